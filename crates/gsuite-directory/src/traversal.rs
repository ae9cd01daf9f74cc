//! Group membership traversal.
//!
//! Lists groups, then resolves the members of every group and assembles the
//! results into a [`Report`]. The report is all-or-nothing: the first
//! failure aborts the traversal and no partial result is returned.

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::client::{DirectoryApi, GroupItem};
use crate::pagination::Paginator;
use crate::report::{Group, Report};
use crate::{DirectoryResult, Operation, TraversalError};

/// Tuning knobs for a traversal.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// Maximum page calls per listing; `None` follows cursors indefinitely.
    pub max_pages: Option<usize>,
    /// Groups whose members are resolved at the same time. `1` is strictly
    /// sequential.
    pub concurrency: usize,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            concurrency: 1,
        }
    }
}

/// Builds membership reports from a directory.
#[derive(Debug)]
pub struct GroupLister<C> {
    client: C,
    options: TraversalOptions,
}

impl<C: DirectoryApi> GroupLister<C> {
    /// Creates a lister with default options.
    pub fn new(client: C) -> Self {
        Self::with_options(client, TraversalOptions::default())
    }

    pub fn with_options(client: C, options: TraversalOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Lists every group of the domain with its members.
    pub async fn list_groups(&self, cancel: &CancellationToken) -> Result<Report, TraversalError> {
        self.traverse("", cancel).await
    }

    /// Lists the groups `user_key` belongs to, each with its members.
    pub async fn list_groups_for_user(
        &self,
        user_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Report, TraversalError> {
        self.traverse(user_key, cancel).await
    }

    #[instrument(skip(self, cancel))]
    async fn traverse(
        &self,
        user_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Report, TraversalError> {
        let paginator = Paginator::new(cancel.clone()).with_max_pages(self.options.max_pages);

        let items = self.list_all_groups(user_key, &paginator).await.map_err(|e| {
            TraversalError::new(
                Operation::ListGroups {
                    user_key: user_key.to_string(),
                },
                e,
            )
        })?;
        info!("Listed {} groups, resolving members", items.len());

        let report = Report::new(self.resolve_groups(items, &paginator).await?);
        info!(
            "Traversal completed, {} groups with {} memberships",
            report.len(),
            report.member_count()
        );
        Ok(report)
    }

    /// Resolves members for every group with at most `concurrency` groups
    /// in flight. Results keep the listing order. The first failure returns
    /// at once and drops the groups still in flight.
    async fn resolve_groups(
        &self,
        items: Vec<GroupItem>,
        paginator: &Paginator,
    ) -> Result<Vec<Group>, TraversalError> {
        let mut slots: Vec<Option<Group>> = (0..items.len()).map(|_| None).collect();
        let mut pending = items.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();

        let resolve = |index: usize, item: GroupItem| async move {
            (index, self.resolve_group(item, paginator).await)
        };

        for (index, item) in pending.by_ref().take(self.options.concurrency.max(1)) {
            in_flight.push(resolve(index, item));
        }

        while let Some((index, result)) = in_flight.next().await {
            slots[index] = Some(result?);
            if let Some((index, item)) = pending.next() {
                in_flight.push(resolve(index, item));
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    async fn list_all_groups(
        &self,
        user_key: &str,
        paginator: &Paginator,
    ) -> DirectoryResult<Vec<GroupItem>> {
        let client = &self.client;
        paginator
            .collect(move |token| async move {
                client.list_groups_page(user_key, token.as_deref()).await
            })
            .await
    }

    async fn resolve_group(
        &self,
        item: GroupItem,
        paginator: &Paginator,
    ) -> Result<Group, TraversalError> {
        let members = self
            .list_all_members(&item.id, paginator)
            .await
            .map_err(|e| {
                TraversalError::new(
                    Operation::ListMembers {
                        group_id: item.id.clone(),
                    },
                    e,
                )
            })?;
        debug!(group = %item.id, "Resolved {} members", members.len());

        Ok(Group::from_item(item, members))
    }

    async fn list_all_members(
        &self,
        group_key: &str,
        paginator: &Paginator,
    ) -> DirectoryResult<Vec<String>> {
        let client = &self.client;
        let members = paginator
            .collect(move |token| async move {
                client.list_members_page(group_key, token.as_deref()).await
            })
            .await?;

        Ok(members
            .iter()
            .map(|m| m.identifier().to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::client::{MemberItem, Page};
    use crate::{ApiErrorKind, DirectoryError};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Groups {
            user_key: String,
            token: Option<String>,
        },
        Members {
            group: String,
            token: Option<String>,
        },
    }

    /// In-memory directory serving pre-built pages, addressed by token
    /// `page-<n>`.
    #[derive(Default)]
    struct FakeDirectory {
        groups: HashMap<String, Vec<Page<GroupItem>>>,
        members: HashMap<String, Vec<Page<MemberItem>>>,
        failing: HashSet<String>,
        delays: HashMap<String, Duration>,
        calls: Mutex<Vec<Call>>,
    }

    fn paged<T>(pages: Vec<Vec<T>>) -> Vec<Page<T>> {
        let n = pages.len();
        pages
            .into_iter()
            .enumerate()
            .map(|(i, items)| Page::new(items, (i + 1 < n).then(|| format!("page-{}", i + 1))))
            .collect()
    }

    fn page_index(token: Option<&str>) -> usize {
        token
            .and_then(|t| t.strip_prefix("page-"))
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }

    fn group(id: &str) -> GroupItem {
        GroupItem {
            id: id.to_string(),
            email: format!("{}@example.com", id.to_lowercase()),
            name: format!("Group {id}"),
            ..Default::default()
        }
    }

    fn member(email: &str) -> MemberItem {
        MemberItem {
            id: format!("id-{email}"),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    impl FakeDirectory {
        fn with_groups(mut self, user_key: &str, pages: Vec<Vec<GroupItem>>) -> Self {
            self.groups.insert(user_key.to_string(), paged(pages));
            self
        }

        fn with_members(mut self, group: &str, pages: Vec<Vec<&str>>) -> Self {
            let pages = pages
                .into_iter()
                .map(|p| p.into_iter().map(member).collect())
                .collect();
            self.members.insert(group.to_string(), paged(pages));
            self
        }

        fn failing(mut self, group: &str) -> Self {
            self.failing.insert(group.to_string());
            self
        }

        fn delayed(mut self, group: &str, delay: Duration) -> Self {
            self.delays.insert(group.to_string(), delay);
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn member_calls_for(&self, group: &str) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::Members { group: g, .. } if g == group))
                .count()
        }
    }

    #[async_trait]
    impl DirectoryApi for FakeDirectory {
        async fn list_groups_page(
            &self,
            user_key: &str,
            page_token: Option<&str>,
        ) -> DirectoryResult<Page<GroupItem>> {
            self.calls.lock().unwrap().push(Call::Groups {
                user_key: user_key.to_string(),
                token: page_token.map(String::from),
            });
            let pages = self.groups.get(user_key).ok_or_else(|| {
                DirectoryError::api(ApiErrorKind::NotFound, format!("no user {user_key}"))
            })?;
            Ok(pages[page_index(page_token)].clone())
        }

        async fn list_members_page(
            &self,
            group_key: &str,
            page_token: Option<&str>,
        ) -> DirectoryResult<Page<MemberItem>> {
            self.calls.lock().unwrap().push(Call::Members {
                group: group_key.to_string(),
                token: page_token.map(String::from),
            });
            if let Some(delay) = self.delays.get(group_key) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.contains(group_key) {
                return Err(DirectoryError::api(
                    ApiErrorKind::PermissionDenied,
                    "Not Authorized to access this resource/api",
                ));
            }
            match self.members.get(group_key) {
                Some(pages) => Ok(pages[page_index(page_token)].clone()),
                None => Ok(Page::last(Vec::new())),
            }
        }
    }

    fn abc_directory() -> FakeDirectory {
        FakeDirectory::default()
            .with_groups("", vec![vec![group("A"), group("B")], vec![group("C")]])
            .with_members("A", vec![vec!["a1"], vec!["a2"]])
            .with_members("B", vec![vec![]])
            .with_members("C", vec![vec!["c1"]])
    }

    fn summary(report: &Report) -> Vec<(String, Vec<String>)> {
        report
            .iter()
            .map(|g| (g.id.clone(), g.members.clone()))
            .collect()
    }

    fn expected_abc() -> Vec<(String, Vec<String>)> {
        vec![
            ("A".into(), vec!["a1".into(), "a2".into()]),
            ("B".into(), vec![]),
            ("C".into(), vec!["c1".into()]),
        ]
    }

    #[tokio::test]
    async fn test_report_preserves_listing_order() {
        let lister = GroupLister::new(abc_directory());
        let report = lister.list_groups(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary(&report), expected_abc());
        assert_eq!(report.groups()[0].email, "a@example.com");
        assert_eq!(report.groups()[0].name, "Group A");
    }

    #[tokio::test]
    async fn test_sequential_call_order() {
        let lister = GroupLister::new(abc_directory());
        lister.list_groups(&CancellationToken::new()).await.unwrap();

        let groups_call = |token: Option<&str>| Call::Groups {
            user_key: String::new(),
            token: token.map(String::from),
        };
        let members_call = |group: &str, token: Option<&str>| Call::Members {
            group: group.to_string(),
            token: token.map(String::from),
        };

        assert_eq!(
            lister.client().calls(),
            vec![
                groups_call(None),
                groups_call(Some("page-1")),
                members_call("A", None),
                members_call("A", Some("page-1")),
                members_call("B", None),
                members_call("C", None),
            ]
        );
    }

    #[tokio::test]
    async fn test_member_failure_aborts_whole_traversal() {
        let lister = GroupLister::new(abc_directory().failing("B"));
        let err = lister
            .list_groups(&CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.group_id(), Some("B"));
        assert_eq!(
            err.operation,
            Operation::ListMembers {
                group_id: "B".into()
            }
        );
        assert_eq!(err.source.api_kind(), Some(ApiErrorKind::PermissionDenied));
        assert_eq!(lister.client().member_calls_for("A"), 2);
        assert_eq!(lister.client().member_calls_for("C"), 0);
    }

    #[tokio::test]
    async fn test_groups_listing_failure_names_operation() {
        let lister = GroupLister::new(FakeDirectory::default());
        let err = lister
            .list_groups_for_user("nobody@example.com", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.operation,
            Operation::ListGroups {
                user_key: "nobody@example.com".into()
            }
        );
        assert!(err.group_id().is_none());
    }

    #[tokio::test]
    async fn test_scoped_and_unscoped_listing() {
        let directory = abc_directory().with_groups(
            "alice@example.com",
            vec![vec![group("A"), group("C")]],
        );
        let lister = GroupLister::new(directory);
        let cancel = CancellationToken::new();

        let all = lister.list_groups(&cancel).await.unwrap();
        let alice = lister
            .list_groups_for_user("alice@example.com", &cancel)
            .await
            .unwrap();

        let group_keys: Vec<String> = lister
            .client()
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Groups { user_key, token: None } => Some(user_key),
                _ => None,
            })
            .collect();
        assert_eq!(group_keys, vec!["".to_string(), "alice@example.com".to_string()]);

        assert_eq!(all.len(), 3);
        assert_eq!(
            summary(&alice),
            vec![
                ("A".into(), vec!["a1".into(), "a2".into()]),
                ("C".into(), vec!["c1".into()]),
            ]
        );
        assert_eq!(alice.groups()[0], all.groups()[0]);
        assert_eq!(alice.groups()[1], all.groups()[2]);
    }

    #[tokio::test]
    async fn test_repeated_traversal_is_identical() {
        let lister = GroupLister::new(abc_directory());
        let cancel = CancellationToken::new();

        let first = lister.list_groups(&cancel).await.unwrap();
        let second = lister.list_groups(&cancel).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_empty_domain() {
        let lister = GroupLister::new(FakeDirectory::default().with_groups("", vec![vec![]]));
        let report = lister.list_groups(&CancellationToken::new()).await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_resolution_keeps_order() {
        let directory = abc_directory()
            .delayed("A", Duration::from_millis(60))
            .delayed("B", Duration::from_millis(30));
        let options = TraversalOptions {
            concurrency: 3,
            ..Default::default()
        };
        let lister = GroupLister::with_options(directory, options);

        let report = lister.list_groups(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary(&report), expected_abc());
    }

    #[tokio::test]
    async fn test_concurrent_resolution_fails_on_error() {
        let options = TraversalOptions {
            concurrency: 3,
            ..Default::default()
        };
        let lister = GroupLister::with_options(abc_directory().failing("C"), options);

        let err = lister
            .list_groups(&CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.group_id(), Some("C"));
    }

    #[tokio::test]
    async fn test_concurrent_failure_does_not_wait_for_slow_groups() {
        let directory = abc_directory()
            .delayed("A", Duration::from_secs(5))
            .failing("B");
        let options = TraversalOptions {
            concurrency: 2,
            ..Default::default()
        };
        let lister = GroupLister::with_options(directory, options);

        let started = std::time::Instant::now();
        let err = lister
            .list_groups(&CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.group_id(), Some("B"));
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "error took {:?}",
            started.elapsed()
        );
        assert_eq!(lister.client().member_calls_for("C"), 0);
    }

    #[tokio::test]
    async fn test_page_limit_applies_to_members() {
        let options = TraversalOptions {
            max_pages: Some(1),
            ..Default::default()
        };
        let directory = FakeDirectory::default()
            .with_groups("", vec![vec![group("A")]])
            .with_members("A", vec![vec!["a1"], vec!["a2"]]);
        let lister = GroupLister::with_options(directory, options);

        let err = lister
            .list_groups(&CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.group_id(), Some("A"));
        assert!(matches!(
            err.source,
            DirectoryError::PaginationExhausted { max_pages: 1 }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_traversal_returns_no_report() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let lister = GroupLister::new(abc_directory());
        let err = lister.list_groups(&cancel).await.unwrap_err();

        assert!(matches!(err.source, DirectoryError::Cancelled));
        assert!(lister.client().calls().is_empty());
    }
}
