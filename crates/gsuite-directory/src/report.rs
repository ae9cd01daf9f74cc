//! Groups with their resolved memberships.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::client::GroupItem;

/// Tag applied to groups created by an administrator rather than a user.
pub const TAG_ADMIN_CREATED: &str = "admin-created";

/// A group together with its fully resolved member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub email: String,
    pub aliases: Vec<String>,
    pub tags: BTreeSet<String>,
    /// Member emails in the order the directory returned them.
    pub members: Vec<String>,
}

impl Group {
    /// Combines a listed group with its resolved members.
    #[must_use]
    pub fn from_item(item: GroupItem, members: Vec<String>) -> Self {
        let mut tags = BTreeSet::new();
        if item.admin_created == Some(true) {
            tags.insert(TAG_ADMIN_CREATED.to_string());
        }

        Self {
            id: item.id,
            name: item.name,
            email: item.email,
            aliases: item.aliases,
            tags,
            members,
        }
    }
}

/// Every group of one traversal, in groups-listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Report {
    groups: Vec<Group>,
}

impl Report {
    #[must_use]
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of memberships across all groups.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Group> {
        self.groups.iter()
    }
}

impl IntoIterator for Report {
    type Item = Group;
    type IntoIter = std::vec::IntoIter<Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

impl<'a> IntoIterator for &'a Report {
    type Item = &'a Group;
    type IntoIter = std::slice::Iter<'a, Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}
