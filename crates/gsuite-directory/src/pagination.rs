//! Cursor-following page collection.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::client::Page;
use crate::{DirectoryError, DirectoryResult};

/// Drives a paged listing call until the service stops returning a
/// continuation token.
///
/// Items are accumulated in page order. A failed page call aborts the loop
/// and the items collected so far are dropped.
#[derive(Debug, Clone, Default)]
pub struct Paginator {
    max_pages: Option<usize>,
    cancel: CancellationToken,
}

impl Paginator {
    /// Creates a paginator with no page limit.
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            max_pages: None,
            cancel,
        }
    }

    /// Limits the number of page calls per listing.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Calls `fetch_page` with the current continuation token (starting with
    /// `None`) until a page comes back without one.
    ///
    /// # Errors
    ///
    /// Returns the first page error, `PaginationExhausted` when the page
    /// limit is hit with more pages pending, or `Cancelled` once the
    /// cancellation token fires.
    pub async fn collect<T, F, Fut>(&self, mut fetch_page: F) -> DirectoryResult<Vec<T>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = DirectoryResult<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                return Err(DirectoryError::Cancelled);
            }
            if let Some(max_pages) = self.max_pages {
                if pages >= max_pages {
                    return Err(DirectoryError::PaginationExhausted { max_pages });
                }
            }

            let page = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(DirectoryError::Cancelled),
                page = fetch_page(token.take()) => page?,
            };
            pages += 1;
            trace!(page = pages, items = page.items.len(), "collected page");

            items.extend(page.items);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => return Ok(items),
            }
        }
    }
}
