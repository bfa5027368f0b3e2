//! Order-preserving concurrent pagination.
//!
//! List endpoints are fetched page 1 first (to learn the total count), then
//! the remaining pages concurrently with a bounded number in flight. The
//! result concatenates pages in their original order; within-page order is
//! the server's.

use futures_util::stream::{self, StreamExt};
use std::future::Future;

/// Maximum number of page fetches in flight at once.
pub const MAX_IN_FLIGHT_PAGES: usize = 50;

/// One page of a list response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Total matching items across all pages, as reported by the server.
    pub total_count: u64,
    /// Items on this page.
    pub items: Vec<T>,
}

/// Fetch every page of a list result. `fetch` is called with 1-based page
/// numbers and a fixed page size; page 1 is fetched serially to learn the
/// total, pages 2..N run concurrently with at most [`MAX_IN_FLIGHT_PAGES`]
/// in flight. The first page error aborts the whole fetch.
pub async fn fetch_all_pages<T, E, F, Fut>(page_size: u64, fetch: F) -> Result<Vec<T>, E>
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    debug_assert!(page_size > 0);

    let first = fetch(1).await?;
    let total = first.total_count;
    let pages = total.div_ceil(page_size);
    let mut items = first.items;

    if pages <= 1 {
        return Ok(items);
    }

    tracing::debug!(total, pages, page_size, "fetching remaining pages");
    let mut rest = stream::iter((2..=pages).map(|n| fetch(n))).buffered(MAX_IN_FLIGHT_PAGES);
    let mut fetched: u64 = 1;
    while let Some(page) = rest.next().await {
        match page {
            Ok(page) => {
                items.extend(page.items);
                fetched += 1;
            }
            Err(e) => {
                tracing::warn!(fetched, pages, "page fetch failed, discarding partial result");
                return Err(e);
            }
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn page_of(total: u64, page_size: u64, page: u64) -> Page<u64> {
        let start = (page - 1) * page_size;
        let end = total.min(start + page_size);
        Page {
            total_count: total,
            items: (start..end).collect(),
        }
    }

    #[tokio::test]
    async fn single_page_issues_one_call() {
        let calls = AtomicU64::new(0);
        let items = fetch_all_pages(100, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, Infallible>(page_of(73, 100, n)) }
        })
        .await
        .unwrap();
        assert_eq!(items.len(), 73);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn three_pages_concatenate_in_order() {
        let calls = AtomicU64::new(0);
        let items = fetch_all_pages(100, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, Infallible>(page_of(250, 100, n)) }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(items.len(), 250);
        let expected: Vec<u64> = (0..250).collect();
        assert_eq!(items, expected);
    }

    #[tokio::test]
    async fn empty_result() {
        let items: Vec<u64> = fetch_all_pages(100, |n| async move {
            Ok::<_, Infallible>(page_of(0, 100, n))
        })
        .await
        .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn page_error_propagates() {
        let calls = AtomicU64::new(0);
        let result = fetch_all_pages(10, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 3 {
                    Err("boom")
                } else {
                    Ok(page_of(45, 10, n))
                }
            }
        })
        .await;
        assert_eq!(result.unwrap_err(), "boom");
        // the healthy pages were fetched before the failure surfaced
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn exact_multiple_of_page_size() {
        let items = fetch_all_pages(50, |n| async move {
            Ok::<_, Infallible>(page_of(100, 50, n))
        })
        .await
        .unwrap();
        assert_eq!(items.len(), 100);
    }
}
