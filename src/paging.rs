//! Offset paging bounded by the server's total count.
//!
//! The server picks the page size. The driver keeps asking for
//! `offset = records so far` until it holds exactly `total_count` records, and
//! treats every way of not getting there as a server inconsistency.

use std::future::Future;
use tracing::debug;

use crate::context::OperationContext;
use crate::error::ProviderError;

/// One page of a list call.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Records of this page, in server order.
    pub records: Vec<T>,
    /// Records matching the query in total.
    pub total_count: i64,
}

impl<T> Page<T> {
    /// A page.
    pub fn new(records: Vec<T>, total_count: i64) -> Self {
        Self {
            records,
            total_count,
        }
    }

    /// Transform every record.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            records: self.records.into_iter().map(f).collect(),
            total_count: self.total_count,
        }
    }

    /// Transform every record, failing on the first error.
    pub fn try_map<U, F>(self, f: F) -> Result<Page<U>, ProviderError>
    where
        F: FnMut(T) -> Result<U, ProviderError>,
    {
        Ok(Page {
            records: self.records.into_iter().map(f).collect::<Result<_, _>>()?,
            total_count: self.total_count,
        })
    }
}

/// Collect every record by calling `fetch` with successive offsets.
///
/// The first call has no offset. Returns exactly `total_count` records in
/// server order, or an [`ProviderError::Invariant`] when the server returns an
/// empty page early, more records than it announced, or needs more calls than
/// `total / first_page_size + 1`.
pub async fn collect_pages<T, F, Fut>(
    ctx: &OperationContext,
    mut fetch: F,
) -> Result<Vec<T>, ProviderError>
where
    F: FnMut(Option<i64>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ProviderError>>,
{
    let mut buffer: Vec<T> = Vec::new();
    let mut calls: i64 = 0;
    let mut budget: Option<i64> = None;
    let mut offset: Option<i64> = None;

    loop {
        ctx.check("paged list")?;
        let page = fetch(offset).await?;
        calls += 1;

        let total = page.total_count;
        let returned = page.records.len() as i64;
        let budget = *budget.get_or_insert(total / returned.max(1) + 1);
        buffer.extend(page.records);
        let held = buffer.len() as i64;
        debug!(offset = ?offset, returned, held, total, "Fetched page");

        if held == total {
            return Ok(buffer);
        }
        if held > total {
            return Err(ProviderError::Invariant(format!(
                "server returned {} records but reported a total of {}",
                held, total
            )));
        }
        if returned == 0 {
            return Err(ProviderError::Invariant(format!(
                "server returned an empty page at offset {} of {}",
                held, total
            )));
        }
        if calls >= budget {
            return Err(ProviderError::Invariant(format!(
                "listing did not reach {} records within {} calls",
                total, budget
            )));
        }
        offset = Some(held);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn scripted(
        pages: Vec<Page<u32>>,
    ) -> (
        Arc<Mutex<Vec<Option<i64>>>>,
        impl FnMut(Option<i64>) -> std::future::Ready<Result<Page<u32>, ProviderError>>,
    ) {
        let offsets = Arc::new(Mutex::new(Vec::new()));
        let seen = offsets.clone();
        let mut pages = pages.into_iter();
        let fetch = move |offset: Option<i64>| {
            seen.lock().unwrap().push(offset);
            std::future::ready(
                pages
                    .next()
                    .ok_or_else(|| ProviderError::Invariant("script exhausted".to_string())),
            )
        };
        (offsets, fetch)
    }

    #[tokio::test]
    async fn test_three_pages_of_seven() {
        let (offsets, fetch) = scripted(vec![
            Page::new(vec![1, 2, 3], 7),
            Page::new(vec![4, 5, 6], 7),
            Page::new(vec![7], 7),
        ]);
        let records = collect_pages(&OperationContext::background(), fetch)
            .await
            .unwrap();
        assert_eq!(records, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(*offsets.lock().unwrap(), vec![None, Some(3), Some(6)]);
    }

    #[tokio::test]
    async fn test_empty_listing_is_one_call() {
        let (offsets, fetch) = scripted(vec![Page::new(vec![], 0)]);
        let records = collect_pages(&OperationContext::background(), fetch)
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(offsets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_page_before_total_is_fatal() {
        let (_, fetch) = scripted(vec![Page::new(vec![1, 2], 5), Page::new(vec![], 5)]);
        let err = collect_pages(&OperationContext::background(), fetch)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Invariant(msg) if msg.contains("empty page")));
    }

    #[tokio::test]
    async fn test_overshoot_is_fatal() {
        let (_, fetch) = scripted(vec![Page::new(vec![1, 2, 3], 2)]);
        let err = collect_pages(&OperationContext::background(), fetch)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Invariant(_)));
    }

    #[tokio::test]
    async fn test_call_budget_is_enforced() {
        // 5 records in pages of 2 allow 3 calls; a server shrinking pages to 1 runs out
        let (offsets, fetch) = scripted(vec![
            Page::new(vec![1, 2], 5),
            Page::new(vec![3], 5),
            Page::new(vec![4], 5),
            Page::new(vec![5], 5),
        ]);
        let err = collect_pages(&OperationContext::background(), fetch)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Invariant(msg) if msg.contains("within 3 calls")));
        assert_eq!(offsets.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_before_fetching() {
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let (offsets, fetch) = scripted(vec![Page::new(vec![1], 1)]);
        let err = collect_pages(&OperationContext::new(token), fetch)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled(_)));
        assert!(offsets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_page_map() {
        let page = Page::new(vec![1, 2], 2).map(|n| n * 10);
        assert_eq!(page.records, vec![10, 20]);
        let err = Page::new(vec![1], 1)
            .try_map(|_| Err::<u32, _>(ProviderError::Conversion("bad".to_string())))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Conversion(_)));
    }
}
