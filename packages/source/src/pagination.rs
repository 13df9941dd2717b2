//! Lazy offset pagination over a [`PageSource`].
//!
//! [`pages`] yields one page per poll, advancing the offset by the page size
//! after each non-empty page and sleeping for the configured delay before the
//! next fetch. The stream ends at the first empty page or the first error.
//! Callers compose it like any other stream: `take(n)` for a bounded run, or
//! drain it to exhaustion.

use std::time::Duration;

use async_stream::try_stream;
use futures::Stream;
use parking_map_source_models::PageQuery;
use parking_map_ticket_models::RawPayload;

use crate::{PageSource, SourceError};

/// Streams pages from `source`, starting at `first`.
///
/// A zero `delay` disables the inter-page sleep. The stream is finite and
/// cannot be resumed mid-way; restarting means fetching from `first` again.
pub fn pages<'a, S>(
    source: &'a S,
    first: PageQuery,
    delay: Duration,
) -> impl Stream<Item = Result<Vec<RawPayload>, SourceError>> + 'a
where
    S: PageSource + ?Sized,
{
    try_stream! {
        let mut query = first;
        loop {
            let page = source.fetch_page(&query).await?;
            if page.is_empty() {
                log::debug!("[{}] empty page at offset {}", source.id(), query.offset);
                break;
            }
            yield page;

            query = query.next();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
