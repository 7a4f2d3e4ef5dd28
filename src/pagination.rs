//! Cursor-paginated fetch.
//!
//! Pages look like:
//!
//! ```json
//! { "data": { "items": [ ... ] }, "meta": { "cursor": "next-page-token" } }
//! ```
//!
//! A `null`, empty or absent cursor ends the sequence. Streams are lazy: no
//! request is made until the first item is polled, and each later page is
//! requested only once the previous one has been consumed. Bounding the
//! number of pages is up to the caller (`.take(n)` or date-range params).

use crate::error::{Error, Result};
use crate::executor::Executor;
use futures::stream::{self, Stream, TryStreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Query parameter carrying the cursor of the page to fetch.
pub const CURSOR_PARAM: &str = "cursor";

/// One page of records.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct RawPage {
    data: RawData,
    #[serde(default)]
    meta: Option<RawMeta>,
}

#[derive(Deserialize)]
struct RawData {
    items: Vec<Value>,
}

#[derive(Deserialize)]
struct RawMeta {
    #[serde(default)]
    cursor: Option<String>,
}

impl Page {
    /// Parses a page body; a missing `data.items` array is malformed.
    pub fn parse(body: &str) -> Result<Self> {
        let raw: RawPage = serde_json::from_str(body)
            .map_err(|e| Error::MalformedResponse(format!("page: {e}")))?;

        let next_cursor = raw
            .meta
            .and_then(|meta| meta.cursor)
            .filter(|cursor| !cursor.is_empty());

        Ok(Self {
            items: raw.data.items,
            next_cursor,
        })
    }
}

/// Lazily fetches pages from `endpoint`, following cursors until exhausted.
///
/// `params` are sent with every page request. An error is yielded once and
/// ends the stream.
pub fn fetch_pages<'a>(
    executor: &'a Executor,
    provider: &'a str,
    endpoint: &'a str,
    params: Vec<(String, String)>,
) -> impl Stream<Item = Result<Page>> + 'a {
    // State: Some(cursor) while pages remain; None once exhausted.
    stream::try_unfold(Some(None::<String>), move |state| {
        let mut query = params.clone();
        async move {
            let Some(cursor) = state else {
                return Ok(None);
            };

            if let Some(cursor) = cursor {
                query.push((CURSOR_PARAM.to_string(), cursor));
            }

            let response = executor.get(provider, endpoint, &query).await?;
            let page = Page::parse(&response.body)?;

            debug!(
                provider = %provider,
                endpoint = %endpoint,
                items = page.items.len(),
                has_more = page.next_cursor.is_some(),
                "Fetched page"
            );

            let next = page.next_cursor.clone().map(Some);
            Ok::<_, Error>(Some((page, next)))
        }
    })
}

/// Lazily fetches every record from `endpoint`, page by page.
pub fn fetch_all<'a>(
    executor: &'a Executor,
    provider: &'a str,
    endpoint: &'a str,
    params: Vec<(String, String)>,
) -> impl Stream<Item = Result<Value>> + 'a {
    fetch_pages(executor, provider, endpoint, params)
        .map_ok(|page| stream::iter(page.items.into_iter().map(Ok)))
        .try_flatten()
}

/// Drains a record stream into a vector, stopping at the first error.
pub async fn collect_all<S>(records: S) -> Result<Vec<Value>>
where
    S: Stream<Item = Result<Value>>,
{
    records.try_collect().await
}
