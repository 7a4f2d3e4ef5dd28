pub mod api;
pub mod transformer;

pub use self::transformer::LimitlessEvent;

use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tether::config::LIMITLESS;
use tether::executor::Executor;
use tether::pagination::{fetch_pages, Page};
use tether::Result;
use tracing::{info, warn};

use self::transformer::lifelog_to_event;
use crate::window::FetchWindow;

pub const LIFELOGS_ENDPOINT: &str = "/v1/lifelogs";

/// Lifelogs per page.
pub const PAGE_LIMIT: u32 = 10;

/// Limitless client: reads pendant lifelogs with the stored API key.
pub struct LimitlessClient {
    executor: Arc<Executor>,
}

impl LimitlessClient {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }

    /// Lifelogs inside `window`, reading at most `max_pages` pages.
    pub async fn lifelogs(
        &self,
        window: &FetchWindow,
        max_pages: usize,
    ) -> Result<Vec<LimitlessEvent>> {
        let mut params = window.params();
        params.push(("limit".to_string(), PAGE_LIMIT.to_string()));

        let pages: Vec<Page> = fetch_pages(&self.executor, LIMITLESS, LIFELOGS_ENDPOINT, params)
            .take(max_pages)
            .try_collect()
            .await?;

        if pages.last().is_some_and(|page| page.next_cursor.is_some()) {
            warn!(max_pages = max_pages, "Stopped before the last lifelog page");
        }

        let events = pages
            .into_iter()
            .flat_map(|page| page.items)
            .map(lifelog_to_event)
            .collect::<Result<Vec<_>>>()?;

        info!(count = events.len(), "Fetched Limitless lifelogs");
        Ok(events)
    }
}
