pub mod api;
pub mod transformer;

pub use self::api::WhoopDataType;
pub use self::transformer::{SleepStage, WhoopMetric};

use futures::TryStreamExt;
use serde_json::Value;
use std::sync::Arc;
use tether::config::WHOOP;
use tether::executor::Executor;
use tether::pagination::fetch_all;
use tether::Result;
use tracing::info;

use self::transformer::record_to_metric;
use crate::window::FetchWindow;

/// Records per page requested from WHOOP.
pub const PAGE_LIMIT: u32 = 25;

/// WHOOP client: reads recovery, sleep and cycle collections through the
/// OAuth-authenticated executor.
pub struct WhoopClient {
    executor: Arc<Executor>,
}

impl WhoopClient {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }

    /// Every raw record of `data_type` inside `window`, across all pages.
    pub async fn records(
        &self,
        data_type: WhoopDataType,
        window: &FetchWindow,
    ) -> Result<Vec<Value>> {
        let mut params = window.params();
        params.push(("limit".to_string(), PAGE_LIMIT.to_string()));

        let records: Vec<Value> =
            fetch_all(&self.executor, WHOOP, data_type.endpoint(), params)
                .try_collect()
                .await?;

        info!(
            data_type = %data_type,
            count = records.len(),
            "Fetched WHOOP records"
        );
        Ok(records)
    }

    /// Normalized metrics of `data_type` inside `window`.
    pub async fn metrics(
        &self,
        data_type: WhoopDataType,
        window: &FetchWindow,
    ) -> Result<Vec<WhoopMetric>> {
        self.records(data_type, window)
            .await?
            .into_iter()
            .map(|record| record_to_metric(data_type, record))
            .collect()
    }
}
