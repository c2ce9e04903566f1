// In crates/api-client/src/lib.rs

use std::sync::Arc;

use app_config::ApiSettings;
use async_trait::async_trait;
use core_types::{BotStatus, ControlAck, RunDetail, RunId, RunList, RunSummary, TimeSeries};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

pub mod error;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use types::*;

/// Longest error body kept in `Error::HttpStatus`.
const MAX_ERROR_BODY: usize = 512;

/// The backend contract consumed by the dashboard.
///
/// `ApiClient` is the HTTP implementation; the synchronizer only depends on
/// this trait so it can be driven by any source.
#[async_trait]
pub trait ControlTowerApi: Send + Sync {
    /// `GET /api/runs`
    async fn list_runs(&self) -> Result<Vec<RunSummary>>;

    /// `GET /api/control/status`
    async fn bot_status(&self) -> Result<BotStatus>;

    /// `POST /api/control/start` or `POST /api/control/stop`
    async fn control(&self, action: BotAction) -> Result<ControlAck>;

    /// `GET /api/runs/{run_id}`
    async fn run_detail(&self, run_id: &RunId) -> Result<RunDetail>;

    /// `GET /api/runs/{run_id}/timeseries`
    async fn timeseries(&self, run_id: &RunId) -> Result<TimeSeries>;
}

#[async_trait]
impl<T: ControlTowerApi + ?Sized> ControlTowerApi for Arc<T> {
    async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        (**self).list_runs().await
    }

    async fn bot_status(&self) -> Result<BotStatus> {
        (**self).bot_status().await
    }

    async fn control(&self, action: BotAction) -> Result<ControlAck> {
        (**self).control(action).await
    }

    async fn run_detail(&self, run_id: &RunId) -> Result<RunDetail> {
        (**self).run_detail(run_id).await
    }

    async fn timeseries(&self, run_id: &RunId) -> Result<TimeSeries> {
        (**self).timeseries(run_id).await
    }
}

impl ApiClient {
    /// Constructs a new ApiClient from ApiSettings.
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let raw = settings.base_url.trim();
        let base_url =
            Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(format!("{raw}: not a base URL")));
        }

        let http_client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| Error::ClientBuildError(e.to_string()))?;

        Ok(ApiClient { http_client, base_url })
    }

    /// Appends path segments to the base URL. Each segment is percent-encoded,
    /// so a run id can never escape its own path component.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::InvalidUrl(self.base_url.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "GET");
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(Error::RequestFailed)?;
        decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "POST");
        let response = self
            .http_client
            .post(url)
            .send()
            .await
            .map_err(Error::RequestFailed)?;
        decode(response).await
    }
}

/// Turns a response into `T`, mapping non-2xx statuses to `Error::HttpStatus`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await.map_err(Error::RequestFailed)?;

    if !status.is_success() {
        let mut body = text;
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(Error::HttpStatus { status: status.as_u16(), body });
    }

    serde_json::from_str(&text).map_err(Error::DeserializationFailed)
}

#[async_trait]
impl ControlTowerApi for ApiClient {
    async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let list: RunList = self.get_json(&["api", "runs"]).await?;
        Ok(list.runs)
    }

    async fn bot_status(&self) -> Result<BotStatus> {
        self.get_json(&["api", "control", "status"]).await
    }

    async fn control(&self, action: BotAction) -> Result<ControlAck> {
        self.post_json(&["api", "control", action.path()]).await
    }

    async fn run_detail(&self, run_id: &RunId) -> Result<RunDetail> {
        self.get_json(&["api", "runs", run_id.as_str()]).await
    }

    async fn timeseries(&self, run_id: &RunId) -> Result<TimeSeries> {
        self.get_json(&["api", "runs", run_id.as_str(), "timeseries"]).await
    }
}
