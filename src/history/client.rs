/// Attribute fetches against the context history service
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use crate::config::HistoryEndpoint;
use crate::error::FetchError;
use crate::history::envelope::extract_values;
use crate::models::{Attribute, RawSample};

/// Source of the most recent samples of one attribute
///
/// Implementations never fail: any problem is reported and results in an
/// empty sequence, meaning "no data for this attribute this cycle".
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch(&self, attribute: Attribute, last_n: u32) -> Vec<RawSample>;
}

pub struct HistoryClient {
    http: reqwest::Client,
    endpoint: HistoryEndpoint,
}

impl HistoryClient {
    pub fn new(http: reqwest::Client, endpoint: HistoryEndpoint) -> Self {
        Self { http, endpoint }
    }

    /// `{base}/STH/v1/contextEntities/type/{type}/id/{id}/attributes/{attribute}?lastN={n}`
    pub fn attribute_url(&self, attribute: Attribute, last_n: u32) -> Result<Url, FetchError> {
        let mut url = self.endpoint.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend([
                "STH",
                "v1",
                "contextEntities",
                "type",
                self.endpoint.entity_type.as_str(),
                "id",
                self.endpoint.entity_id.as_str(),
                "attributes",
                attribute.as_str(),
            ]);
        url.query_pairs_mut()
            .clear()
            .append_pair("lastN", &last_n.to_string());
        Ok(url)
    }

    /// Fetch one attribute, surfacing every failure to the caller
    pub async fn try_fetch(
        &self,
        attribute: Attribute,
        last_n: u32,
    ) -> Result<Vec<RawSample>, FetchError> {
        let url = self.attribute_url(attribute, last_n)?;
        debug!("GET {}", url);

        let response = self
            .http
            .get(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header("fiware-service", &self.endpoint.service)
            .header("fiware-servicepath", &self.endpoint.service_path)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await.map_err(FetchError::Decode)?;
        extract_values(&body).ok_or(FetchError::MissingValues { attribute })
    }
}

#[async_trait]
impl HistorySource for HistoryClient {
    async fn fetch(&self, attribute: Attribute, last_n: u32) -> Vec<RawSample> {
        match self.try_fetch(attribute, last_n).await {
            Ok(samples) => {
                debug!("Fetched {} {} samples", samples.len(), attribute);
                samples
            }
            Err(e @ FetchError::MissingValues { .. }) => {
                warn!("{}", e);
                Vec::new()
            }
            Err(e) => {
                error!("Error fetching {}: {}", attribute, e);
                Vec::new()
            }
        }
    }
}
