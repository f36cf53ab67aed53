use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::config::ResolvedConfig;
use crate::domain::{ListingResponse, ModelId};
use crate::error::HarvestError;

pub trait ModelDbClient {
    fn list_models(&self) -> Result<Vec<ModelId>, HarvestError>;

    fn fetch_detail(&self, id: ModelId) -> Result<Value, HarvestError>;
}

impl<T: ModelDbClient + ?Sized> ModelDbClient for &T {
    fn list_models(&self) -> Result<Vec<ModelId>, HarvestError> {
        (**self).list_models()
    }

    fn fetch_detail(&self, id: ModelId) -> Result<Value, HarvestError> {
        (**self).fetch_detail(id)
    }
}

#[derive(Clone)]
pub struct ModelDbHttpClient {
    client: Client,
    listing_url: String,
    detail_base_url: String,
}

impl ModelDbHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, HarvestError> {
        Self::with_urls(
            &config.listing_url,
            &config.detail_base_url,
            config.request_timeout,
        )
    }

    pub fn with_urls(
        listing_url: &str,
        detail_base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("modeldb-harvester/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HarvestError::Http(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        // reqwest's blocking client defaults to a 30s timeout; `None` here
        // means no timeout at all.
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| HarvestError::Http(err.to_string()))?;

        Ok(Self {
            client,
            listing_url: listing_url.to_string(),
            detail_base_url: detail_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn detail_url(&self, id: ModelId) -> String {
        format!("{}/{}", self.detail_base_url, id)
    }

    fn get(&self, url: &str) -> Result<Response, HarvestError> {
        debug!(url, "modeldb.request");
        self.client
            .get(url)
            .send()
            .map_err(|err| HarvestError::Http(err.to_string()))
    }

    fn handle_status(response: Response) -> Result<Response, HarvestError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "ModelDB request failed".to_string());
        Err(HarvestError::Status { status, message })
    }
}

impl ModelDbClient for ModelDbHttpClient {
    fn list_models(&self) -> Result<Vec<ModelId>, HarvestError> {
        let response = Self::handle_status(self.get(&self.listing_url)?)?;
        let listing: ListingResponse = response.json().map_err(|err| HarvestError::Decode {
            context: "model listing".to_string(),
            message: err.to_string(),
        })?;
        Ok(listing.objects.into_iter().map(|object| object.id).collect())
    }

    fn fetch_detail(&self, id: ModelId) -> Result<Value, HarvestError> {
        let response = self.get(&self.detail_url(id))?;
        // The transient error body arrives with a 5xx status, so the body is
        // decoded before the status is considered.
        let status = response.status();
        let text = response
            .text()
            .map_err(|err| HarvestError::Http(err.to_string()))?;
        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Ok(body),
            Err(_) if !status.is_success() => Err(HarvestError::Status {
                status: status.as_u16(),
                message: text,
            }),
            Err(err) => Err(HarvestError::Decode {
                context: format!("model {id}"),
                message: err.to_string(),
            }),
        }
    }
}
