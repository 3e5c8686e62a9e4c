//! Authenticated HTTP access to the data API.

use std::time::Duration;

use async_trait::async_trait;
use ingestion::{SubmissionPort, SubmitError, SubmitReceipt};
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ApiError, ApiErrorResponse, Result};
use crate::key::KeyInfo;

const ENDPOINT_METARS: &str = "/v1/metars";
const ENDPOINT_KEY_INFO: &str = "/v1/auth/key";

#[derive(Serialize)]
struct FeedRequest<'a> {
    data: &'a [String],
}

#[derive(Deserialize)]
struct FeedResponse {
    #[serde(default)]
    duplicates: Vec<usize>,
}

/// Client for the data API, authenticating with a bearer key.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    address: String,
    key: String,
}

impl ApiClient {
    /// Create a client. Trailing slashes of `address` are ignored.
    pub fn new(address: &str, key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            client,
            address: address.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.address, endpoint))
            .bearer_auth(&self.key)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ApiErrorResponse>(&body) {
                Ok(response) => ApiError::Api(response),
                Err(_) => ApiError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                },
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Retrieve the information about the configured key.
    pub async fn key_info(&self) -> Result<KeyInfo> {
        self.execute(self.request(Method::GET, ENDPOINT_KEY_INFO))
            .await
    }

    /// Feed a batch of METARs. Returns the positions of the METARs the
    /// API already knew.
    #[instrument(skip(self, metars), fields(amount = metars.len()))]
    pub async fn feed_metars(&self, metars: &[String]) -> Result<Vec<usize>> {
        let request = self
            .request(Method::POST, ENDPOINT_METARS)
            .json(&FeedRequest { data: metars });
        let response: FeedResponse = self.execute(request).await?;
        debug!(duplicates = response.duplicates.len(), "Fed METAR batch");
        Ok(response.duplicates)
    }
}

#[async_trait]
impl SubmissionPort for ApiClient {
    async fn submit(&self, batch: &[String]) -> std::result::Result<SubmitReceipt, SubmitError> {
        let duplicates = self.feed_metars(batch).await?;
        Ok(SubmitReceipt { duplicates })
    }
}
