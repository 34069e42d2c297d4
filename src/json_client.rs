use std::time::Duration;

use crate::errors::AppError;
use crate::errors::FeedError;

use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

#[derive(Clone, Debug)]
pub struct JsonClient {
    base_url: Url,
    client: Client,
}

impl JsonClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Api(format!("failed to build client: {e}")))?;

        Ok(Self { base_url, client })
    }

    pub async fn get<T>(&self, path: &str) -> Result<T, FeedError>
    where
        T: DeserializeOwned,
    {
        self.get_with_query(path, &[]).await
    }

    /// GET `path` with the query pairs appended in the given order.
    /// Repeated keys are kept, which is how batch lookups are encoded.
    pub async fn get_with_query<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, FeedError>
    where
        T: DeserializeOwned,
    {
        let mut url = self.base_url.join(path)?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let url_str = url.to_string();
        let resp = self.client.request(Method::GET, url).send().await?;

        debug!(path, url = %url_str, "JsonClient GET");

        if resp.status() == 404 {
            return Err(FeedError::not_found());
        }

        let status = resp.status();
        let body_text = resp.text().await?;

        if !status.is_success() {
            error!(
                path,
                url = %url_str,
                status = %status,
                response_body = %body_text,
                "JsonClient received an error response"
            );
            return Err(FeedError {
                error: status
                    .canonical_reason()
                    .unwrap_or("Unexpected Response")
                    .to_string(),
                message: body_text,
                status_code: status.as_u16(),
            });
        }

        let body: T = serde_json::from_str(&body_text).map_err(|e| {
            error!(
                path,
                url = %url_str,
                status = %status,
                response_body = %body_text,
                error = %e,
                "JsonClient failed to parse response"
            );
            e
        })?;

        Ok(body)
    }
}
