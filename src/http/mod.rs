use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} responded with status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Unexpected response shape from {url}: {source}")]
    UnexpectedShape {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Username/password pair sent as HTTP basic auth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

/// Authenticated transport used by every fetcher.
/// Implementations return the raw response body; decoding happens in [`get_json`].
#[async_trait]
pub trait HttpProvider: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, HttpError>;

    async fn put_json(&self, url: &str, body: &serde_json::Value) -> Result<String, HttpError>;
}

/// GET `url` and decode the body into `T`.
///
/// A body that is not the expected JSON shape (missing key, wrong type)
/// becomes [`HttpError::UnexpectedShape`].
pub async fn get_json<T: DeserializeOwned>(
    http: &dyn HttpProvider,
    url: &str,
) -> Result<T, HttpError> {
    let body = http.get(url).await?;
    serde_json::from_str(&body).map_err(|source| HttpError::UnexpectedShape {
        url: url.to_string(),
        source,
    })
}

/// reqwest-backed [`HttpProvider`] with basic auth and JSON headers.
pub struct RestClient {
    client: reqwest::Client,
    auth: BasicAuth,
}

impl RestClient {
    pub fn new(auth: BasicAuth) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.auth.username, self.auth.password.as_ref())
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
    }

    async fn read_body(url: &str, response: reqwest::Response) -> Result<String, HttpError> {
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), body_bytes = body.len(), "received response");
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl HttpProvider for RestClient {
    #[instrument(skip(self))]
    async fn get(&self, url: &str) -> Result<String, HttpError> {
        let response = self.request(reqwest::Method::GET, url).send().await?;
        Self::read_body(url, response).await
    }

    #[instrument(skip(self, body))]
    async fn put_json(&self, url: &str, body: &serde_json::Value) -> Result<String, HttpError> {
        let response = self
            .request(reqwest::Method::PUT, url)
            .json(body)
            .send()
            .await?;
        Self::read_body(url, response).await
    }
}
