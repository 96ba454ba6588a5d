use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::StatusCode;
use islandhop_core::FilterMode;
use reqwest::Client;
use thiserror::Error;

/// Parameters forwarded to the spreadsheet-backed tour endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginQuery {
    pub client: String,
    pub mode: FilterMode,
    pub value: String,
    pub debug: bool,
    pub nocache: bool,
}

impl OriginQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("client", self.client.clone()),
            ("mode", self.mode.to_string()),
            ("value", self.value.clone()),
        ];
        if self.debug {
            params.push(("debug", "1".to_string()));
        }
        if self.nocache {
            params.push(("nocache", "1".to_string()));
        }
        params
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OriginError {
    #[error("origin request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for OriginError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

#[async_trait]
pub trait TourOrigin: Send + Sync {
    async fn fetch(&self, query: &OriginQuery) -> Result<OriginResponse, OriginError>;
}

#[derive(Clone, Debug)]
pub struct HttpTourOrigin {
    client: Client,
    url: String,
}

impl HttpTourOrigin {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TourOrigin for HttpTourOrigin {
    #[tracing::instrument(skip(self), fields(origin = %self.url))]
    async fn fetch(&self, query: &OriginQuery) -> Result<OriginResponse, OriginError> {
        let response = self.client.get(&self.url).query(&query.params()).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(OriginResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use islandhop_core::FilterMode;

    use super::OriginQuery;

    #[test]
    fn optional_flags_are_only_forwarded_when_set() {
        let mut query = OriginQuery {
            client: "acme".to_string(),
            mode: FilterMode::Keyword,
            value: "waterfall".to_string(),
            debug: false,
            nocache: false,
        };
        let names: Vec<&str> = query.params().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["client", "mode", "value"]);

        query.debug = true;
        query.nocache = true;
        let params = query.params();
        assert!(params.contains(&("debug", "1".to_string())));
        assert!(params.contains(&("nocache", "1".to_string())));
        assert!(params.contains(&("mode", "keyword".to_string())));
    }
}
