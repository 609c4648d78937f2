//! HTTP client for the files service plus a noop stand-in.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Value as Json, json};
use uuid::Uuid;

use crate::application::files::{FileBundle, FileGateway, FileGatewayError};

pub const METRIC_FILE_LOOKUP_FAILURES: &str = "mediateca_file_lookup_failures_total";

#[derive(Debug, Deserialize)]
struct WireBundle {
    #[serde(default, rename = "Thumbnails")]
    thumbnails: Vec<Json>,
    #[serde(default, rename = "Attachments")]
    attachments: Vec<Json>,
}

/// Posts `{IDs, Titles}` to the files service and maps the returned
/// per-id bundles.
pub struct HttpFileGateway {
    client: Client,
    endpoint: Url,
}

impl HttpFileGateway {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, FileGatewayError> {
        let client = Client::builder()
            .user_agent(concat!("mediateca/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(FileGatewayError::from_transport)?;
        Ok(Self { client, endpoint })
    }

    async fn fetch(
        &self,
        ids: &[Uuid],
        titles: &HashMap<Uuid, String>,
    ) -> Result<HashMap<Uuid, FileBundle>, FileGatewayError> {
        let titles: HashMap<String, &str> = titles
            .iter()
            .map(|(id, title)| (id.to_string(), title.as_str()))
            .collect();
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({"IDs": ids, "Titles": titles}))
            .send()
            .await
            .map_err(FileGatewayError::from_transport)?
            .error_for_status()
            .map_err(FileGatewayError::from_transport)?;

        let bundles: HashMap<Uuid, WireBundle> = response
            .json()
            .await
            .map_err(FileGatewayError::from_transport)?;
        Ok(bundles
            .into_iter()
            .map(|(id, bundle)| {
                (
                    id,
                    FileBundle {
                        thumbnails: bundle.thumbnails,
                        attachments: bundle.attachments,
                    },
                )
            })
            .collect())
    }
}

#[async_trait]
impl FileGateway for HttpFileGateway {
    async fn bundles_for(
        &self,
        ids: &[Uuid],
        titles: &HashMap<Uuid, String>,
    ) -> Result<HashMap<Uuid, FileBundle>, FileGatewayError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.fetch(ids, titles)
            .await
            .inspect_err(|_| counter!(METRIC_FILE_LOOKUP_FAILURES).increment(1))
    }
}

/// Stands in when no files endpoint is configured; every item simply
/// serves without attachments.
pub struct NoopFileGateway;

#[async_trait]
impl FileGateway for NoopFileGateway {
    async fn bundles_for(
        &self,
        _ids: &[Uuid],
        _titles: &HashMap<Uuid, String>,
    ) -> Result<HashMap<Uuid, FileBundle>, FileGatewayError> {
        Ok(HashMap::new())
    }
}
