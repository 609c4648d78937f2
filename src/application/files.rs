//! Attachment lookup seam and response merging.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Value as Json, json};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FileGatewayError {
    #[error("file gateway unavailable: {0}")]
    Unavailable(String),
}

impl FileGatewayError {
    pub fn from_transport(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Thumbnails and attachments of one content item, as returned by the
/// files service.
#[derive(Debug, Clone, Default)]
pub struct FileBundle {
    pub thumbnails: Vec<Json>,
    pub attachments: Vec<Json>,
}

impl FileBundle {
    pub fn is_empty(&self) -> bool {
        self.thumbnails.is_empty() && self.attachments.is_empty()
    }
}

/// Fetches file bundles for a batch of content items. Titles ride along
/// so the files service can label derived assets.
#[async_trait]
pub trait FileGateway: Send + Sync {
    async fn bundles_for(
        &self,
        ids: &[Uuid],
        titles: &HashMap<Uuid, String>,
    ) -> Result<HashMap<Uuid, FileBundle>, FileGatewayError>;
}

/// Folds a file bundle into a serialized content object: thumbnails and
/// attachments are attached verbatim, and `Images` collects thumbnail
/// URIs plus the direct URIs of image-typed attachments.
pub fn merge_files(object: &mut Json, bundle: &FileBundle) {
    if bundle.is_empty() {
        return;
    }
    let mut images: Vec<Json> = Vec::new();
    for thumbnail in &bundle.thumbnails {
        if let Some(uri) = thumbnail.get("URI").and_then(Json::as_str) {
            images.push(json!(uri));
        }
    }
    for attachment in &bundle.attachments {
        let is_image = attachment
            .get("ContentType")
            .and_then(Json::as_str)
            .is_some_and(|content_type| content_type.starts_with("image/"));
        if !is_image {
            continue;
        }
        if let Some(direct) = attachment
            .get("URIs")
            .and_then(|uris| uris.get("Direct"))
            .and_then(Json::as_str)
        {
            images.push(json!(direct));
        }
    }
    if let Some(map) = object.as_object_mut() {
        if !bundle.thumbnails.is_empty() {
            map.insert("Thumbnails".to_owned(), json!(bundle.thumbnails));
        }
        if !bundle.attachments.is_empty() {
            map.insert("Attachments".to_owned(), json!(bundle.attachments));
        }
        map.insert("Images".to_owned(), json!(images));
    }
}
