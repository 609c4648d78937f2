//! Filesystem-backed definition sets.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::application::definitions::{DefinitionKind, DefinitionSource};
use crate::application::repos::StoreError;

/// Reads `{directory}/{set}.json` on every request so operators can
/// edit the files without a restart.
pub struct FsDefinitionSource {
    directory: PathBuf,
}

impl FsDefinitionSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl DefinitionSource for FsDefinitionSource {
    async fn read(&self, kind: DefinitionKind) -> Result<String, StoreError> {
        let path = self.directory.join(format!("{}.json", kind.file_stem()));
        fs::read_to_string(&path)
            .await
            .map_err(|error| match error.kind() {
                ErrorKind::NotFound => StoreError::NotFound,
                _ => StoreError::from_persistence(error),
            })
    }
}
