//! Initial genesis published by the launch coordinator

use crate::PrepareError;
use launchpad_fs_util::write_atomic;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// A genesis document to start from instead of the chain's default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteGenesis {
    /// Where to download it
    pub url: String,
    /// Expected SHA-256, hex
    pub hash: Option<String>,
}

impl RemoteGenesis {
    /// Download the document, checking its hash when one is announced
    pub async fn fetch(&self) -> Result<Vec<u8>, PrepareError> {
        let download_error = |source: reqwest::Error| PrepareError::RemoteGenesis { url: self.url.clone(), source };

        let response = reqwest::get(&self.url)
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(download_error)?;
        let body = response.bytes().await.map_err(download_error)?;

        if let Some(expected) = &self.hash {
            let actual = format!("{:x}", Sha256::digest(&body));
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(PrepareError::GenesisHashMismatch {
                    url: self.url.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(body.to_vec())
    }

    /// Download the document and write it to `path`
    pub async fn install(&self, path: &Path) -> Result<(), PrepareError> {
        let genesis = self.fetch().await?;
        write_atomic(path, &genesis)?;

        info!(target: "launchpad::prepare", url = %self.url, path = %path.display(), "Initial genesis installed");
        Ok(())
    }
}
