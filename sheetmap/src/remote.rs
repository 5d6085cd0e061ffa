//! Fetching tables over HTTP

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_DISPOSITION;

use crate::error::MappingError;

static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"filename="([^"]+)""#).expect("filename pattern is valid")
});

/// A downloaded file held in memory
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// Download `url` into memory
///
/// Any non-2xx status is a [`MappingError::Download`].
pub async fn fetch_remote(url: &str) -> Result<RemoteFile, MappingError> {
    log::debug!("Downloading {}", url);
    let response = reqwest::get(url)
        .await
        .map_err(|e| MappingError::Download(format!("request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MappingError::Download(format!("status code: {}", status.as_u16())));
    }

    let disposition = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let file_name = disposition
        .as_deref()
        .and_then(filename_from_disposition)
        .unwrap_or_else(|| filename_from_path(response.url().path()));

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MappingError::Download(format!("failed to read body: {}", e)))?;

    log::info!("Downloaded {} ({} bytes)", file_name, bytes.len());
    Ok(RemoteFile {
        bytes: bytes.to_vec(),
        file_name,
    })
}

/// `x.xlsx` from `attachment; filename="x.xlsx"`
fn filename_from_disposition(header: &str) -> Option<String> {
    FILENAME_RE
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Last path segment of a URL path
fn filename_from_path(path: &str) -> String {
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("/")
        .to_string()
}
