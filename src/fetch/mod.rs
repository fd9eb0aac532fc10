//! Dataset sourcing: HTTP fetch behind a client trait, or a local file.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;
use tracing::debug;

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    Ok(resp.bytes().await?.to_vec())
}

/// Loads a dataset from a local file path or fetches it over HTTP.
#[tracing::instrument(fields(source = %source))]
pub async fn load_source(source: &str) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        let client = BasicClient::new();
        fetch_bytes(&client, source).await?
    } else {
        std::fs::read(source)?
    };
    debug!(bytes = bytes.len(), "Dataset bytes loaded");
    Ok(bytes)
}
