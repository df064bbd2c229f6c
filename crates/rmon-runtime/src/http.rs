use std::time::Duration;

use anyhow::{Context, Result};

use rmon_core::vendor::VendorError;

const USER_AGENT: &str = concat!("rmon-setup/", env!("CARGO_PKG_VERSION"));

fn client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// POST to the vendor API and return the archive body.
///
/// A status of 400 or above is decoded into a [`VendorError`] and returned
/// as the error, so callers can show its messages.
pub fn post_archive(url: &str, token: &str) -> Result<Vec<u8>> {
    let resp = client(Duration::from_secs(600))?
        .post(url)
        .header("content-type", "application/json")
        .header("accept", "application/gzip")
        .header("Authorization", format!("Token {}", token))
        .send()
        .with_context(|| format!("HTTP request failed: {}", url))?;

    let status = resp.status();
    if status.as_u16() >= 400 {
        let body = resp.text().unwrap_or_default();
        match serde_json::from_str::<VendorError>(&body) {
            Ok(err) => return Err(err.into()),
            Err(_) => anyhow::bail!("HTTP {} for {}", status, url),
        }
    }

    let bytes = resp
        .bytes()
        .with_context(|| format!("Failed to read response body from {}", url))?;
    Ok(bytes.to_vec())
}
