// src/fetch.rs

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::{fs, time::sleep};
use tracing::{info, instrument, warn};
use url::Url;

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Export URL for a dataset page, asking the portal for a download.
pub fn export_url(feed_url: &str) -> Result<Url> {
    let mut url = Url::parse(feed_url).with_context(|| format!("parsing feed URL {}", feed_url))?;
    if !url.query_pairs().any(|(k, _)| k == "accessType") {
        url.query_pairs_mut().append_pair("accessType", "DOWNLOAD");
    }
    Ok(url)
}

/// Download the raw feed to `dest`, retrying transient failures.
/// Returns the number of bytes written.
#[instrument(level = "info", skip(client, dest), fields(dest = %dest.display()))]
pub async fn download_feed(client: &Client, feed_url: &str, dest: &Path) -> Result<u64> {
    let url = export_url(feed_url)?;
    let mut attempt = 0;

    let body = loop {
        attempt += 1;
        let resp = client.get(url.clone()).send().await;
        match resp {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(bytes) => break bytes,
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(attempt, error = %e, "reading feed body failed; retrying");
                    sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e).context("reading feed body"),
            },
            Ok(resp) if resp.status().is_server_error() && attempt < MAX_RETRIES => {
                warn!(attempt, status = %resp.status(), "feed request failed; retrying");
                sleep(RETRY_DELAY).await;
            }
            Ok(resp) => return Err(anyhow!("HTTP error fetching {}: {}", url, resp.status())),
            Err(e) if attempt < MAX_RETRIES => {
                warn!(attempt, error = %e, "feed request failed; retrying");
                sleep(RETRY_DELAY).await;
            }
            Err(e) => return Err(e).with_context(|| format!("GET {}", url)),
        }
    };

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {:?}", parent))?;
    }
    let mut tmp_name = dest.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let saved = match fs::write(&tmp_name, &body).await {
        Ok(()) => fs::rename(&tmp_name, dest)
            .await
            .with_context(|| format!("renaming {:?} -> {:?}", tmp_name, dest)),
        Err(e) => Err(e).with_context(|| format!("writing {:?}", tmp_name)),
    };
    if saved.is_err() {
        let _ = fs::remove_file(&tmp_name).await;
    }
    saved?;

    info!(bytes = body.len(), attempts = attempt, "downloaded feed");
    Ok(body.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_url_requests_download() {
        let url = export_url("https://data.cdc.gov/api/views/jr58-6ysp/rows.csv").unwrap();
        assert_eq!(
            url.as_str(),
            "https://data.cdc.gov/api/views/jr58-6ysp/rows.csv?accessType=DOWNLOAD"
        );
    }

    #[test]
    fn export_url_keeps_existing_access_type() {
        let raw = "https://data.cdc.gov/api/views/jr58-6ysp/rows.csv?accessType=API";
        assert_eq!(export_url(raw).unwrap().as_str(), raw);
    }

    #[test]
    fn export_url_rejects_garbage() {
        assert!(export_url("not a url").is_err());
    }

    #[tokio::test]
    async fn unreachable_host_fails_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("feed.csv");
        let client = Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let res = download_feed(&client, "http://127.0.0.1:9/rows.csv", &dest).await;
        assert!(res.is_err());
        assert!(!dest.exists());
    }
}
