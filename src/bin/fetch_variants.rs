// src/bin/fetch_variants.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::{env, path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use variantprep::{fetch, PipelineConfig};

const USAGE: &str = "Usage: fetch_variants <OUT_CSV> [CONFIG]";

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let mut args = env::args().skip(1);
    let dest = PathBuf::from(args.next().context(USAGE)?);
    let config_path = args.next().map(PathBuf::from);
    let cfg = PipelineConfig::load(config_path.as_deref())?;

    let client = Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .context("building HTTP client")?;
    info!(url = %cfg.feed_url, "fetching variant feed");
    let bytes = fetch::download_feed(&client, &cfg.feed_url, &dest).await?;
    info!(bytes, dest = %dest.display(), "saved");
    Ok(())
}
