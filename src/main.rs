use anyhow::{Context, Result};
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use variantprep::{io, pipeline, LabelTable, PipelineConfig};

const USAGE: &str = "Usage: variantprep <RAW_CSV> <OUT_PATH> [CONFIG]";

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) args + config ────────────────────────────────────────────
    let mut args = env::args().skip(1);
    let raw_path = PathBuf::from(args.next().context(USAGE)?);
    let out_path = PathBuf::from(args.next().context(USAGE)?);
    let config_path = args.next().map(PathBuf::from);
    let cfg = PipelineConfig::load(config_path.as_deref())?;

    // ─── 3) labels ───────────────────────────────────────────────────
    let labels = match &cfg.labels_path {
        Some(p) => LabelTable::from_path(p)?,
        None => LabelTable::builtin()?,
    };
    info!(labels = labels.len(), "label table ready");

    // ─── 4) read → clean → write ─────────────────────────────────────
    let raw = io::read_raw_records(&raw_path)
        .with_context(|| format!("reading {}", raw_path.display()))?;
    let (clean, report) = pipeline::clean(raw, &labels, &cfg)?;

    if is_parquet(&out_path) {
        io::write_clean_parquet(&clean, &out_path)?;
    } else {
        io::write_clean_csv(&clean, &out_path)?;
    }

    let mut report_path = out_path.as_os_str().to_owned();
    report_path.push(".report.json");
    io::write_report(&report, Path::new(&report_path))?;

    info!(out = %out_path.display(), rows = report.rows_written, "done");
    Ok(())
}

fn is_parquet(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("parquet"))
}
