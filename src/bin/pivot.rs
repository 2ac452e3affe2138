// src/bin/pivot.rs

use anyhow::{Context, Result};
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use variantprep::{
    io,
    reshape::{self, DuplicatePolicy},
};

const USAGE: &str =
    "Usage: pivot <LONG_CSV> <OUT_CSV> <ID_COLUMN> <MEASURE_COLUMN> <VALUE_COLUMN> [--last-wins]";

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let mut args = env::args().skip(1);
    let input = PathBuf::from(args.next().context(USAGE)?);
    let output = PathBuf::from(args.next().context(USAGE)?);
    let id_column = args.next().context(USAGE)?;
    let measure_column = args.next().context(USAGE)?;
    let value_column = args.next().context(USAGE)?;
    let policy = match args.next().as_deref() {
        Some("--last-wins") => DuplicatePolicy::LastWins,
        Some(other) => anyhow::bail!("unknown option `{}`\n{}", other, USAGE),
        None => DuplicatePolicy::Reject,
    };

    let long = io::read_csv_batch(&input)?;
    let wide = reshape::pivot(&long, &id_column, &measure_column, &value_column, policy)?;
    io::write_csv_batch(&wide, &output)?;
    info!(rows_in = long.num_rows(), rows_out = wide.num_rows(), out = %output.display(), "pivoted");
    Ok(())
}
