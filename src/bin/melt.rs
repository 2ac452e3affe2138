// src/bin/melt.rs

use anyhow::{Context, Result};
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use variantprep::{io, reshape};

const USAGE: &str = "Usage: melt <WIDE_CSV> <OUT_CSV> <ID_COLUMN> [MEASURE_NAME] [VALUE_NAME]";

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let mut args = env::args().skip(1);
    let input = PathBuf::from(args.next().context(USAGE)?);
    let output = PathBuf::from(args.next().context(USAGE)?);
    let id_column = args.next().context(USAGE)?;
    let measure_name = args.next().unwrap_or_else(|| "measure".to_string());
    let value_name = args.next().unwrap_or_else(|| "value".to_string());

    let wide = io::read_csv_batch(&input)?;

    // numeric tables melt into numeric values
    let numeric = reshape::numeric_columns(&wide, &id_column);
    let wide = if numeric.len() + 1 == wide.num_columns() {
        info!(columns = numeric.len(), "value columns are numeric");
        reshape::coerce_numeric(&wide, &numeric)?
    } else {
        wide
    };

    let long = reshape::melt(&wide, &id_column, &measure_name, &value_name)?;
    io::write_csv_batch(&long, &output)?;
    info!(rows_in = wide.num_rows(), rows_out = long.num_rows(), out = %output.display(), "melted");
    Ok(())
}
