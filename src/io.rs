// src/io.rs

use crate::error::CleanError;
use crate::pipeline::RunReport;
use crate::record::{parse_timestamp, CleanVariantRecord, RawVariantRecord};
use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, StringArray},
    compute::concat_batches,
    csv::{ReaderBuilder, WriterBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::{DateTime, Utc};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use serde::Deserialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, instrument};

/// Feed row as it sits in the file. Accepts the internal column names or
/// the upstream ones; other columns are ignored.
#[derive(Debug, Deserialize)]
struct FeedRow {
    #[serde(alias = "usa_or_hhsregion")]
    region: String,
    week_ending: String,
    #[serde(alias = "variant")]
    lineage_code: String,
    #[serde(alias = "share", default)]
    pct: String,
    #[serde(alias = "share_lo", default)]
    pct_ci_lo: String,
    #[serde(alias = "share_hi", default)]
    pct_ci_hi: String,
    #[serde(alias = "modeltype")]
    model_kind: String,
    #[serde(alias = "time_interval")]
    interval_kind: String,
    #[serde(alias = "creation_date")]
    revision_timestamp: String,
}

impl FeedRow {
    fn into_record(self, row: usize) -> Result<RawVariantRecord, CleanError> {
        let week_ending =
            parse_timestamp(&self.week_ending).ok_or_else(|| CleanError::MalformedTimestamp {
                row,
                field: "week_ending",
                value: self.week_ending.clone(),
            })?;
        let revision_timestamp = parse_timestamp(&self.revision_timestamp).ok_or_else(|| {
            CleanError::MalformedTimestamp {
                row,
                field: "revision_timestamp",
                value: self.revision_timestamp.clone(),
            }
        })?;
        Ok(RawVariantRecord {
            row,
            region: self.region,
            week_ending,
            lineage_code: self.lineage_code,
            pct: self.pct,
            pct_ci_lo: self.pct_ci_lo,
            pct_ci_hi: self.pct_ci_hi,
            model_kind: self.model_kind,
            interval_kind: self.interval_kind,
            revision_timestamp,
        })
    }
}

pub fn read_raw_records_from<R: Read>(reader: R) -> Result<Vec<RawVariantRecord>, CleanError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut out = Vec::new();
    for (idx, row) in rdr.deserialize::<FeedRow>().enumerate() {
        out.push(row?.into_record(idx + 1)?);
    }
    Ok(out)
}

#[instrument(level = "info", skip(path), fields(path = %path.display()))]
pub fn read_raw_records(path: &Path) -> Result<Vec<RawVariantRecord>, CleanError> {
    let records = read_raw_records_from(File::open(path)?)?;
    info!(rows = records.len(), "read raw feed");
    Ok(records)
}

/// Write through a `.tmp` sibling, then rename over `path`.
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(BufWriter<File>) -> Result<BufWriter<File>>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let file = File::create(&tmp).with_context(|| format!("creating {:?}", tmp))?;
    let res = write(BufWriter::new(file))
        .and_then(|mut buf| buf.flush().with_context(|| format!("flushing {:?}", tmp)))
        .and_then(|()| {
            fs::rename(&tmp, path).with_context(|| format!("renaming {:?} -> {:?}", tmp, path))
        });
    if res.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    res
}

#[instrument(level = "info", skip(records, path), fields(path = %path.display(), rows = records.len()))]
pub fn write_clean_csv(records: &[CleanVariantRecord], path: &Path) -> Result<()> {
    write_atomically(path, |buf| {
        let mut wtr = csv::Writer::from_writer(buf);
        for rec in records {
            wtr.serialize(rec).context("serializing clean record")?;
        }
        wtr.into_inner()
            .map_err(|e| anyhow::anyhow!("flushing csv writer: {}", e.error()))
    })
}

pub fn clean_schema() -> Schema {
    Schema::new(vec![
        Field::new("region", DataType::Utf8, false),
        Field::new("week", DataType::Date32, false),
        Field::new("lineage_code", DataType::Utf8, false),
        Field::new("who_label", DataType::Utf8, true),
        Field::new("display_variant", DataType::Utf8, true),
        Field::new("pct", DataType::Float64, true),
        Field::new("pct_ci_lo", DataType::Float64, true),
        Field::new("pct_ci_hi", DataType::Float64, true),
    ])
}

/// Columnar form of the clean table.
pub fn clean_to_batch(records: &[CleanVariantRecord]) -> Result<RecordBatch> {
    let epoch = DateTime::<Utc>::UNIX_EPOCH.date_naive();
    let cols: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.region.as_str()))),
        Arc::new(Date32Array::from_iter_values(
            records
                .iter()
                .map(|r| r.week.signed_duration_since(epoch).num_days() as i32),
        )),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.lineage_code.as_str()))),
        Arc::new(records.iter().map(|r| r.who_label.as_deref()).collect::<StringArray>()),
        Arc::new(records.iter().map(|r| r.display_variant.as_deref()).collect::<StringArray>()),
        Arc::new(records.iter().map(|r| r.pct).collect::<Float64Array>()),
        Arc::new(records.iter().map(|r| r.pct_ci_lo).collect::<Float64Array>()),
        Arc::new(records.iter().map(|r| r.pct_ci_hi).collect::<Float64Array>()),
    ];
    RecordBatch::try_new(Arc::new(clean_schema()), cols).context("building clean record batch")
}

#[instrument(level = "info", skip(records, path), fields(path = %path.display(), rows = records.len()))]
pub fn write_clean_parquet(records: &[CleanVariantRecord], path: &Path) -> Result<()> {
    let batch = clean_to_batch(records)?;
    write_atomically(path, |buf| {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(buf, batch.schema(), Some(props))
            .context("creating parquet writer")?;
        writer.write(&batch).context("writing parquet batch")?;
        writer.into_inner().context("closing parquet writer")
    })
}

/// Read any CSV with a header row into one batch of nullable string columns.
#[instrument(level = "info", skip(path), fields(path = %path.display()))]
pub fn read_csv_batch(path: &Path) -> Result<RecordBatch> {
    let headers = csv::Reader::from_path(path)
        .with_context(|| format!("opening {:?}", path))?
        .headers()
        .with_context(|| format!("reading header of {:?}", path))?
        .clone();
    let fields: Vec<Field> = headers
        .iter()
        .map(|n| Field::new(n.trim(), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let file = File::open(path).with_context(|| format!("opening {:?}", path))?;
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(file)
        .context("creating CSV reader")?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("reading CSV rows of {:?}", path))?;
    let batch = concat_batches(&schema, &batches).context("concatenating CSV batches")?;
    info!(rows = batch.num_rows(), columns = batch.num_columns(), "read table");
    Ok(batch)
}

#[instrument(level = "info", skip(batch, path), fields(path = %path.display(), rows = batch.num_rows()))]
pub fn write_csv_batch(batch: &RecordBatch, path: &Path) -> Result<()> {
    write_atomically(path, |buf| {
        let mut writer = WriterBuilder::new().with_header(true).build(buf);
        writer.write(batch).context("writing CSV batch")?;
        Ok(writer.into_inner())
    })
}

pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    write_atomically(path, |mut buf| {
        serde_json::to_writer_pretty(&mut buf, report).context("serializing run report")?;
        buf.write_all(b"\n")?;
        Ok(buf)
    })
}
