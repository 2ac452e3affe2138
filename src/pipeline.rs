// src/pipeline.rs

use crate::config::{MalformedPolicy, PipelineConfig};
use crate::dedup::latest_revisions;
use crate::error::CleanError;
use crate::filter::RecordFilter;
use crate::labels::LabelTable;
use crate::percent::{normalize_share, Share};
use crate::record::{CleanVariantRecord, RawVariantRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Counts collected over one cleaning run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub rows_read: usize,
    pub rows_filtered_out: usize,
    pub revisions_superseded: usize,
    pub revision_ties: usize,
    pub unmatched_lineages: Vec<String>,
    pub malformed_values_nulled: usize,
    pub rows_written: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn start(rows_read: usize) -> Self {
        let now = Utc::now();
        Self {
            rows_read,
            rows_filtered_out: 0,
            revisions_superseded: 0,
            revision_ties: 0,
            unmatched_lineages: Vec::new(),
            malformed_values_nulled: 0,
            rows_written: 0,
            started_at: now,
            finished_at: now,
        }
    }
}

/// Turn raw feed rows into one labelled, normalized row per (week, lineage).
///
/// Stages: filter → latest revision → label join → share normalization.
#[instrument(level = "info", skip_all, fields(rows = records.len()))]
pub fn clean(
    records: Vec<RawVariantRecord>,
    labels: &LabelTable,
    cfg: &PipelineConfig,
) -> Result<(Vec<CleanVariantRecord>, RunReport), CleanError> {
    let mut report = RunReport::start(records.len());

    let (kept, dropped) = RecordFilter::from_config(cfg).apply(records);
    report.rows_filtered_out = dropped;

    let (latest, stats) = latest_revisions(kept);
    report.revisions_superseded = stats.superseded;
    report.revision_ties = stats.ties;

    let (joined, unmatched) = labels.join(latest);
    report.unmatched_lineages = unmatched.into_iter().collect();

    let mut out = Vec::with_capacity(joined.len());
    for (rec, label) in joined {
        let pct = share(&rec.pct, "pct", rec.row, cfg, &mut report)?;
        let pct_ci_lo = share(&rec.pct_ci_lo, "pct_ci_lo", rec.row, cfg, &mut report)?;
        let pct_ci_hi = share(&rec.pct_ci_hi, "pct_ci_hi", rec.row, cfg, &mut report)?;
        out.push(CleanVariantRecord {
            week: rec.week(),
            region: rec.region,
            lineage_code: rec.lineage_code,
            who_label: label.map(|l| l.who_label.clone()),
            display_variant: label.map(|l| l.display_variant.clone()),
            pct,
            pct_ci_lo,
            pct_ci_hi,
        });
    }

    report.rows_written = out.len();
    report.finished_at = Utc::now();
    info!(
        read = report.rows_read,
        filtered_out = report.rows_filtered_out,
        superseded = report.revisions_superseded,
        ties = report.revision_ties,
        unmatched = report.unmatched_lineages.len(),
        written = report.rows_written,
        "cleaning pass done"
    );
    Ok((out, report))
}

fn share(
    raw: &str,
    field: &'static str,
    row: usize,
    cfg: &PipelineConfig,
    report: &mut RunReport,
) -> Result<Option<f64>, CleanError> {
    match normalize_share(raw, &cfg.null_token) {
        Share::Value(v) => Ok(Some(v)),
        Share::Missing => Ok(None),
        Share::Malformed => match cfg.malformed {
            MalformedPolicy::Reject => Err(CleanError::MalformedNumber {
                row,
                field,
                value: raw.to_string(),
            }),
            MalformedPolicy::TreatAsMissing => {
                warn!(row, field, value = raw, "malformed share; treating as missing");
                report.malformed_values_nulled += 1;
                Ok(None)
            }
        },
    }
}
