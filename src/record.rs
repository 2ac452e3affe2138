use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One row of the untreated surveillance feed, after column renaming and
/// timestamp parsing. Share fields stay textual until normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVariantRecord {
    /// 1-based data row in the source file.
    pub row: usize,
    pub region: String,
    pub week_ending: NaiveDateTime,
    pub lineage_code: String,
    pub pct: String,
    pub pct_ci_lo: String,
    pub pct_ci_hi: String,
    pub model_kind: String,
    pub interval_kind: String,
    pub revision_timestamp: NaiveDateTime,
}

impl RawVariantRecord {
    /// Calendar week this estimate belongs to.
    pub fn week(&self) -> NaiveDate {
        self.week_ending.date()
    }

    /// Dedup key: (region, week date, lineage code).
    pub fn key(&self) -> (&str, NaiveDate, &str) {
        (self.region.as_str(), self.week(), self.lineage_code.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageLabel {
    pub lineage_code: String,
    pub who_label: String,
    pub display_variant: String,
}

/// Output row: one per (week, lineage) with labels and percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanVariantRecord {
    pub region: String,
    pub week: NaiveDate,
    pub lineage_code: String,
    pub who_label: Option<String>,
    pub display_variant: Option<String>,
    pub pct: Option<f64>,
    pub pct_ci_lo: Option<f64>,
    pub pct_ci_hi: Option<f64>,
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
];

/// Parse the timestamp spellings seen in the feed and its exports.
/// Zoned values are converted to UTC; bare dates land on midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn parses_feed_spellings() {
        let expected = ymd_hms(2022, 1, 10, 0, 0, 0);
        for raw in [
            "2022-01-10T00:00",
            "2022-01-10T00:00:00",
            "2022-01-10T00:00:00.000",
            "2022-01-10 00:00:00",
            "2022-01-10",
            "2022-01-10T00:00:00Z",
            "01/10/2022 12:00:00 AM",
            " 2022/01/10 00:00:00 ",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "{raw}");
        }
    }

    #[test]
    fn zoned_values_become_utc() {
        assert_eq!(
            parse_timestamp("2022-01-10T10:00:00+10:00"),
            Some(ymd_hms(2022, 1, 10, 0, 0, 0))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("NULL"), None);
        assert_eq!(parse_timestamp("2022-13-40"), None);
    }

    #[test]
    fn week_truncates_time() {
        let rec = RawVariantRecord {
            row: 1,
            region: "USA".into(),
            week_ending: ymd_hms(2022, 1, 8, 13, 45, 0),
            lineage_code: "BA.2".into(),
            pct: "0.1".into(),
            pct_ci_lo: "NULL".into(),
            pct_ci_hi: "NULL".into(),
            model_kind: "weighted".into(),
            interval_kind: "weekly".into(),
            revision_timestamp: ymd_hms(2022, 1, 10, 0, 0, 0),
        };
        assert_eq!(
            rec.key(),
            ("USA", NaiveDate::from_ymd_opt(2022, 1, 8).unwrap(), "BA.2")
        );
    }
}
