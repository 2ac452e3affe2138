use crate::config::PipelineConfig;
use crate::record::RawVariantRecord;

/// Selects the rows worth cleaning. Anything that does not match the
/// configured sentinels is dropped, never reported as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub region: Option<String>,
    pub model_kind: String,
    pub interval_kind: String,
}

impl RecordFilter {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            region: cfg.region.clone(),
            model_kind: cfg.model_kind.clone(),
            interval_kind: cfg.interval_kind.clone(),
        }
    }

    pub fn keeps(&self, rec: &RawVariantRecord) -> bool {
        let region_ok = self.region.as_deref().map_or(true, |r| rec.region == r);
        region_ok && rec.model_kind == self.model_kind && rec.interval_kind == self.interval_kind
    }

    /// Keep matching records in input order; returns them with the drop count.
    pub fn apply(&self, records: Vec<RawVariantRecord>) -> (Vec<RawVariantRecord>, usize) {
        let before = records.len();
        let kept: Vec<_> = records.into_iter().filter(|r| self.keeps(r)).collect();
        let dropped = before - kept.len();
        (kept, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(region: &str, model: &str, interval: &str) -> RawVariantRecord {
        let ts = NaiveDate::from_ymd_opt(2022, 1, 8)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        RawVariantRecord {
            row: 1,
            region: region.into(),
            week_ending: ts,
            lineage_code: "BA.2".into(),
            pct: "0.1".into(),
            pct_ci_lo: "0.05".into(),
            pct_ci_hi: "0.15".into(),
            model_kind: model.into(),
            interval_kind: interval.into(),
            revision_timestamp: ts,
        }
    }

    fn any_region() -> RecordFilter {
        RecordFilter {
            region: None,
            ..RecordFilter::from_config(&PipelineConfig::default())
        }
    }

    #[test]
    fn nowcast_is_dropped_for_any_interval() {
        let f = any_region();
        for interval in ["weekly", "biweekly", "monthly"] {
            assert!(!f.keeps(&rec("USA", "nowcast", interval)));
        }
    }

    #[test]
    fn monthly_is_dropped_for_any_model() {
        let f = any_region();
        for model in ["weighted", "smoothed", "nowcast"] {
            assert!(!f.keeps(&rec("USA", model, "monthly")));
        }
    }

    #[test]
    fn only_weighted_weekly_survives() {
        let f = any_region();
        assert!(f.keeps(&rec("USA", "weighted", "weekly")));
        assert!(f.keeps(&rec("4", "weighted", "weekly")));
        assert!(!f.keeps(&rec("USA", "Weighted", "weekly")));
        assert!(!f.keeps(&rec("USA", "weighted", "Weekly")));
    }

    #[test]
    fn region_sentinel_applies_when_configured() {
        let f = RecordFilter::from_config(&PipelineConfig::default());
        assert!(f.keeps(&rec("USA", "weighted", "weekly")));
        assert!(!f.keeps(&rec("4", "weighted", "weekly")));
    }

    #[test]
    fn apply_counts_drops_and_keeps_order() {
        let f = any_region();
        let mut a = rec("USA", "weighted", "weekly");
        a.row = 1;
        let mut b = rec("USA", "nowcast", "weekly");
        b.row = 2;
        let mut c = rec("USA", "weighted", "weekly");
        c.row = 3;
        let (kept, dropped) = f.apply(vec![a, b, c]);
        assert_eq!(dropped, 1);
        assert_eq!(kept.iter().map(|r| r.row).collect::<Vec<_>>(), vec![1, 3]);
    }
}
