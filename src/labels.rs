// src/labels.rs

use crate::error::CleanError;
use crate::record::{LineageLabel, RawVariantRecord};
use serde::Deserialize;
use std::{
    collections::{BTreeSet, HashMap},
    fs::File,
    io::Read,
    path::Path,
};
use tracing::{info, instrument, warn};

/// Lineage → label table shipped with the crate.
const BUILTIN_LABELS: &str = include_str!("../assets/lineage_labels.csv");

#[derive(Debug, Deserialize)]
struct LabelRow {
    lineage_code: String,
    who_label: String,
    display_variant: Option<String>,
}

/// Read-only lookup from lineage code to its WHO label and reporting bucket.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    by_code: HashMap<String, LineageLabel>,
}

impl LabelTable {
    /// The table compiled into the crate.
    pub fn builtin() -> Result<Self, CleanError> {
        Self::from_reader(BUILTIN_LABELS.as_bytes())
    }

    #[instrument(level = "info", skip(path), fields(path = %path.display()))]
    pub fn from_path(path: &Path) -> Result<Self, CleanError> {
        let table = Self::from_reader(File::open(path)?)?;
        info!(labels = table.len(), "loaded lineage labels");
        Ok(table)
    }

    /// Parse `lineage_code,who_label,display_variant`. An empty
    /// `display_variant` falls back to the WHO label.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CleanError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut by_code = HashMap::new();
        for row in rdr.deserialize::<LabelRow>() {
            let row = row?;
            let display_variant = row
                .display_variant
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| row.who_label.clone());
            let label = LineageLabel {
                lineage_code: row.lineage_code.clone(),
                who_label: row.who_label,
                display_variant,
            };
            if by_code.insert(row.lineage_code.clone(), label).is_some() {
                return Err(CleanError::DuplicateLabel {
                    lineage_code: row.lineage_code,
                });
            }
        }
        Ok(Self { by_code })
    }

    pub fn from_labels(labels: impl IntoIterator<Item = LineageLabel>) -> Result<Self, CleanError> {
        let mut by_code = HashMap::new();
        for label in labels {
            let code = label.lineage_code.clone();
            if by_code.insert(code.clone(), label).is_some() {
                return Err(CleanError::DuplicateLabel { lineage_code: code });
            }
        }
        Ok(Self { by_code })
    }

    pub fn get(&self, lineage_code: &str) -> Option<&LineageLabel> {
        self.by_code.get(lineage_code)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Left join: every record comes back exactly once, in input order, with
    /// its label when the lineage is known. Unknown codes are returned sorted
    /// and logged once each.
    pub fn join(
        &self,
        records: Vec<RawVariantRecord>,
    ) -> (Vec<(RawVariantRecord, Option<&LineageLabel>)>, BTreeSet<String>) {
        let mut unmatched = BTreeSet::new();
        let joined: Vec<_> = records
            .into_iter()
            .map(|rec| {
                let label = self.get(&rec.lineage_code);
                if label.is_none() && !unmatched.contains(&rec.lineage_code) {
                    warn!(lineage = %rec.lineage_code, "no label for lineage; passing through");
                    unmatched.insert(rec.lineage_code.clone());
                }
                (rec, label)
            })
            .collect();
        (joined, unmatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(row: usize, lineage: &str) -> RawVariantRecord {
        let ts = NaiveDate::from_ymd_opt(2022, 1, 8)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        RawVariantRecord {
            row,
            region: "USA".into(),
            week_ending: ts,
            lineage_code: lineage.into(),
            pct: "0.5".into(),
            pct_ci_lo: "NULL".into(),
            pct_ci_hi: "NULL".into(),
            model_kind: "weighted".into(),
            interval_kind: "weekly".into(),
            revision_timestamp: ts,
        }
    }

    #[test]
    fn builtin_buckets_omicron_sublineages() {
        let table = LabelTable::builtin().unwrap();
        let ba11 = table.get("BA.1.1").unwrap();
        assert_eq!(ba11.who_label, "Omicron");
        assert_eq!(ba11.display_variant, "BA.1");
        assert_eq!(table.get("B.1.1.529").unwrap().display_variant, "BA.1");
        assert_eq!(table.get("B.1.617.2").unwrap().who_label, "Delta");
    }

    #[test]
    fn empty_display_variant_defaults_to_who_label() {
        let table = LabelTable::builtin().unwrap();
        let other = table.get("Other").unwrap();
        assert_eq!(other.who_label, "Other");
        assert_eq!(other.display_variant, "Other");
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let csv = "lineage_code,who_label,display_variant\nBA.2,Omicron,BA.2\nBA.2,Omicron,\n";
        match LabelTable::from_reader(csv.as_bytes()) {
            Err(CleanError::DuplicateLabel { lineage_code }) => assert_eq!(lineage_code, "BA.2"),
            other => panic!("expected duplicate error, got {:?}", other),
        }
    }

    #[test]
    fn join_keeps_unmatched_rows_without_labels() {
        let table = LabelTable::builtin().unwrap();
        let input = vec![rec(1, "BA.1.1"), rec(2, "ZZ.9"), rec(3, "ZZ.9"), rec(4, "BA.2")];
        let (joined, unmatched) = table.join(input);

        assert_eq!(joined.len(), 4);
        assert_eq!(
            joined.iter().map(|(r, _)| r.row).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(joined[0].1.map(|l| l.display_variant.as_str()), Some("BA.1"));
        assert!(joined[1].1.is_none());
        assert!(joined[2].1.is_none());
        assert_eq!(joined[3].1.map(|l| l.who_label.as_str()), Some("Omicron"));
        assert_eq!(unmatched.into_iter().collect::<Vec<_>>(), vec!["ZZ.9".to_string()]);
    }

    #[test]
    fn from_labels_checks_uniqueness() {
        let label = |code: &str| LineageLabel {
            lineage_code: code.into(),
            who_label: "Omicron".into(),
            display_variant: "XBB".into(),
        };
        let table = LabelTable::from_labels(vec![label("XBB"), label("XBB.1.5")]).unwrap();
        assert_eq!(table.len(), 2);
        assert!(LabelTable::from_labels(vec![label("XBB"), label("XBB")]).is_err());
    }

    #[test]
    fn from_path_reads_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("labels.csv");
        std::fs::write(
            &path,
            "lineage_code,who_label,display_variant\nXBB.1.5,Omicron,XBB.1.5\n",
        )?;
        let table = LabelTable::from_path(&path)?;
        assert_eq!(table.len(), 1);
        assert!(table.get("BA.2").is_none());
        Ok(())
    }
}
