use crate::record::RawVariantRecord;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DedupStats {
    /// Records replaced by, or losing to, a later revision of the same key.
    pub superseded: usize,
    /// Records that matched the current winner's revision timestamp exactly.
    pub ties: usize,
}

/// Keep the latest revision of every (region, week, lineage) key.
///
/// Single pass over the input. A record replaces the current winner only when
/// its revision timestamp is strictly greater, so on a tie the record seen
/// first in the input wins. Output follows each key's first appearance.
pub fn latest_revisions(records: Vec<RawVariantRecord>) -> (Vec<RawVariantRecord>, DedupStats) {
    let mut slot_of: HashMap<(String, NaiveDate, String), usize> = HashMap::with_capacity(records.len());
    let mut winners: Vec<RawVariantRecord> = Vec::new();
    let mut stats = DedupStats::default();

    for rec in records {
        let key = (rec.region.clone(), rec.week(), rec.lineage_code.clone());
        match slot_of.get(&key).copied() {
            None => {
                slot_of.insert(key, winners.len());
                winners.push(rec);
            }
            Some(slot) => {
                let current = &mut winners[slot];
                stats.superseded += 1;
                if rec.revision_timestamp > current.revision_timestamp {
                    *current = rec;
                } else if rec.revision_timestamp == current.revision_timestamp {
                    stats.ties += 1;
                    debug!(
                        region = %key.0,
                        week = %key.1,
                        lineage = %key.2,
                        kept_row = current.row,
                        dropped_row = rec.row,
                        "revision tie; keeping first"
                    );
                }
            }
        }
    }

    (winners, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
    }

    fn rec(row: usize, week: &str, lineage: &str, revised: NaiveDateTime) -> RawVariantRecord {
        RawVariantRecord {
            row,
            region: "USA".into(),
            week_ending: at(week, "00:00"),
            lineage_code: lineage.into(),
            pct: format!("0.{row:04}"),
            pct_ci_lo: "NULL".into(),
            pct_ci_hi: "NULL".into(),
            model_kind: "weighted".into(),
            interval_kind: "weekly".into(),
            revision_timestamp: revised,
        }
    }

    #[test]
    fn keeps_max_revision_per_key() {
        let input = vec![
            rec(1, "2022-01-08", "BA.2", at("2022-01-10", "00:00")),
            rec(2, "2022-01-08", "BA.1", at("2022-01-11", "00:00")),
            rec(3, "2022-01-08", "BA.2", at("2022-01-12", "00:00")),
            rec(4, "2022-01-08", "BA.2", at("2022-01-11", "00:00")),
            rec(5, "2022-01-15", "BA.2", at("2022-01-16", "00:00")),
        ];
        let (out, stats) = latest_revisions(input);

        let rows: Vec<_> = out.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![3, 2, 5]);
        assert_eq!(stats.superseded, 2);
        assert_eq!(stats.ties, 0);
    }

    #[test]
    fn one_record_per_key_with_maximum_timestamp() {
        let weeks = ["2022-01-01", "2022-01-08", "2022-01-15"];
        let lineages = ["BA.1", "BA.2", "Other"];
        let mut input = Vec::new();
        let mut row = 0;
        for rev_day in [20, 12, 25, 18] {
            for w in weeks {
                for l in lineages {
                    row += 1;
                    input.push(rec(row, w, l, at(&format!("2022-01-{rev_day}"), "06:00")));
                }
            }
        }
        let (out, _) = latest_revisions(input);

        assert_eq!(out.len(), weeks.len() * lineages.len());
        let mut keys: Vec<_> = out.iter().map(|r| r.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), out.len());
        assert!(out
            .iter()
            .all(|r| r.revision_timestamp == at("2022-01-25", "06:00")));
    }

    #[test]
    fn tie_keeps_first_in_input_order() {
        let same = at("2022-01-12", "00:00");
        let input = vec![
            rec(7, "2022-01-08", "BA.2", same),
            rec(8, "2022-01-08", "BA.2", same),
        ];
        let (out, stats) = latest_revisions(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].row, 7);
        assert_eq!(stats.ties, 1);
    }

    #[test]
    fn time_of_day_in_week_does_not_split_key() {
        let mut a = rec(1, "2022-01-08", "BA.2", at("2022-01-10", "00:00"));
        let mut b = rec(2, "2022-01-08", "BA.2", at("2022-01-11", "00:00"));
        a.week_ending = at("2022-01-08", "00:00");
        b.week_ending = at("2022-01-08", "23:59");
        let (out, _) = latest_revisions(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].row, 2);
    }

    #[test]
    fn regions_do_not_replace_each_other() {
        let usa = rec(1, "2022-01-08", "BA.2", at("2022-01-10", "00:00"));
        let mut hhs = rec(2, "2022-01-08", "BA.2", at("2022-01-11", "00:00"));
        hhs.region = "4".into();
        let (out, stats) = latest_revisions(vec![usa, hhs]);

        let regions: Vec<_> = out.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(regions, vec!["USA", "4"]);
        assert_eq!(stats.superseded, 0);
    }

    #[test]
    fn empty_input() {
        let (out, stats) = latest_revisions(Vec::new());
        assert!(out.is_empty());
        assert_eq!(stats, DedupStats::default());
    }
}
