// src/modification_ledger.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

pub const RECENT_LIMIT: usize = 50;

/// Month bucket key, `YYYY-MM`.
pub fn month_key(at: NaiveDateTime) -> String {
    at.format("%Y-%m").to_string()
}

/// A shift write about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftEdit {
    pub employee_id: String,
    pub employee_name: String,
    pub team_name: String,
    pub date_index: usize,
    pub date_header: String,
    pub old_shift: String,
    pub new_shift: String,
    pub modified_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub employee_id: String,
    pub employee_name: String,
    pub team_name: String,
    pub date_index: usize,
    pub date_header: String,
    pub old_shift: String,
    pub new_shift: String,
    pub modified_by: String,
    pub timestamp: NaiveDateTime,
    pub month_year: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub total_modifications: u64,
    #[serde(default)]
    pub employees_modified: BTreeSet<String>,
    #[serde(default)]
    pub modifications_by_user: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationLedger {
    #[serde(default)]
    modifications: Vec<Modification>,
    #[serde(default)]
    monthly_stats: BTreeMap<String, MonthlyStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReport<'a> {
    pub monthly_stats: MonthlyStats,
    pub recent_modifications: Vec<&'a Modification>,
    pub current_month: String,
}

impl ModificationLedger {
    pub fn len(&self) -> usize {
        self.modifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }

    pub fn stats_for(&self, month: &str) -> Option<&MonthlyStats> {
        self.monthly_stats.get(month)
    }

    /// Appends the edit stamped at `at` and updates that month's statistics.
    pub fn record(&mut self, edit: ShiftEdit, at: NaiveDateTime) -> &Modification {
        let month_year = month_key(at);
        let stats = self.monthly_stats.entry(month_year.clone()).or_default();
        stats.total_modifications += 1;
        stats.employees_modified.insert(edit.employee_id.clone());
        *stats
            .modifications_by_user
            .entry(edit.modified_by.clone())
            .or_insert(0) += 1;

        info!(
            "Shift modified: Emp={}, Date={}, {} -> {} by {}",
            edit.employee_id, edit.date_header, edit.old_shift, edit.new_shift, edit.modified_by
        );
        self.modifications.push(Modification {
            employee_id: edit.employee_id,
            employee_name: edit.employee_name,
            team_name: edit.team_name,
            date_index: edit.date_index,
            date_header: edit.date_header,
            old_shift: edit.old_shift,
            new_shift: edit.new_shift,
            modified_by: edit.modified_by,
            timestamp: at,
            month_year,
        });
        &self.modifications[self.modifications.len() - 1]
    }

    /// The month's statistics (zeroed when absent) and its most recent entries.
    pub fn query(&self, month: &str) -> MonthlyReport<'_> {
        let mut recent: Vec<&Modification> = self
            .modifications
            .iter()
            .filter(|m| m.month_year == month)
            .collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(RECENT_LIMIT);

        MonthlyReport {
            monthly_stats: self.stats_for(month).cloned().unwrap_or_default(),
            recent_modifications: recent,
            current_month: month.to_string(),
        }
    }

    pub fn employee_history(&self, employee_id: &str) -> Vec<&Modification> {
        self.modifications
            .iter()
            .filter(|m| m.employee_id == employee_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(datetime_str: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn edit(employee_id: &str, by: &str) -> ShiftEdit {
        ShiftEdit {
            employee_id: employee_id.to_string(),
            employee_name: format!("Name {}", employee_id),
            team_name: "Team A".to_string(),
            date_index: 0,
            date_header: "1Jan".to_string(),
            old_shift: "M2".to_string(),
            new_shift: "SL".to_string(),
            modified_by: by.to_string(),
        }
    }

    #[test]
    fn record_counts_each_write_but_each_employee_once() {
        let mut ledger = ModificationLedger::default();
        ledger.record(edit("E1", "admin"), at("2025-01-10 09:00:00"));
        ledger.record(edit("E1", "admin"), at("2025-01-10 09:05:00"));
        ledger.record(edit("E2", "tl"), at("2025-01-11 09:00:00"));

        let stats = ledger.stats_for("2025-01").unwrap();
        assert_eq!(stats.total_modifications, 3);
        assert_eq!(stats.employees_modified.len(), 2);
        assert_eq!(stats.modifications_by_user["admin"], 2);
        assert_eq!(stats.modifications_by_user["tl"], 1);
    }

    #[test]
    fn months_are_bucketed_separately() {
        let mut ledger = ModificationLedger::default();
        let first = ledger.record(edit("E1", "admin"), at("2025-01-31 23:59:59"));
        assert_eq!(first.month_year, "2025-01");
        ledger.record(edit("E1", "admin"), at("2025-02-01 00:00:00"));

        assert_eq!(ledger.stats_for("2025-01").unwrap().total_modifications, 1);
        assert_eq!(ledger.stats_for("2025-02").unwrap().total_modifications, 1);
    }

    #[test]
    fn query_sorts_newest_first_and_caps() {
        let mut ledger = ModificationLedger::default();
        let start = at("2025-03-01 08:00:00");
        for i in 0..60 {
            ledger.record(edit(&format!("E{}", i), "admin"), start + Duration::minutes(i));
        }
        ledger.record(edit("OLD", "admin"), at("2025-02-28 08:00:00"));

        let report = ledger.query("2025-03");
        assert_eq!(report.recent_modifications.len(), RECENT_LIMIT);
        assert_eq!(report.recent_modifications[0].employee_id, "E59");
        assert_eq!(report.monthly_stats.total_modifications, 60);
        assert_eq!(report.current_month, "2025-03");
    }

    #[test]
    fn query_unknown_month_is_zeroed() {
        let ledger = ModificationLedger::default();
        let report = ledger.query("1999-12");
        assert_eq!(report.monthly_stats, MonthlyStats::default());
        assert!(report.recent_modifications.is_empty());
    }

    #[test]
    fn touched_set_serializes_as_list() {
        let mut ledger = ModificationLedger::default();
        ledger.record(edit("E2", "admin"), at("2025-01-10 09:00:00"));
        ledger.record(edit("E1", "admin"), at("2025-01-10 09:00:00"));
        let value = serde_json::to_value(&ledger).unwrap();
        assert_eq!(
            value["monthly_stats"]["2025-01"]["employees_modified"],
            serde_json::json!(["E1", "E2"])
        );
        let back: ModificationLedger = serde_json::from_value(value).unwrap();
        assert_eq!(back, ledger);
    }

    #[test]
    fn employee_history_filters_by_id() {
        let mut ledger = ModificationLedger::default();
        ledger.record(edit("E1", "admin"), at("2025-01-10 09:00:00"));
        ledger.record(edit("E2", "admin"), at("2025-01-10 09:00:00"));
        ledger.record(edit("E1", "tl"), at("2025-01-12 09:00:00"));
        let history = ledger.employee_history("E1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].modified_by, "tl");
    }
}
