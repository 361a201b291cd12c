// src/roster_state_tests.rs

#[cfg(test)]
mod tests {
    use crate::clock::TestClock;
    use crate::reconciler::{self, EmployeeDraft, RosterError};
    use crate::roster::{Dataset, Employee};
    use crate::roster_state::*;
    use crate::schedule_requests::{
        RequestError, RequestStatus, ScheduleRequest, ShiftChangeDetails, SwapDetails,
    };
    use crate::sheet_source::fake::FakeSheetSource;
    use crate::sheet_source::SheetError;
    use crate::storage::DataDir;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    const JAN_SHEET: &str = "Roster January,,,,\n\
        Team,Name,ID,1Jan,2Jan\n\
        Team A,John Doe,E1,M2,DO\n\
        ,Jane Smith,E2,M3,M3\n";

    fn roster() -> Dataset {
        let mut data = Dataset {
            headers: vec!["1Jan".into(), "2Jan".into(), "3Jan".into()],
            ..Default::default()
        };
        data.teams.entry("Team A").extend([
            Employee::new("E1", "John Doe", "Team A", vec!["M2".into(), "M2".into(), "DO".into()]),
            Employee::new("E2", "Jane Smith", "Team A", vec!["M3".into(), "M3".into(), "M3".into()]),
        ]);
        data.teams.entry("Team B").push(Employee::new(
            "E3",
            "Robert Brown",
            "Team B",
            vec!["D1".into(), "D1".into(), "D1".into()],
        ));
        data
    }

    fn setup() -> (TempDir, TestClock, RosterState) {
        let dir = tempfile::tempdir().unwrap();
        let clock = TestClock::new("2025-01-02 10:00:00");
        let mut state = RosterState::load(DataDir::new(dir.path()), Arc::new(clock.clone()));
        state.apply_sync(vec![roster()]);
        (dir, clock, state)
    }

    fn reload(dir: &TempDir, clock: &TestClock) -> RosterState {
        RosterState::load(DataDir::new(dir.path()), Arc::new(clock.clone()))
    }

    fn shift_change(employee_id: &str, date: &str, requested: &str) -> ShiftChangeDetails {
        ShiftChangeDetails {
            employee_id: employee_id.to_string(),
            employee_name: "John Doe".to_string(),
            team: "Team A".to_string(),
            date: date.to_string(),
            current_shift: "M2".to_string(),
            requested_shift: requested.to_string(),
            reason: "Appointment".to_string(),
        }
    }

    fn swap(requester: &str, target: &str, date: &str) -> SwapDetails {
        SwapDetails {
            requester_id: requester.to_string(),
            requester_name: "John Doe".to_string(),
            target_employee_id: target.to_string(),
            target_employee_name: "Robert Brown".to_string(),
            team: "Team A".to_string(),
            date: date.to_string(),
            requester_shift: "M2".to_string(),
            target_shift: "D1".to_string(),
            reason: "Family event".to_string(),
        }
    }

    fn overlay_shift(state: &RosterState, id: &str, index: usize) -> String {
        state.overlay().teams.find_employee(id).unwrap().1.schedule[index].clone()
    }

    #[test]
    fn sync_seeds_overlay_and_display() {
        let (_dir, _clock, state) = setup();
        assert_eq!(state.overlay(), state.synced());
        assert_eq!(state.display().teams.employee_count(), 3);
        assert_eq!(state.display().teams.find_employee("E3").unwrap().0, "Team B");
    }

    #[test]
    fn approved_shift_change_updates_one_cell_and_ledger() {
        let (_dir, _clock, mut state) = setup();
        let request = state.submit_shift_change(shift_change("E1", "2Jan", "SL")).unwrap();

        state
            .decide_request(&request.id, RequestStatus::Approved, "admin")
            .unwrap();

        assert_eq!(overlay_shift(&state, "E1", 1), "SL");
        assert_eq!(overlay_shift(&state, "E1", 0), "M2");
        assert_eq!(overlay_shift(&state, "E2", 1), "M3");
        let entries = state.ledger().modifications();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].old_shift, "M2");
        assert_eq!(entries[0].new_shift, "SL");
        assert_eq!(entries[0].date_header, "2Jan");
        assert_eq!(entries[0].modified_by, "Schedule Request (Approved by admin)");
        assert_eq!(
            state.display().teams.find_employee("E1").unwrap().1.schedule[1],
            "SL"
        );
    }

    #[test]
    fn approved_swap_exchanges_cells_across_teams() {
        let (_dir, _clock, mut state) = setup();
        let request = state.submit_swap(swap("E1", "E3", "3Jan")).unwrap();

        state
            .decide_request(&request.id, RequestStatus::Approved, "lead")
            .unwrap();

        assert_eq!(overlay_shift(&state, "E1", 2), "D1");
        assert_eq!(overlay_shift(&state, "E3", 2), "DO");
        let entries = state.ledger().modifications();
        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].old_shift.as_str(), entries[0].new_shift.as_str()), ("DO", "D1"));
        assert_eq!((entries[1].old_shift.as_str(), entries[1].new_shift.as_str()), ("D1", "DO"));
        assert_eq!(entries[1].team_name, "Team B");
        assert!(entries
            .iter()
            .all(|e| e.modified_by == "Swap Request (Approved by lead)"));
    }

    #[test]
    fn swap_of_equal_cells_records_nothing() {
        let (_dir, _clock, mut state) = setup();
        state
            .edit_overlay(|overlay| {
                let (_, jane) = overlay
                    .teams
                    .find_employee_mut("E2")
                    .ok_or_else(|| RosterError::EmployeeNotFound("E2".into()))?;
                jane.schedule[0] = "M2".to_string();
                Ok(())
            })
            .unwrap();
        let request = state.submit_swap(swap("E1", "E2", "1Jan")).unwrap();

        state
            .decide_request(&request.id, RequestStatus::Approved, "lead")
            .unwrap();

        assert_eq!(overlay_shift(&state, "E1", 0), "M2");
        assert_eq!(overlay_shift(&state, "E2", 0), "M2");
        assert!(state.ledger().is_empty());
        assert_eq!(state.modified_shifts(Some("2025-01")).monthly_stats.total_modifications, 0);
    }

    #[test]
    fn unresolvable_approval_is_a_no_op() {
        let (_dir, _clock, mut state) = setup();
        let before = state.overlay().clone();
        let unknown_date = state.submit_shift_change(shift_change("E1", "9Mar", "SL")).unwrap();
        let unknown_target = state.submit_swap(swap("E1", "E99", "1Jan")).unwrap();

        let decided = state
            .decide_request(&unknown_date.id, RequestStatus::Approved, "admin")
            .unwrap();
        assert_eq!(decided.status(), RequestStatus::Approved);
        state
            .decide_request(&unknown_target.id, RequestStatus::Approved, "admin")
            .unwrap();

        assert_eq!(state.overlay(), &before);
        assert!(state.ledger().is_empty());
        assert_eq!(state.pending_requests().1.approved_count, 2);
    }

    #[test]
    fn rejection_and_redecision_leave_overlay_alone() {
        let (_dir, _clock, mut state) = setup();
        let request = state.submit_shift_change(shift_change("E1", "1Jan", "CL")).unwrap();
        state
            .decide_request(&request.id, RequestStatus::Rejected, "admin")
            .unwrap();
        assert_eq!(overlay_shift(&state, "E1", 0), "M2");

        let err = state
            .decide_request(&request.id, RequestStatus::Approved, "admin")
            .unwrap_err();
        assert!(matches!(err, RequestError::AlreadyDecided { .. }));
        assert_eq!(overlay_shift(&state, "E1", 0), "M2");
        let (pending, stats) = state.pending_requests();
        assert!(pending.is_empty());
        assert_eq!(stats.approved_count, 0);
    }

    #[test]
    fn direct_overlay_write_records_only_changes() {
        let (_dir, _clock, mut state) = setup();
        let write = state.update_shift(Tier::Admin, "E2", 0, "EL", "admin").unwrap();
        assert_eq!(write.old_shift, "M3");
        state.update_shift(Tier::Admin, "E2", 0, "EL", "admin").unwrap();

        let report = state.modified_shifts(None);
        assert_eq!(report.current_month, "2025-01");
        assert_eq!(report.monthly_stats.total_modifications, 1);
        assert_eq!(report.recent_modifications[0].modified_by, "admin");
        assert_eq!(state.display().teams.find_employee("E2").unwrap().1.schedule[0], "EL");
    }

    #[test]
    fn direct_write_errors() {
        let (_dir, _clock, mut state) = setup();
        assert_eq!(
            state.update_shift(Tier::Admin, "E9", 0, "M2", "admin").unwrap_err(),
            RosterError::EmployeeNotFound("E9".to_string())
        );
        assert_eq!(
            state.update_shift(Tier::Admin, "E1", 7, "M2", "admin").unwrap_err(),
            RosterError::DateIndexOutOfRange { index: 7, len: 3 }
        );
    }

    #[test]
    fn synced_write_is_not_recorded() {
        let (_dir, _clock, mut state) = setup();
        state.update_shift(Tier::Google, "E1", 0, "D2", "admin").unwrap();
        assert!(state.ledger().is_empty());
        assert_eq!(state.synced().teams.find_employee("E1").unwrap().1.schedule[0], "D2");
        assert_eq!(overlay_shift(&state, "E1", 0), "M2");
    }

    #[test]
    fn overlay_edits_rebuild_display() {
        let (_dir, _clock, mut state) = setup();
        state
            .edit_overlay(|overlay| reconciler::delete_team(overlay, "Team B"))
            .unwrap();
        assert!(state.display().teams.get("Team B").is_none());
        assert_eq!(state.display().teams.employee_count(), 2);

        let draft = EmployeeDraft {
            id: "E1".to_string(),
            name: "Clone".to_string(),
            team: "Team C".to_string(),
            ..Default::default()
        };
        let err = state
            .edit_overlay(|overlay| reconciler::add_employee(overlay, &draft))
            .unwrap_err();
        assert_eq!(err, RosterError::DuplicateEmployee("E1".to_string()));
        assert!(state.display().teams.get("Team C").is_none());

        state.reset_to_synced();
        assert_eq!(state.display().teams.employee_count(), 3);
    }

    #[test]
    fn state_survives_reload() {
        let (dir, clock, mut state) = setup();
        state.update_shift(Tier::Admin, "E1", 0, "SL", "admin").unwrap();
        state.submit_swap(swap("E1", "E2", "1Jan")).unwrap();
        state.save_link("2025-01", "https://sheets.test/jan").unwrap();

        let reloaded = reload(&dir, &clock);
        assert_eq!(reloaded.overlay(), state.overlay());
        assert_eq!(reloaded.synced(), state.synced());
        assert_eq!(reloaded.display(), state.display());
        assert_eq!(reloaded.ledger(), state.ledger());
        assert_eq!(reloaded.links(), state.links());
        assert_eq!(reloaded.pending_requests().0.len(), 1);
    }

    #[test]
    fn month_import_extends_synced_and_overlay() {
        let (_dir, _clock, mut state) = setup();
        state.update_shift(Tier::Admin, "E1", 0, "SL", "admin").unwrap();
        let csv_text = "Team,Name,ID,1 Feb,2-Feb\n\
            ,,Date,,\n\
            Team A,John Doe,E1,D1,D2\n\
            Team C,New Hire,E9,M4,M4\n";

        let summary = state.import_month(csv_text).unwrap();
        assert_eq!(summary.month, "Feb");
        assert_eq!(summary.dates, 5);
        assert_eq!(state.synced().headers, vec!["1Jan", "2Jan", "3Jan", "1Feb", "2Feb"]);

        let e1 = state.overlay().teams.find_employee("E1").unwrap().1;
        assert_eq!(e1.schedule, vec!["SL", "M2", "DO", "D1", "D2"]);
        assert_eq!(state.overlay().teams.find_employee("E9").unwrap().0, "Team C");
        assert!(state.display().teams.get("Team C").is_some());
    }

    #[test]
    fn employee_history_combines_tiers() {
        let (_dir, _clock, mut state) = setup();
        state.update_shift(Tier::Admin, "E3", 2, "SL", "admin").unwrap();
        let history = state.employee_history("E3").unwrap();
        assert_eq!(history.google_schedule, vec!["D1", "D1", "D1"]);
        assert_eq!(history.admin_schedule, vec!["D1", "D1", "SL"]);
        assert_eq!(history.modifications.len(), 1);
        assert_eq!(history.headers.len(), 3);
        assert!(state.employee_history("E404").is_err());
    }

    #[test]
    fn today_view_uses_clock() {
        let (_dir, clock, state) = setup();
        let view = state.today_view();
        assert_eq!(view.dates.today, "2Jan");
        assert_eq!(view.dates.tomorrow, "3Jan");
        let john = view.employees.iter().find(|e| e.id == "E1").unwrap();
        assert_eq!(john.today_shift, "M2");
        assert_eq!(john.tomorrow_shift, "DO");
        assert_eq!(john.tomorrow_display, "OFF");

        clock.set_time("2025-01-03 08:00:00");
        let view = state.today_view();
        let john = view.employees.iter().find(|e| e.id == "E1").unwrap();
        assert_eq!(john.today_shift, "DO");
        assert_eq!(john.tomorrow_shift, "N/A");
    }

    #[test]
    fn template_covers_whole_month() {
        let template = csv_template_for(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
        assert_eq!(template.file_name, "roster_template_Feb.csv");
        let lines: Vec<&str> = template.body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Team,Name,ID,1Feb,2Feb"));
        assert!(lines[0].ends_with(",29Feb"));
        assert_eq!(lines[2].matches("M2").count(), 29);

        let december = csv_template_for(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert!(december.body.lines().next().unwrap().ends_with(",31Dec"));
    }

    #[tokio::test]
    async fn sync_from_sources_merges_and_keeps_overlay_edits() {
        let dir = tempfile::tempdir().unwrap();
        let clock = TestClock::new("2025-01-02 10:00:00");
        let state = Mutex::new(RosterState::load(
            DataDir::new(dir.path()),
            Arc::new(clock.clone()),
        ));
        let source = FakeSheetSource::default().with_sheet("https://sheets.test/jan", JAN_SHEET);
        state
            .lock()
            .await
            .save_link("2025-01", "https://sheets.test/jan")
            .unwrap();

        let summary = sync_from_sources(&state, &source).await.unwrap();
        assert_eq!(summary.employees, 2);
        assert_eq!(summary.dates, 2);

        state
            .lock()
            .await
            .update_shift(Tier::Admin, "E2", 1, "CL", "admin")
            .unwrap();
        sync_from_sources(&state, &source).await.unwrap();

        let guard = state.lock().await;
        assert_eq!(overlay_shift(&guard, "E2", 1), "CL");
        assert_eq!(guard.synced().teams.find_employee("E2").unwrap().1.schedule[1], "M3");
    }

    #[tokio::test]
    async fn failed_sync_changes_nothing() {
        let (_dir, _clock, mut state) = setup();
        state.save_link("2025-01", "https://sheets.test/gone").unwrap();
        let before = state.synced().clone();
        let state = Mutex::new(state);

        let err = sync_from_sources(&state, &FakeSheetSource::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SheetError::NothingLoaded { failed: 1 }));
        assert_eq!(state.lock().await.synced(), &before);
    }

    #[tokio::test]
    async fn sync_without_links_is_refused() {
        let (_dir, _clock, state) = setup();
        let state = Mutex::new(state);
        let err = sync_from_sources(&state, &FakeSheetSource::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SheetError::NoLinks));
    }

    #[test]
    fn team_members_read_overlay() {
        let (_dir, _clock, state) = setup();
        let members = state.team_members("Team A", "E1", "3Jan").unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, "E2");
        assert_eq!(members[0].shift_display, "9 AM – 6 PM");
        assert!(matches!(
            state.employee_requests(" "),
            Err(RequestError::MissingField { .. })
        ));
        let requests: Vec<ScheduleRequest> = state.employee_requests("E1").unwrap();
        assert!(requests.is_empty());
    }
}
