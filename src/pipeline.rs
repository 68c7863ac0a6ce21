//! Application pipeline: applications bucketed by status, optimistic moves
//! between buckets, and reconciliation against the server by full re-fetch.
//!
//! Every remote round trip is split into `begin_*` (local, immediate) and
//! `finish_*` (applies the server's answer) so the same state machine can be
//! driven synchronously from the CLI or through the board's worker thread.
//! Each move and load carries a sequence tag; answers older than newer local
//! work are dropped instead of clobbering it.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::api::JobTrackerApi;
use crate::error::{ApiError, ApiResult};
use crate::models::{Application, ApplicationStatus, Interview, InterviewType, RecordId};
use crate::notice::Notices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub status: ApplicationStatus,
    pub index: usize,
}

impl Position {
    pub fn new(status: ApplicationStatus, index: usize) -> Self {
        Self { status, index }
    }
}

/// One ordered column per status, always all five.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buckets {
    columns: [Vec<Application>; 5],
}

impl Buckets {
    /// Keeps server order within each column. Statuses the server sent that
    /// we don't know were already mapped to `Applied` during decoding.
    pub fn partition(apps: Vec<Application>) -> Self {
        let mut buckets = Self::default();
        for app in apps {
            buckets.columns[app.status.index()].push(app);
        }
        buckets
    }

    pub fn column(&self, status: ApplicationStatus) -> &[Application] {
        &self.columns[status.index()]
    }

    pub fn columns(&self) -> impl Iterator<Item = (ApplicationStatus, &[Application])> + '_ {
        ApplicationStatus::ALL
            .into_iter()
            .map(move |status| (status, self.column(status)))
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, position: Position) -> Option<&Application> {
        self.column(position.status).get(position.index)
    }

    pub fn find(&self, id: &RecordId) -> Option<Position> {
        self.columns().find_map(|(status, apps)| {
            apps.iter()
                .position(|a| &a.id == id)
                .map(|index| Position { status, index })
        })
    }

    pub fn application(&self, id: &RecordId) -> Option<&Application> {
        self.find(id).and_then(|pos| self.get(pos))
    }

    fn remove(&mut self, id: &RecordId) -> Option<Application> {
        let pos = self.find(id)?;
        Some(self.columns[pos.status.index()].remove(pos.index))
    }
}

/// Pure drag-and-drop: lift the card at `source`, restamp its status, drop
/// it at `destination` (index clamped to the column). `None` means nothing
/// changes and nothing should be sent.
pub fn reposition(buckets: &Buckets, source: Position, destination: Position) -> Option<Buckets> {
    if source == destination || buckets.get(source).is_none() {
        return None;
    }
    let mut next = buckets.clone();
    let mut moved = next.columns[source.status.index()].remove(source.index);
    moved.status = destination.status;
    let column = &mut next.columns[destination.status.index()];
    let index = destination.index.min(column.len());
    column.insert(index, moved);

    if next == *buckets {
        return None;
    }
    Some(next)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub application_id: RecordId,
    pub status: ApplicationStatus,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingLoad {
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Confirmed,
    /// A newer move of the same application was issued after this one.
    Stale,
    /// Server refused; local state will be replaced by a re-fetch.
    Rejected,
}

/// Interview form as the user fills it in; nothing is required until
/// `validate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterviewDraft {
    pub interview_type: Option<InterviewType>,
    pub scheduled_date: String,
    pub location: String,
    pub notes: String,
}

impl InterviewDraft {
    pub fn from_interview(interview: Option<&Interview>) -> Self {
        match interview {
            Some(i) => Self {
                interview_type: Some(i.interview_type),
                scheduled_date: i.scheduled_date.clone(),
                location: i.location.clone(),
                notes: i.notes.clone(),
            },
            None => Self::default(),
        }
    }

    pub fn validate(&self) -> ApiResult<Interview> {
        let date = self.scheduled_date.trim();
        let Some(interview_type) = self.interview_type.filter(|_| !date.is_empty()) else {
            return Err(ApiError::validation("Please fill in required interview details"));
        };
        let parsed = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M")
            .or_else(|_| NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S"));
        if parsed.is_err() {
            return Err(ApiError::validation(format!(
                "Interview date must look like 2024-05-01T14:30, got '{}'",
                date
            )));
        }
        Ok(Interview {
            interview_type,
            scheduled_date: date.to_string(),
            location: self.location.trim().to_string(),
            notes: self.notes.trim().to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct Pipeline {
    buckets: Buckets,
    selected: Option<RecordId>,
    pub notices: Notices,
    next_seq: u64,
    in_flight_moves: HashMap<RecordId, u64>,
    newest_mutation: u64,
    newest_load: u64,
    applied_load: u64,
    needs_reload: bool,
    loading: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    // --- Loading ---

    pub fn begin_load(&mut self) -> PendingLoad {
        let seq = self.bump();
        self.newest_load = seq;
        self.loading = true;
        PendingLoad { seq }
    }

    /// Returns whether the result replaced the displayed buckets.
    pub fn finish_load(&mut self, pending: PendingLoad, result: ApiResult<Vec<Application>>) -> bool {
        if pending.seq == self.newest_load {
            self.loading = false;
        }
        if pending.seq < self.applied_load {
            tracing::debug!(seq = pending.seq, "dropping load older than the one on screen");
            return false;
        }
        if pending.seq < self.newest_mutation {
            // Snapshot predates local work; fetch again once that work settles.
            tracing::debug!(seq = pending.seq, "dropping load issued before a newer local change");
            self.needs_reload = true;
            return false;
        }
        match result {
            Ok(apps) => {
                tracing::debug!(count = apps.len(), "applications loaded");
                self.buckets = Buckets::partition(apps);
                self.applied_load = pending.seq;
                if self
                    .selected
                    .as_ref()
                    .is_some_and(|id| self.buckets.find(id).is_none())
                {
                    self.selected = None;
                }
                true
            }
            Err(e) => {
                self.notices
                    .error(format!("Failed to fetch applications: {}", e));
                false
            }
        }
    }

    pub fn load(&mut self, api: &dyn JobTrackerApi) -> bool {
        let pending = self.begin_load();
        let result = api.applications();
        self.finish_load(pending, result)
    }

    /// True once if a re-fetch is owed and no move is still in flight.
    pub fn take_reload(&mut self) -> bool {
        if self.needs_reload && self.in_flight_moves.is_empty() {
            self.needs_reload = false;
            return true;
        }
        false
    }

    fn reconcile(&mut self, api: &dyn JobTrackerApi) {
        if self.take_reload() {
            self.load(api);
        }
    }

    // --- Moving ---

    pub fn begin_move(&mut self, source: Position, destination: Position) -> Option<PendingMove> {
        let next = reposition(&self.buckets, source, destination)?;
        let application_id = self.buckets.get(source)?.id.clone();
        self.buckets = next;

        let seq = self.bump();
        self.newest_mutation = seq;
        self.in_flight_moves.insert(application_id.clone(), seq);
        tracing::info!(
            id = %application_id,
            from = source.status.as_str(),
            to = destination.status.as_str(),
            seq,
            "optimistic move"
        );
        Some(PendingMove {
            application_id,
            status: destination.status,
            seq,
        })
    }

    pub fn finish_move(&mut self, pending: &PendingMove, result: ApiResult<()>) -> MoveOutcome {
        let newest = self.in_flight_moves.get(&pending.application_id).copied();
        if newest != Some(pending.seq) {
            tracing::debug!(id = %pending.application_id, seq = pending.seq, "stale status update");
            if let Err(e) = result {
                self.notices.error(format!("Failed to update status: {}", e));
            }
            return MoveOutcome::Stale;
        }
        self.in_flight_moves.remove(&pending.application_id);
        match result {
            Ok(()) => {
                self.notices.success("Application status updated");
                MoveOutcome::Confirmed
            }
            Err(e) => {
                self.notices.error(format!("Failed to update status: {}", e));
                self.needs_reload = true;
                MoveOutcome::Rejected
            }
        }
    }

    /// Local move, remote update, and re-fetch on rejection, in one call.
    /// `None` when the move was a no-op and nothing was sent.
    pub fn move_and_persist(
        &mut self,
        api: &dyn JobTrackerApi,
        source: Position,
        destination: Position,
    ) -> Option<MoveOutcome> {
        let pending = self.begin_move(source, destination)?;
        let result = api.update_status(&pending.application_id, pending.status);
        let outcome = self.finish_move(&pending, result);
        self.reconcile(api);
        Some(outcome)
    }

    // --- Detail view ---

    pub fn select(&mut self, id: &RecordId) -> bool {
        if self.buckets.find(id).is_some() {
            self.selected = Some(id.clone());
            true
        } else {
            false
        }
    }

    pub fn selected(&self) -> Option<&Application> {
        self.selected
            .as_ref()
            .and_then(|id| self.buckets.application(id))
    }

    pub fn close_detail(&mut self) {
        self.selected = None;
    }

    pub fn finish_notes(&mut self, result: ApiResult<()>) {
        match result {
            Ok(()) => {
                self.notices.success("Notes updated successfully");
                self.needs_reload = true;
            }
            Err(e) => self.notices.error(format!("Failed to update notes: {}", e)),
        }
    }

    pub fn finish_interview(&mut self, result: ApiResult<()>) {
        match result {
            Ok(()) => {
                self.notices.success("Interview scheduled successfully");
                self.needs_reload = true;
            }
            Err(e) => self.notices.error(format!("Failed to schedule interview: {}", e)),
        }
    }

    pub fn finish_delete(&mut self, id: &RecordId, result: ApiResult<()>) {
        match result {
            Ok(()) => {
                self.buckets.remove(id);
                if self.selected.as_ref() == Some(id) {
                    self.selected = None;
                }
                // Loads still in flight may include the deleted card.
                self.newest_mutation = self.bump();
                self.notices.success("Application deleted successfully");
            }
            Err(e) => self.notices.error(format!("Failed to delete application: {}", e)),
        }
    }

    pub fn save_notes(&mut self, api: &dyn JobTrackerApi, id: &RecordId, notes: &str) {
        let result = api.update_notes(id, notes);
        self.finish_notes(result);
        self.reconcile(api);
    }

    /// Returns false when the draft failed validation and nothing was sent.
    pub fn schedule_interview(&mut self, api: &dyn JobTrackerApi, id: &RecordId, draft: &InterviewDraft) -> bool {
        let interview = match draft.validate() {
            Ok(interview) => interview,
            Err(e) => {
                self.notices.error(e.to_string());
                return false;
            }
        };
        let result = api.schedule_interview(id, &interview);
        self.finish_interview(result);
        self.reconcile(api);
        true
    }

    pub fn delete(&mut self, api: &dyn JobTrackerApi, id: &RecordId) {
        let result = api.delete_application(id);
        self.finish_delete(id, result);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::testing::FakeApi;
    use crate::models::ApplicationStatus::{Applied, Offer, Rejected, Screening};

    pub(crate) fn app(id: i64, status: ApplicationStatus) -> Application {
        Application {
            id: RecordId::Number(id),
            job_id: None,
            title: format!("Role {}", id),
            company: format!("Company {}", id),
            location: "Remote".to_string(),
            status,
            applied_date: Some("2024-04-01".to_string()),
            salary_min: None,
            salary_max: None,
            application_url: None,
            notes: None,
            interview: None,
        }
    }

    fn ids(buckets: &Buckets, status: ApplicationStatus) -> Vec<i64> {
        buckets
            .column(status)
            .iter()
            .map(|a| match a.id {
                RecordId::Number(n) => n,
                RecordId::Text(_) => -1,
            })
            .collect()
    }

    fn sample() -> Vec<Application> {
        vec![
            app(1, Applied),
            app(2, Screening),
            app(3, Applied),
            app(4, Offer),
        ]
    }

    #[test]
    fn test_partition_has_every_column_even_when_empty() {
        let buckets = Buckets::partition(sample());
        let statuses: Vec<_> = buckets.columns().map(|(s, _)| s).collect();
        assert_eq!(statuses, ApplicationStatus::ALL.to_vec());
        assert!(buckets.column(ApplicationStatus::Interview).is_empty());
        assert!(buckets.column(Rejected).is_empty());

        let empty = Buckets::partition(Vec::new());
        assert_eq!(empty.columns().count(), 5);
    }

    #[test]
    fn test_partition_preserves_server_order() {
        let buckets = Buckets::partition(sample());
        assert_eq!(ids(&buckets, Applied), vec![1, 3]);
        assert_eq!(ids(&buckets, Screening), vec![2]);
        assert_eq!(ids(&buckets, Offer), vec![4]);
    }

    #[test]
    fn test_partition_unknown_status_lands_in_applied() {
        let weird: Application = serde_json::from_value(serde_json::json!({
            "id": 10, "title": "X", "company": "Y", "status": "ON_HOLD"
        }))
        .unwrap();
        let buckets = Buckets::partition(vec![app(1, Offer), weird]);
        assert_eq!(ids(&buckets, Applied), vec![10]);
    }

    #[test]
    fn test_reposition_same_place_is_noop() {
        let buckets = Buckets::partition(sample());
        let pos = Position::new(Applied, 1);
        assert_eq!(reposition(&buckets, pos, pos), None);
    }

    #[test]
    fn test_reposition_across_columns() {
        let buckets = Buckets::partition(sample());
        let next = reposition(&buckets, Position::new(Applied, 1), Position::new(Screening, 0)).unwrap();
        assert_eq!(ids(&next, Applied), vec![1]);
        assert_eq!(ids(&next, Screening), vec![3, 2]);
        assert_eq!(next.column(Screening)[0].status, Screening);
        // input untouched
        assert_eq!(ids(&buckets, Applied), vec![1, 3]);
    }

    #[test]
    fn test_reposition_within_column_and_clamping() {
        let buckets = Buckets::partition(sample());
        let next = reposition(&buckets, Position::new(Applied, 0), Position::new(Applied, 1)).unwrap();
        assert_eq!(ids(&next, Applied), vec![3, 1]);

        let next = reposition(&buckets, Position::new(Offer, 0), Position::new(Rejected, 99)).unwrap();
        assert_eq!(ids(&next, Rejected), vec![4]);

        // dropping the last card past the end of its own column changes nothing
        assert_eq!(reposition(&buckets, Position::new(Applied, 1), Position::new(Applied, 7)), None);
    }

    #[test]
    fn test_reposition_bad_source() {
        let buckets = Buckets::partition(sample());
        assert_eq!(reposition(&buckets, Position::new(ApplicationStatus::Interview, 0), Position::new(Offer, 0)), None);
    }

    #[test]
    fn test_noop_move_sends_nothing() {
        let api = FakeApi::with_applications(sample());
        let mut pipeline = Pipeline::new();
        pipeline.load(&api);
        let before = pipeline.buckets().clone();

        let pos = Position::new(Applied, 0);
        assert_eq!(pipeline.move_and_persist(&api, pos, pos), None);
        assert_eq!(api.call_count("update_status"), 0);
        assert_eq!(pipeline.buckets(), &before);
    }

    #[test]
    fn test_move_updates_locally_and_remotely() {
        let api = FakeApi::with_applications(sample());
        let mut pipeline = Pipeline::new();
        pipeline.load(&api);

        let outcome = pipeline.move_and_persist(&api, Position::new(Applied, 0), Position::new(ApplicationStatus::Interview, 0));
        assert_eq!(outcome, Some(MoveOutcome::Confirmed));
        assert_eq!(ids(pipeline.buckets(), ApplicationStatus::Interview), vec![1]);
        assert_eq!(pipeline.buckets().column(ApplicationStatus::Interview)[0].status, ApplicationStatus::Interview);
        assert!(api.calls().contains(&"update_status 1 INTERVIEW".to_string()));
        // success does not re-fetch
        assert_eq!(api.call_count("applications"), 1);
    }

    #[test]
    fn test_rejected_move_refetches_authoritative_state() {
        let api = FakeApi::with_applications(sample());
        let mut pipeline = Pipeline::new();
        pipeline.load(&api);

        // Someone else moved #2 to Offer meanwhile; our update for #1 fails.
        api.applications.lock().unwrap()[1].status = Offer;
        api.fail("update_status", ApiError::Remote { status: 500, message: "boom".into() });

        let outcome = pipeline.move_and_persist(&api, Position::new(Applied, 0), Position::new(Rejected, 0));
        assert_eq!(outcome, Some(MoveOutcome::Rejected));
        assert_eq!(api.call_count("applications"), 2);

        let expected = Buckets::partition(api.applications.lock().unwrap().clone());
        assert_eq!(pipeline.buckets(), &expected);
        assert!(pipeline.buckets().column(Rejected).is_empty());
        assert_eq!(ids(pipeline.buckets(), Offer), vec![2, 4]);
        assert!(pipeline.notices.has_errors());
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut pipeline = Pipeline::new();
        let load = pipeline.begin_load();
        pipeline.finish_load(load, Ok(sample()));

        let first = pipeline
            .begin_move(Position::new(Applied, 0), Position::new(Screening, 0))
            .unwrap();
        let second = pipeline
            .begin_move(Position::new(Screening, 0), Position::new(ApplicationStatus::Interview, 0))
            .unwrap();
        assert_eq!(first.application_id, second.application_id);

        // The newer request lands first, then the older one fails.
        assert_eq!(pipeline.finish_move(&second, Ok(())), MoveOutcome::Confirmed);
        assert_eq!(
            pipeline.finish_move(&first, Err(ApiError::Remote { status: 500, message: "late".into() })),
            MoveOutcome::Stale
        );
        assert!(!pipeline.take_reload());
        assert_eq!(ids(pipeline.buckets(), ApplicationStatus::Interview), vec![1]);
    }

    #[test]
    fn test_load_issued_before_a_move_does_not_clobber_it() {
        let mut pipeline = Pipeline::new();
        let initial = pipeline.begin_load();
        pipeline.finish_load(initial, Ok(sample()));

        let refresh = pipeline.begin_load();
        let pending = pipeline
            .begin_move(Position::new(Applied, 0), Position::new(Offer, 0))
            .unwrap();

        // Refresh returns the pre-move snapshot after the move began.
        assert!(!pipeline.finish_load(refresh, Ok(sample())));
        assert_eq!(ids(pipeline.buckets(), Offer), vec![1, 4]);

        pipeline.finish_move(&pending, Ok(()));
        assert!(pipeline.take_reload());
        assert!(!pipeline.take_reload());
    }

    #[test]
    fn test_older_load_never_replaces_newer() {
        let mut pipeline = Pipeline::new();
        let older = pipeline.begin_load();
        let newer = pipeline.begin_load();
        assert!(pipeline.finish_load(newer, Ok(vec![app(9, Offer)])));
        assert!(!pipeline.finish_load(older, Ok(sample())));
        assert_eq!(ids(pipeline.buckets(), Offer), vec![9]);
        assert!(!pipeline.is_loading());
    }

    #[test]
    fn test_failed_load_keeps_board_usable() {
        let api = FakeApi::default();
        api.fail("applications", ApiError::Remote { status: 503, message: "down".into() });
        let mut pipeline = Pipeline::new();
        assert!(!pipeline.load(&api));
        assert!(pipeline.buckets().is_empty());
        assert_eq!(pipeline.buckets().columns().count(), 5);
        let notice = pipeline.notices.latest().unwrap();
        assert!(notice.message.contains("Failed to fetch applications"));
    }

    #[test]
    fn test_save_notes_refetches() {
        let api = FakeApi::with_applications(sample());
        let mut pipeline = Pipeline::new();
        pipeline.load(&api);

        pipeline.save_notes(&api, &RecordId::Number(3), "recruiter called back");
        assert_eq!(api.call_count("applications"), 2);
        let notes = pipeline
            .buckets()
            .application(&RecordId::Number(3))
            .and_then(|a| a.notes.clone());
        assert_eq!(notes.as_deref(), Some("recruiter called back"));
    }

    #[test]
    fn test_failed_notes_do_not_refetch() {
        let api = FakeApi::with_applications(sample());
        api.fail("update_notes", ApiError::Remote { status: 500, message: "nope".into() });
        let mut pipeline = Pipeline::new();
        pipeline.load(&api);
        pipeline.save_notes(&api, &RecordId::Number(3), "x");
        assert_eq!(api.call_count("applications"), 1);
        assert!(pipeline.notices.has_errors());
    }

    #[test]
    fn test_interview_requires_type_and_date() {
        let api = FakeApi::with_applications(sample());
        let mut pipeline = Pipeline::new();
        pipeline.load(&api);

        let missing_type = InterviewDraft {
            scheduled_date: "2024-05-01T10:00".into(),
            ..Default::default()
        };
        assert!(!pipeline.schedule_interview(&api, &RecordId::Number(1), &missing_type));

        let missing_date = InterviewDraft {
            interview_type: Some(InterviewType::Technical),
            ..Default::default()
        };
        assert!(!pipeline.schedule_interview(&api, &RecordId::Number(1), &missing_date));
        assert_eq!(api.call_count("schedule_interview"), 0);
        assert!(pipeline.notices.has_errors());
    }

    #[test]
    fn test_schedule_interview_refetches() {
        let api = FakeApi::with_applications(sample());
        let mut pipeline = Pipeline::new();
        pipeline.load(&api);

        let draft = InterviewDraft {
            interview_type: Some(InterviewType::Onsite),
            scheduled_date: "2024-05-01T10:00".into(),
            location: " 1 Infinite Loop ".into(),
            notes: String::new(),
        };
        assert!(pipeline.schedule_interview(&api, &RecordId::Number(2), &draft));
        let interview = pipeline
            .buckets()
            .application(&RecordId::Number(2))
            .and_then(|a| a.interview.clone())
            .unwrap();
        assert_eq!(interview.interview_type, InterviewType::Onsite);
        assert_eq!(interview.location, "1 Infinite Loop");
    }

    #[test]
    fn test_interview_date_format_is_checked() {
        let draft = InterviewDraft {
            interview_type: Some(InterviewType::Final),
            scheduled_date: "next tuesday".into(),
            ..Default::default()
        };
        assert!(matches!(draft.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_delete_removes_locally_and_closes_detail() {
        let api = FakeApi::with_applications(sample());
        let mut pipeline = Pipeline::new();
        pipeline.load(&api);
        let id = RecordId::Number(3);
        assert!(pipeline.select(&id));
        assert!(pipeline.selected().is_some());

        pipeline.delete(&api, &id);
        assert!(pipeline.selected().is_none());
        assert_eq!(ids(pipeline.buckets(), Applied), vec![1]);
        assert_eq!(api.call_count("applications"), 1);
    }

    #[test]
    fn test_failed_delete_keeps_card() {
        let api = FakeApi::with_applications(sample());
        api.fail("delete_application", ApiError::Remote { status: 500, message: "x".into() });
        let mut pipeline = Pipeline::new();
        pipeline.load(&api);
        let id = RecordId::Number(3);
        pipeline.select(&id);
        pipeline.delete(&api, &id);
        assert!(pipeline.selected().is_some());
        assert_eq!(ids(pipeline.buckets(), Applied), vec![1, 3]);
    }
}
