use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use super::geo::Geolocator;
use super::session::SessionContext;
use super::state::{self, ActionAvailability, ClockState};
use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, Coordinates, EntryKind, NewAttendanceRecord};
use crate::store::AttendanceStore;

#[derive(Debug, Clone, Default)]
struct ControllerState {
    clock: ClockState,
    work_centers: Vec<String>,
    selected_work_center: Option<String>,
    needs_selection: bool,
    last_position: Option<Coordinates>,
    last_error: Option<String>,
}

/// What the time-control page renders.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TimeControlView {
    pub state: ClockState,
    pub busy: bool,
    pub work_centers: Vec<String>,
    pub selected_work_center: Option<String>,
    /// Clock-in was requested with several work centers and none chosen.
    pub needs_selection: bool,
    pub actions: ActionAvailability,
    pub last_position: Option<Coordinates>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Recorded(AttendanceRecord),
    /// Nothing was written; the caller must pick one of these first.
    NeedsSelection(Vec<String>),
}

/// Clears the busy flag when the in-flight action ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn fetch_state(
    employee_id: u64,
    store: &dyn AttendanceStore,
) -> Result<ControllerState, AttendanceError> {
    let profile = store.employee_profile(employee_id).await.map_err(|e| {
        error!(error = %e, "Failed to fetch employee profile");
        AttendanceError::from(e)
    })?;

    let latest = store.latest_active_record(employee_id).await.map_err(|e| {
        error!(error = %e, "Failed to fetch latest time entry");
        AttendanceError::from(e)
    })?;

    let derived = state::derive(latest.as_ref());
    let selected_work_center = match (derived.state, derived.work_center) {
        (ClockState::Initial, _) | (_, None) => match profile.work_centers.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        },
        (_, Some(center)) => Some(center),
    };

    info!(state = ?derived.state, work_center = ?selected_work_center, "Attendance state loaded");

    Ok(ControllerState {
        clock: derived.state,
        work_centers: profile.work_centers,
        selected_work_center,
        ..ControllerState::default()
    })
}

/// Attendance state of one employee's page session.
pub struct AttendanceController {
    session: SessionContext,
    store: Arc<dyn AttendanceStore>,
    inner: RwLock<ControllerState>,
    busy: AtomicBool,
}

impl AttendanceController {
    /// Reads work centers and the latest active record, and derives the current state.
    #[instrument(name = "attendance_load", skip(session, store), fields(employee_id = session.employee_id))]
    pub async fn load(
        session: SessionContext,
        store: Arc<dyn AttendanceStore>,
    ) -> Result<Self, AttendanceError> {
        let inner = fetch_state(session.employee_id, store.as_ref()).await?;

        Ok(Self {
            session,
            store,
            inner: RwLock::new(inner),
            busy: AtomicBool::new(false),
        })
    }

    /// Page reload: replaces the state with what the store holds now.
    ///
    /// Holds the busy flag while reading, so no action can interleave with it.
    /// Returns `false` and keeps the current state when an action is in flight.
    #[instrument(name = "attendance_reload", skip(self), fields(employee_id = self.session.employee_id))]
    pub async fn reload(&self) -> Result<bool, AttendanceError> {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!("Action in progress, keeping current state");
            return Ok(false);
        };

        let fresh = fetch_state(self.session.employee_id, self.store.as_ref()).await?;
        *self.write() = fresh;
        Ok(true)
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ClockState {
        self.read().clock
    }

    pub fn view(&self) -> TimeControlView {
        let busy = self.is_busy();
        let inner = self.read();

        let actions = if busy {
            ActionAvailability::none()
        } else {
            let mut actions = state::available_actions(inner.clock);
            actions.clock_in &= !inner.work_centers.is_empty();
            actions
        };

        TimeControlView {
            state: inner.clock,
            busy,
            work_centers: inner.work_centers.clone(),
            selected_work_center: inner.selected_work_center.clone(),
            needs_selection: inner.needs_selection,
            actions,
            last_position: inner.last_position,
            error: inner.last_error.clone(),
        }
    }

    /// Chooses the work center the next clock-in is recorded against.
    pub fn select_work_center(&self, name: &str) -> Result<(), AttendanceError> {
        // The in-flight action already picked its work center.
        if self.is_busy() {
            warn!("Rejected: work center change while an action is in progress");
            return Err(AttendanceError::Busy);
        }

        let mut inner = self.write();

        let result = if inner.clock != ClockState::Initial {
            Err(AttendanceError::SelectionLocked)
        } else if !inner.work_centers.iter().any(|c| c == name) {
            Err(AttendanceError::UnknownWorkCenter(name.to_string()))
        } else {
            inner.selected_work_center = Some(name.to_string());
            inner.needs_selection = false;
            Ok(())
        };

        inner.last_error = result.as_ref().err().map(ToString::to_string);
        result
    }

    /// Appends one attendance record and advances the state once the store accepted it.
    #[instrument(
        name = "attendance_action",
        skip(self, geolocator),
        fields(employee_id = self.session.employee_id, entry_kind = %kind)
    )]
    pub async fn perform(
        &self,
        kind: EntryKind,
        geolocator: &dyn Geolocator,
    ) -> Result<ActionOutcome, AttendanceError> {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            warn!("Rejected: action already in progress");
            return Err(AttendanceError::Busy);
        };

        self.write().last_error = None;

        let result = self.run(kind, geolocator).await;
        if let Err(e) = &result {
            self.write().last_error = Some(e.to_string());
        }
        result
    }

    async fn run(
        &self,
        kind: EntryKind,
        geolocator: &dyn Geolocator,
    ) -> Result<ActionOutcome, AttendanceError> {
        let (current, work_center) = {
            let mut inner = self.write();
            let current = inner.clock;
            state::transition(current, kind)?;

            let work_center = if kind == EntryKind::ClockIn {
                let inner = &mut *inner;
                match inner.work_centers.len() {
                    0 => return Err(AttendanceError::NoWorkCenters),
                    1 => {
                        let only = inner.work_centers[0].clone();
                        inner.selected_work_center = Some(only.clone());
                        Some(only)
                    }
                    count => match &inner.selected_work_center {
                        Some(selected) => Some(selected.clone()),
                        None => {
                            info!(count, "Work center selection required");
                            inner.needs_selection = true;
                            return Ok(ActionOutcome::NeedsSelection(inner.work_centers.clone()));
                        }
                    },
                }
            } else {
                None
            };
            (current, work_center)
        };

        let coordinates = match geolocator.current_position().await {
            Ok(position) => Some(position),
            Err(e) => {
                warn!(error = %e, "Geolocation unavailable, recording without coordinates");
                None
            }
        };

        let record = NewAttendanceRecord {
            employee_id: self.session.employee_id,
            entry_type: kind,
            timestamp: Utc::now(),
            coordinates,
            is_active: true,
            work_center,
        };

        let stored = self.store.append(record).await.map_err(|e| {
            error!(error = %e, "Failed to append time entry");
            AttendanceError::from(e)
        })?;

        let mut inner = self.write();
        // Only the busy holder moves the clock, so `current` is still accurate here.
        inner.clock = state::transition(current, kind)?;
        inner.needs_selection = false;
        inner.last_position = coordinates;
        if kind == EntryKind::ClockOut {
            inner.selected_work_center = None;
        }

        info!(record_id = stored.id, state = ?inner.clock, "Time entry recorded");
        Ok(ActionOutcome::Recorded(stored))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ControllerState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ControllerState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::geo::{GeoError, ReportedPosition};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use futures::channel::oneshot;
    use futures::lock::Mutex;

    fn session(employee_id: u64) -> SessionContext {
        SessionContext {
            employee_id,
            username: format!("employee{employee_id}"),
        }
    }

    fn here() -> ReportedPosition {
        ReportedPosition {
            latitude: Some(40.4168),
            longitude: Some(-3.7038),
        }
    }

    fn recorded(outcome: ActionOutcome) -> AttendanceRecord {
        match outcome {
            ActionOutcome::Recorded(record) => record,
            other => panic!("expected a record, got {other:?}"),
        }
    }

    async fn controller(store: &Arc<InMemoryStore>, employee_id: u64) -> AttendanceController {
        let store: Arc<dyn AttendanceStore> = store.clone();
        AttendanceController::load(session(employee_id), store)
            .await
            .expect("load")
    }

    #[actix_web::test]
    async fn starts_initial_without_records() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A", "B"]));
        let ctl = controller(&store, 1).await;

        let view = ctl.view();
        assert_eq!(view.state, ClockState::Initial);
        assert_eq!(view.selected_work_center, None);
        assert!(view.actions.clock_in);
        assert!(!view.actions.clock_out);
    }

    #[actix_web::test]
    async fn load_fails_without_profile() {
        let store: Arc<dyn AttendanceStore> = Arc::new(InMemoryStore::new());
        let err = AttendanceController::load(session(9), store).await.err();
        assert!(matches!(err, Some(AttendanceError::ProfileNotFound)));
    }

    #[actix_web::test]
    async fn clock_in_rejected_without_work_centers() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, Vec::<String>::new()));
        let ctl = controller(&store, 1).await;

        let err = ctl.perform(EntryKind::ClockIn, &here()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NoWorkCenters));
        assert_eq!(ctl.state(), ClockState::Initial);
        assert!(store.records_for(1).is_empty());
        assert_eq!(ctl.view().error.as_deref(), Some("You have no work centers assigned"));
        assert!(!ctl.view().actions.clock_in);
    }

    #[actix_web::test]
    async fn single_work_center_is_used_without_prompt() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["Madrid"]));
        let ctl = controller(&store, 1).await;
        assert_eq!(ctl.view().selected_work_center.as_deref(), Some("Madrid"));

        let record = recorded(ctl.perform(EntryKind::ClockIn, &here()).await.unwrap());
        assert_eq!(record.work_center.as_deref(), Some("Madrid"));
        assert_eq!(record.latitude, Some(40.4168));
        assert_eq!(ctl.state(), ClockState::Working);
    }

    #[actix_web::test]
    async fn multiple_work_centers_prompt_then_record_selected() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A", "B"]));
        let ctl = controller(&store, 1).await;

        let outcome = ctl.perform(EntryKind::ClockIn, &here()).await.unwrap();
        assert_eq!(outcome, ActionOutcome::NeedsSelection(vec!["A".into(), "B".into()]));
        assert!(ctl.view().needs_selection);
        assert_eq!(ctl.state(), ClockState::Initial);
        assert!(store.records_for(1).is_empty());

        ctl.select_work_center("B").unwrap();
        assert!(!ctl.view().needs_selection);

        let record = recorded(ctl.perform(EntryKind::ClockIn, &here()).await.unwrap());
        assert_eq!(record.entry_type, EntryKind::ClockIn);
        assert_eq!(record.work_center.as_deref(), Some("B"));
        assert_eq!(ctl.state(), ClockState::Working);
    }

    #[actix_web::test]
    async fn selecting_unassigned_work_center_fails() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A", "B"]));
        let ctl = controller(&store, 1).await;

        let err = ctl.select_work_center("C").unwrap_err();
        assert!(matches!(err, AttendanceError::UnknownWorkCenter(ref c) if c == "C"));
        assert_eq!(ctl.view().selected_work_center, None);
    }

    #[actix_web::test]
    async fn full_cycle_and_clock_out_clears_selection() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A", "B"]));
        let ctl = controller(&store, 1).await;
        ctl.select_work_center("A").unwrap();

        for (kind, expected) in [
            (EntryKind::ClockIn, ClockState::Working),
            (EntryKind::BreakStart, ClockState::Paused),
            (EntryKind::BreakEnd, ClockState::Working),
            (EntryKind::BreakStart, ClockState::Paused),
            (EntryKind::ClockOut, ClockState::Initial),
        ] {
            ctl.perform(kind, &here()).await.unwrap();
            assert_eq!(ctl.state(), expected);
        }

        assert_eq!(ctl.view().selected_work_center, None);
        let records = store.records_for(1);
        assert_eq!(records.len(), 5);
        assert!(records[1..].iter().all(|r| r.work_center.is_none()));
    }

    #[actix_web::test]
    async fn illegal_action_writes_nothing() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A"]));
        let ctl = controller(&store, 1).await;

        let err = ctl.perform(EntryKind::BreakStart, &here()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::IllegalTransition(_)));
        assert!(store.records_for(1).is_empty());
    }

    #[actix_web::test]
    async fn failed_append_keeps_state() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A"]));
        let ctl = controller(&store, 1).await;
        store.fail_appends(true);

        let err = ctl.perform(EntryKind::ClockIn, &here()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::Store(_)));
        assert_eq!(ctl.state(), ClockState::Initial);
        assert!(ctl.view().error.is_some());

        store.fail_appends(false);
        ctl.perform(EntryKind::ClockIn, &here()).await.unwrap();
        assert_eq!(ctl.state(), ClockState::Working);
        assert_eq!(ctl.view().error, None);
    }

    #[actix_web::test]
    async fn missing_position_does_not_block() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A"]));
        let ctl = controller(&store, 1).await;

        let record = recorded(
            ctl.perform(EntryKind::ClockIn, &ReportedPosition::default())
                .await
                .unwrap(),
        );
        assert_eq!((record.latitude, record.longitude), (None, None));
        assert_eq!(ctl.view().last_position, None);
    }

    #[actix_web::test]
    async fn load_restores_state_from_latest_record() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A", "B"]));
        let at = |h| Utc.with_ymd_and_hms(2026, 1, 1, h, 0, 0).unwrap();
        let base = AttendanceRecord {
            id: 1,
            employee_id: 1,
            entry_type: EntryKind::ClockIn,
            timestamp: at(8),
            latitude: None,
            longitude: None,
            is_active: true,
            work_center: Some("B".into()),
        };
        store.seed(base.clone());
        store.seed(AttendanceRecord {
            id: 2,
            entry_type: EntryKind::BreakStart,
            timestamp: at(10),
            work_center: None,
            ..base.clone()
        });
        // inactive entries are ignored
        store.seed(AttendanceRecord {
            id: 3,
            entry_type: EntryKind::ClockOut,
            timestamp: at(11),
            is_active: false,
            work_center: None,
            ..base
        });

        let ctl = controller(&store, 1).await;
        assert_eq!(ctl.state(), ClockState::Paused);
        assert!(ctl.view().actions.break_end);
        assert!(ctl.view().actions.clock_out);
    }

    #[actix_web::test]
    async fn reload_after_clock_out_is_initial_without_selection() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A", "B"]));
        let ctl = controller(&store, 1).await;
        ctl.select_work_center("A").unwrap();
        ctl.perform(EntryKind::ClockIn, &here()).await.unwrap();
        ctl.perform(EntryKind::ClockOut, &here()).await.unwrap();

        let reloaded = controller(&store, 1).await;
        assert_eq!(reloaded.state(), ClockState::Initial);
        assert_eq!(reloaded.view().selected_work_center, None);
    }

    /// Holds the position lookup open until released.
    struct GatedPosition(Mutex<Option<oneshot::Receiver<()>>>);

    #[async_trait]
    impl Geolocator for GatedPosition {
        async fn current_position(&self) -> Result<Coordinates, GeoError> {
            let gate = self.0.lock().await.take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Err(GeoError::Unavailable)
        }
    }

    #[actix_web::test]
    async fn second_action_is_rejected_while_busy() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A"]));
        let ctl = controller(&store, 1).await;
        let (release, gate) = oneshot::channel();
        let gated = GatedPosition(Mutex::new(Some(gate)));

        let (first, second) = futures::join!(ctl.perform(EntryKind::ClockIn, &gated), async {
            let view = ctl.view();
            let second = ctl.perform(EntryKind::ClockIn, &here()).await;
            let _ = release.send(());
            (view, second)
        });

        let (busy_view, second) = second;
        assert!(busy_view.busy);
        assert_eq!(busy_view.actions, ActionAvailability::none());
        assert!(matches!(second, Err(AttendanceError::Busy)));
        assert!(matches!(first, Ok(ActionOutcome::Recorded(_))));
        assert!(!ctl.is_busy());
        assert_eq!(store.records_for(1).len(), 1);
    }

    #[actix_web::test]
    async fn work_center_is_locked_while_clock_in_is_in_flight() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A", "B"]));
        let ctl = controller(&store, 1).await;
        ctl.select_work_center("A").unwrap();
        let (release, gate) = oneshot::channel();
        let gated = GatedPosition(Mutex::new(Some(gate)));

        let (first, select) = futures::join!(ctl.perform(EntryKind::ClockIn, &gated), async {
            let select = ctl.select_work_center("B");
            let _ = release.send(());
            select
        });

        assert!(matches!(select, Err(AttendanceError::Busy)));
        let record = recorded(first.unwrap());
        assert_eq!(record.work_center.as_deref(), Some("A"));
        assert_eq!(ctl.state(), ClockState::Working);
        assert_eq!(ctl.view().selected_work_center.as_deref(), Some("A"));
    }

    #[actix_web::test]
    async fn reload_picks_up_records_written_elsewhere() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A"]));
        let ctl = controller(&store, 1).await;
        let other = controller(&store, 1).await;
        other.perform(EntryKind::ClockIn, &here()).await.unwrap();

        assert_eq!(ctl.state(), ClockState::Initial);
        assert!(ctl.reload().await.unwrap());
        assert_eq!(ctl.state(), ClockState::Working);
        assert!(!ctl.is_busy());
    }

    #[actix_web::test]
    async fn reload_leaves_in_flight_action_alone() {
        let store = Arc::new(InMemoryStore::new().with_employee(1, ["A"]));
        let ctl = controller(&store, 1).await;
        let (release, gate) = oneshot::channel();
        let gated = GatedPosition(Mutex::new(Some(gate)));

        let (first, reloaded) = futures::join!(ctl.perform(EntryKind::ClockIn, &gated), async {
            let reloaded = ctl.reload().await;
            let _ = release.send(());
            reloaded
        });

        assert!(!reloaded.unwrap());
        assert!(matches!(first, Ok(ActionOutcome::Recorded(_))));
        assert_eq!(ctl.state(), ClockState::Working);
        assert!(matches!(
            ctl.perform(EntryKind::ClockIn, &here()).await,
            Err(AttendanceError::IllegalTransition(_))
        ));
        assert_eq!(store.records_for(1).len(), 1);
    }
}
