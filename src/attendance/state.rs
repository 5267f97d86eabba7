//! The clock-in / break / clock-out state machine.
//!
//! Everything here is pure: state is a fold over the ordered attendance log, and
//! the state after a log equals the state implied by its last record.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceRecord, EntryKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClockState {
    #[default]
    Initial,
    Working,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} while {state:?}")]
pub struct IllegalTransition {
    pub state: ClockState,
    pub action: EntryKind,
}

/// Applies one action to a state according to the transition table.
pub fn transition(state: ClockState, action: EntryKind) -> Result<ClockState, IllegalTransition> {
    use ClockState::*;
    use EntryKind::*;

    match (state, action) {
        (Initial, ClockIn) => Ok(Working),
        (Working, BreakStart) => Ok(Paused),
        (Paused, BreakEnd) => Ok(Working),
        (Working | Paused, ClockOut) => Ok(Initial),
        _ => Err(IllegalTransition { state, action }),
    }
}

/// State implied by a record of the given kind being the latest one.
pub fn state_after(kind: EntryKind) -> ClockState {
    match kind {
        EntryKind::ClockIn | EntryKind::BreakEnd => ClockState::Working,
        EntryKind::BreakStart => ClockState::Paused,
        EntryKind::ClockOut => ClockState::Initial,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Derived {
    pub state: ClockState,
    pub work_center: Option<String>,
}

/// Reconstructs the current state from the most recent active record.
pub fn derive(latest: Option<&AttendanceRecord>) -> Derived {
    match latest {
        None => Derived::default(),
        Some(record) if record.entry_type == EntryKind::ClockOut => Derived::default(),
        Some(record) => Derived {
            state: state_after(record.entry_type),
            work_center: record.work_center.clone(),
        },
    }
}

/// Folds an ordered log of entry kinds starting from `Initial`.
pub fn replay<I>(kinds: I) -> Result<ClockState, IllegalTransition>
where
    I: IntoIterator<Item = EntryKind>,
{
    kinds
        .into_iter()
        .try_fold(ClockState::Initial, transition)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct ActionAvailability {
    pub clock_in: bool,
    pub break_start: bool,
    pub break_end: bool,
    pub clock_out: bool,
}

impl ActionAvailability {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn allows(&self, kind: EntryKind) -> bool {
        match kind {
            EntryKind::ClockIn => self.clock_in,
            EntryKind::BreakStart => self.break_start,
            EntryKind::BreakEnd => self.break_end,
            EntryKind::ClockOut => self.clock_out,
        }
    }
}

/// Actions the transition table permits from `state`.
pub fn available_actions(state: ClockState) -> ActionAvailability {
    ActionAvailability {
        clock_in: transition(state, EntryKind::ClockIn).is_ok(),
        break_start: transition(state, EntryKind::BreakStart).is_ok(),
        break_end: transition(state, EntryKind::BreakEnd).is_ok(),
        clock_out: transition(state, EntryKind::ClockOut).is_ok(),
    }
}
