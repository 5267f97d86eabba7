use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Kind of an attendance entry, persisted as its snake_case name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntryKind {
    ClockIn,
    BreakStart,
    BreakEnd,
    ClockOut,
}

impl EntryKind {
    pub const ALL: [EntryKind; 4] = [
        EntryKind::ClockIn,
        EntryKind::BreakStart,
        EntryKind::BreakEnd,
        EntryKind::ClockOut,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    #[schema(example = 40.4168)]
    pub latitude: f64,
    #[schema(example = -3.7038)]
    pub longitude: f64,
}

impl Coordinates {
    /// Returns `None` unless both values are finite and inside WGS84 bounds.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);
        (lat_ok && lon_ok).then_some(Self { latitude, longitude })
    }
}

/// One append-only event in an employee's time log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 42,
    "employee_id": 7,
    "entry_type": "clock_in",
    "timestamp": "2026-01-01T08:00:00Z",
    "latitude": 40.4168,
    "longitude": -3.7038,
    "is_active": true,
    "work_center": "Madrid"
}))]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,
    pub entry_type: EntryKind,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_active: bool,
    pub work_center: Option<String>,
}

/// A record about to be appended; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceRecord {
    pub employee_id: u64,
    pub entry_type: EntryKind,
    pub timestamp: DateTime<Utc>,
    pub coordinates: Option<Coordinates>,
    pub is_active: bool,
    pub work_center: Option<String>,
}

impl NewAttendanceRecord {
    pub fn into_record(self, id: u64) -> AttendanceRecord {
        AttendanceRecord {
            id,
            employee_id: self.employee_id,
            entry_type: self.entry_type,
            timestamp: self.timestamp,
            latitude: self.coordinates.map(|c| c.latitude),
            longitude: self.coordinates.map(|c| c.longitude),
            is_active: self.is_active,
            work_center: self.work_center,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn entry_kind_uses_snake_case_names() {
        assert_eq!(EntryKind::BreakStart.as_ref(), "break_start");
        assert_eq!(EntryKind::from_str("clock_out").ok(), Some(EntryKind::ClockOut));
        assert!(EntryKind::from_str("lunch").is_err());
        assert_eq!(
            serde_json::to_value(EntryKind::ClockIn).ok(),
            Some(serde_json::json!("clock_in"))
        );
    }

    #[test]
    fn coordinates_reject_out_of_range_values() {
        assert!(Coordinates::new(40.0, -3.0).is_some());
        assert!(Coordinates::new(91.0, 0.0).is_none());
        assert!(Coordinates::new(0.0, 181.0).is_none());
        assert!(Coordinates::new(f64::NAN, 0.0).is_none());
    }
}
