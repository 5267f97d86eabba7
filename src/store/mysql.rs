use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, types::Json};
use tracing::debug;

use super::{AttendanceStore, StoreError};
use crate::model::attendance::{AttendanceRecord, EntryKind, NewAttendanceRecord};
use crate::model::employee::EmployeeProfile;

#[derive(sqlx::FromRow)]
struct TimeEntryRow {
    id: u64,
    employee_id: u64,
    entry_type: String,
    timestamp: DateTime<Utc>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    is_active: bool,
    work_center: Option<String>,
}

impl TryFrom<TimeEntryRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: TimeEntryRow) -> Result<Self, Self::Error> {
        let entry_type = EntryKind::from_str(&row.entry_type).map_err(|_| {
            StoreError::InvalidRecord(format!(
                "time entry {} has unknown entry_type '{}'",
                row.id, row.entry_type
            ))
        })?;

        Ok(AttendanceRecord {
            id: row.id,
            employee_id: row.employee_id,
            entry_type,
            timestamp: row.timestamp,
            latitude: row.latitude,
            longitude: row.longitude,
            is_active: row.is_active,
            work_center: row.work_center,
        })
    }
}

#[derive(Clone)]
pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn employee_profile(&self, employee_id: u64) -> Result<EmployeeProfile, StoreError> {
        let row = sqlx::query_as::<_, (Option<Json<Vec<String>>>,)>(
            "SELECT work_centers FROM employee_profiles WHERE id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        let (work_centers,) = row.ok_or(StoreError::ProfileNotFound(employee_id))?;

        Ok(EmployeeProfile {
            id: employee_id,
            work_centers: work_centers.map(|Json(centers)| centers).unwrap_or_default(),
        })
    }

    async fn latest_active_record(
        &self,
        employee_id: u64,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let row = sqlx::query_as::<_, TimeEntryRow>(
            r#"
            SELECT id, employee_id, entry_type, timestamp, latitude, longitude, is_active, work_center
            FROM time_entries
            WHERE employee_id = ? AND is_active = TRUE
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn append(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        debug!(
            employee_id = record.employee_id,
            entry_kind = %record.entry_type,
            work_center = ?record.work_center,
            "Inserting time entry"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO time_entries
                (employee_id, entry_type, timestamp, latitude, longitude, is_active, work_center)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.employee_id)
        .bind(record.entry_type.as_ref())
        .bind(record.timestamp)
        .bind(record.coordinates.map(|c| c.latitude))
        .bind(record.coordinates.map(|c| c.longitude))
        .bind(record.is_active)
        .bind(record.work_center.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(record.into_record(result.last_insert_id()))
    }
}
