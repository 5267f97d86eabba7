pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::attendance::{AttendanceRecord, NewAttendanceRecord};
use crate::model::employee::EmployeeProfile;

pub use memory::InMemoryStore;
pub use mysql::MySqlAttendanceStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("employee profile {0} not found")]
    ProfileNotFound(u64),

    #[error("invalid attendance record: {0}")]
    InvalidRecord(String),

    #[error("attendance store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Remote store holding employee profiles and the attendance log.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Profile with the work centers assigned to the employee.
    async fn employee_profile(&self, employee_id: u64) -> Result<EmployeeProfile, StoreError>;

    /// Most recent active record (latest timestamp, ties broken by id).
    async fn latest_active_record(
        &self,
        employee_id: u64,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    async fn append(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError>;
}
