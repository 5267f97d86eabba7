use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{AttendanceStore, StoreError};
use crate::model::attendance::{AttendanceRecord, NewAttendanceRecord};
use crate::model::employee::EmployeeProfile;

/// Process-local store, used by tests and for running without a database.
#[derive(Default)]
pub struct InMemoryStore {
    profiles: RwLock<HashMap<u64, Vec<String>>>,
    records: RwLock<Vec<AttendanceRecord>>,
    next_id: AtomicU64,
    fail_appends: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_employee<S: Into<String>>(
        self,
        employee_id: u64,
        work_centers: impl IntoIterator<Item = S>,
    ) -> Self {
        self.set_work_centers(employee_id, work_centers);
        self
    }

    pub fn set_work_centers<S: Into<String>>(
        &self,
        employee_id: u64,
        work_centers: impl IntoIterator<Item = S>,
    ) {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(employee_id, work_centers.into_iter().map(Into::into).collect());
    }

    /// Makes every subsequent append fail until switched off again.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Inserts an already-built record as-is, e.g. history written by another client.
    pub fn seed(&self, record: AttendanceRecord) {
        self.next_id.fetch_max(record.id, Ordering::SeqCst);
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// All records of one employee in insertion order.
    pub fn records_for(&self, employee_id: u64) -> Vec<AttendanceRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.employee_id == employee_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AttendanceStore for InMemoryStore {
    async fn employee_profile(&self, employee_id: u64) -> Result<EmployeeProfile, StoreError> {
        let profiles = self.profiles.read().unwrap_or_else(PoisonError::into_inner);
        let work_centers = profiles
            .get(&employee_id)
            .ok_or(StoreError::ProfileNotFound(employee_id))?;

        Ok(EmployeeProfile {
            id: employee_id,
            work_centers: work_centers.clone(),
        })
    }

    async fn latest_active_record(
        &self,
        employee_id: u64,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .filter(|r| r.employee_id == employee_id && r.is_active)
            .max_by_key(|r| (r.timestamp, r.id))
            .cloned())
    }

    async fn append(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("append rejected".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = record.into_record(id);
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(record)
    }
}
