use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, info};

use super::controller::AttendanceController;
use crate::error::AttendanceError;
use crate::store::AttendanceStore;

/// Who is using the time clock, taken from the authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub employee_id: u64,
    pub username: String,
}

/// One live controller per employee, dropped after `idle` without use.
pub struct SessionRegistry {
    store: Arc<dyn AttendanceStore>,
    controllers: Cache<u64, Arc<AttendanceController>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn AttendanceStore>, capacity: u64, idle: Duration) -> Self {
        Self {
            store,
            controllers: Cache::builder()
                .max_capacity(capacity)
                .time_to_idle(idle)
                .build(),
        }
    }

    /// Page load: reads the stored state again, unless an action is still in flight.
    pub async fn open(
        &self,
        session: SessionContext,
    ) -> Result<Arc<AttendanceController>, AttendanceError> {
        let employee_id = session.employee_id;

        if let Some(existing) = self.controllers.get(&employee_id).await {
            if !existing.reload().await? {
                debug!(employee_id, "Keeping busy controller");
            }
            return Ok(existing);
        }

        let fresh = Arc::new(AttendanceController::load(session, self.store.clone()).await?);
        // A concurrent page load may have cached one first; everyone shares that one.
        let entry = self.controllers.entry(employee_id).or_insert(fresh).await;
        Ok(entry.into_value())
    }

    /// Controller of an already opened page, opening one if it expired.
    pub async fn resume(
        &self,
        session: SessionContext,
    ) -> Result<Arc<AttendanceController>, AttendanceError> {
        match self.controllers.get(&session.employee_id).await {
            Some(controller) => Ok(controller),
            None => self.open(session).await,
        }
    }

    pub async fn close(&self, employee_id: u64) {
        info!(employee_id, "Closing attendance session");
        self.controllers.invalidate(&employee_id).await;
    }
}
