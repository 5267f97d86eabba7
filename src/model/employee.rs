use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Employee as seen by the time clock: an id and the work centers it may clock in at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "work_centers": ["Madrid", "Valencia"]
    })
)]
pub struct EmployeeProfile {
    #[schema(example = 7)]
    pub id: u64,

    #[schema(example = json!(["Madrid", "Valencia"]))]
    pub work_centers: Vec<String>,
}
