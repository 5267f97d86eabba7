use crate::api::attendance::{ActionResponse, SelectWorkCenter};
use crate::api::dashboard::{DashboardResponse, NavLink};
use crate::attendance::{ActionAvailability, ClockState, ReportedPosition, TimeControlView};
use crate::auth::handlers::{LoginResponse, LogoutResponse};
use crate::model::attendance::{AttendanceRecord, Coordinates, EntryKind};
use crate::model::employee::EmployeeProfile;
use crate::model::role::Role;
use crate::models::LoginReqDto;
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Time Clock API",
        version = "1.0.0",
        description = r#"
## Employee Time Clock

Back end of the employee portal's time-control page.

### 🔹 Key Features
- **Clock in / out** with breaks, guarded by a state machine
  (`initial → working → paused → working → initial`)
- **Work centers**: employees assigned to several must pick one before clocking in
- **Location**: coordinates reported by the client are stored with each entry when available

### 🔐 Security
Endpoints under `/api` require a **JWT Bearer** access token linked to an employee.

### 📦 Response Format
- JSON responses; errors are `{"message": "..."}`
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::dashboard::dashboard,

        crate::api::attendance::time_control,
        crate::api::attendance::select_work_center,
        crate::api::attendance::record_action
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            LogoutResponse,
            DashboardResponse,
            NavLink,
            Role,
            TimeControlView,
            ActionAvailability,
            ClockState,
            SelectWorkCenter,
            ActionResponse,
            ReportedPosition,
            AttendanceRecord,
            Coordinates,
            EntryKind,
            EmployeeProfile
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh and logout"),
        (name = "Dashboard", description = "Employee portal navigation"),
        (name = "Attendance", description = "Time clock APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
