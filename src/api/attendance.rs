use crate::attendance::{ActionOutcome, ReportedPosition, SessionRegistry, TimeControlView};
use crate::auth::auth::AuthUser;
use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, EntryKind};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct SelectWorkCenter {
    #[schema(example = "Valencia")]
    pub work_center: String,
}

#[derive(Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionResponse {
    /// The entry was stored and the state advanced.
    Recorded {
        record: AttendanceRecord,
        view: TimeControlView,
    },
    /// Several work centers are assigned and none is selected yet; nothing was stored.
    NeedsSelection {
        work_centers: Vec<String>,
        view: TimeControlView,
    },
}

/// Time control page state
#[utoipa::path(
    get,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Current attendance state", body = TimeControlView),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee id found for this session", body = Object, example = json!({
            "message": "No employee id found for this session"
        })),
        (status = 404, description = "No employee profile found"),
        (status = 503, description = "Attendance store unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn time_control(
    auth: AuthUser,
    sessions: web::Data<SessionRegistry>,
) -> Result<impl Responder, AttendanceError> {
    let controller = sessions.open(auth.session()?).await?;
    Ok(HttpResponse::Ok().json(controller.view()))
}

/// Select work center for the next clock-in
#[utoipa::path(
    put,
    path = "/api/attendance/work-center",
    request_body = SelectWorkCenter,
    responses(
        (status = 200, description = "Work center selected", body = TimeControlView),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Work center not assigned, or already clocked in", body = Object, example = json!({
            "message": "Work center 'Bilbao' is not assigned to you"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn select_work_center(
    auth: AuthUser,
    sessions: web::Data<SessionRegistry>,
    payload: web::Json<SelectWorkCenter>,
) -> Result<impl Responder, AttendanceError> {
    let controller = sessions.resume(auth.session()?).await?;
    controller.select_work_center(payload.work_center.trim())?;
    Ok(HttpResponse::Ok().json(controller.view()))
}

/// Record an attendance action
#[utoipa::path(
    post,
    path = "/api/attendance/actions/{action}",
    params(
        ("action" = EntryKind, Path, description = "clock_in, break_start, break_end or clock_out")
    ),
    request_body(
        content = ReportedPosition,
        description = "Coordinates read by the client; optional",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Entry recorded, or work center selection required", body = ActionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Action not allowed in the current state, or another action in progress", body = Object, example = json!({
            "message": "Another attendance action is still in progress"
        })),
        (status = 422, description = "No work centers assigned", body = Object, example = json!({
            "message": "You have no work centers assigned"
        })),
        (status = 503, description = "Attendance store unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn record_action(
    auth: AuthUser,
    sessions: web::Data<SessionRegistry>,
    path: web::Path<EntryKind>,
    position: Option<web::Json<ReportedPosition>>,
) -> Result<impl Responder, AttendanceError> {
    let kind = path.into_inner();
    let position = position.map(web::Json::into_inner).unwrap_or_default();

    let controller = sessions.resume(auth.session()?).await?;
    let response = match controller.perform(kind, &position).await? {
        ActionOutcome::Recorded(record) => ActionResponse::Recorded {
            record,
            view: controller.view(),
        },
        ActionOutcome::NeedsSelection(work_centers) => ActionResponse::NeedsSelection {
            work_centers,
            view: controller.view(),
        },
    };

    Ok(HttpResponse::Ok().json(response))
}
