use crate::auth::auth::AuthUser;
use crate::model::role::Role;
use actix_web::{HttpResponse, Responder};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NavLink {
    #[schema(example = "History")]
    pub label: String,
    #[schema(example = "/employee/history")]
    pub path: String,
}

/// Pages of the employee portal; only the clock is served by this service.
const EMPLOYEE_NAV: [(&str, &str); 5] = [
    ("Clock", "/employee/clock"),
    ("History", "/employee/history"),
    ("Requests", "/employee/requests"),
    ("Calendar", "/employee/calendar"),
    ("Profile", "/employee/profile"),
];

pub fn employee_nav() -> Vec<NavLink> {
    EMPLOYEE_NAV
        .iter()
        .map(|(label, path)| NavLink {
            label: label.to_string(),
            path: path.to_string(),
        })
        .collect()
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    #[schema(example = "maria")]
    pub username: String,
    pub role: Role,
    #[schema(example = 7, nullable = true)]
    pub employee_id: Option<u64>,
    pub links: Vec<NavLink>,
}

/// Employee portal header: signed-in user and navigation
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Signed-in user and portal navigation", body = DashboardResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Dashboard"
)]
pub async fn dashboard(auth: AuthUser) -> impl Responder {
    HttpResponse::Ok().json(DashboardResponse {
        username: auth.username,
        role: auth.role,
        employee_id: auth.employee_id,
        links: employee_nav(),
    })
}
