use crate::attendance::SessionContext;
use crate::error::AttendanceError;
use crate::model::role::Role;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    /// Set by `auth_middleware`; routes outside it never see a user.
    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("Not authenticated")),
        )
    }
}

impl AuthUser {
    /// Session context for the time clock; only users linked to an employee have one.
    pub fn session(&self) -> Result<SessionContext, AttendanceError> {
        let employee_id = self
            .employee_id
            .ok_or(AttendanceError::MissingEmployeeId)?;

        Ok(SessionContext {
            employee_id,
            username: self.username.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn maria() -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "maria".into(),
            role: Role::Employee,
            employee_id: Some(7),
        }
    }

    #[actix_web::test]
    async fn extracts_user_set_by_middleware() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(maria());

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.username, "maria");
        assert_eq!(user.session().unwrap().employee_id, 7);
    }

    #[actix_web::test]
    async fn bearer_header_alone_is_not_enough() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer anything"))
            .to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());
    }

    #[test]
    fn session_requires_employee_link() {
        let user = AuthUser {
            employee_id: None,
            ..maria()
        };
        assert!(matches!(user.session(), Err(AttendanceError::MissingEmployeeId)));
    }
}
