use actix_web::error::{ErrorForbidden, ErrorInternalServerError, ErrorUnauthorized};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::leave::workflow::Approver;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    pub employee_id: u64,
}

impl TryFrom<Claims> for AuthUser {
    type Error = &'static str;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        if claims.token_type != TokenType::Access {
            return Err("Access token required");
        }
        let role = Role::from_id(claims.role).ok_or("Invalid role")?;

        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by auth_middleware on protected scopes.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(ErrorInternalServerError("Config missing"))),
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        ready(AuthUser::try_from(claims).map_err(ErrorUnauthorized))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ErrorForbidden("Admin only"))
        }
    }

    /// Admins and managers may decide leave requests and read reports.
    pub fn require_approver(&self) -> actix_web::Result<Approver> {
        Approver::new(self.employee_id, self.role).map_err(actix_web::Error::from)
    }

    /// Staff only see their own records.
    pub fn can_view(&self, employee_id: u64) -> bool {
        self.role.is_approver() || self.employee_id == employee_id
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: u8, token_type: TokenType) -> Claims {
        Claims {
            user_id: 1,
            sub: "kofi@africahr.com".into(),
            role,
            employee_id: 9,
            exp: usize::MAX,
            jti: "jti".into(),
            token_type,
        }
    }

    #[test]
    fn refresh_tokens_cannot_authenticate_requests() {
        assert!(AuthUser::try_from(claims(3, TokenType::Refresh)).is_err());
        assert!(AuthUser::try_from(claims(7, TokenType::Access)).is_err());
    }

    #[test]
    fn staff_see_only_themselves() {
        let staff = AuthUser::try_from(claims(3, TokenType::Access)).unwrap();
        assert!(staff.is_staff());
        assert!(staff.can_view(9));
        assert!(!staff.can_view(10));
        assert!(staff.require_approver().is_err());
        assert!(staff.require_admin().is_err());

        let manager = AuthUser::try_from(claims(2, TokenType::Access)).unwrap();
        assert!(manager.can_view(10));
        assert_eq!(manager.require_approver().unwrap().employee_id, 9);
        assert!(manager.require_admin().is_err());
    }
}
