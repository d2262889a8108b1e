use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    web, Error, HttpMessage, ResponseError,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

use crate::config::Config;
use crate::services::auth_service::{verify_token, Claims, TokenType};
use crate::utils::AppError;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Verifies the access token and stores its `Claims` in the request extensions, where
/// handlers pick them up as `web::ReqData<Claims>`. The admin variant also requires the
/// admin role.
#[derive(Clone, Copy)]
pub struct AuthMiddleware {
    require_admin: bool,
}

impl AuthMiddleware {
    pub fn user() -> Self {
        Self { require_admin: false }
    }

    pub fn admin() -> Self {
        Self { require_admin: true }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            require_admin: self.require_admin,
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    require_admin: bool,
}

/// Access token from the `accessToken` cookie, falling back to `Authorization: Bearer`.
fn access_token(req: &ServiceRequest) -> Option<String> {
    req.cookie(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| {
            req.headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty())
        })
}

fn authenticate(req: &ServiceRequest, require_admin: bool) -> Result<Claims, AppError> {
    let config = req.app_data::<web::Data<Config>>().ok_or_else(|| {
        log::error!("❌ Config missing from app data; cannot verify tokens");
        AppError::Internal("Authentication is not configured".to_string())
    })?;

    let token = access_token(req)
        .ok_or_else(|| AppError::Unauthorized("Unauthorized request".to_string()))?;
    let claims = verify_token(config, &token, TokenType::Access)?;

    if require_admin && !claims.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(claims)
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match authenticate(&req, self.require_admin) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(err) => {
                log::warn!("🔒 {} {} rejected: {}", req.method(), req.path(), err);
                let response = req
                    .into_response(err.error_response())
                    .map_into_right_body();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, User, ROLE_ADMIN, ROLE_USER};
    use crate::services::auth_service::generate_access_token;
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::{test, App, HttpResponse};

    fn token_for(config: &Config, roles: &[&str]) -> String {
        let user = User::new(NewUser {
            username: "asha".into(),
            email: "asha@example.com".into(),
            full_name: "Asha".into(),
            roll_number: "R1".into(),
            password_hash: String::new(),
            id_card: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            is_verified: true,
        });
        generate_access_token(config, &user).unwrap()
    }

    async fn whoami(claims: web::ReqData<Claims>) -> HttpResponse {
        HttpResponse::Ok().body(claims.username.clone())
    }

    #[actix_web::test]
    async fn test_user_and_admin_guards() {
        let config = Config::default();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config.clone()))
                .service(
                    web::scope("/me")
                        .wrap(AuthMiddleware::user())
                        .route("", web::get().to(whoami)),
                )
                .service(
                    web::scope("/admin")
                        .wrap(AuthMiddleware::admin())
                        .route("", web::get().to(whoami)),
                ),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/me").to_request()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);

        let user_token = token_for(&config, &[ROLE_USER]);
        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((AUTHORIZATION, format!("Bearer {}", user_token)))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(test::read_body(res).await, "asha");

        let req = test::TestRequest::get()
            .uri("/me")
            .cookie(Cookie::new(ACCESS_TOKEN_COOKIE, user_token.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header((AUTHORIZATION, format!("Bearer {}", user_token)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let admin_token = token_for(&config, &[ROLE_USER, ROLE_ADMIN]);
        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header((AUTHORIZATION, format!("Bearer {}", admin_token)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((AUTHORIZATION, "Bearer not-a-jwt"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }
}
