use actix_multipart::Multipart;
use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};

use crate::config::Config;
use crate::database::Store;
use crate::middleware::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::middleware::AuthMiddleware;
use crate::models::{
    PlacementDetailsRow, PlacementResponse, PlacementSlot, PopulatedUser, UserResponse,
};
use crate::services::auth_service::Claims;
use crate::services::mail_service::SendEmail;
use crate::services::media_service::MediaStore;
use crate::services::user_service::{
    self, LoginRequest, LoginResponse, RefreshTokenRequest, RollNumberRequest, VerifyMailRequest,
    VerifyUserRequest,
};
use crate::utils::{ApiResponse, AppError, FormData};

type StoreData = web::Data<dyn Store>;
type MailerData = web::Data<dyn SendEmail>;
type MediaData = web::Data<dyn MediaStore>;

fn session_cookie(config: &Config, name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .finish()
}

fn removal_cookie(config: &Config, name: &'static str) -> Cookie<'static> {
    let mut cookie = session_cookie(config, name, String::new());
    cookie.make_removal();
    cookie
}

fn session_response(config: &Config, session: LoginResponse, message: &str) -> HttpResponse {
    let access = session_cookie(config, ACCESS_TOKEN_COOKIE, session.access_token.clone());
    let refresh = session_cookie(config, REFRESH_TOKEN_COOKIE, session.refresh_token.clone());

    let body = ApiResponse::ok(session, message);
    let mut builder = body.builder();
    builder.cookie(access).cookie(refresh);
    builder.json(body)
}

// ==================== REGISTRATION ====================

#[utoipa::path(
    post,
    path = "/api/v1/users/verify-mail",
    tag = "Users",
    request_body = VerifyMailRequest,
    responses(
        (status = 200, description = "OTP mailed"),
        (status = 400, description = "Email missing"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn verify_mail(
    store: StoreData,
    mailer: MailerData,
    config: web::Data<Config>,
    request: web::Json<VerifyMailRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("📨 POST /users/verify-mail - email: {}", request.email);
    user_service::request_otp(store.get_ref(), mailer.get_ref(), &config, &request.email).await?;
    Ok(ApiResponse::ok(serde_json::json!({}), "OTP sent successfully").respond())
}

#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    tag = "Users",
    request_body(content_type = "multipart/form-data", description = "username, password, fullName, rollNumber, email, usrOTP and the idCard file"),
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Missing field, missing ID card or wrong OTP"),
        (status = 409, description = "Username or email already taken"),
        (status = 500, description = "ID card upload failed")
    )
)]
pub async fn register(
    store: StoreData,
    media: MediaData,
    config: web::Data<Config>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    log::info!("📝 POST /users/register");
    let form = FormData::collect(payload, config.max_upload_bytes).await?;
    let user = user_service::register(store.get_ref(), media.get_ref(), &config, form).await?;

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        UserResponse::from(&user),
        "User registered successfully",
    )
    .respond())
}

// ==================== SESSION ====================

#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; accessToken and refreshToken cookies set", body = LoginResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Wrong password"),
        (status = 403, description = "Account not verified yet"),
        (status = 404, description = "No such user")
    )
)]
pub async fn login(
    store: StoreData,
    config: web::Data<Config>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔐 POST /users/login - email: {}", request.email);

    match user_service::login(store.get_ref(), &config, &request).await {
        Ok(session) => {
            log::info!("✅ Login successful: {}", session.user.username);
            Ok(session_response(&config, session, "User logged in successfully"))
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", request.email, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/users/logout",
    tag = "Users",
    responses(
        (status = 200, description = "Logged out; cookies cleared"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(
    store: StoreData,
    config: web::Data<Config>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    log::info!("👋 POST /users/logout - user: {}", claims.sub);
    user_service::logout(store.get_ref(), &claims).await?;

    let body = ApiResponse::ok(serde_json::json!({}), "User logged out successfully!");
    let mut builder = body.builder();
    builder
        .cookie(removal_cookie(&config, ACCESS_TOKEN_COOKIE))
        .cookie(removal_cookie(&config, REFRESH_TOKEN_COOKIE));
    Ok(builder.json(body))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/refresh-token",
    tag = "Users",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = LoginResponse),
        (status = 401, description = "Refresh token missing, invalid or already used")
    )
)]
pub async fn refresh_token(
    req: HttpRequest,
    store: StoreData,
    config: web::Data<Config>,
    request: Option<web::Json<RefreshTokenRequest>>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔄 POST /users/refresh-token");

    let token = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.trim().is_empty())
        .or_else(|| request.and_then(|body| body.into_inner().refresh_token));

    let session = user_service::refresh(store.get_ref(), &config, token.as_deref()).await?;
    Ok(session_response(&config, session, "Access token refreshed"))
}

// ==================== PROFILE ====================

#[utoipa::path(
    get,
    path = "/api/v1/users/get-user",
    tag = "Users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Account no longer exists")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    store: StoreData,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let user = user_service::current_user(store.get_ref(), &claims).await?;
    Ok(ApiResponse::ok(UserResponse::from(&user), "user fetched").respond())
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/update",
    tag = "Users",
    request_body(content_type = "multipart/form-data", description = "Any profile text field plus optional image and resume files"),
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Nothing to update or a malformed value"),
        (status = 409, description = "Email belongs to another account")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update(
    store: StoreData,
    media: MediaData,
    config: web::Data<Config>,
    claims: web::ReqData<Claims>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    log::info!("✏️  PATCH /users/update - user: {}", claims.sub);
    let form = FormData::collect(payload, config.max_upload_bytes).await?;
    let user = user_service::update_profile(store.get_ref(), media.get_ref(), &claims, form).await?;

    Ok(ApiResponse::ok(UserResponse::from(&user), "User details updated successfully!").respond())
}

// ==================== PLACEMENTS ====================

async fn save_placement(
    slot: PlacementSlot,
    store: StoreData,
    media: MediaData,
    config: web::Data<Config>,
    claims: web::ReqData<Claims>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    log::info!("💼 PATCH {} - user: {}", slot.field(), claims.sub);
    let form = FormData::collect(payload, config.max_upload_bytes).await?;
    let user =
        user_service::set_placement(store.get_ref(), media.get_ref(), &claims, slot, form).await?;

    Ok(ApiResponse::ok(UserResponse::from(&user), "Placement details updated successfully!")
        .respond())
}

async fn fetch_placement(
    slot: PlacementSlot,
    store: StoreData,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let placement = user_service::get_placement(store.get_ref(), &claims, slot).await?;

    let response = match placement {
        Some(placement) => ApiResponse::ok(
            Some(PlacementResponse::from(&placement)),
            "Placement data retrieved successfully",
        ),
        None => ApiResponse::ok(None, "No placement data found"),
    };
    Ok(response.respond())
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/pone",
    tag = "Placements",
    request_body(content_type = "multipart/form-data", description = "company, role, ctc, date (YYYY-MM-DD) and the doc file"),
    responses(
        (status = 200, description = "First placement recorded", body = UserResponse),
        (status = 400, description = "Missing or malformed field, or missing document")
    ),
    security(("bearer_auth" = []))
)]
pub async fn pone(
    store: StoreData,
    media: MediaData,
    config: web::Data<Config>,
    claims: web::ReqData<Claims>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    save_placement(PlacementSlot::One, store, media, config, claims, payload).await
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/ptwo",
    tag = "Placements",
    request_body(content_type = "multipart/form-data", description = "company, role, ctc, date (YYYY-MM-DD) and the doc file"),
    responses(
        (status = 200, description = "Second placement recorded", body = UserResponse),
        (status = 400, description = "Missing or malformed field, or missing document")
    ),
    security(("bearer_auth" = []))
)]
pub async fn ptwo(
    store: StoreData,
    media: MediaData,
    config: web::Data<Config>,
    claims: web::ReqData<Claims>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    save_placement(PlacementSlot::Two, store, media, config, claims, payload).await
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/pthree",
    tag = "Placements",
    request_body(content_type = "multipart/form-data", description = "company, role, ctc, date (YYYY-MM-DD) and the doc file"),
    responses(
        (status = 200, description = "Third placement recorded", body = UserResponse),
        (status = 400, description = "Missing or malformed field, or missing document")
    ),
    security(("bearer_auth" = []))
)]
pub async fn pthree(
    store: StoreData,
    media: MediaData,
    config: web::Data<Config>,
    claims: web::ReqData<Claims>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    save_placement(PlacementSlot::Three, store, media, config, claims, payload).await
}

#[utoipa::path(
    get,
    path = "/api/v1/users/placementOne",
    tag = "Placements",
    responses((status = 200, description = "First placement, or null data when never set", body = PlacementResponse)),
    security(("bearer_auth" = []))
)]
pub async fn placement_one(
    store: StoreData,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    fetch_placement(PlacementSlot::One, store, claims).await
}

#[utoipa::path(
    get,
    path = "/api/v1/users/placementTwo",
    tag = "Placements",
    responses((status = 200, description = "Second placement, or null data when never set", body = PlacementResponse)),
    security(("bearer_auth" = []))
)]
pub async fn placement_two(
    store: StoreData,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    fetch_placement(PlacementSlot::Two, store, claims).await
}

#[utoipa::path(
    get,
    path = "/api/v1/users/placementThree",
    tag = "Placements",
    responses((status = 200, description = "Third placement, or null data when never set", body = PlacementResponse)),
    security(("bearer_auth" = []))
)]
pub async fn placement_three(
    store: StoreData,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    fetch_placement(PlacementSlot::Three, store, claims).await
}

// ==================== LOOKUP & ADMIN ====================

#[utoipa::path(
    post,
    path = "/api/v1/users/getbyroll",
    tag = "Users",
    request_body = RollNumberRequest,
    responses(
        (status = 200, description = "User with placements embedded", body = PopulatedUser),
        (status = 400, description = "Roll number missing"),
        (status = 404, description = "No user with that roll number")
    )
)]
pub async fn get_by_roll(
    store: StoreData,
    request: web::Json<RollNumberRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔎 POST /users/getbyroll - roll: {}", request.roll_number);

    Ok(
        match user_service::user_by_roll(store.get_ref(), &request.roll_number).await? {
            Some(user) => ApiResponse::ok(Some(user), "User data fetched").respond(),
            None => ApiResponse::<Option<PopulatedUser>>::new(
                StatusCode::NOT_FOUND,
                None,
                "User not found",
            )
            .respond(),
        },
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/users/placementDetails",
    tag = "Admin",
    responses(
        (status = 200, description = "Placement summary per student", body = [PlacementDetailsRow]),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an administrator")
    ),
    security(("bearer_auth" = []))
)]
pub async fn placement_details(store: StoreData) -> Result<HttpResponse, AppError> {
    let rows = user_service::placement_details(store.get_ref()).await?;
    log::info!("📊 Placement details for {} students", rows.len());
    Ok(ApiResponse::ok(rows, "Placement details fetched successfully!").respond())
}

#[utoipa::path(
    get,
    path = "/api/v1/users/all-users",
    tag = "Admin",
    responses(
        (status = 200, description = "Every account with placements embedded", body = [PopulatedUser]),
        (status = 403, description = "Not an administrator")
    ),
    security(("bearer_auth" = []))
)]
pub async fn all_users(store: StoreData) -> Result<HttpResponse, AppError> {
    let users = user_service::all_users(store.get_ref()).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "users": users }), "all users fetched").respond())
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/verify-user",
    tag = "Admin",
    request_body = VerifyUserRequest,
    responses(
        (status = 200, description = "Verification flag updated", body = UserResponse),
        (status = 404, description = "No user with that roll number")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_user(
    store: StoreData,
    claims: web::ReqData<Claims>,
    request: web::Json<VerifyUserRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!(
        "🛂 PATCH /users/verify-user - roll: {} by {}",
        request.roll_number,
        claims.username
    );
    let user = user_service::set_verified(store.get_ref(), &request).await?;
    Ok(ApiResponse::ok(UserResponse::from(&user), "Verification status updated").respond())
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid JSON body: {}", err)).into())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/users")
            .app_data(json_config())
            .route("/verify-mail", web::post().to(verify_mail))
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/refresh-token", web::post().to(refresh_token))
            .route("/getbyroll", web::post().to(get_by_roll))
            .service(
                web::resource("/logout")
                    .wrap(AuthMiddleware::user())
                    .route(web::post().to(logout)),
            )
            .service(
                web::resource("/get-user")
                    .wrap(AuthMiddleware::user())
                    .route(web::get().to(get_user)),
            )
            .service(
                web::resource("/update")
                    .wrap(AuthMiddleware::user())
                    .route(web::patch().to(update)),
            )
            .service(web::resource("/pone").wrap(AuthMiddleware::user()).route(web::patch().to(pone)))
            .service(web::resource("/ptwo").wrap(AuthMiddleware::user()).route(web::patch().to(ptwo)))
            .service(
                web::resource("/pthree")
                    .wrap(AuthMiddleware::user())
                    .route(web::patch().to(pthree)),
            )
            .service(
                web::resource("/placementOne")
                    .wrap(AuthMiddleware::user())
                    .route(web::get().to(placement_one)),
            )
            .service(
                web::resource("/placementTwo")
                    .wrap(AuthMiddleware::user())
                    .route(web::get().to(placement_two)),
            )
            .service(
                web::resource("/placementThree")
                    .wrap(AuthMiddleware::user())
                    .route(web::get().to(placement_three)),
            )
            .service(
                web::resource("/placementDetails")
                    .wrap(AuthMiddleware::admin())
                    .route(web::get().to(placement_details)),
            )
            .service(
                web::resource("/all-users")
                    .wrap(AuthMiddleware::admin())
                    .route(web::get().to(all_users)),
            )
            .service(
                web::resource("/verify-user")
                    .wrap(AuthMiddleware::admin())
                    .route(web::patch().to(verify_user)),
            ),
    );
}
