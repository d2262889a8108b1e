use chrono::NaiveDate;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::config::Config;
use crate::database::Store;
use crate::models::{
    CodingProfiles, NewUser, Otp, Placement, PlacementDetailsRow, PlacementResponse,
    PlacementSlot, PlacementSummary, PopulatedUser, ProfileUpdate, ProfileView, User,
    UserResponse, WorkExperience, ROLE_USER,
};
use crate::services::auth_service::{self, Claims, TokenType};
use crate::services::mail_service::{otp_message, SendEmail};
use crate::services::media_service::MediaStore;
use crate::utils::{otp::generate_otp, AppError, FormData, UploadedFile};

pub const ID_CARD_FOLDER: &str = "idCards";
pub const PROFILE_FOLDER: &str = "profiles";
pub const PLACEMENT_FOLDER: &str = "placements";

// ==================== REQUEST / RESPONSE TYPES ====================

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyMailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollNumberRequest {
    #[serde(default)]
    pub roll_number: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyUserRequest {
    #[serde(default)]
    pub roll_number: String,
    pub verified: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

// ==================== HELPERS ====================

fn required_fields() -> AppError {
    AppError::BadRequest("All fields are required".to_string())
}

async fn upload(
    media: &dyn MediaStore,
    file: UploadedFile,
    folder: &str,
    what: &str,
) -> Result<String, AppError> {
    media
        .upload(file, folder)
        .await
        .map(|stored| stored.url)
        .map_err(|e| {
            log::error!("❌ Failed to upload {}: {}", what, e);
            AppError::Internal(format!("Failed to upload {}", what))
        })
}

async fn load_user(store: &dyn Store, claims: &Claims) -> Result<User, AppError> {
    store
        .find_user_by_id(&claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

fn parse_cgpa(raw: &str) -> Result<f64, AppError> {
    raw.parse::<f64>()
        .ok()
        .filter(|cgpa| (0.0..=10.0).contains(cgpa))
        .ok_or_else(|| AppError::BadRequest("cgpa must be a number between 0 and 10".to_string()))
}

fn parse_ctc(raw: &str) -> Result<f64, AppError> {
    raw.parse::<f64>()
        .ok()
        .filter(|ctc| ctc.is_finite() && *ctc >= 0.0)
        .ok_or_else(|| AppError::BadRequest("ctc must be a non-negative number".to_string()))
}

/// Normalises to `YYYY-MM-DD`.
fn parse_date(raw: &str) -> Result<String, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|_| AppError::BadRequest("date must be formatted as YYYY-MM-DD".to_string()))
}

async fn issue_tokens(
    store: &dyn Store,
    config: &Config,
    user: &User,
) -> Result<LoginResponse, AppError> {
    let access_token = auth_service::generate_access_token(config, user)?;
    let refresh_token = auth_service::generate_refresh_token(config, user)?;
    store.set_refresh_token(&user.id, Some(&refresh_token)).await?;

    Ok(LoginResponse {
        user: UserResponse::from(user),
        access_token,
        refresh_token,
    })
}

/// Loads every referenced placement in one query.
async fn placements_by_id(
    store: &dyn Store,
    users: &[User],
) -> Result<HashMap<ObjectId, Placement>, AppError> {
    let ids: Vec<ObjectId> = users.iter().flat_map(|u| u.placement_refs()).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(store
        .find_placements(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect())
}

async fn populate(store: &dyn Store, users: &[User]) -> Result<Vec<PopulatedUser>, AppError> {
    let placements = placements_by_id(store, users).await?;
    Ok(users
        .iter()
        .map(|user| {
            let embed = |slot: PlacementSlot| {
                user.placement_ref(slot)
                    .and_then(|id| placements.get(&id))
                    .map(PlacementResponse::from)
            };
            PopulatedUser {
                profile: ProfileView::from(user),
                placement_one: embed(PlacementSlot::One),
                placement_two: embed(PlacementSlot::Two),
                placement_three: embed(PlacementSlot::Three),
            }
        })
        .collect())
}

// ==================== REGISTRATION ====================

/// Issues a fresh OTP for an email that is not yet registered and mails it.
pub async fn request_otp(
    store: &dyn Store,
    mailer: &dyn SendEmail,
    config: &Config,
    email: &str,
) -> Result<(), AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::BadRequest("Email is required".to_string()));
    }

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("User with this email already exists".to_string()));
    }

    let code = generate_otp();
    store
        .upsert_otp(&Otp::new(&email, code.clone(), config.otp_ttl_seconds))
        .await?;

    mailer
        .send(otp_message(&config.app_name, &email, &code, config.otp_ttl_seconds))
        .await
        .map_err(|e| {
            log::error!("❌ Failed to send OTP mail to {}: {}", email, e);
            AppError::Internal("Failed to send verification email".to_string())
        })?;

    log::info!("📨 OTP issued for {}", email);
    Ok(())
}

pub async fn register(
    store: &dyn Store,
    media: &dyn MediaStore,
    config: &Config,
    mut form: FormData,
) -> Result<User, AppError> {
    let text = |name: &str| form.text(name).map(str::to_string);
    let (Some(username), Some(password), Some(full_name), Some(roll_number), Some(email)) = (
        text("username"),
        form.raw("password").map(str::to_string),
        text("fullName"),
        text("rollNumber"),
        text("email"),
    ) else {
        return Err(required_fields());
    };
    let code = text("usrOTP").unwrap_or_default();

    let id_card = form
        .take_file("idCard")
        .ok_or_else(|| AppError::BadRequest("ID card is required".to_string()))?;

    let username = username.to_lowercase();
    let email = email.to_lowercase();

    if code.is_empty() || !store.consume_otp(&email, &code).await? {
        log::warn!("⚠️  OTP validation failed for {}", email);
        return Err(AppError::BadRequest("wrong otp, validation failed".to_string()));
    }

    if store
        .find_user_by_username_or_email(&username, &email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "User with email or username already exists".to_string(),
        ));
    }

    let id_card_url = upload(media, id_card, ID_CARD_FOLDER, "ID card").await?;
    let password_hash = auth_service::hash_password(password, config.bcrypt_cost).await?;

    let user = User::new(NewUser {
        username,
        email,
        full_name,
        roll_number,
        password_hash,
        id_card: Some(id_card_url),
        roles: vec![ROLE_USER.to_string()],
        is_verified: false,
    });
    store.insert_user(&user).await?;

    log::info!("✅ Registered {} ({})", user.username, user.roll_number);
    Ok(user)
}

// ==================== SESSION ====================

pub async fn login(
    store: &dyn Store,
    config: &Config,
    request: &LoginRequest,
) -> Result<LoginResponse, AppError> {
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || request.password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".to_string()));
    }

    let user = store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

    if !auth_service::verify_password(request.password.clone(), user.password.clone()).await? {
        return Err(AppError::Unauthorized("Invalid user credentials".to_string()));
    }

    if !user.is_verified {
        return Err(AppError::Forbidden("You are not verified yet!".to_string()));
    }

    issue_tokens(store, config, &user).await
}

pub async fn logout(store: &dyn Store, claims: &Claims) -> Result<(), AppError> {
    store.set_refresh_token(&claims.user_id()?, None).await?;
    Ok(())
}

/// Rotates both tokens. The presented refresh token must be the one stored on the account.
pub async fn refresh(
    store: &dyn Store,
    config: &Config,
    token: Option<&str>,
) -> Result<LoginResponse, AppError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Unauthorized request".to_string()))?;

    let claims = auth_service::verify_token(config, token, TokenType::Refresh)?;
    let user = store
        .find_user_by_id(&claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    if user.refresh_token.as_deref() != Some(token) {
        return Err(AppError::Unauthorized(
            "Refresh token is expired or used".to_string(),
        ));
    }

    if !user.is_verified {
        return Err(AppError::Forbidden("You are not verified yet!".to_string()));
    }

    issue_tokens(store, config, &user).await
}

// ==================== PROFILE ====================

pub async fn current_user(store: &dyn Store, claims: &Claims) -> Result<User, AppError> {
    load_user(store, claims).await
}

pub async fn update_profile(
    store: &dyn Store,
    media: &dyn MediaStore,
    claims: &Claims,
    mut form: FormData,
) -> Result<User, AppError> {
    let cgpa = form.text("cgpa").map(parse_cgpa).transpose()?;
    let work_experiences = form
        .text("workExperiences")
        .map(|raw| {
            serde_json::from_str::<Vec<WorkExperience>>(raw).map_err(|_| {
                AppError::BadRequest(
                    "workExperiences must be a JSON array of {company, role, duration}"
                        .to_string(),
                )
            })
        })
        .transpose()?;

    let text = |name: &str| form.text(name).map(str::to_string);
    let mut update = ProfileUpdate {
        full_name: text("fullName"),
        roll_number: text("rollNumber"),
        email: text("email").map(|e| e.to_lowercase()),
        branch: text("branch"),
        section: text("section"),
        mobile_number: text("mobileNumber"),
        semester: text("semester"),
        cgpa,
        abc_id: text("abcId"),
        linkedin: text("linkedin"),
        graduation_year: text("graduationYear"),
        work_experiences,
        coding_profiles: CodingProfiles {
            github: text("github"),
            leetcode: text("leetcode"),
            codeforces: text("codeforces"),
            codechef: text("codechef"),
            atcoder: text("atcoder"),
        },
        image: None,
        resume: None,
    };

    let image = form.take_file("image");
    let resume = form.take_file("resume");

    if update.is_empty() && image.is_none() && resume.is_none() {
        return Err(AppError::BadRequest(
            "At least one field is required for update".to_string(),
        ));
    }

    if let Some(file) = image {
        update.image = Some(upload(media, file, PROFILE_FOLDER, "profile image").await?);
    }
    if let Some(file) = resume {
        update.resume = Some(upload(media, file, PROFILE_FOLDER, "resume").await?);
    }

    let user = store
        .update_profile(&claims.user_id()?, &update)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    log::info!("📝 Profile updated for {}", user.username);
    Ok(user)
}

// ==================== PLACEMENTS ====================

/// Records a placement in `slot`, replacing and deleting whatever the slot held.
pub async fn set_placement(
    store: &dyn Store,
    media: &dyn MediaStore,
    claims: &Claims,
    slot: PlacementSlot,
    mut form: FormData,
) -> Result<User, AppError> {
    let text = |name: &str| form.text(name).map(str::to_string);
    let (Some(company), Some(role), Some(ctc), Some(date)) =
        (text("company"), text("role"), text("ctc"), text("date"))
    else {
        return Err(required_fields());
    };
    let ctc = parse_ctc(&ctc)?;
    let date = parse_date(&date)?;

    let doc = form
        .take_file("doc")
        .ok_or_else(|| AppError::BadRequest("Placement document is required".to_string()))?;

    let owner = load_user(store, claims).await?;
    let doc_url = upload(media, doc, PLACEMENT_FOLDER, "placement document").await?;

    let placement = Placement {
        id: ObjectId::new(),
        student: owner.id,
        company,
        role,
        ctc,
        date,
        doc: doc_url,
        created_at: Some(DateTime::now()),
    };
    store.insert_placement(&placement).await?;

    let (updated, replaced) = match store.set_placement(&owner.id, slot, &placement.id).await? {
        Some(swap) => swap,
        None => {
            store.delete_placement(&placement.id).await?;
            return Err(AppError::NotFound("User not found".to_string()));
        }
    };

    if let Some(previous) = replaced {
        if let Err(e) = store.delete_placement(&previous).await {
            log::warn!("⚠️  Replaced placement {} was not deleted: {}", previous, e);
        }
    }

    log::info!(
        "💼 {} set for {}: {} ({})",
        slot.field(),
        updated.username,
        placement.company,
        placement.ctc
    );
    Ok(updated)
}

/// `None` when the slot was never filled or its placement is gone.
pub async fn get_placement(
    store: &dyn Store,
    claims: &Claims,
    slot: PlacementSlot,
) -> Result<Option<Placement>, AppError> {
    let user = load_user(store, claims).await?;
    match user.placement_ref(slot) {
        Some(id) => Ok(store.find_placements(&[id]).await?.into_iter().next()),
        None => Ok(None),
    }
}

// ==================== LOOKUP & ADMIN ====================

pub async fn user_by_roll(
    store: &dyn Store,
    roll_number: &str,
) -> Result<Option<PopulatedUser>, AppError> {
    let roll_number = roll_number.trim();
    if roll_number.is_empty() {
        return Err(AppError::BadRequest("Roll number is required".to_string()));
    }

    match store.find_user_by_roll(roll_number).await? {
        Some(user) => Ok(populate(store, &[user]).await?.into_iter().next()),
        None => Ok(None),
    }
}

/// One row per student account; administrators are left out.
pub async fn placement_details(store: &dyn Store) -> Result<Vec<PlacementDetailsRow>, AppError> {
    let students: Vec<User> = store
        .list_users()
        .await?
        .into_iter()
        .filter(|u| !u.is_admin())
        .collect();
    let placements = placements_by_id(store, &students).await?;

    Ok(students
        .iter()
        .map(|user| {
            let summary = |slot: PlacementSlot| {
                user.placement_ref(slot)
                    .and_then(|id| placements.get(&id))
                    .map(PlacementSummary::from)
            };
            PlacementDetailsRow {
                full_name: user.full_name.clone(),
                roll_number: user.roll_number.clone(),
                branch: user.branch.clone(),
                placement_one: summary(PlacementSlot::One),
                placement_two: summary(PlacementSlot::Two),
                placement_three: summary(PlacementSlot::Three),
            }
        })
        .collect())
}

pub async fn all_users(store: &dyn Store) -> Result<Vec<PopulatedUser>, AppError> {
    let users = store.list_users().await?;
    populate(store, &users).await
}

pub async fn set_verified(
    store: &dyn Store,
    request: &VerifyUserRequest,
) -> Result<User, AppError> {
    let roll_number = request.roll_number.trim();
    if roll_number.is_empty() {
        return Err(AppError::BadRequest("Roll number is required".to_string()));
    }

    let user = store
        .set_verified(roll_number, request.verified)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    log::info!(
        "🛂 {} marked {}",
        user.roll_number,
        if user.is_verified { "verified" } else { "unverified" }
    );
    Ok(user)
}
