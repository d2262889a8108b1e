use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Student Portal API",
        version = "1.0.0",
        description = "Student information service.\n\n**Authentication:** protected endpoints accept the `accessToken` cookie set by login or a JWT Bearer token.\n\n**Features:**\n- OTP-gated registration with ID card upload\n- Profile and coding profile management\n- Up to three placement records per student\n- Administrator placement report and account verification"
    ),
    paths(
        // Registration & session
        crate::api::users::verify_mail,
        crate::api::users::register,
        crate::api::users::login,
        crate::api::users::logout,
        crate::api::users::refresh_token,

        // Profile
        crate::api::users::get_user,
        crate::api::users::update,
        crate::api::users::get_by_roll,

        // Placements
        crate::api::users::pone,
        crate::api::users::ptwo,
        crate::api::users::pthree,
        crate::api::users::placement_one,
        crate::api::users::placement_two,
        crate::api::users::placement_three,

        // Admin
        crate::api::users::placement_details,
        crate::api::users::all_users,
        crate::api::users::verify_user,

        // Health
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::services::user_service::VerifyMailRequest,
            crate::services::user_service::LoginRequest,
            crate::services::user_service::LoginResponse,
            crate::services::user_service::RefreshTokenRequest,
            crate::services::user_service::RollNumberRequest,
            crate::services::user_service::VerifyUserRequest,

            crate::models::UserResponse,
            crate::models::ProfileView,
            crate::models::PopulatedUser,
            crate::models::CodingProfiles,
            crate::models::WorkExperience,
            crate::models::PlacementResponse,
            crate::models::PlacementSummary,
            crate::models::PlacementDetailsRow,

            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Users", description = "Registration, login and profile endpoints."),
        (name = "Placements", description = "Record and read a student's three placement slots."),
        (name = "Admin", description = "Administrator-only reporting and account verification."),
        (name = "Health", description = "Service and database health."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token from /api/v1/users/login"))
                        .build()
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/users/register"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/users/placementDetails"));
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
        assert!(doc.components.unwrap().security_schemes.contains_key("bearer_auth"));
    }
}
