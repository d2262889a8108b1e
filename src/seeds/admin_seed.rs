use crate::config::Config;
use crate::database::Store;
use crate::models::{NewUser, User, ROLE_ADMIN, ROLE_USER};
use crate::services::auth_service::hash_password;

pub const ADMIN_ROLL_NUMBER: &str = "ADMIN";

/// Creates the administrator account from `ADMIN_EMAIL`/`ADMIN_PASSWORD` if it does not
/// exist yet. Never touches an existing account.
pub async fn seed_admin(store: &dyn Store, config: &Config) {
    let Some(seed) = &config.admin_seed else {
        log::info!("👤 Admin seed: ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping");
        return;
    };

    match store.find_user_by_username_or_email(&seed.username, &seed.email).await {
        Ok(Some(existing)) => {
            if existing.is_admin() {
                log::info!("👤 Admin seed: {} already present, skipping", existing.email);
            } else {
                log::warn!(
                    "⚠️  Admin seed: {} exists without the admin role, leaving it unchanged",
                    existing.email
                );
            }
            return;
        }
        Ok(None) => {}
        Err(e) => {
            log::error!("   ❌ Admin seed lookup failed: {}", e);
            return;
        }
    }

    let password_hash = match hash_password(seed.password.clone(), config.bcrypt_cost).await {
        Ok(hash) => hash,
        Err(e) => {
            log::error!("   ❌ Admin seed: {}", e);
            return;
        }
    };

    let admin = User::new(NewUser {
        username: seed.username.clone(),
        email: seed.email.clone(),
        full_name: "Administrator".to_string(),
        roll_number: ADMIN_ROLL_NUMBER.to_string(),
        password_hash,
        id_card: None,
        roles: vec![ROLE_USER.to_string(), ROLE_ADMIN.to_string()],
        is_verified: true,
    });

    match store.insert_user(&admin).await {
        Ok(()) => log::info!("   ✅ Admin account {} created", admin.email),
        Err(e) => log::error!("   ❌ Failed to seed admin account: {}", e),
    }
}
