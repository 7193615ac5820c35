use bcrypt::{hash, verify};

use crate::error::{CmsError, CmsResult};
use crate::helper::form_helpers::{
    non_blank, normalize_email, require_confirmation, require_email, require_max_length, require_person_name,
    require_strong_password, require_url, require_username,
};
use crate::helper::sanitization_helpers::{strip_all_html, strip_optional};
use crate::helper::settings_helpers;
use crate::models::db_operations::users_db_operations::{self, UserRecord};
use crate::models::forms::{PasswordChange, ProfileUpdate, Registration};
use crate::models::{Capability, Identity, Role, User, UserStatus};
use crate::DbPool;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

pub fn hash_password(password: &str) -> CmsResult<String> {
    Ok(hash(password, HASH_COST)?)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    verify(password, password_hash).unwrap_or(false)
}

pub fn require_capability(identity: &Identity, capability: Capability) -> CmsResult<()> {
    if identity.has_capability(capability) {
        Ok(())
    } else {
        log::warn!("{} ({}) lacks {:?}", identity.email, identity.role, capability);
        Err(CmsError::Unauthorized("You do not have permission to perform this action".to_string()))
    }
}

/// Unknown email, inactive account and wrong password all produce the same
/// `InvalidCredentials`.
pub fn authenticate(pool: &DbPool, email: &str, password: &str) -> CmsResult<User> {
    let email = normalize_email(email);
    let conn = pool.get()?;
    let user = match users_db_operations::find_user_by_email(&conn, &email)? {
        Some(user) if user.status == UserStatus::Active && verify_password(password, &user.password_hash) => user,
        Some(user) => {
            log::warn!("Failed login for user {} (status {})", user.id, user.status);
            return Err(CmsError::InvalidCredentials);
        }
        None => {
            log::warn!("Failed login for unknown email");
            return Err(CmsError::InvalidCredentials);
        }
    };
    users_db_operations::record_login(&conn, user.id)?;
    log::info!("User {} logged in", user.id);
    users_db_operations::find_user_by_id(&conn, user.id)?.ok_or(CmsError::InvalidCredentials)
}

/// The stored account behind a session, if it still exists and is active.
pub fn active_user(pool: &DbPool, user_id: i64) -> CmsResult<Option<User>> {
    let conn = pool.get()?;
    Ok(users_db_operations::find_user_by_id(&conn, user_id)?.filter(|u| u.status == UserStatus::Active))
}

pub fn register(pool: &DbPool, form: &Registration) -> CmsResult<User> {
    if !settings_helpers::flag(pool, "enable_registration", false)? {
        return Err(CmsError::Unauthorized("Registration is currently disabled".to_string()));
    }
    require_username(&form.username)?;
    require_email(&form.email)?;
    require_person_name("First name", &form.first_name)?;
    require_person_name("Last name", &form.last_name)?;
    require_strong_password(&form.password)?;
    require_confirmation(&form.password, &form.confirm_password)?;

    let username = form.username.trim();
    let email = normalize_email(&form.email);
    let conn = pool.get()?;
    if users_db_operations::email_taken(&conn, &email, None)? {
        return Err(CmsError::Conflict("Email is already registered".to_string()));
    }
    if users_db_operations::username_taken(&conn, username, None)? {
        return Err(CmsError::Conflict("Username is already taken".to_string()));
    }

    let record = UserRecord {
        username,
        email: &email,
        first_name: form.first_name.trim(),
        last_name: form.last_name.trim(),
        role: Role::User,
        status: UserStatus::Active,
    };
    let user_id = users_db_operations::insert_user(&conn, &record, &hash_password(&form.password)?)?;
    log::info!("New user {} registered", user_id);
    users_db_operations::find_user_by_id(&conn, user_id)?.ok_or_else(|| CmsError::NotFound("User".to_string()))
}

pub fn update_profile(pool: &DbPool, identity: &Identity, form: &ProfileUpdate) -> CmsResult<User> {
    require_person_name("First name", &form.first_name)?;
    require_person_name("Last name", &form.last_name)?;
    let bio = strip_optional(form.bio.as_deref());
    if let Some(bio) = bio.as_deref() {
        require_max_length("Bio", bio, 500)?;
    }
    let website = non_blank(form.website.as_deref());
    if let Some(url) = website {
        require_url("Website", url)?;
    }

    let conn = pool.get()?;
    let updated = users_db_operations::update_profile(
        &conn,
        identity.user_id,
        &strip_all_html(&form.first_name),
        &strip_all_html(&form.last_name),
        bio.as_deref(),
        website,
    )?;
    if updated == 0 {
        return Err(CmsError::NotFound("User".to_string()));
    }
    users_db_operations::find_user_by_id(&conn, identity.user_id)?.ok_or_else(|| CmsError::NotFound("User".to_string()))
}

pub fn change_password(pool: &DbPool, identity: &Identity, form: &PasswordChange) -> CmsResult<()> {
    let conn = pool.get()?;
    let user = users_db_operations::find_user_by_id(&conn, identity.user_id)?
        .ok_or_else(|| CmsError::NotFound("User".to_string()))?;
    if !verify_password(&form.current_password, &user.password_hash) {
        return Err(CmsError::Validation("Current password is incorrect".to_string()));
    }
    require_strong_password(&form.new_password)?;
    require_confirmation(&form.new_password, &form.confirm_new_password)?;
    users_db_operations::update_password_hash(&conn, user.id, &hash_password(&form.new_password)?)?;
    log::info!("User {} changed their password", user.id);
    Ok(())
}
