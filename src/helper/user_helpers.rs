use chrono::{Datelike, TimeZone, Utc};
use rusqlite::Connection;

use crate::error::{CmsError, CmsResult};
use crate::helper::auth_helpers::{hash_password, require_capability};
use crate::helper::form_helpers::{normalize_email, require_basic_password, require_email, require_length, require_username};
use crate::helper::listing_helpers::{PageRequest, Paginated};
use crate::models::db_operations::users_db_operations::{self, UserRecord};
use crate::models::db_operations::to_db_time;
use crate::models::filters::UserFilter;
use crate::models::forms::{BulkUserAction, BulkUserRequest, NewUser, UserUpdate};
use crate::models::{Capability, Identity, Role, User, UserStatistics, UserStatus};
use crate::DbPool;

fn load(conn: &Connection, user_id: i64) -> CmsResult<User> {
    users_db_operations::find_user_by_id(conn, user_id)?.ok_or_else(|| CmsError::NotFound("User".to_string()))
}

/// Destructive actions never target the caller or a protected account.
fn guard_target(actor: &Identity, target: &User, action: &str) -> CmsResult<()> {
    if target.id == actor.user_id {
        log::warn!("{} tried to {} their own account", actor.email, action);
        return Err(CmsError::Unauthorized(format!("You cannot {} your own account", action)));
    }
    if target.role.is_protected() {
        log::warn!("{} tried to {} protected user {}", actor.email, action, target.id);
        return Err(CmsError::Unauthorized(format!("Cannot {} a super admin account", action)));
    }
    Ok(())
}

fn require_role_grant(actor: &Identity, role: Role) -> CmsResult<()> {
    if role == Role::SuperAdmin {
        require_capability(actor, Capability::AssignSuperAdmin)?;
    }
    Ok(())
}

fn validate_account(username: &str, email: &str, first_name: &str, last_name: &str) -> CmsResult<()> {
    require_username(username)?;
    require_email(email)?;
    require_length("First name", first_name, 1, 50)?;
    require_length("Last name", last_name, 1, 50)?;
    Ok(())
}

fn ensure_unique(conn: &Connection, username: &str, email: &str, exclude_id: Option<i64>) -> CmsResult<()> {
    if users_db_operations::username_taken(conn, username, exclude_id)? {
        return Err(CmsError::Conflict("Username is already taken".to_string()));
    }
    if users_db_operations::email_taken(conn, email, exclude_id)? {
        return Err(CmsError::Conflict("Email is already registered".to_string()));
    }
    Ok(())
}

pub fn list_users(pool: &DbPool, filter: &UserFilter, page: &PageRequest) -> CmsResult<Paginated<User>> {
    let conn = pool.get()?;
    let total = users_db_operations::count_users(&conn, filter)?;
    let items = users_db_operations::list_users(&conn, filter, page.limit(), page.offset())?;
    Ok(Paginated::new(items, page, total))
}

pub fn get_user(pool: &DbPool, user_id: i64) -> CmsResult<User> {
    let conn = pool.get()?;
    load(&conn, user_id)
}

pub fn create_user(pool: &DbPool, actor: &Identity, form: &NewUser) -> CmsResult<User> {
    require_capability(actor, Capability::ManageUsers)?;
    validate_account(&form.username, &form.email, &form.first_name, &form.last_name)?;
    require_basic_password(&form.password)?;
    let role = form.role.unwrap_or(Role::User);
    require_role_grant(actor, role)?;

    let username = form.username.trim();
    let email = normalize_email(&form.email);
    let conn = pool.get()?;
    ensure_unique(&conn, username, &email, None)?;
    let record = UserRecord {
        username,
        email: &email,
        first_name: form.first_name.trim(),
        last_name: form.last_name.trim(),
        role,
        status: form.status.unwrap_or(UserStatus::Active),
    };
    let user_id = users_db_operations::insert_user(&conn, &record, &hash_password(&form.password)?)?;
    log::info!("{} created user {} with role {}", actor.email, user_id, role);
    load(&conn, user_id)
}

pub fn update_user(pool: &DbPool, actor: &Identity, user_id: i64, form: &UserUpdate) -> CmsResult<User> {
    require_capability(actor, Capability::ManageUsers)?;
    validate_account(&form.username, &form.email, &form.first_name, &form.last_name)?;
    if let Some(password) = form.password.as_deref().filter(|p| !p.is_empty()) {
        require_basic_password(password)?;
    }

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let existing = load(&tx, user_id)?;
    let role = form.role.unwrap_or(existing.role);
    let status = form.status.unwrap_or(existing.status);
    if existing.role.is_protected() && !actor.has_capability(Capability::AssignSuperAdmin) {
        return Err(CmsError::Unauthorized("Cannot modify a super admin account".to_string()));
    }
    if role != existing.role {
        if existing.id == actor.user_id {
            return Err(CmsError::Unauthorized("You cannot change your own role".to_string()));
        }
        require_role_grant(actor, role)?;
    }
    if status != existing.status && existing.id == actor.user_id {
        return Err(CmsError::Unauthorized("You cannot change your own status".to_string()));
    }

    let username = form.username.trim();
    let email = normalize_email(&form.email);
    ensure_unique(&tx, username, &email, Some(user_id))?;
    let record = UserRecord {
        username,
        email: &email,
        first_name: form.first_name.trim(),
        last_name: form.last_name.trim(),
        role,
        status,
    };
    users_db_operations::update_account(&tx, user_id, &record)?;
    if let Some(password) = form.password.as_deref().filter(|p| !p.is_empty()) {
        users_db_operations::update_password_hash(&tx, user_id, &hash_password(password)?)?;
    }
    let updated = load(&tx, user_id)?;
    tx.commit()?;
    log::info!("{} updated user {}", actor.email, user_id);
    Ok(updated)
}

/// Refused while the user still authors posts.
pub fn delete_user(pool: &DbPool, actor: &Identity, user_id: i64) -> CmsResult<()> {
    require_capability(actor, Capability::ManageUsers)?;
    let conn = pool.get()?;
    let target = load(&conn, user_id)?;
    guard_target(actor, &target, "delete")?;
    let authored = users_db_operations::count_authored_posts(&conn, user_id)?;
    if authored > 0 {
        return Err(CmsError::Conflict(format!("user has {} posts", authored)));
    }
    users_db_operations::delete_user(&conn, user_id)?;
    log::info!("{} deleted user {}", actor.email, user_id);
    Ok(())
}

pub fn toggle_user_status(pool: &DbPool, actor: &Identity, user_id: i64) -> CmsResult<User> {
    require_capability(actor, Capability::ManageUsers)?;
    let conn = pool.get()?;
    let target = load(&conn, user_id)?;
    guard_target(actor, &target, "change the status of")?;
    let next = match target.status {
        UserStatus::Active => UserStatus::Inactive,
        UserStatus::Inactive => UserStatus::Active,
    };
    users_db_operations::set_status(&conn, user_id, next)?;
    log::info!("{} set user {} to {}", actor.email, user_id, next);
    load(&conn, user_id)
}

pub fn reset_user_password(pool: &DbPool, actor: &Identity, user_id: i64, new_password: &str) -> CmsResult<()> {
    require_capability(actor, Capability::ManageUsers)?;
    require_basic_password(new_password)?;
    let conn = pool.get()?;
    let target = load(&conn, user_id)?;
    if target.role.is_protected() && !actor.has_capability(Capability::AssignSuperAdmin) {
        return Err(CmsError::Unauthorized("Cannot reset a super admin password".to_string()));
    }
    users_db_operations::update_password_hash(&conn, user_id, &hash_password(new_password)?)?;
    log::info!("{} reset the password of user {}", actor.email, user_id);
    Ok(())
}

/// Applies `request.action` to every eligible id and returns how many
/// accounts actually changed. The caller, super admins, unknown ids and
/// (for delete) post authors are skipped.
pub fn bulk_user_action(pool: &DbPool, actor: &Identity, request: &BulkUserRequest) -> CmsResult<usize> {
    require_capability(actor, Capability::ManageUsers)?;
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let targets = users_db_operations::bulk_target_ids(&tx, &request.user_ids, actor.user_id)?;
    let affected = match request.action {
        BulkUserAction::Activate => users_db_operations::set_status_many(&tx, &targets, UserStatus::Active)?,
        BulkUserAction::Deactivate => users_db_operations::set_status_many(&tx, &targets, UserStatus::Inactive)?,
        BulkUserAction::Promote => users_db_operations::set_role_many(&tx, &targets, Role::Admin)?,
        BulkUserAction::Demote => users_db_operations::set_role_many(&tx, &targets, Role::User)?,
        BulkUserAction::Delete => {
            let mut deleted = 0;
            for id in targets {
                if users_db_operations::count_authored_posts(&tx, id)? > 0 {
                    log::warn!("Skipped deleting user {} who still authors posts", id);
                    continue;
                }
                deleted += users_db_operations::delete_user(&tx, id)?;
            }
            deleted
        }
    };
    tx.commit()?;
    log::info!(
        "{} applied {:?} to {} of {} user(s)",
        actor.email,
        request.action,
        affected,
        request.user_ids.len()
    );
    Ok(affected)
}

pub fn user_statistics(pool: &DbPool) -> CmsResult<UserStatistics> {
    let now = Utc::now();
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let conn = pool.get()?;
    Ok(users_db_operations::user_statistics(&conn, &to_db_time(&month_start))?)
}
