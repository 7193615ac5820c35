use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult, Row};

use super::{count_where, now_db_time, optional_time_at, time_at, SqlFilter};
use crate::models::filters::UserFilter;
use crate::models::{Role, User, UserStatus, UserStatistics};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, role, status, \
     bio, website, avatar, last_login_at, login_count, created_at, updated_at";

/// Column values for inserting or rewriting an account.
pub struct UserRecord<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
    pub status: UserStatus,
}

fn row_to_user(row: &Row<'_>) -> RusqliteResult<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        role: row.get(6)?,
        status: row.get(7)?,
        bio: row.get(8)?,
        website: row.get(9)?,
        avatar: row.get(10)?,
        last_login_at: optional_time_at(row, 11)?,
        login_count: row.get(12)?,
        created_at: time_at(row, 13)?,
        updated_at: time_at(row, 14)?,
    })
}

fn user_filter(filter: &UserFilter) -> SqlFilter {
    let mut sql = SqlFilter::new();
    sql.eq_opt("role", filter.role)
        .eq_opt("status", filter.status)
        .search(
            &["username", "email", "first_name", "last_name"],
            filter.search.as_deref(),
        );
    sql
}

pub fn insert_user(conn: &Connection, user: &UserRecord<'_>, password_hash: &str) -> RusqliteResult<i64> {
    let now = now_db_time();
    conn.execute(
        "INSERT INTO users (username, email, password_hash, first_name, last_name, role, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            user.username,
            user.email,
            password_hash,
            user.first_name,
            user.last_name,
            user.role,
            user.status,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_user_by_id(conn: &Connection, user_id: i64) -> RusqliteResult<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [user_id],
        row_to_user,
    )
    .optional()
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> RusqliteResult<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
        [email],
        row_to_user,
    )
    .optional()
}

/// True when another account (not `exclude_id`) already uses `column = value`.
fn value_taken(conn: &Connection, column: &str, value: &str, exclude_id: Option<i64>) -> RusqliteResult<bool> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM users WHERE {} = ?1 AND id != ?2", column),
        params![value, exclude_id.unwrap_or(-1)],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn username_taken(conn: &Connection, username: &str, exclude_id: Option<i64>) -> RusqliteResult<bool> {
    value_taken(conn, "username", username, exclude_id)
}

pub fn email_taken(conn: &Connection, email: &str, exclude_id: Option<i64>) -> RusqliteResult<bool> {
    value_taken(conn, "email", email, exclude_id)
}

pub fn update_account(conn: &Connection, user_id: i64, user: &UserRecord<'_>) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE users SET username = ?1, email = ?2, first_name = ?3, last_name = ?4, role = ?5, status = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            user.username,
            user.email,
            user.first_name,
            user.last_name,
            user.role,
            user.status,
            now_db_time(),
            user_id
        ],
    )
}

pub fn update_profile(
    conn: &Connection,
    user_id: i64,
    first_name: &str,
    last_name: &str,
    bio: Option<&str>,
    website: Option<&str>,
) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, bio = ?3, website = ?4, updated_at = ?5 WHERE id = ?6",
        params![first_name, last_name, bio, website, now_db_time(), user_id],
    )
}

pub fn update_password_hash(conn: &Connection, user_id: i64, password_hash: &str) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
        params![password_hash, now_db_time(), user_id],
    )
}

pub fn set_status(conn: &Connection, user_id: i64, status: UserStatus) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE users SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status, now_db_time(), user_id],
    )
}

pub fn record_login(conn: &Connection, user_id: i64) -> RusqliteResult<()> {
    conn.execute(
        "UPDATE users SET last_login_at = ?1, login_count = login_count + 1 WHERE id = ?2",
        params![now_db_time(), user_id],
    )?;
    Ok(())
}

pub fn delete_user(conn: &Connection, user_id: i64) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM users WHERE id = ?1", [user_id])
}

pub fn count_authored_posts(conn: &Connection, user_id: i64) -> RusqliteResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM posts WHERE author_id = ?1", [user_id], |row| row.get(0))
}

pub fn count_users(conn: &Connection, filter: &UserFilter) -> RusqliteResult<i64> {
    count_where(conn, "users", &user_filter(filter))
}

pub fn list_users(conn: &Connection, filter: &UserFilter, limit: i64, offset: i64) -> RusqliteResult<Vec<User>> {
    let sql_filter = user_filter(filter);
    let sql = format!(
        "SELECT {} FROM users{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        USER_COLUMNS,
        sql_filter.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(sql_filter.params_with_page(&limit, &offset).as_slice(), row_to_user)?;
    rows.collect()
}

/// Ids among `ids` that a bulk action may touch: never `caller_id`, never a
/// protected role.
pub fn bulk_target_ids(conn: &Connection, ids: &[i64], caller_id: i64) -> RusqliteResult<Vec<i64>> {
    let mut filter = SqlFilter::new();
    filter
        .in_list("id", ids)
        .ne("id", caller_id)
        .ne("role", Role::SuperAdmin);
    let sql = format!("SELECT id FROM users{} ORDER BY id", filter.where_clause());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(filter.params().as_slice(), |row| row.get(0))?;
    rows.collect()
}

/// Only rows whose status actually changes are counted.
pub fn set_status_many(conn: &Connection, ids: &[i64], status: UserStatus) -> RusqliteResult<usize> {
    let mut filter = SqlFilter::new();
    filter.in_list("id", ids).ne("status", status);
    let sql = format!("UPDATE users SET status = ?, updated_at = ?{}", filter.where_clause());
    let now = now_db_time();
    let mut values: Vec<&dyn rusqlite::ToSql> = vec![&status, &now];
    values.extend(filter.params());
    conn.execute(&sql, values.as_slice())
}

/// Only rows whose role actually changes are counted.
pub fn set_role_many(conn: &Connection, ids: &[i64], role: Role) -> RusqliteResult<usize> {
    let mut filter = SqlFilter::new();
    filter.in_list("id", ids).ne("role", role);
    let sql = format!("UPDATE users SET role = ?, updated_at = ?{}", filter.where_clause());
    let now = now_db_time();
    let mut values: Vec<&dyn rusqlite::ToSql> = vec![&role, &now];
    values.extend(filter.params());
    conn.execute(&sql, values.as_slice())
}

pub fn user_statistics(conn: &Connection, month_start: &str) -> RusqliteResult<UserStatistics> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(status = 'ACTIVE'), 0),
                COALESCE(SUM(role IN ('ADMIN', 'SUPER_ADMIN')), 0),
                COALESCE(SUM(created_at >= ?1), 0)
         FROM users",
        [month_start],
        |row| {
            Ok(UserStatistics {
                total: row.get(0)?,
                active: row.get(1)?,
                admin: row.get(2)?,
                new_this_month: row.get(3)?,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup::memory_pool;

    fn record<'a>(username: &'a str, email: &'a str, role: Role) -> UserRecord<'a> {
        UserRecord {
            username,
            email,
            first_name: "Test",
            last_name: "User",
            role,
            status: UserStatus::Active,
        }
    }

    #[test]
    fn uniqueness_checks_exclude_self() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let id = insert_user(&conn, &record("alice", "alice@example.com", Role::User), "x").unwrap();
        assert!(username_taken(&conn, "alice", None).unwrap());
        assert!(!username_taken(&conn, "alice", Some(id)).unwrap());
        assert!(email_taken(&conn, "alice@example.com", None).unwrap());
    }

    #[test]
    fn bulk_targets_skip_caller_and_super_admins() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let caller = insert_user(&conn, &record("admin", "a@example.com", Role::Admin), "x").unwrap();
        let root = insert_user(&conn, &record("root", "r@example.com", Role::SuperAdmin), "x").unwrap();
        let bob = insert_user(&conn, &record("bob", "b@example.com", Role::User), "x").unwrap();
        let targets = bulk_target_ids(&conn, &[caller, root, bob, 999], caller).unwrap();
        assert_eq!(targets, vec![bob]);
    }

    #[test]
    fn login_bumps_counter() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let id = insert_user(&conn, &record("carol", "c@example.com", Role::User), "x").unwrap();
        record_login(&conn, id).unwrap();
        record_login(&conn, id).unwrap();
        let user = find_user_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.login_count, 2);
        assert!(user.last_login_at.is_some());
    }

    #[test]
    fn search_is_case_insensitive_over_names() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        insert_user(&conn, &record("dave", "dave@example.com", Role::Editor), "x").unwrap();
        insert_user(&conn, &record("erin", "erin@example.com", Role::User), "x").unwrap();
        let filter = UserFilter {
            search: Some("DAV".into()),
            ..Default::default()
        };
        assert_eq!(count_users(&conn, &filter).unwrap(), 1);
        let editors = UserFilter {
            role: Some(Role::Editor),
            ..Default::default()
        };
        assert_eq!(list_users(&conn, &editors, 10, 0).unwrap()[0].username, "dave");
    }
}
