use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult, Row};

use super::now_db_time;
use crate::models::{Setting, SettingCategory, SettingType};

const SETTING_COLUMNS: &str = "setting_key, setting_value, setting_type, category, description, is_public";

fn row_to_setting(row: &Row<'_>) -> RusqliteResult<Setting> {
    Ok(Setting {
        setting_key: row.get(0)?,
        setting_value: row.get(1)?,
        setting_type: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        is_public: row.get(5)?,
    })
}

/// Inserts `setting` unless the key already exists. Returns whether a row
/// was written.
pub fn insert_if_absent(conn: &Connection, setting: &Setting) -> RusqliteResult<bool> {
    let now = now_db_time();
    let written = conn.execute(
        "INSERT OR IGNORE INTO settings (setting_key, setting_value, setting_type, category, description, is_public,
                                        created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            setting.setting_key,
            setting.setting_value,
            setting.setting_type,
            setting.category,
            setting.description,
            setting.is_public,
            now
        ],
    )?;
    Ok(written > 0)
}

pub fn find_setting(conn: &Connection, key: &str) -> RusqliteResult<Option<Setting>> {
    conn.query_row(
        &format!("SELECT {} FROM settings WHERE setting_key = ?1", SETTING_COLUMNS),
        [key],
        row_to_setting,
    )
    .optional()
}

/// Creates or rewrites a key. A new key lands in `category`; an existing key
/// keeps its category and public flag, and keeps its description unless one
/// is given.
pub fn upsert_setting(
    conn: &Connection,
    key: &str,
    value: &str,
    setting_type: SettingType,
    category: SettingCategory,
    description: Option<&str>,
) -> RusqliteResult<()> {
    conn.execute(
        "INSERT INTO settings (setting_key, setting_value, setting_type, category, description, is_public,
                               created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, COALESCE(?5, ''), 0, ?6, ?6)
         ON CONFLICT(setting_key) DO UPDATE SET
             setting_value = excluded.setting_value,
             setting_type = excluded.setting_type,
             description = COALESCE(?5, settings.description),
             updated_at = excluded.updated_at",
        params![key, value, setting_type, category, description, now_db_time()],
    )?;
    Ok(())
}

fn query_settings(conn: &Connection, clause: &str, args: &[&dyn rusqlite::ToSql]) -> RusqliteResult<Vec<Setting>> {
    let sql = format!(
        "SELECT {} FROM settings{} ORDER BY category ASC, setting_key ASC",
        SETTING_COLUMNS, clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(args, row_to_setting)?;
    rows.collect()
}

pub fn list_settings(conn: &Connection) -> RusqliteResult<Vec<Setting>> {
    query_settings(conn, "", &[])
}

pub fn list_settings_by_category(conn: &Connection, category: SettingCategory) -> RusqliteResult<Vec<Setting>> {
    query_settings(conn, " WHERE category = ?1", &[&category])
}

pub fn list_public_settings(conn: &Connection) -> RusqliteResult<Vec<Setting>> {
    query_settings(conn, " WHERE is_public = 1", &[])
}

pub fn delete_setting(conn: &Connection, key: &str) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM settings WHERE setting_key = ?1", [key])
}
