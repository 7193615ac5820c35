use std::collections::BTreeMap;

use crate::error::{CmsError, CmsResult};
use crate::helper::auth_helpers::require_capability;
use crate::helper::form_helpers::is_valid_email;
use crate::models::db_operations::settings_db_operations;
use crate::models::forms::SettingUpdate;
use crate::models::{Capability, Identity, Setting, SettingCategory, SettingType};
use crate::DbPool;

/// key, default value, type, category, public, description
type CatalogEntry = (&'static str, &'static str, SettingType, SettingCategory, bool, &'static str);

const DEFAULT_CATALOG: &[CatalogEntry] = &[
    ("site_name", "My Website", SettingType::String, SettingCategory::General, true, "Site name"),
    ("site_description", "A great website", SettingType::Text, SettingCategory::General, true, "Site description used for SEO"),
    ("site_keywords", "blog, news, articles", SettingType::String, SettingCategory::General, true, "Site keywords used for SEO"),
    ("admin_email", "admin@example.com", SettingType::Email, SettingCategory::General, false, "Administrator email address"),
    ("timezone", "Asia/Ho_Chi_Minh", SettingType::String, SettingCategory::General, true, "Site timezone"),
    ("date_format", "DD/MM/YYYY", SettingType::String, SettingCategory::General, true, "Date display format"),
    ("posts_per_page", "10", SettingType::Number, SettingCategory::Content, true, "Posts shown per page"),
    ("enable_comments", "true", SettingType::Boolean, SettingCategory::Content, true, "Allow comments on posts"),
    ("comment_moderation", "true", SettingType::Boolean, SettingCategory::Content, false, "Hold new comments for review"),
    ("enable_registration", "false", SettingType::Boolean, SettingCategory::Users, true, "Allow new user sign-ups"),
    ("maintenance_mode", "false", SettingType::Boolean, SettingCategory::System, false, "Maintenance mode"),
    ("google_analytics_id", "", SettingType::String, SettingCategory::Analytics, true, "Google Analytics tracking id"),
];

const DEFAULT_POSTS_PER_PAGE: i64 = 10;

pub fn default_settings() -> Vec<Setting> {
    DEFAULT_CATALOG
        .iter()
        .map(|(key, value, setting_type, category, is_public, description)| Setting {
            setting_key: key.to_string(),
            setting_value: value.to_string(),
            setting_type: *setting_type,
            category: *category,
            description: description.to_string(),
            is_public: *is_public,
        })
        .collect()
}

/// Static key list for a category.
pub fn category_keys(category: SettingCategory) -> Vec<&'static str> {
    DEFAULT_CATALOG
        .iter()
        .filter(|d| d.3 == category)
        .map(|d| d.0)
        .collect()
}

fn catalog_category(key: &str) -> SettingCategory {
    DEFAULT_CATALOG
        .iter()
        .find(|d| d.0 == key)
        .map(|d| d.3)
        .unwrap_or(SettingCategory::General)
}

/// Seeds every missing catalog key. Existing values are never touched.
pub fn initialize_defaults(pool: &DbPool) -> CmsResult<usize> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let mut inserted = 0;
    for setting in default_settings() {
        if settings_db_operations::insert_if_absent(&tx, &setting)? {
            inserted += 1;
        }
    }
    tx.commit()?;
    if inserted > 0 {
        log::info!("Seeded {} default settings", inserted);
    }
    Ok(inserted)
}

pub fn validate_value(key: &str, setting_type: SettingType, value: &str) -> CmsResult<()> {
    let ok = match setting_type {
        SettingType::String | SettingType::Text => true,
        SettingType::Number => value.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false),
        SettingType::Boolean => matches!(value, "true" | "false"),
        SettingType::Email => value.is_empty() || is_valid_email(value),
    };
    if ok {
        Ok(())
    } else {
        Err(CmsError::Validation(format!("'{}' is not a valid {} value for {}", value, setting_type, key)))
    }
}

pub fn get(pool: &DbPool, key: &str) -> CmsResult<Setting> {
    let conn = pool.get()?;
    settings_db_operations::find_setting(&conn, key)?.ok_or_else(|| CmsError::NotFound(format!("Setting '{}'", key)))
}

/// Boolean setting, falling back to `default` when absent or not boolean.
pub fn flag(pool: &DbPool, key: &str, default: bool) -> CmsResult<bool> {
    let conn = pool.get()?;
    Ok(settings_db_operations::find_setting(&conn, key)?
        .and_then(|s| s.as_bool())
        .unwrap_or(default))
}

pub fn posts_per_page(pool: &DbPool) -> CmsResult<i64> {
    let conn = pool.get()?;
    let configured = settings_db_operations::find_setting(&conn, "posts_per_page")?
        .and_then(|s| s.as_number())
        .map(|n| n as i64)
        .filter(|n| *n > 0);
    Ok(configured.unwrap_or(DEFAULT_POSTS_PER_PAGE))
}

/// Sets one key, keeping its declared type (or `string` for a new key).
pub fn set(pool: &DbPool, actor: &Identity, key: &str, value: &str) -> CmsResult<Setting> {
    let mut updates = BTreeMap::new();
    updates.insert(
        key.to_string(),
        SettingUpdate {
            value: value.to_string(),
            setting_type: None,
            description: None,
        },
    );
    update_multiple(pool, actor, &updates)?;
    get(pool, key)
}

/// Validates every entry before writing any, then upserts them all in one
/// transaction.
pub fn update_multiple(
    pool: &DbPool,
    actor: &Identity,
    updates: &BTreeMap<String, SettingUpdate>,
) -> CmsResult<usize> {
    require_capability(actor, Capability::ManageSettings)?;
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let mut resolved = Vec::with_capacity(updates.len());
    for (key, update) in updates {
        let key = key.trim();
        if key.is_empty() {
            return Err(CmsError::Validation("Setting key must not be empty".to_string()));
        }
        let existing = settings_db_operations::find_setting(&tx, key)?;
        let setting_type = update
            .setting_type
            .or(existing.as_ref().map(|s| s.setting_type))
            .unwrap_or(SettingType::String);
        validate_value(key, setting_type, &update.value)?;
        let category = existing.map(|s| s.category).unwrap_or_else(|| catalog_category(key));
        resolved.push((key, update, setting_type, category));
    }

    for (key, update, setting_type, category) in &resolved {
        settings_db_operations::upsert_setting(
            &tx,
            key,
            &update.value,
            *setting_type,
            *category,
            update.description.as_deref(),
        )?;
    }
    tx.commit()?;
    log::info!("{} updated {} setting(s)", actor.email, resolved.len());
    Ok(resolved.len())
}

pub fn get_all(pool: &DbPool) -> CmsResult<Vec<Setting>> {
    let conn = pool.get()?;
    Ok(settings_db_operations::list_settings(&conn)?)
}

pub fn get_by_category(pool: &DbPool, category: SettingCategory) -> CmsResult<Vec<Setting>> {
    let conn = pool.get()?;
    Ok(settings_db_operations::list_settings_by_category(&conn, category)?)
}

/// Public keys as a flat key/value map.
pub fn public_settings(pool: &DbPool) -> CmsResult<BTreeMap<String, String>> {
    let conn = pool.get()?;
    Ok(settings_db_operations::list_public_settings(&conn)?
        .into_iter()
        .map(|s| (s.setting_key, s.setting_value))
        .collect())
}

pub fn delete(pool: &DbPool, actor: &Identity, key: &str) -> CmsResult<()> {
    require_capability(actor, Capability::ManageSettings)?;
    let conn = pool.get()?;
    if settings_db_operations::delete_setting(&conn, key)? == 0 {
        return Err(CmsError::NotFound(format!("Setting '{}'", key)));
    }
    log::info!("{} deleted setting {}", actor.email, key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use pretty_assertions::assert_eq;

    fn update(value: &str) -> SettingUpdate {
        SettingUpdate {
            value: value.to_string(),
            setting_type: None,
            description: None,
        }
    }

    #[test]
    fn initialize_defaults_never_overwrites() {
        let fx = test_support::fixture();
        set(&fx.pool, &fx.admin, "site_name", "Renamed").unwrap();
        assert_eq!(initialize_defaults(&fx.pool).unwrap(), 0);
        assert_eq!(get(&fx.pool, "site_name").unwrap().setting_value, "Renamed");
    }

    #[test]
    fn typed_values_are_validated() {
        let fx = test_support::fixture();
        assert!(matches!(set(&fx.pool, &fx.admin, "posts_per_page", "ten"), Err(CmsError::Validation(_))));
        assert!(matches!(set(&fx.pool, &fx.admin, "enable_comments", "yes"), Err(CmsError::Validation(_))));
        assert!(matches!(set(&fx.pool, &fx.admin, "admin_email", "nobody"), Err(CmsError::Validation(_))));
        assert_eq!(set(&fx.pool, &fx.admin, "posts_per_page", "12").unwrap().as_number(), Some(12.0));
        assert_eq!(posts_per_page(&fx.pool).unwrap(), 12);
    }

    #[test]
    fn update_multiple_is_all_or_nothing() {
        let fx = test_support::fixture();
        let mut updates = BTreeMap::new();
        updates.insert("site_name".to_string(), update("Batch Name"));
        updates.insert("posts_per_page".to_string(), update("-x-"));
        assert!(update_multiple(&fx.pool, &fx.admin, &updates).is_err());
        assert_eq!(get(&fx.pool, "site_name").unwrap().setting_value, "My Website");

        updates.insert("posts_per_page".to_string(), update("8"));
        updates.insert(
            "footer_text".to_string(),
            SettingUpdate {
                value: "Hello".into(),
                setting_type: Some(SettingType::Text),
                description: Some("Footer".into()),
            },
        );
        assert_eq!(update_multiple(&fx.pool, &fx.admin, &updates).unwrap(), 3);
        let footer = get(&fx.pool, "footer_text").unwrap();
        assert_eq!(footer.setting_type, SettingType::Text);
        assert_eq!(footer.category, SettingCategory::General);
        assert!(!footer.is_public);
    }

    #[test]
    fn categories_and_public_view() {
        let fx = test_support::fixture();
        let content: Vec<String> = get_by_category(&fx.pool, SettingCategory::Content)
            .unwrap()
            .into_iter()
            .map(|s| s.setting_key)
            .collect();
        assert_eq!(content, vec!["comment_moderation", "enable_comments", "posts_per_page"]);
        assert_eq!(category_keys(SettingCategory::Users), vec!["enable_registration"]);

        let public = public_settings(&fx.pool).unwrap();
        assert!(public.contains_key("site_name"));
        assert!(!public.contains_key("admin_email"));
    }

    #[test]
    fn only_settings_managers_may_write() {
        let fx = test_support::fixture();
        assert!(matches!(set(&fx.pool, &fx.reader, "site_name", "x"), Err(CmsError::Unauthorized(_))));
        assert!(matches!(delete(&fx.pool, &fx.admin, "nope"), Err(CmsError::NotFound(_))));
        delete(&fx.pool, &fx.admin, "google_analytics_id").unwrap();
    }
}
