use std::path::Path;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction};
use thiserror::Error;

use crate::helper::settings_helpers;
use crate::models::db_operations::settings_db_operations;
use crate::DbPool;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

const SCHEMA: &[(&str, &str)] = &[
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'USER' CHECK(role IN ('USER', 'EDITOR', 'ADMIN', 'SUPER_ADMIN')),
            status TEXT NOT NULL DEFAULT 'ACTIVE' CHECK(status IN ('ACTIVE', 'INACTIVE')),
            bio TEXT,
            website TEXT,
            avatar TEXT,
            last_login_at TEXT,
            login_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "categories",
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT,
            color TEXT,
            icon TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_featured INTEGER NOT NULL DEFAULT 0,
            parent_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
            meta_title TEXT,
            meta_description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "tags",
        "CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "posts",
        "CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            excerpt TEXT NOT NULL,
            content TEXT NOT NULL,
            featured_image TEXT,
            status TEXT NOT NULL DEFAULT 'DRAFT' CHECK(status IN ('DRAFT', 'PUBLISHED', 'SCHEDULED', 'ARCHIVED')),
            category_id INTEGER NOT NULL REFERENCES categories(id),
            author_id INTEGER NOT NULL REFERENCES users(id),
            is_featured INTEGER NOT NULL DEFAULT 0,
            views_count INTEGER NOT NULL DEFAULT 0,
            likes_count INTEGER NOT NULL DEFAULT 0,
            comments_count INTEGER NOT NULL DEFAULT 0,
            reading_time INTEGER NOT NULL DEFAULT 0,
            published_at TEXT,
            meta_title TEXT,
            meta_description TEXT,
            meta_keywords TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "post_tags",
        "CREATE TABLE IF NOT EXISTS post_tags (
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (post_id, tag_id)
        )",
    ),
    (
        "comments",
        "CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            parent_id INTEGER REFERENCES comments(id) ON DELETE CASCADE,
            author_name TEXT NOT NULL,
            author_email TEXT NOT NULL,
            author_website TEXT,
            author_ip TEXT,
            user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            status TEXT NOT NULL DEFAULT 'PENDING' CHECK(status IN ('PENDING', 'APPROVED', 'TRASH', 'SPAM')),
            moderated_at TEXT,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "settings",
        "CREATE TABLE IF NOT EXISTS settings (
            setting_key TEXT PRIMARY KEY,
            setting_value TEXT NOT NULL,
            setting_type TEXT NOT NULL DEFAULT 'string' CHECK(setting_type IN ('string', 'text', 'number', 'boolean', 'email')),
            category TEXT NOT NULL DEFAULT 'general',
            description TEXT NOT NULL DEFAULT '',
            is_public INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "post_views",
        "CREATE TABLE IF NOT EXISTS post_views (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            ip_address TEXT NOT NULL,
            user_agent TEXT,
            referer TEXT,
            session_id TEXT,
            created_at TEXT NOT NULL
        )",
    ),
];

const INDEXES: &str = "
    CREATE INDEX IF NOT EXISTS idx_posts_status_created ON posts(status, created_at);
    CREATE INDEX IF NOT EXISTS idx_posts_category ON posts(category_id);
    CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
    CREATE INDEX IF NOT EXISTS idx_comments_post_status ON comments(post_id, status);
    CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id);
    CREATE INDEX IF NOT EXISTS idx_post_views_post ON post_views(post_id);
";

/// Opens (creating if needed) the SQLite file and wraps it in a pool whose
/// connections all enforce foreign keys.
pub fn build_pool(db_file: &Path) -> Result<DbPool, SetupError> {
    if let Some(parent) = db_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let manager = SqliteConnectionManager::file(db_file)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
    Ok(r2d2::Pool::new(manager)?)
}

/// Creates every table and seeds the default settings catalog. Safe to run
/// repeatedly; returns the number of settings newly inserted.
pub fn setup_database(conn: &mut Connection) -> Result<usize, SetupError> {
    let tx = conn.transaction()?;
    for (table, ddl) in SCHEMA {
        println!("- Creating '{}' table...", table);
        tx.execute(ddl, [])?;
    }
    tx.execute_batch(INDEXES)?;
    let seeded = seed_default_settings(&tx)?;
    tx.commit()?;
    Ok(seeded)
}

fn seed_default_settings(tx: &Transaction) -> rusqlite::Result<usize> {
    println!("- Seeding default settings...");
    let mut inserted = 0;
    for setting in settings_helpers::default_settings() {
        if settings_db_operations::insert_if_absent(tx, &setting)? {
            println!("  > {} = {}", setting.setting_key, setting.setting_value);
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Single-connection in-memory pool with the full schema, for tests.
#[cfg(test)]
pub(crate) fn memory_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory()
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
    {
        let mut conn = pool.get().unwrap();
        setup_database(&mut conn).unwrap();
    }
    pool
}
