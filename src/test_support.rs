//! Shared fixtures for unit tests: an in-memory store with one account per
//! role and a single category.

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;

use crate::config::{Config, WebConfig};
use crate::helper::auth_helpers::hash_password;
use crate::models::db_operations::categories_db_operations::{self, CategoryRecord};
use crate::models::db_operations::posts_db_operations::{self, PostRecord};
use crate::models::db_operations::users_db_operations::{self, UserRecord};
use crate::models::db_operations::now_db_time;
use crate::models::forms::PostInput;
use crate::models::{Identity, PostStatus, Role, UserStatus};
use crate::setup::db_setup::memory_pool;
use crate::DbPool;

pub const TEST_PASSWORD: &str = "Passw0rd";

pub struct Fixture {
    pub pool: DbPool,
    pub super_admin: Identity,
    pub admin: Identity,
    pub editor: Identity,
    pub reader: Identity,
    pub category_id: i64,
}

pub fn long_content(words: usize) -> String {
    vec!["word"; words].join(" ")
}

fn insert_account(pool: &DbPool, username: &str, role: Role) -> Identity {
    let conn = pool.get().unwrap();
    let email = format!("{}@example.com", username);
    let record = UserRecord {
        username,
        email: &email,
        first_name: "Test",
        last_name: "Account",
        role,
        status: UserStatus::Active,
    };
    let hash = hash_password(TEST_PASSWORD).unwrap();
    let user_id = users_db_operations::insert_user(&conn, &record, &hash).unwrap();
    Identity { user_id, email, role }
}

pub fn fixture() -> Fixture {
    let pool = memory_pool();
    let super_admin = insert_account(&pool, "root", Role::SuperAdmin);
    let admin = insert_account(&pool, "admin", Role::Admin);
    let editor = insert_account(&pool, "editor", Role::Editor);
    let reader = insert_account(&pool, "reader", Role::User);
    let category_id = {
        let conn = pool.get().unwrap();
        categories_db_operations::insert_category(
            &conn,
            &CategoryRecord {
                name: "Technology",
                slug: "technology",
                description: None,
                color: None,
                icon: None,
                sort_order: 0,
                is_featured: false,
                parent_id: None,
                meta_title: None,
                meta_description: None,
            },
        )
        .unwrap()
    };
    Fixture {
        pool,
        super_admin,
        admin,
        editor,
        reader,
        category_id,
    }
}

/// Inserts a post directly, bypassing validation.
pub fn insert_post(fx: &Fixture, slug: &str, status: PostStatus) -> i64 {
    let conn = fx.pool.get().unwrap();
    let stamp = (status == PostStatus::Published).then(now_db_time);
    posts_db_operations::insert_post(
        &conn,
        &PostRecord {
            title: slug,
            slug,
            excerpt: "Fixture excerpt",
            content: "Fixture content",
            featured_image: None,
            status,
            category_id: fx.category_id,
            is_featured: false,
            reading_time: 1,
            meta_title: None,
            meta_description: None,
            meta_keywords: None,
        },
        fx.admin.user_id,
        stamp.as_deref(),
    )
    .unwrap()
}

/// A valid published post form in `category_id`.
pub fn fixture_post_input(category_id: i64) -> PostInput {
    PostInput {
        title: "Fixture Post Title".to_string(),
        slug: None,
        excerpt: "A short excerpt for listings".to_string(),
        content: long_content(60),
        featured_image: None,
        status: PostStatus::Published,
        category_id,
        is_featured: false,
        meta_title: None,
        meta_description: None,
        meta_keywords: None,
        tags: None,
    }
}

/// Configuration for HTTP tests; paths are never touched.
pub fn test_config() -> Config {
    Config {
        web: WebConfig {
            host: "127.0.0.1".into(),
            port: 8080,
        },
        database_path: "/tmp".into(),
        media_path: "/tmp".into(),
        allowed_origins: String::new(),
        log_level: "info".into(),
        session_secret_key: "0".repeat(128),
        use_secure_cookies: false,
        session_ttl_hours: 1,
        remember_me_ttl_days: 1,
    }
}

/// The session cookie set by a login response.
pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Cookie<'static> {
    resp.response()
        .cookies()
        .find(|c| c.name() == "id")
        .expect("session cookie")
        .into_owned()
}
