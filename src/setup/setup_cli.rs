use blogcms_backend::config::Config;
use blogcms_backend::helper::auth_helpers::hash_password;
use blogcms_backend::helper::form_helpers::{normalize_email, require_basic_password, require_email, require_username};
use blogcms_backend::helper::settings_helpers;
use blogcms_backend::models::db_operations::users_db_operations::{self, UserRecord};
use blogcms_backend::models::filters::UserFilter;
use blogcms_backend::models::{Role, UserStatus};
use blogcms_backend::setup::db_setup;
use blogcms_backend::DbPool;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial application setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Creates the schema and seeds the default settings.
    Setup,
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "Site")]
        first_name: String,
        #[arg(long, default_value = "Administrator")]
        last_name: String,
        /// Create a SUPER_ADMIN instead of an ADMIN.
        #[arg(long)]
        super_admin: bool,
    },
    List,
    ChangePassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        new_password: String,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Inserts any missing default settings without touching existing ones.
    Init,
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::from_env(&cli.env_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup => setup_database(&config),
        },
        Commands::Admin { action } => {
            let Some(pool) = open_existing(&config) else {
                process::exit(1);
            };
            match action {
                AdminAction::Create {
                    username,
                    email,
                    password,
                    first_name,
                    last_name,
                    super_admin,
                } => {
                    let role = if *super_admin { Role::SuperAdmin } else { Role::Admin };
                    create_admin_user(&pool, username, email, password, first_name, last_name, role);
                }
                AdminAction::List => list_admin_users(&pool),
                AdminAction::ChangePassword { email, new_password } => {
                    change_admin_password(&pool, email, new_password)
                }
            }
        }
        Commands::Settings { action } => match action {
            SettingsAction::Init => {
                let Some(pool) = open_existing(&config) else {
                    process::exit(1);
                };
                match settings_helpers::initialize_defaults(&pool) {
                    Ok(0) => println!("ℹ️ All default settings are already present."),
                    Ok(n) => println!("✅ Inserted {} default setting(s).", n),
                    Err(e) => eprintln!("❌ Error seeding settings: {}", e),
                }
            }
        },
    }
}

fn setup_database(config: &Config) {
    let db_path = config.db_path();
    println!("\nSetting up database at '{}'...", db_path.display());

    let pool = match db_setup::build_pool(&db_path) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("❌ Could not open database: {}", e);
            return;
        }
    };
    let mut conn = match pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Could not open database: {}", e);
            return;
        }
    };
    match db_setup::setup_database(&mut conn) {
        Ok(seeded) => println!("✅ Database setup completed successfully ({} default settings seeded).", seeded),
        Err(e) => eprintln!("❌ Error setting up database: {}", e),
    }
}

fn open_existing(config: &Config) -> Option<DbPool> {
    let db_path = config.db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    match db_setup::build_pool(&db_path) {
        Ok(pool) => Some(pool),
        Err(e) => {
            eprintln!("❌ Could not open database: {}", e);
            None
        }
    }
}

fn create_admin_user(
    pool: &DbPool,
    username: &str,
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
    role: Role,
) {
    if let Err(e) = require_username(username)
        .and_then(|_| require_email(email))
        .and_then(|_| require_basic_password(password))
    {
        eprintln!("❌ {}", e);
        return;
    }
    let email = normalize_email(email);
    let hashed_password = match hash_password(password) {
        Ok(hash) => hash,
        Err(e) => {
            eprintln!("❌ Failed to hash password: {}", e);
            return;
        }
    };
    let conn = match pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Could not open database: {}", e);
            return;
        }
    };
    let record = UserRecord {
        username,
        email: &email,
        first_name,
        last_name,
        role,
        status: UserStatus::Active,
    };
    match users_db_operations::insert_user(&conn, &record, &hashed_password) {
        Ok(_) => println!("✅ {} user '{}' <{}> created successfully.", role, username, email),
        Err(e) => eprintln!(
            "❌ Error creating admin user: {}. The username or email might already exist.",
            e
        ),
    }
}

fn list_admin_users(pool: &DbPool) {
    let conn = match pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Could not open database: {}", e);
            return;
        }
    };
    println!("Listing Admin Users:");
    for role in [Role::SuperAdmin, Role::Admin] {
        let filter = UserFilter {
            role: Some(role),
            ..Default::default()
        };
        match users_db_operations::list_users(&conn, &filter, i64::MAX, 0) {
            Ok(users) => {
                for user in users {
                    println!("- {} <{}> [{}, {}]", user.username, user.email, user.role, user.status);
                }
            }
            Err(e) => eprintln!("❌ Error fetching admins: {}", e),
        }
    }
}

fn change_admin_password(pool: &DbPool, email: &str, new_password: &str) {
    if let Err(e) = require_basic_password(new_password) {
        eprintln!("❌ {}", e);
        return;
    }
    let email = normalize_email(email);
    let conn = match pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Could not open database: {}", e);
            return;
        }
    };
    let user = match users_db_operations::find_user_by_email(&conn, &email) {
        Ok(Some(user)) if matches!(user.role, Role::Admin | Role::SuperAdmin) => user,
        Ok(_) => {
            eprintln!("❌ Error: No admin user with email '{}' found.", email);
            return;
        }
        Err(e) => {
            eprintln!("❌ Error looking up user: {}", e);
            return;
        }
    };
    let hashed_password = match hash_password(new_password) {
        Ok(hash) => hash,
        Err(e) => {
            eprintln!("❌ Failed to hash new password: {}", e);
            return;
        }
    };
    match users_db_operations::update_password_hash(&conn, user.id, &hashed_password) {
        Ok(_) => println!("✅ Password for admin user '{}' changed successfully.", email),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}
