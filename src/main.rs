use actix_cors::Cors;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::Key,
    http::header,
    middleware::{DefaultHeaders, Logger},
    web, App, HttpResponse, HttpServer, Responder,
};
use blogcms_backend::{
    config::Config,
    helper::settings_helpers,
    middleware::RequireCapability,
    models::Capability,
    routes,
    setup::db_setup,
};
use clap::Parser;
use std::fmt::Display;
use std::fs;
use std::path::PathBuf;

async fn root_handler() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

#[derive(Parser, Debug)]
#[command(name = "blogcms_server", author, version, about = "Starts the blog CMS web server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

fn fatal(context: &str, e: impl Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("FATAL: {}: {}", context, e))
}

fn build_cors(allowed_origins: &str) -> Cors {
    let cors = if allowed_origins.trim() == "*" {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).map_err(|e| fatal("failed to load configuration", e))?;

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let db_path = config.db_path();
    if !db_path.exists() {
        return Err(fatal(
            "database not found",
            format!(
                "'{}'. Run 'setup_cli --env-file <path> db setup' first",
                db_path.display()
            ),
        ));
    }
    let pool = db_setup::build_pool(&db_path).map_err(|e| fatal("failed to create the connection pool", e))?;

    settings_helpers::initialize_defaults(&pool).map_err(|e| fatal("failed to seed settings", e))?;

    fs::create_dir_all(config.media_root().join("posts"))?;

    let session_key_bytes =
        hex::decode(&config.session_secret_key).map_err(|e| fatal("SESSION_SECRET_KEY is not valid hex", e))?;
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .map_err(|e| fatal("SESSION_SECRET_KEY is too short (64 bytes required)", e))?;

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_secure(config.use_secure_cookies)
            .cookie_http_only(true)
            .cookie_same_site(actix_web::cookie::SameSite::Lax)
            .build();

        App::new()
            .wrap(session_mw)
            .wrap(build_cors(&config.allowed_origins))
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(pool.clone()))
            .configure(routes::public::config_api)
            .configure(routes::auth::config_auth)
            .service(
                web::scope("/admin")
                    .wrap(RequireCapability(Capability::AccessAdmin))
                    .configure(routes::admin::config_admin)
                    .configure(routes::comments::config_comments)
                    .configure(routes::users::config_users),
            )
            .service(actix_files::Files::new("/media", config.media_root()))
            .route("/", web::get().to(root_handler))
    })
    .bind(server_address)?
    .run()
    .await
}
