//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::GatePolicy;
use crate::db::{Database, NewUser, UserRole};
use crate::jwt::JwtConfig;
use crate::pages::is_reserved_path;
use crate::password::hash_password;
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

const MIN_SECRET_LENGTH: usize = 32;
const ADMIN_PASSWORD_LENGTH: usize = 24;

pub const ACCESS_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";
pub const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Floodgate",
    about = "Session gate with short-lived access tokens and revocable refresh tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "floodgate.db")]
    pub database: String,

    /// Path to file containing the access token secret. Prefer the ACCESS_TOKEN_SECRET env var
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer the REFRESH_TOKEN_SECRET env var
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Access token lifetime in minutes
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u64).range(1..=1440))]
    pub access_token_ttl_minutes: u64,

    /// Refresh token lifetime in days
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..=365))]
    pub refresh_token_ttl_days: u64,

    /// Public origin of the site. Cookies are marked Secure when it uses https
    #[arg(long, default_value = "http://localhost:7291")]
    pub public_origin: Url,

    /// Path of the login page; denied requests are redirected here
    #[arg(long, default_value = "/login", value_parser = validate_login_path)]
    pub login_path: String,

    /// Route prefix guarded by the session gate (repeatable)
    #[arg(long = "protect", value_name = "PREFIX", value_parser = validate_route_path,
        default_values = ["/user", "/analyst", "/admin"])]
    pub protected_prefixes: Vec<String>,

    /// Renew access tokens through this verification endpoint instead of in-process
    #[arg(long, value_name = "URL")]
    pub renewal_endpoint: Option<Url>,

    /// Time budget for a single access token renewal
    #[arg(long, default_value = "2000", value_parser = clap::value_parser!(u64).range(1..=60000))]
    pub renewal_timeout_ms: u64,

    /// Create an admin account with this email on startup and print its password
    #[arg(long, value_name = "EMAIL")]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn validate_route_path(s: &str) -> Result<String, String> {
    if !s.starts_with('/') {
        return Err(format!("Path must start with '/': {}", s));
    }

    if s.len() < 2 {
        return Err("Path must not be the site root".to_string());
    }

    if s.ends_with('/') {
        return Err(format!("Path must not end with '/': {}", s));
    }

    if s.chars().any(|c| !c.is_ascii() || c.is_whitespace()) {
        return Err(format!("Path contains invalid characters: {}", s));
    }

    Ok(s.to_string())
}

fn validate_login_path(s: &str) -> Result<String, String> {
    let path = validate_route_path(s)?;
    if is_reserved_path(&path) {
        return Err(format!("Login path clashes with an existing route: {}", path));
    }
    Ok(path)
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<Vec<u8>> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            env_var,
            "Signing secret is required. Set the environment variable (recommended) or pass a secret file"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            env_var,
            "Signing secret is shorter than {} characters. Use a longer secret", MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret.into_bytes())
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if the secrets cannot be used together.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: &[u8],
    refresh_secret: &[u8],
) -> Option<ServerConfig> {
    let jwt = match JwtConfig::new(
        access_secret,
        refresh_secret,
        Duration::from_secs(args.access_token_ttl_minutes * 60),
        Duration::from_secs(args.refresh_token_ttl_days * 24 * 60 * 60),
    ) {
        Ok(jwt) => jwt,
        Err(e) => {
            error!(error = %e, "Invalid token configuration");
            return None;
        }
    };

    let secure_cookies = args.public_origin.scheme() == "https";

    Some(ServerConfig {
        db,
        jwt: Arc::new(jwt),
        secure_cookies,
        gate: GatePolicy {
            login_path: args.login_path.clone(),
            protected_prefixes: args.protected_prefixes.clone(),
            renewal_timeout: Duration::from_millis(args.renewal_timeout_ms),
        },
        renewal_endpoint: args.renewal_endpoint.clone(),
        rate_limit: RateLimitConfig::new(),
    })
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
}

/// Result of the admin bootstrap.
#[derive(Debug)]
pub enum AdminBootstrap {
    /// A new account was created with this one-time password
    Created { password: String },
    /// An account with the email already existed and now has the admin role
    Promoted,
}

/// Create an admin account for `email`, or promote the existing one.
pub async fn create_admin(db: &Database, email: &str) -> Result<AdminBootstrap, BootstrapError> {
    if let Some(existing) = db.users().get_by_email(email).await? {
        db.users().set_role(&existing.id, UserRole::Admin).await?;
        return Ok(AdminBootstrap::Promoted);
    }

    let password: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ADMIN_PASSWORD_LENGTH)
        .map(char::from)
        .collect();
    let password_hash = hash_password(&password).map_err(BootstrapError::Hash)?;

    db.users()
        .create(&NewUser {
            name: "Administrator",
            email: Some(email),
            phone: None,
            password_hash: &password_hash,
            role: UserRole::Admin,
        })
        .await?;

    Ok(AdminBootstrap::Created { password })
}

/// Handle the --create-admin flag. Returns false if the bootstrap failed.
pub async fn handle_create_admin(db: &Database, email: &str) -> bool {
    match create_admin(db, email).await {
        Ok(AdminBootstrap::Created { password }) => {
            println!();
            println!("Admin user created: {}", email);
            println!("Password (shown once): {}", password);
            println!();
            true
        }
        Ok(AdminBootstrap::Promoted) => {
            println!();
            println!("Existing user promoted to admin: {}", email);
            println!();
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::verify_password;

    const ACCESS: &[u8] = b"access-secret-for-cli-tests-00000";
    const REFRESH: &[u8] = b"refresh-secret-for-cli-tests-0000";

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["floodgate"]).unwrap();

        assert_eq!(args.port, 7291);
        assert_eq!(args.access_token_ttl_minutes, 15);
        assert_eq!(args.refresh_token_ttl_days, 30);
        assert_eq!(args.login_path, "/login");
        assert_eq!(args.protected_prefixes, ["/user", "/analyst", "/admin"]);
        assert_eq!(args.renewal_timeout_ms, 2000);
        assert!(args.renewal_endpoint.is_none());
    }

    #[test]
    fn test_repeated_protect_replaces_defaults() {
        let args =
            Args::try_parse_from(["floodgate", "--protect", "/profile", "--protect", "/user"])
                .unwrap();
        assert_eq!(args.protected_prefixes, ["/profile", "/user"]);
    }

    #[test]
    fn test_custom_login_path() {
        let args = Args::try_parse_from(["floodgate", "--login-path", "/signin"]).unwrap();
        assert_eq!(args.login_path, "/signin");
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        for argv in [
            vec!["floodgate", "--access-token-ttl-minutes", "0"],
            vec!["floodgate", "--refresh-token-ttl-days", "400"],
            vec!["floodgate", "--protect", "user"],
            vec!["floodgate", "--protect", "/"],
            vec!["floodgate", "--login-path", "/login/"],
            vec!["floodgate", "--login-path", "/user/dashboard"],
            vec!["floodgate", "--login-path", "/admin/dashboard"],
            vec!["floodgate", "--login-path", "/api/auth/login"],
            vec!["floodgate", "--renewal-endpoint", "not a url"],
        ] {
            assert!(Args::try_parse_from(argv.clone()).is_err(), "accepted {:?}", argv);
        }
    }

    #[tokio::test]
    async fn test_build_config() {
        let args = Args::try_parse_from([
            "floodgate",
            "--public-origin",
            "https://example.org",
            "--access-token-ttl-minutes",
            "5",
            "--renewal-timeout-ms",
            "250",
        ])
        .unwrap();
        let db = Database::open(":memory:").await.unwrap();

        let config = build_config(&args, db, ACCESS, REFRESH).unwrap();
        assert!(config.secure_cookies);
        assert_eq!(config.jwt.access_ttl(), Duration::from_secs(300));
        assert_eq!(config.jwt.refresh_ttl(), Duration::from_secs(30 * 86400));
        assert_eq!(config.gate.renewal_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_build_config_rejects_shared_secret() {
        let args = Args::try_parse_from(["floodgate"]).unwrap();
        let db = Database::open(":memory:").await.unwrap();

        assert!(build_config(&args, db, ACCESS, ACCESS).is_none());
    }

    #[test]
    fn test_load_secret_from_file() {
        let path = std::env::temp_dir().join(format!("floodgate-secret-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, "a-file-secret-that-is-long-enough-123\n").unwrap();

        let secret = load_secret("FLOODGATE_TEST_UNSET_SECRET", path.to_str()).unwrap();
        assert_eq!(secret, b"a-file-secret-that-is-long-enough-123");

        std::fs::write(&path, "short").unwrap();
        assert!(load_secret("FLOODGATE_TEST_UNSET_SECRET", path.to_str()).is_none());

        std::fs::remove_file(&path).unwrap();
        assert!(load_secret("FLOODGATE_TEST_UNSET_SECRET", None).is_none());
    }

    #[tokio::test]
    async fn test_create_admin() {
        let db = Database::open(":memory:").await.unwrap();

        let AdminBootstrap::Created { password } =
            create_admin(&db, "root@example.org").await.unwrap()
        else {
            panic!("expected a new admin");
        };
        assert_eq!(password.len(), ADMIN_PASSWORD_LENGTH);

        let admin = db
            .users()
            .get_by_contact(Some("root@example.org"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert!(verify_password(&password, &admin.password_hash));

        assert!(matches!(
            create_admin(&db, "root@example.org").await.unwrap(),
            AdminBootstrap::Promoted
        ));
    }

    #[tokio::test]
    async fn test_create_admin_promotes_existing_user() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create(&NewUser {
                name: "Asha",
                email: Some("asha@example.org"),
                phone: None,
                password_hash: "unused",
                role: UserRole::Citizen,
            })
            .await
            .unwrap();

        create_admin(&db, "asha@example.org").await.unwrap();

        let user = db.users().get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(user.role, UserRole::Admin);
    }
}
