//! CLI argument parsing, validation, and startup helpers.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand};
use rand::RngCore;
use tracing::{error, info};
use url::Url;

use crate::ServerConfig;
use crate::clock::SystemClock;
use crate::db::Database;
use crate::jwt::decode_secret;

const MIN_JWT_SECRET_BYTES: usize = 32;
const GENERATED_SECRET_BYTES: usize = 48;
const ENV_KEY: &str = "JWT_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "storefront-auth",
    about = "Storefront API with database-backed JWT authentication"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Port to listen on
    #[arg(short, long, default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "storefront.db")]
    pub database: String,

    /// Application URL, used as the token issuer (e.g., "https://shop.example.com")
    #[arg(long, env = "APP_URL", default_value = "http://localhost:7291")]
    pub app_url: String,

    /// Token lifetime in minutes
    #[arg(long, env = "JWT_TTL", default_value = "60", value_parser = parse_ttl)]
    pub jwt_ttl: NonZeroU32,

    /// Path to file containing the base64 JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate a random JWT secret and print it or store it in an env file
    GenerateSecret(GenerateSecretArgs),
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct GenerateSecretArgs {
    /// Env file to write JWT_SECRET into instead of printing it
    #[arg(long)]
    pub env_file: Option<String>,

    /// Leave an existing JWT_SECRET entry untouched
    #[arg(long, conflicts_with = "force")]
    pub skip_if_present: bool,

    /// Replace an existing JWT_SECRET entry
    #[arg(long)]
    pub force: bool,
}

fn parse_ttl(s: &str) -> Result<NonZeroU32, String> {
    let minutes: u32 = s
        .parse()
        .map_err(|_| format!("JWT TTL must be a whole number of minutes: {}", s))?;
    NonZeroU32::new(minutes).ok_or_else(|| "JWT TTL must be greater than zero".to_string())
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the JWT secret from environment variable or file and decode it.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<Vec<u8>> {
    let secret = if let Ok(secret) = std::env::var(ENV_KEY) {
        // SAFETY: called during startup before the runtime spawns any tasks,
        // and nothing else reads this variable.
        unsafe { std::env::remove_var(ENV_KEY) };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    parse_jwt_secret(&secret)
}

/// Decode a base64 secret and check its length.
pub fn parse_jwt_secret(secret: &str) -> Option<Vec<u8>> {
    let bytes = match decode_secret(secret) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Invalid JWT secret");
            return None;
        }
    };

    if bytes.len() < MIN_JWT_SECRET_BYTES {
        error!(
            "JWT secret decodes to fewer than {} bytes. Run `generate-secret` for a longer one",
            MIN_JWT_SECRET_BYTES
        );
        return None;
    }

    Some(bytes)
}

/// Parse and validate the application URL.
/// Returns None and logs an error if validation fails.
pub fn validate_app_url(app_url: &str) -> Option<Url> {
    let url = match Url::parse(app_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %app_url, error = %e, "Invalid app URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = url.host_str() == Some("localhost");

    if !is_https && !is_localhost {
        error!("app-url must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    app_url: &Url,
    jwt_secret: Vec<u8>,
    ttl_minutes: NonZeroU32,
) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret,
        app_url: app_url.as_str().trim_end_matches('/').to_string(),
        ttl_minutes,
        clock: Arc::new(SystemClock),
    }
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

/// Random base64 secret suitable for `JWT_SECRET`.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; GENERATED_SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// What happened to the env file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFileUpdate {
    Appended,
    Replaced,
    /// An entry exists and `--skip-if-present` was given
    Kept,
    /// An entry exists and neither flag was given
    AlreadyPresent,
}

/// Write `JWT_SECRET=<secret>` into an env file, creating it if needed.
pub fn write_secret_to_env_file(
    path: &Path,
    secret: &str,
    skip_if_present: bool,
    force: bool,
) -> std::io::Result<EnvFileUpdate> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };

    let prefix = format!("{}=", ENV_KEY);
    let entry = format!("{}{}", prefix, secret);
    let present = content.lines().any(|line| line.starts_with(&prefix));

    if present {
        if skip_if_present {
            return Ok(EnvFileUpdate::Kept);
        }
        if !force {
            return Ok(EnvFileUpdate::AlreadyPresent);
        }

        let mut updated: Vec<&str> = content
            .lines()
            .map(|line| {
                if line.starts_with(&prefix) {
                    entry.as_str()
                } else {
                    line
                }
            })
            .collect();
        updated.push("");
        std::fs::write(path, updated.join("\n"))?;
        return Ok(EnvFileUpdate::Replaced);
    }

    let mut updated = content;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&entry);
    updated.push('\n');
    std::fs::write(path, updated)?;
    Ok(EnvFileUpdate::Appended)
}

/// Handle the `generate-secret` command. Returns false if the process should exit with an error.
pub fn handle_generate_secret(args: &GenerateSecretArgs) -> bool {
    let secret = generate_secret();

    let Some(path) = args.env_file.as_deref() else {
        println!("{}", secret);
        return true;
    };

    match write_secret_to_env_file(Path::new(path), &secret, args.skip_if_present, args.force) {
        Ok(EnvFileUpdate::Appended) | Ok(EnvFileUpdate::Replaced) => {
            info!(path = %path, "JWT secret written");
            true
        }
        Ok(EnvFileUpdate::Kept) => {
            info!(path = %path, "JWT secret already present, left unchanged");
            true
        }
        Ok(EnvFileUpdate::AlreadyPresent) => {
            error!(path = %path, "JWT secret already present. Use --force to replace it");
            false
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to write env file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl("60").map(NonZeroU32::get), Ok(60));
        assert_eq!(parse_ttl("1").map(NonZeroU32::get), Ok(1));
        assert!(parse_ttl("0").is_err());
        assert!(parse_ttl("-5").is_err());
        assert!(parse_ttl("soon").is_err());
    }

    #[test]
    fn test_parse_jwt_secret() {
        let secret = generate_secret();
        assert_eq!(parse_jwt_secret(&secret).map(|b| b.len()), Some(48));

        // 16 bytes is too short
        assert!(parse_jwt_secret(&STANDARD.encode([1u8; 16])).is_none());
        assert!(parse_jwt_secret(&STANDARD.encode([1u8; 32])).is_some());
        assert!(parse_jwt_secret("not base64 at all!").is_none());
        assert!(parse_jwt_secret("").is_none());
    }

    #[test]
    fn test_load_jwt_secret_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        std::fs::write(&path, format!("{}\n", STANDARD.encode([7u8; 40]))).unwrap();

        // Only meaningful when JWT_SECRET is not set in the test environment.
        if std::env::var(ENV_KEY).is_err() {
            let secret = load_jwt_secret(path.to_str()).unwrap();
            assert_eq!(secret, vec![7u8; 40]);

            let missing = dir.path().join("missing");
            assert!(load_jwt_secret(missing.to_str()).is_none());
        }
    }

    #[test]
    fn test_validate_app_url() {
        assert!(validate_app_url("https://shop.example.com").is_some());
        assert!(validate_app_url("http://localhost:7291").is_some());
        assert!(validate_app_url("http://shop.example.com").is_none());
        assert!(validate_app_url("not a url").is_none());
    }

    #[test]
    fn test_generate_secret_is_random() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        assert_eq!(STANDARD.decode(&a).unwrap().len(), GENERATED_SECRET_BYTES);
    }

    #[test]
    fn test_env_file_append_and_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        let update = write_secret_to_env_file(&path, "first", false, false).unwrap();
        assert_eq!(update, EnvFileUpdate::Appended);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "JWT_SECRET=first\n");

        let other = dir.path().join("other.env");
        std::fs::write(&other, "APP_URL=http://localhost").unwrap();
        write_secret_to_env_file(&other, "abc", false, false).unwrap();
        assert_eq!(
            std::fs::read_to_string(&other).unwrap(),
            "APP_URL=http://localhost\nJWT_SECRET=abc\n"
        );
    }

    #[test]
    fn test_env_file_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "APP_URL=http://localhost\nJWT_SECRET=old\nJWT_TTL=30\n").unwrap();

        let update = write_secret_to_env_file(&path, "new", false, false).unwrap();
        assert_eq!(update, EnvFileUpdate::AlreadyPresent);

        let update = write_secret_to_env_file(&path, "new", true, false).unwrap();
        assert_eq!(update, EnvFileUpdate::Kept);
        assert!(std::fs::read_to_string(&path).unwrap().contains("JWT_SECRET=old"));

        let update = write_secret_to_env_file(&path, "new", false, true).unwrap();
        assert_eq!(update, EnvFileUpdate::Replaced);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "APP_URL=http://localhost\nJWT_SECRET=new\nJWT_TTL=30\n"
        );
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["storefront-auth", "--jwt-ttl", "15"]).unwrap();
        assert_eq!(args.jwt_ttl.get(), 15);
        assert!(args.command.is_none());

        let args = Args::try_parse_from([
            "storefront-auth",
            "generate-secret",
            "--env-file",
            ".env",
            "--force",
        ])
        .unwrap();
        match args.command {
            Some(Command::GenerateSecret(generate)) => {
                assert_eq!(generate.env_file.as_deref(), Some(".env"));
                assert!(generate.force);
                assert!(!generate.skip_if_present);
            }
            None => panic!("expected generate-secret"),
        }

        assert!(Args::try_parse_from(["storefront-auth", "--jwt-ttl", "0"]).is_err());
    }
}
