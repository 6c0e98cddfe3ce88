use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    /// Password shared by the seeded demo users.
    pub seed_password: String,
    /// Overrides the seed comment file compiled into the binary.
    pub seed_comments_path: Option<PathBuf>,
    pub static_dir: PathBuf,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "sqlite:./data/pinboard.db?mode=rwc".to_string(),
            jwt_secret: "development-secret-change-in-production".to_string(),
            token_ttl_days: 7,
            seed_password: "password".to_string(),
            seed_comments_path: None,
            static_dir: PathBuf::from("static"),
            rate_limit_max: 10,
            rate_limit_window_secs: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed("PORT").unwrap_or(defaults.port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            token_ttl_days: parsed("TOKEN_TTL_DAYS").unwrap_or(defaults.token_ttl_days),
            seed_password: env::var("SEED_PASSWORD").unwrap_or(defaults.seed_password),
            seed_comments_path: env::var("SEED_COMMENTS_PATH").ok().map(PathBuf::from),
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            rate_limit_max: parsed("RATE_LIMIT_MAX").unwrap_or(defaults.rate_limit_max),
            rate_limit_window_secs: parsed("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or(defaults.rate_limit_window_secs),
        }
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring unparsable {key}={raw:?}");
            None
        }
    }
}
