//! Application configuration loaded from environment variables.

/// Server and job configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL connection string; when absent the server
///   falls back to the in-memory store with a few seeded demo products
/// - `STALE_THRESHOLD_DAYS` — detector day threshold (default: `3`)
/// - `STALE_JOB_HOUR` / `STALE_JOB_MINUTE` — daily firing time
///   (default: `22:00`)
/// - `STALE_JOB_UTC_OFFSET` — schedule timezone as whole hours east of UTC
///   (default: `-5`)
/// - `RUN_JOBS_ON_STARTUP` — run the stale check once at boot
///   (default: `false`)
/// - `JOB_LOG_DIR` — directory for per-run job logs (default: `"logs"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub stale_threshold_days: u32,
    pub job_hour: u32,
    pub job_minute: u32,
    pub job_utc_offset_hours: i32,
    pub run_jobs_on_startup: bool,
    pub job_log_dir: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT", 3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            stale_threshold_days: env_parse("STALE_THRESHOLD_DAYS", 3),
            job_hour: env_parse("STALE_JOB_HOUR", 22),
            job_minute: env_parse("STALE_JOB_MINUTE", 0),
            job_utc_offset_hours: env_parse("STALE_JOB_UTC_OFFSET", -5),
            run_jobs_on_startup: env_parse("RUN_JOBS_ON_STARTUP", false),
            job_log_dir: std::env::var("JOB_LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            stale_threshold_days: 3,
            job_hour: 22,
            job_minute: 0,
            job_utc_offset_hours: -5,
            run_jobs_on_startup: false,
            job_log_dir: "logs".to_string(),
        }
    }
}
