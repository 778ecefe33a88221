/// Default constituents list for the rotating universe scan.
pub const DEFAULT_UNIVERSE_URL: &str =
    "https://raw.githubusercontent.com/datasets/s-and-p-500-companies/master/data/constituents.csv";

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
///
/// Alert tuning (thresholds, intervals, market hours) lives in the TOML file
/// at `alerts_config_path`, loaded by `scheduler::AlertFileConfig`.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    /// Chat that receives scheduled alerts.
    pub telegram_chat_id: i64,

    // Dashboard
    pub dashboard_token: String,
    pub dashboard_port: u16,

    // Database
    pub database_url: String,

    // Files
    pub watchlist_path: String,
    pub alerts_config_path: String,

    // Market data
    pub universe_url: String,
    pub provider_timeout_secs: u64,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let telegram_chat_id = required_env("TELEGRAM_CHAT_ID")
            .trim()
            .parse::<i64>()
            .unwrap_or_else(|_| panic!("TELEGRAM_CHAT_ID must be a numeric chat ID"));

        Config {
            telegram_token: required_env("TELEGRAM_TOKEN"),
            telegram_chat_id,
            dashboard_token: required_env("DASHBOARD_TOKEN"),
            dashboard_port: optional_env("DASHBOARD_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            database_url: required_env("DATABASE_URL"),
            watchlist_path: optional_env("WATCHLIST_PATH")
                .unwrap_or_else(|| "watchlist.json".to_string()),
            alerts_config_path: optional_env("ALERTS_CONFIG_PATH")
                .unwrap_or_else(|| "config/alerts.toml".to_string()),
            universe_url: optional_env("UNIVERSE_URL")
                .unwrap_or_else(|| DEFAULT_UNIVERSE_URL.to_string()),
            provider_timeout_secs: optional_env("PROVIDER_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|&secs| secs > 0)
                .unwrap_or(10),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
