// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use crate::generation::DEFAULT_GENERATION_URL;
use crate::listing::DEFAULT_TRENDING_LIMIT;

const DEV_JWT_SECRET: &str = "storyhub-dev-secret-change-in-production";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Directory containing pre-built frontend files to serve.
    pub static_dir: Option<PathBuf>,
    /// Key for the generation endpoint; generation fails without it.
    pub gemini_api_key: Option<String>,
    pub generation_url: String,
    pub generation_timeout: Duration,
    pub jwt_secret: String,
    /// Number of stories returned by the trending listing.
    pub trending_limit: usize,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:storyhub.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `STATIC_DIR` - Path to frontend dist directory for static file serving
    /// - `GEMINI_API_KEY` - Generation API key
    /// - `GENERATION_URL` - Override the generateContent endpoint
    /// - `GENERATION_TIMEOUT_SECS` - Generation request timeout (default: 60)
    /// - `JWT_SECRET` - Session signing secret
    /// - `TRENDING_LIMIT` - Size of the trending list (default: 5)
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let database_url =
            env("DATABASE_URL").unwrap_or_else(|| "sqlite:storyhub.db?mode=rwc".to_string());

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let static_dir = env("STATIC_DIR").map(PathBuf::from);

        let gemini_api_key = env("GEMINI_API_KEY").filter(|k| !k.is_empty());

        let generation_url =
            env("GENERATION_URL").unwrap_or_else(|| DEFAULT_GENERATION_URL.to_string());

        let generation_timeout = env("GENERATION_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        let jwt_secret = env("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set, using development secret");
            DEV_JWT_SECRET.to_string()
        });

        let trending_limit = env("TRENDING_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TRENDING_LIMIT);

        Config {
            database_url,
            port,
            static_dir,
            gemini_api_key,
            generation_url,
            generation_timeout,
            jwt_secret,
            trending_limit,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(args: &[&str], vars: &[(&str, &str)]) -> Config {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_sources(&args, |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load_with(&["storyhub-backend"], &[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, "sqlite:storyhub.db?mode=rwc");
        assert_eq!(config.generation_url, DEFAULT_GENERATION_URL);
        assert_eq!(config.generation_timeout, Duration::from_secs(60));
        assert_eq!(config.trending_limit, DEFAULT_TRENDING_LIMIT);
        assert!(config.gemini_api_key.is_none());
        assert!(config.static_dir.is_none());
    }

    #[test]
    fn test_cli_port_overrides_env() {
        let config = load_with(&["bin", "--port", "8080"], &[("PORT", "9000")]);
        assert_eq!(config.port, 8080);

        let config = load_with(&["bin"], &[("PORT", "9000")]);
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_env_values() {
        let config = load_with(
            &["bin"],
            &[
                ("GEMINI_API_KEY", "abc"),
                ("TRENDING_LIMIT", "10"),
                ("GENERATION_TIMEOUT_SECS", "5"),
                ("STATIC_DIR", "../frontend/dist"),
            ],
        );
        assert_eq!(config.gemini_api_key.as_deref(), Some("abc"));
        assert_eq!(config.trending_limit, 10);
        assert_eq!(config.generation_timeout, Duration::from_secs(5));
        assert_eq!(config.static_dir, Some(PathBuf::from("../frontend/dist")));
    }

    #[test]
    fn test_empty_api_key_is_none() {
        let config = load_with(&["bin"], &[("GEMINI_API_KEY", "")]);
        assert!(config.gemini_api_key.is_none());
    }
}
