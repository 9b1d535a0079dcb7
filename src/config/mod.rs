//! Configuration module for the bookshelf backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Root directory for uploaded media (book cover images)
    pub media_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("BOOKSHELF_DB_PATH")
            .unwrap_or_else(|_| "./data/catalog.sqlite".to_string())
            .into();

        let media_path = env::var("BOOKSHELF_MEDIA_PATH")
            .unwrap_or_else(|_| "./data/media".to_string())
            .into();

        let bind_addr = env::var("BOOKSHELF_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid BOOKSHELF_BIND_ADDR format");

        let log_level = env::var("BOOKSHELF_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            db_path,
            media_path,
            bind_addr,
            log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("BOOKSHELF_DB_PATH");
        env::remove_var("BOOKSHELF_MEDIA_PATH");
        env::remove_var("BOOKSHELF_BIND_ADDR");
        env::remove_var("BOOKSHELF_LOG_LEVEL");

        let config = Config::from_env();

        assert_eq!(config.db_path, PathBuf::from("./data/catalog.sqlite"));
        assert_eq!(config.media_path, PathBuf::from("./data/media"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
    }
}
