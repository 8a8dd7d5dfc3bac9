use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::error::AppError;

/// Where conversations, messages and directory data live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local fakes; everything is lost on restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(AppError::Config(format!(
                "DM_STORAGE_BACKEND must be postgres or memory, got {other}"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    pub storage: StorageBackend,
    /// Present whenever `storage` is `Postgres`
    pub db: Option<DbConfig>,
    pub port: u16,
    /// Process-wide HMAC key for stored-message integrity tags
    pub integrity_key: Zeroizing<Vec<u8>>,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("storage", &self.storage)
            .field("db", &self.db)
            .field("port", &self.port)
            .field("integrity_key", &"[REDACTED]")
            .field("default_page_size", &self.default_page_size)
            .field("max_page_size", &self.max_page_size)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage = match lookup("DM_STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Postgres,
        };

        let db = match storage {
            StorageBackend::Postgres => {
                let database_url = lookup("DATABASE_URL")
                    .ok_or_else(|| AppError::Config("DATABASE_URL missing".into()))?;
                Some(DbConfig {
                    database_url,
                    max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS").unwrap_or(10),
                    min_connections: parse_var(&lookup, "DB_MIN_CONNECTIONS").unwrap_or(1),
                    acquire_timeout_secs: parse_var(&lookup, "DB_ACQUIRE_TIMEOUT_SECS").unwrap_or(10),
                })
            }
            StorageBackend::Memory => None,
        };

        let key_b64 = lookup("CONTENT_INTEGRITY_KEY")
            .ok_or_else(|| AppError::Config("CONTENT_INTEGRITY_KEY missing".into()))?;
        let integrity_key = Zeroizing::new(
            STANDARD
                .decode(key_b64.trim())
                .map_err(|_| AppError::Config("CONTENT_INTEGRITY_KEY invalid base64".into()))?,
        );
        if integrity_key.len() < crypto_core::integrity::MIN_SECRET_LEN {
            return Err(AppError::Config(format!(
                "CONTENT_INTEGRITY_KEY must decode to at least {} bytes",
                crypto_core::integrity::MIN_SECRET_LEN
            )));
        }

        let max_page_size: u32 = parse_var(&lookup, "DM_MAX_PAGE_SIZE").unwrap_or(100).max(1);
        let default_page_size: u32 = parse_var(&lookup, "DM_DEFAULT_PAGE_SIZE")
            .unwrap_or(50)
            .clamp(1, max_page_size);

        Ok(Self {
            storage,
            db,
            port: parse_var(&lookup, "PORT").unwrap_or(8085),
            integrity_key,
            default_page_size,
            max_page_size,
        })
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|v| v.trim().parse().ok())
}
