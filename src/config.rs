use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub leave_type_cache_ttl_secs: u64,
    pub log_dir: String,
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} must be set"))
}

fn parse_var<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{name} has invalid value '{v}'")),
    }
}

fn optional<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_var(name, env::var(name).ok(), default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: optional("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: optional("REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: optional("RATE_LOGIN_PER_MIN", 60)?,
            rate_refresh_per_min: optional("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: optional("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            db_max_connections: optional("DB_MAX_CONNECTIONS", 10)?,
            run_migrations: optional("RUN_MIGRATIONS", true)?,
            leave_type_cache_ttl_secs: optional("LEAVE_TYPE_CACHE_TTL_SECS", 300)?,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_value_falls_back_to_default() {
        assert_eq!(parse_var("ACCESS_TOKEN_TTL", None, 900usize).unwrap(), 900);
    }

    #[test]
    fn present_value_is_parsed_and_trimmed() {
        assert_eq!(parse_var("DB_MAX_CONNECTIONS", Some(" 25 ".into()), 10u32).unwrap(), 25);
        assert!(!parse_var("RUN_MIGRATIONS", Some("false".into()), true).unwrap());
    }

    #[test]
    fn bad_value_names_the_variable() {
        let err = parse_var("RATE_LOGIN_PER_MIN", Some("lots".into()), 60u32).unwrap_err();
        assert!(err.to_string().contains("RATE_LOGIN_PER_MIN"));
    }
}
