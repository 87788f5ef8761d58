//! Server configuration loaded from environment variables.

use anyhow::Context;

/// Deployment environment. Controls webhook verification strictness, the
/// debug surface, and admin endpoint gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub stripe_secret_key: String,
    /// Required in production; optional in development, where missing
    /// means webhook deliveries are accepted unverified.
    pub stripe_webhook_secret: Option<String>,
    pub http_port: u16,
    pub environment: Environment,
    /// Token gating project registration. When unset, registration is
    /// open in development and refused in production.
    pub admin_token: Option<String>,
    pub rate_limit_per_minute: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let stripe_secret_key =
            std::env::var("STRIPE_SECRET_KEY").context("STRIPE_SECRET_KEY must be set")?;

        let environment = match std::env::var("ENVIRONMENT").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        let stripe_webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        if environment.is_production() && stripe_webhook_secret.is_none() {
            anyhow::bail!("STRIPE_WEBHOOK_SECRET must be set in production");
        }

        let http_port = match std::env::var("HTTP_PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("HTTP_PORT is not a valid port: {}", raw))?,
            Err(_) => 8080,
        };

        let admin_token = std::env::var("ADMIN_TOKEN").ok().filter(|s| !s.is_empty());

        let rate_limit_per_minute =
            parse_rate_limit(std::env::var("RATE_LIMIT_PER_MINUTE").ok())?;

        Ok(Self {
            database_url,
            stripe_secret_key,
            stripe_webhook_secret,
            http_port,
            environment,
            admin_token,
            rate_limit_per_minute,
        })
    }
}

/// Per-project request budget per minute when `RATE_LIMIT_PER_MINUTE`
/// is not set.
const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 60;

fn parse_rate_limit(raw: Option<String>) -> anyhow::Result<u32> {
    match raw {
        Some(raw) => raw.parse().with_context(|| {
            format!("RATE_LIMIT_PER_MINUTE is not a valid count: {}", raw)
        }),
        None => Ok(DEFAULT_RATE_LIMIT_PER_MINUTE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_defaults_to_sixty() {
        assert_eq!(parse_rate_limit(None).unwrap(), 60);
    }

    #[test]
    fn rate_limit_honors_override() {
        assert_eq!(parse_rate_limit(Some("120".to_string())).unwrap(), 120);
    }

    #[test]
    fn rate_limit_rejects_garbage() {
        assert!(parse_rate_limit(Some("lots".to_string())).is_err());
    }
}

