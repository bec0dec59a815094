use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct OutreachConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    pub model: String,
    pub batch_size: u32,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            batch_size: 3,
            max_retries: 3,
            retry_delay_ms: 1000,
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuotaConfig {
    pub daily_limit: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { daily_limit: 25 }
    }
}

impl OutreachConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Batch size of zero would make the orchestrator loop forever.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.batch_size == 0 {
            return Err(ConfigError::Message(
                "generation.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.quota.daily_limit <= 0 {
            return Err(ConfigError::Message(
                "quota.daily_limit must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(batch_size: u32, daily_limit: i64) -> OutreachConfig {
        OutreachConfig {
            service: ServiceConfig {
                host: "127.0.0.1".to_string(),
                port: 8790,
                log_level: "info".to_string(),
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/outreach".to_string(),
                max_connections: 5,
            },
            auth: AuthConfig {
                base_url: "http://127.0.0.1:9000".to_string(),
            },
            generation: GenerationConfig {
                batch_size,
                ..GenerationConfig::default()
            },
            quota: QuotaConfig { daily_limit },
        }
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = base_config(0, 25);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_limit() {
        let config = base_config(3, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let config = base_config(3, 25);
        assert!(config.validate().is_ok());
    }
}
