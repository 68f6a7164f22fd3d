use config::{Config, ConfigError, Environment, File, FileFormat};
use data_ingestion::config::ProviderConfig;
use feature_processing::misc::TargetAlignment;
use feature_processing::pipeline::DEFAULT_LOOKBACK_YEARS;
use reqwest::Url;
use serde::Deserialize;

/// Remote model endpoint and its credential.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub endpoint: String,
    pub api_key: String,
}

impl ScoringConfig {
    /// Reads `AZURE_ML_ENDPOINT` and `AZURE_ML_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(Environment::with_prefix("AZURE_ML"))
            .build()?;
        Self::from_config(cfg)
    }

    fn from_config(cfg: Config) -> Result<Self, ConfigError> {
        let scoring: Self = cfg.try_deserialize()?;
        scoring.validate()?;
        Ok(scoring)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Message(
                "scoring api_key must not be empty".to_string(),
            ));
        }
        let url = Url::parse(self.endpoint.trim()).map_err(|e| {
            ConfigError::Message(format!("scoring endpoint {:?} is not a URL: {}", self.endpoint, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Message(format!(
                "scoring endpoint must be http(s), got {}",
                url.scheme()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub lookback_years: u32,
    pub target_alignment: TargetAlignment,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            lookback_years: DEFAULT_LOOKBACK_YEARS,
            target_alignment: TargetAlignment::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::new("server.toml", FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("SERVER").try_parsing(true))
            .build()?;
        Self::from_config(cfg)
    }

    fn from_config(cfg: Config) -> Result<Self, ConfigError> {
        let server: Self = cfg.try_deserialize()?;
        if server.lookback_years == 0 {
            return Err(ConfigError::Message(
                "lookback_years must be at least 1".to_string(),
            ));
        }
        Ok(server)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Everything the process reads at startup. Loaded once in `main`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub scoring: ScoringConfig,
    pub provider: ProviderConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            scoring: ScoringConfig::from_env()?,
            provider: ProviderConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toml(source: &str) -> Config {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .unwrap()
    }

    #[test]
    fn server_defaults() {
        let server = ServerConfig::from_config(toml("")).unwrap();
        assert_eq!(server.bind_addr(), "0.0.0.0:8000");
        assert_eq!(server.lookback_years, 3);
        assert_eq!(server.target_alignment, TargetAlignment::CalendarDays);
    }

    #[test]
    fn server_overrides() {
        let server = ServerConfig::from_config(toml(
            "port = 9100\nlookback_years = 5\ntarget_alignment = \"next_row\"",
        ))
        .unwrap();
        assert_eq!(server.port, 9100);
        assert_eq!(server.lookback_years, 5);
        assert_eq!(server.target_alignment, TargetAlignment::NextRow);
    }

    #[test]
    fn zero_lookback_is_rejected() {
        assert!(ServerConfig::from_config(toml("lookback_years = 0")).is_err());
    }

    #[test]
    fn scoring_requires_both_values() {
        assert!(ScoringConfig::from_config(toml("endpoint = \"https://ml.example/score\"")).is_err());
        assert!(ScoringConfig::from_config(toml("api_key = \"secret\"")).is_err());

        let scoring = ScoringConfig::from_config(toml(
            "endpoint = \"https://ml.example/score\"\napi_key = \"secret\"",
        ))
        .unwrap();
        assert_eq!(scoring.endpoint, "https://ml.example/score");
    }

    #[test]
    fn scoring_rejects_blank_key_and_bad_urls() {
        assert!(ScoringConfig::from_config(toml(
            "endpoint = \"https://ml.example/score\"\napi_key = \"  \""
        ))
        .is_err());
        assert!(ScoringConfig::from_config(toml("endpoint = \"\"\napi_key = \"secret\"")).is_err());
        assert!(ScoringConfig::from_config(toml(
            "endpoint = \"ftp://ml.example/score\"\napi_key = \"secret\""
        ))
        .is_err());
    }
}
