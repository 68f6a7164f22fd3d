use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

/// Where and how daily price history is fetched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Appended to the caller's stock code to form the exchange symbol,
    /// e.g. `7203` + `.T`.
    pub ticker_suffix: String,
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            ticker_suffix: ".T".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36".to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::new("provider.toml", FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("PROVIDER"))
            .build()?;

        cfg.try_deserialize()
    }
}
