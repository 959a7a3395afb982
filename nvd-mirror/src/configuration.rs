use std::path::PathBuf;

use config::{Config, Environment};
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    host: String,
    port: u16,
    user: String,
    password: String,
    database: String,
}

impl DatabaseSettings {
    pub fn try_from_env() -> Result<Self, config::ConfigError> {
        Config::builder()
            .set_default("port", 5432)?
            .add_source(Environment::with_prefix("DB").prefix_separator("_"))
            .build()?
            .try_deserialize::<Self>()
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct MirrorSettings {
    pub path: PathBuf,
}

impl MirrorSettings {
    pub fn try_from_env() -> Result<Self, config::ConfigError> {
        Config::builder()
            .set_default("path", "./mirror")?
            .add_source(Environment::with_prefix("MIRROR").prefix_separator("_"))
            .build()?
            .try_deserialize::<Self>()
    }
}
