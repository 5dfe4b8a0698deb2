use std::env;

use config_crate::{Config as RawConfig, ConfigError, Environment, File};

enum Env {
    Development,
    Test,
    Production,
}

impl Env {
    fn new() -> Self {
        match env::var("RUN_MODE") {
            Ok(ref s) if s == "test" => Env::Test,
            Ok(ref s) if s == "production" => Env::Production,
            _ => Env::Development,
        }
    }

    fn to_string(&self) -> &'static str {
        match self {
            &Env::Development => "development",
            &Env::Production => "production",
            &Env::Test => "test",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Database {
    pub dsn: String,
    pub pool_size: u32,
}

/// Worker threads running blocking store work.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CpuPoolConfig {
    pub threads: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payments {
    /// Secret shared with the payment provider for webhook signatures
    pub webhook_secret: String,
    /// Maximum age of a webhook signature, in seconds
    pub webhook_tolerance_secs: i64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Database settings
    pub db: Database,
    pub pool: CpuPoolConfig,
    pub payments: Payments,
}

impl Config {
    /// Creates config from base.toml, which are overwritten by <env>.toml, where
    /// env is one of development, test, production. After that it could be overwritten
    /// by env variables like MK_ORDERS_DB__DSN (this will override `db.dsn` field in config)
    pub fn new() -> Result<Self, ConfigError> {
        let env = Env::new();
        let mut s = RawConfig::new();

        s.merge(File::with_name("config/base"))?;
        // Optional file specific for environment
        s.merge(File::with_name(&format!("config/{}", env.to_string())).required(false))?;

        // Add in settings from the environment (with a prefix of MK_ORDERS)
        s.merge(Environment::with_prefix("MK_ORDERS").separator("__"))?;

        s.try_into()
    }
}
