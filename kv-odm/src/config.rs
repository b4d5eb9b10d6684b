use std::str::FromStr;

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Engine {
    Memory,
    Tikv,
}

impl FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Engine::Memory),
            "tikv" => Ok(Engine::Tikv),
            other => Err(Error::UnsupportedEngine(other.to_string())),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Memory => write!(f, "memory"),
            Engine::Tikv => write!(f, "tikv"),
        }
    }
}

/// Connection settings. Read from `DATABASE_*` environment variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub engine: Engine,
    /// One host or a comma separated list of hosts.
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Namespace prefixed to every stored key.
    pub name: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Memory,
            host: "127.0.0.1".to_string(),
            port: 2379,
            username: None,
            password: None,
            name: None,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source; unset or empty variables
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = StoreConfig::default();

        if let Some(engine) = var("DATABASE_ENGINE") {
            config.engine = engine.parse()?;
        }
        if let Some(host) = var("DATABASE_HOST") {
            config.host = host;
        }
        if let Some(port) = var("DATABASE_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("DATABASE_PORT '{}': {}", port, e)))?;
        }
        config.username = var("DATABASE_USERNAME");
        config.password = var("DATABASE_PASSWORD");
        config.name = var("DATABASE_NAME");
        Ok(config)
    }

    /// `host:port` for every configured host; hosts that already carry a
    /// port keep it.
    pub fn endpoints(&self) -> Vec<String> {
        self.host
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| {
                if h.contains(':') {
                    h.to_string()
                } else {
                    format!("{}:{}", h, self.port)
                }
            })
            .collect()
    }
}
