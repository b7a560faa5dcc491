use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Ten years.
pub const MAX_API_KEY_TTL_HOURS: u64 = 10 * 365 * 24;
/// One year.
pub const MAX_SHARE_TOKEN_TTL_MINUTES: u64 = 365 * 24 * 60;

#[derive(Parser, Debug)]
#[command(name = "hearth", about = "A shared household list server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub rooms: RoomsConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allow any origin; for a browser client served from elsewhere.
    pub cors_permissive: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub api_key_ttl_hours: u64,
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RoomsConfig {
    pub share_token_ttl_minutes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_permissive: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key_ttl_hours: 720,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            share_token_ttl_minutes: 24 * 60,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli)?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("hearth.db"));
        }

        if !(4..=31).contains(&config.auth.bcrypt_cost) {
            anyhow::bail!(
                "auth.bcrypt_cost must be between 4 and 31, got {}",
                config.auth.bcrypt_cost
            );
        }
        if !(1..=MAX_API_KEY_TTL_HOURS).contains(&config.auth.api_key_ttl_hours) {
            anyhow::bail!(
                "auth.api_key_ttl_hours must be between 1 and {}, got {}",
                MAX_API_KEY_TTL_HOURS,
                config.auth.api_key_ttl_hours
            );
        }
        if !(1..=MAX_SHARE_TOKEN_TTL_MINUTES).contains(&config.rooms.share_token_ttl_minutes) {
            anyhow::bail!(
                "rooms.share_token_ttl_minutes must be between 1 and {}, got {}",
                MAX_SHARE_TOKEN_TTL_MINUTES,
                config.rooms.share_token_ttl_minutes
            );
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match &cli.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".hearth"))
                .ok_or_else(|| anyhow::anyhow!("Could not determine home directory")),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("hearth.db"))
    }
}
