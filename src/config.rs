// Configuration module for watchlog
// Handles XDG-compliant directory paths and TOML configuration file

use serde::Deserialize;
use std::path::PathBuf;

const APP_NAME: &str = "watchlog";
const CONFIG_FILENAME: &str = "config.toml";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Sync server configuration
    pub server: ServerConfig,

    /// Client-side sync configuration
    pub client: ClientConfig,

    /// Directory paths (overrides XDG defaults)
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server port (default: 8799)
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    pub bind_address: String,

    /// Expected Authorization header value. When unset the server runs in
    /// open mode and accepts any non-empty token.
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8799,
            bind_address: "0.0.0.0".to_string(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the sync server (e.g. "https://sync.example.com").
    /// When unset the client runs local-only.
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Override data directory (database + local store location)
    pub data_dir: Option<PathBuf>,

    /// Override config directory
    pub config_dir: Option<PathBuf>,
}

/// Application paths following XDG Base Directory Specification on Unix
/// On other platforms, falls back to platform-specific locations
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for configuration files (config.toml)
    /// XDG: $XDG_CONFIG_HOME/watchlog or ~/.config/watchlog
    pub config_dir: PathBuf,

    /// Directory for persistent data (database, local store)
    /// XDG: $XDG_DATA_HOME/watchlog or ~/.local/share/watchlog
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Create application paths using XDG directories (or fallbacks)
    ///
    /// Priority order:
    /// 1. Environment variables (WATCHLOG_CONFIG_DIR, WATCHLOG_DATA_DIR)
    /// 2. Config file overrides
    /// 3. XDG/platform directories
    /// 4. Current directory fallback
    pub fn new(config_overrides: &PathsConfig) -> Self {
        Self {
            config_dir: Self::resolve_config_dir(&config_overrides.config_dir),
            data_dir: Self::resolve_data_dir(&config_overrides.data_dir),
        }
    }

    /// Create application paths using current directory (portable mode)
    pub fn current_dir() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            config_dir: cwd.clone(),
            data_dir: cwd,
        }
    }

    fn resolve_config_dir(config_override: &Option<PathBuf>) -> PathBuf {
        if let Ok(path) = std::env::var("WATCHLOG_CONFIG_DIR") {
            return PathBuf::from(path);
        }

        if let Some(ref path) = config_override {
            return path.clone();
        }

        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    fn resolve_data_dir(config_override: &Option<PathBuf>) -> PathBuf {
        if let Ok(path) = std::env::var("WATCHLOG_DATA_DIR") {
            return PathBuf::from(path);
        }

        if let Some(ref path) = config_override {
            return path.clone();
        }

        if let Some(dir) = dirs::data_dir() {
            return dir.join(APP_NAME);
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Get the database file path (server side)
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("watchlog.db")
    }

    /// Get the database URL for SQLite
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.database_path().display())
    }

    /// Get the local key-value store file path (client side)
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    /// Get the config file path
    pub fn config_file_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILENAME)
    }

    /// Ensure all directories exist
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.config_dir).await?;
        tokio::fs::create_dir_all(&self.data_dir).await?;
        Ok(())
    }

    /// Log the configured paths
    pub fn log_paths(&self) {
        tracing::info!("Configuration directory: {}", self.config_dir.display());
        tracing::info!("Data directory: {}", self.data_dir.display());
        tracing::debug!("Database path: {}", self.database_path().display());
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new(&PathsConfig::default())
    }
}

/// Application configuration - combines TOML file with environment overrides
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Application paths
    pub paths: AppPaths,

    /// Server port
    pub port: u16,

    /// Bind address
    pub bind_address: String,

    /// Expected Authorization header value (None = open mode)
    pub api_token: Option<String>,

    /// Sync server base URL for the client (None = local-only)
    pub api_base: Option<String>,
}

impl AppConfig {
    /// Load configuration from TOML file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML config file
    /// 3. Default values
    pub fn load() -> Self {
        let portable_mode = std::env::var("WATCHLOG_PORTABLE")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        if portable_mode {
            tracing::info!("Running in portable mode (using current directory)");
            return Self::portable();
        }

        let config_dir = Self::find_config_dir();
        let config_file = Self::load_config_file(&config_dir);
        Self::build(config_file)
    }

    /// Create a portable configuration (current directory for everything)
    fn portable() -> Self {
        Self {
            paths: AppPaths::current_dir(),
            port: Self::env_port().unwrap_or(8799),
            bind_address: Self::env_bind_address().unwrap_or_else(|| "0.0.0.0".to_string()),
            api_token: std::env::var("WATCHLOG_API_TOKEN").ok(),
            api_base: std::env::var("WATCHLOG_API_BASE").ok(),
        }
    }

    /// Find the config directory (for locating config.toml)
    fn find_config_dir() -> PathBuf {
        if let Ok(path) = std::env::var("WATCHLOG_CONFIG_DIR") {
            return PathBuf::from(path);
        }

        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }

        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Load and parse the TOML config file
    fn load_config_file(config_dir: &std::path::Path) -> ConfigFile {
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_path.exists() {
            tracing::debug!(
                "No config file found at {}, using defaults",
                config_path.display()
            );
            return ConfigFile::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config file {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    ConfigFile::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                ConfigFile::default()
            }
        }
    }

    /// Build configuration from config file with environment overrides
    fn build(config_file: ConfigFile) -> Self {
        let paths = AppPaths::new(&config_file.paths);

        let port = Self::env_port().unwrap_or(config_file.server.port);

        let bind_address =
            Self::env_bind_address().unwrap_or_else(|| config_file.server.bind_address.clone());

        let api_token = std::env::var("WATCHLOG_API_TOKEN")
            .ok()
            .or(config_file.server.api_token);

        let api_base = std::env::var("WATCHLOG_API_BASE")
            .ok()
            .or(config_file.client.api_base);

        Self {
            paths,
            port,
            bind_address,
            api_token,
            api_base,
        }
    }

    fn env_port() -> Option<u16> {
        std::env::var("WATCHLOG_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
    }

    fn env_bind_address() -> Option<String> {
        std::env::var("WATCHLOG_BIND_ADDRESS").ok()
    }

    /// Get the database URL, with override from DATABASE_URL env var
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.paths.database_url())
    }

    /// Log configuration status
    pub fn log_config(&self) {
        self.paths.log_paths();
        tracing::info!("Server listening on {}:{}", self.bind_address, self.port);

        if self.api_token.is_some() {
            tracing::info!("Auth: fixed token required");
        } else {
            tracing::info!("Auth: open mode (any non-empty token accepted)");
            tracing::info!("Hint: set api_token in config.toml or WATCHLOG_API_TOKEN to lock it down");
        }

        match self.api_base {
            Some(ref base) => tracing::info!("Client sync target: {}", base),
            None => tracing::debug!("Client sync target: none (local-only)"),
        }
    }
}
