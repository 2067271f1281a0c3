//! # Ledger Configuration
//!
//! ## Where Settings Come From
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Higher entries win                                   │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     PEARL_DB_PATH=./data/pearl.db                                       │
//! │     PEARL_UTC_OFFSET_MINUTES=420                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/pearl-pos/ledger.toml (Linux)                             │
//! │     ~/Library/Application Support/com.pearl.pos/ledger.toml (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     UTC store, sequences start after 125, codes like #0126              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ledger.toml
//! ```toml
//! # ledger.toml
//! [store]
//! name = "Pearl Tea Downtown"
//! utc_offset_minutes = 420
//!
//! [orders]
//! initial_sequence = 125
//! code_prefix = "#"
//! code_width = 4
//!
//! [database]
//! path = "/var/lib/pearl/pearl.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [alerts]
//! sweep_interval_secs = 300
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use pearl_core::{BusinessCalendar, OrderCodeFormat, DEFAULT_INITIAL_SEQUENCE};
use pearl_db::DbConfig;

/// Largest zero-padding width accepted for order codes.
const MAX_CODE_WIDTH: usize = 12;

/// Path value that selects an in-memory database.
const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Store Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Display name, only used in logs.
    #[serde(default = "default_store_name")]
    pub name: String,

    /// Minutes east of UTC. Decides which calendar day an order belongs to.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_store_name() -> String {
    "Pearl POS".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: default_store_name(),
            utc_offset_minutes: 0,
        }
    }
}

// =============================================================================
// Order Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSettings {
    /// The first order of a day gets `initial_sequence + 1`.
    #[serde(default = "default_initial_sequence")]
    pub initial_sequence: i64,

    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,

    #[serde(default = "default_code_width")]
    pub code_width: usize,
}

fn default_initial_sequence() -> i64 {
    DEFAULT_INITIAL_SEQUENCE
}

fn default_code_prefix() -> String {
    "#".to_string()
}

fn default_code_width() -> usize {
    4
}

impl Default for OrderSettings {
    fn default() -> Self {
        OrderSettings {
            initial_sequence: default_initial_sequence(),
            code_prefix: default_code_prefix(),
            code_width: default_code_width(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. `None` uses the platform data directory;
    /// `":memory:"` opens a throwaway in-memory database.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits for the SQLite write lock before failing
    /// with a retryable error.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

// =============================================================================
// Alert Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSettings {
    /// Interval of the background low-stock sweep. 0 disables it.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for AlertSettings {
    fn default() -> Self {
        AlertSettings {
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// =============================================================================
// Main Ledger Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub orders: OrderSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub alerts: AlertSettings,
}

impl LedgerConfig {
    /// Defaults with an in-memory database. Used by tests and demos.
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.database.path = Some(PathBuf::from(MEMORY_PATH));
        config.alerts.sweep_interval_secs = 0;
        config
    }

    /// Defaults, then `ledger.toml` (explicit path or the platform config
    /// dir), then `PEARL_*` variables. The result is validated.
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "No ledger config file, keeping defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// [`LedgerConfig::load`], falling back to defaults with a warning.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Ledger config unusable, falling back to defaults");
            Self::default()
        })
    }

    pub fn from_toml(contents: &str) -> LedgerResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Writes the config as TOML, creating parent directories.
    pub fn save(&self, config_path: Option<PathBuf>) -> LedgerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| LedgerError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    pub fn validate(&self) -> LedgerResult<()> {
        self.calendar()?;

        if self.orders.initial_sequence < 0 {
            return Err(LedgerError::Config(
                "orders.initial_sequence must not be negative".into(),
            ));
        }

        if self.orders.code_width > MAX_CODE_WIDTH {
            return Err(LedgerError::Config(format!(
                "orders.code_width must be at most {}",
                MAX_CODE_WIDTH
            )));
        }

        if self.database.max_connections == 0 {
            return Err(LedgerError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `PEARL_*` overrides from `lookup`. Unparseable values are
    /// logged and ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("PEARL_STORE_NAME") {
            self.store.name = name;
        }

        if let Some(offset) = lookup("PEARL_UTC_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(minutes) => {
                    debug!(minutes, "Overriding store UTC offset from environment");
                    self.store.utc_offset_minutes = minutes;
                }
                Err(_) => warn!(value = %offset, "Ignoring invalid PEARL_UTC_OFFSET_MINUTES"),
            }
        }

        if let Some(initial) = lookup("PEARL_INITIAL_SEQUENCE") {
            match initial.parse::<i64>() {
                Ok(value) => self.orders.initial_sequence = value,
                Err(_) => warn!(value = %initial, "Ignoring invalid PEARL_INITIAL_SEQUENCE"),
            }
        }

        if let Some(prefix) = lookup("PEARL_CODE_PREFIX") {
            self.orders.code_prefix = prefix;
        }

        if let Some(path) = lookup("PEARL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(secs) = lookup("PEARL_ALERT_SWEEP_SECS") {
            match secs.parse::<u64>() {
                Ok(value) => self.alerts.sweep_interval_secs = value,
                Err(_) => warn!(value = %secs, "Ignoring invalid PEARL_ALERT_SWEEP_SECS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "pearl", "pos")
            .map(|dirs| dirs.config_dir().join("ledger.toml"))
    }

    fn default_database_path() -> PathBuf {
        directories::ProjectDirs::from("com", "pearl", "pos")
            .map(|dirs| dirs.data_dir().join("pearl.db"))
            .unwrap_or_else(|| PathBuf::from("./pearl.db"))
    }

    // =========================================================================
    // Derived Settings
    // =========================================================================

    pub fn calendar(&self) -> LedgerResult<BusinessCalendar> {
        Ok(BusinessCalendar::from_offset_minutes(
            self.store.utc_offset_minutes,
        )?)
    }

    pub fn code_format(&self) -> OrderCodeFormat {
        OrderCodeFormat::new(self.orders.code_prefix.clone(), self.orders.code_width)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.alerts.sweep_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::default_database_path)
    }

    pub fn db_config(&self) -> DbConfig {
        let path = self.database_path();
        let busy_timeout = Duration::from_millis(self.database.busy_timeout_ms);

        if path.as_os_str() == MEMORY_PATH {
            return DbConfig::in_memory().busy_timeout(busy_timeout);
        }

        DbConfig::new(path)
            .max_connections(self.database.max_connections)
            .busy_timeout(busy_timeout)
    }
}
