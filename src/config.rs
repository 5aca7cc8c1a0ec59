//! Driver settings using Figment
//!
//! Settings are loaded from:
//! 1. a TOML file (base configuration)
//! 2. Environment variables (prefixed with ADRV_DPD_, nested keys separated by `__`)
//!
//! Every field has a default, so an empty or missing file yields
//! [`DriverSettings::default`].
//!
//! # Example
//! ```no_run
//! use adrv9025_dpd::config::DriverSettings;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = DriverSettings::load_from("config/dpd.toml")?;
//! settings.validate()?;
//! println!("range checks: {}", settings.validation.range_check);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level driver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Parameter validation
    #[serde(default)]
    pub validation: ValidationSettings,
    /// LUT access policies
    #[serde(default)]
    pub lut: LutSettings,
    /// Mailbox status-wait budgets
    #[serde(default)]
    pub mailbox: MailboxSettings,
    /// Actuator clock polling
    #[serde(default)]
    pub clock: ClockSettings,
}

/// Parameter validation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Run range checks before touching hardware
    #[serde(default = "default_true")]
    pub range_check: bool,
    /// Tx channels initialised on the device (bit mask); actuator enable is
    /// refused for channels outside it
    #[serde(default = "default_initialized_tx")]
    pub initialized_tx_mask: u8,
}

/// Where the swap-mode flag is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapModeSource {
    /// Session-local mirror of the last value written
    #[default]
    Cache,
    /// Re-read the firmware config object
    Device,
}

/// LUT access settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LutSettings {
    /// Restore the LUT's previous power state at the end of a LUT write
    #[serde(default)]
    pub power_restore_on_write: bool,
    /// Source of the swap-mode flag reported by the session
    #[serde(default)]
    pub swap_mode_source: SwapModeSource,
}

/// Mailbox command timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxSettings {
    /// Status-wait timeout for ordinary commands, in microseconds
    #[serde(default = "default_timeout_us")]
    pub timeout_us: u64,
    /// Status-wait poll interval, in microseconds
    #[serde(default = "default_interval_us")]
    pub interval_us: u64,
    /// Status-wait timeout for LUT clear and multi-model promotion
    #[serde(default = "default_lut_update_timeout_us")]
    pub lut_update_timeout_us: u64,
}

/// Actuator clock polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSettings {
    /// Number of status reads before giving up
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
    /// Wait between status reads, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_initialized_tx() -> u8 {
    0x0F
}

fn default_timeout_us() -> u64 {
    1_000_000
}

fn default_interval_us() -> u64 {
    10_000
}

fn default_lut_update_timeout_us() -> u64 {
    5_000_000
}

fn default_poll_attempts() -> u32 {
    40
}

fn default_poll_interval_ms() -> u64 {
    1
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            range_check: true,
            initialized_tx_mask: default_initialized_tx(),
        }
    }
}

impl Default for LutSettings {
    fn default() -> Self {
        Self {
            power_restore_on_write: false,
            swap_mode_source: SwapModeSource::Cache,
        }
    }
}

impl Default for MailboxSettings {
    fn default() -> Self {
        Self {
            timeout_us: default_timeout_us(),
            interval_us: default_interval_us(),
            lut_update_timeout_us: default_lut_update_timeout_us(),
        }
    }
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            poll_attempts: default_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            validation: ValidationSettings::default(),
            lut: LutSettings::default(),
            mailbox: MailboxSettings::default(),
            clock: ClockSettings::default(),
        }
    }
}

impl DriverSettings {
    /// Load settings from a TOML file and environment variables
    ///
    /// Environment variables override the file with prefix ADRV_DPD_
    /// Example: ADRV_DPD_LUT__POWER_RESTORE_ON_WRITE=true
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    /// Figment with defaults, file and environment merged in that order.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(DriverSettings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ADRV_DPD_").split("__"))
    }

    /// Parse settings from a TOML string (no environment overlay).
    pub fn from_toml_str(toml: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(DriverSettings::default()))
            .merge(Toml::string(toml))
            .extract()
    }

    /// Validate settings after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.validation.initialized_tx_mask & !0x0F != 0 {
            return Err(format!(
                "initialized_tx_mask 0x{:02X} has bits outside Tx1..Tx4",
                self.validation.initialized_tx_mask
            ));
        }

        if self.mailbox.interval_us == 0 {
            return Err("mailbox.interval_us must be greater than 0".to_string());
        }

        if self.mailbox.interval_us > self.mailbox.timeout_us {
            return Err(format!(
                "mailbox.interval_us ({}) exceeds mailbox.timeout_us ({})",
                self.mailbox.interval_us, self.mailbox.timeout_us
            ));
        }

        if self.mailbox.interval_us > self.mailbox.lut_update_timeout_us {
            return Err(format!(
                "mailbox.interval_us ({}) exceeds mailbox.lut_update_timeout_us ({})",
                self.mailbox.interval_us, self.mailbox.lut_update_timeout_us
            ));
        }

        if self.clock.poll_attempts == 0 {
            return Err("clock.poll_attempts must be greater than 0".to_string());
        }

        Ok(())
    }
}
