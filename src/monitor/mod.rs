//! Actuator protection: gain-monitor model autoswitching and the hard clipper.

pub mod gain_monitor;
pub mod hard_clipper;

pub use gain_monitor::{GainMonitorConfig, GAIN_MONITOR_RECORD_LEN};
pub use hard_clipper::{
    decode_threshold, encode_threshold, HardClipperConfig, CLIPPER_COUNTER_MASK,
    MAX_HARD_CLIPPER_CONFIGS,
};
