//! Capture configuration: range checks and config-object access.
//!
//! The whole record lives in the EXT_DPD_CAPTURE config object. Sub-record
//! setters write only their slice of the object, so a control update does not
//! disturb thresholds programmed earlier.

use super::codec::{self, CAPTURE_RECORD_LEN, CTRL_LEN, CTRL_OFFSET, LEVEL_LEN, LEVEL_OFFSET, THRESH_LEN};
use super::trigger::CaptureState;
use super::types::{
    CaptureConfig, CaptureCtrl, CaptureLevel, CapturePathDelay, CapturePwrThresh, CaptureType,
    ThresholdBand,
};
use crate::error::{DpdError, Result};
use crate::gpio::{GpioPin, DONE_PIN_SCAN_MAX, GPIO_MAX};
use crate::session::DpdSession;
use crate::transport::regmap::object;
use crate::transport::Transport;
use tracing::{debug, info};

/// Largest peak decay and interpolation index.
pub const MAX_NIBBLE: u8 = 15;
/// Largest 24-bit counter value (peak window, capture delay).
pub const MAX_COUNTER_24: u32 = 0x00FF_FFFF;
/// Largest Tx/ORx alignment delay.
pub const MAX_ALIGN_DELAY: u16 = 8191;
/// Largest extended peak-search window.
pub const MAX_EXTENDED_WINDOW_US: u32 = 15_000_000;
/// Largest power pulse width.
pub const MAX_PULSE_WIDTH: u16 = 4096;

/// Range check a complete capture configuration.
pub fn validate_capture_config(config: &CaptureConfig) -> Result<()> {
    validate_capture_ctrl(&config.ctrl)?;
    validate_path_delay(&config.path_delay)?;
    for band in ThresholdBand::ALL {
        validate_pwr_thresh(config.thresh(band))?;
    }
    validate_trigger_pin(config.trigger_pin)?;
    validate_done_pin(config.done_pin)?;

    if config.trigger_pin.is_valid() && config.trigger_pin == config.done_pin {
        return Err(DpdError::invalid(
            "triggerPin",
            config.trigger_pin,
            "capture trigger and capture done cannot share a GPIO",
        ));
    }
    Ok(())
}

/// Range check the control record.
pub fn validate_capture_ctrl(ctrl: &CaptureCtrl) -> Result<()> {
    if ctrl.peak.decay > MAX_NIBBLE {
        return Err(DpdError::invalid("peakDecay", ctrl.peak.decay, "must be 0..=15"));
    }
    if ctrl.peak.window_count > MAX_COUNTER_24 {
        return Err(DpdError::invalid(
            "peakWindowCount",
            ctrl.peak.window_count,
            "must be 0..=16777215",
        ));
    }
    if ctrl.align_delay > MAX_ALIGN_DELAY {
        return Err(DpdError::invalid("alignDelay", ctrl.align_delay, "must be 0..=8191"));
    }
    if ctrl.capture_delay > MAX_COUNTER_24 {
        return Err(DpdError::invalid(
            "captureDelay",
            ctrl.capture_delay,
            "must be 0..=16777215",
        ));
    }
    if ctrl.capture_type == CaptureType::ExtendedPeakSearch
        && ctrl.peak.extended_window_us > MAX_EXTENDED_WINDOW_US
    {
        return Err(DpdError::invalid(
            "extendedWindowUs",
            ctrl.peak.extended_window_us,
            "must be 0..=15000000",
        ));
    }
    Ok(())
}

/// Range check the path delay record.
pub fn validate_path_delay(delay: &CapturePathDelay) -> Result<()> {
    if delay.interpolation_index > MAX_NIBBLE {
        return Err(DpdError::invalid(
            "interpolationIndex",
            delay.interpolation_index,
            "must be 0..=15",
        ));
    }
    Ok(())
}

/// Range check a power threshold record.
pub fn validate_pwr_thresh(thresh: &CapturePwrThresh) -> Result<()> {
    if thresh.low_to_high_pulse_width > MAX_PULSE_WIDTH {
        return Err(DpdError::invalid(
            "lowToHighPulseWidth",
            thresh.low_to_high_pulse_width,
            "must be 0..=4096",
        ));
    }
    if thresh.high_to_low_pulse_width > MAX_PULSE_WIDTH {
        return Err(DpdError::invalid(
            "highToLowPulseWidth",
            thresh.high_to_low_pulse_width,
            "must be 0..=4096",
        ));
    }
    Ok(())
}

fn validate_trigger_pin(pin: GpioPin) -> Result<()> {
    match pin.number() {
        Some(n) if n > DONE_PIN_SCAN_MAX => Err(DpdError::invalid(
            "triggerPin",
            pin,
            "must be GPIO00..GPIO15 or invalid",
        )),
        _ => Ok(()),
    }
}

fn validate_done_pin(pin: GpioPin) -> Result<()> {
    match pin.number() {
        Some(n) if n > GPIO_MAX => Err(DpdError::invalid(
            "donePin",
            pin,
            "must be GPIO00..GPIO18 or invalid",
        )),
        _ => Ok(()),
    }
}

impl<T: Transport> DpdSession<T> {
    /// Program the full capture configuration, including both GPIO pins.
    ///
    /// On success the capture state becomes `Configured`, which also clears
    /// a previous `Error` state.
    pub fn set_capture_config(&mut self, config: &CaptureConfig) -> Result<()> {
        if self.range_check() {
            validate_capture_config(config)?;
        }

        let result = self.write_capture_config(config);
        self.track("set capture config", result)?;

        self.capture_state = CaptureState::Configured;
        info!(
            channel = %config.ctrl.channel,
            capture_type = %config.ctrl.capture_type,
            samples = config.ctrl.size.samples(),
            trigger_pin = %config.trigger_pin,
            done_pin = %config.done_pin,
            "Capture configured"
        );
        Ok(())
    }

    fn write_capture_config(&mut self, config: &CaptureConfig) -> Result<()> {
        self.setup_trigger_pin(config.trigger_pin)?;
        self.setup_done_status_pin(config.done_pin)?;
        let record = codec::encode_config(config);
        self.transport
            .config_write(object::EXT_DPD_CAPTURE, 0, &record)?;
        Ok(())
    }

    /// Read back the capture configuration.
    ///
    /// The trigger pin comes from the session cache, the done pin from the
    /// shared-resource table.
    pub fn capture_config(&mut self) -> Result<CaptureConfig> {
        let result = self.read_capture_config();
        self.track("get capture config", result)
    }

    fn read_capture_config(&mut self) -> Result<CaptureConfig> {
        let done_pin = self.done_status_pin()?;
        let mut record = [0u8; CAPTURE_RECORD_LEN];
        self.transport
            .config_read(object::EXT_DPD_CAPTURE, 0, &mut record)?;
        codec::decode_config(&record, self.trigger_pin, done_pin)
    }

    /// Write only the control record.
    pub fn set_capture_ctrl(&mut self, ctrl: &CaptureCtrl) -> Result<()> {
        if self.range_check() {
            validate_capture_ctrl(ctrl)?;
        }
        let record = codec::encode_ctrl(ctrl);
        let result = self
            .transport
            .config_write(object::EXT_DPD_CAPTURE, CTRL_OFFSET, &record)
            .map_err(DpdError::from);
        self.track("set capture ctrl", result)?;
        debug!(channel = %ctrl.channel, capture_type = %ctrl.capture_type, "Capture ctrl written");
        Ok(())
    }

    /// Read the control record.
    pub fn capture_ctrl(&mut self) -> Result<CaptureCtrl> {
        let mut record = [0u8; CTRL_LEN];
        let result = self
            .transport
            .config_read(object::EXT_DPD_CAPTURE, CTRL_OFFSET, &mut record)
            .map_err(DpdError::from);
        self.track("get capture ctrl", result)?;
        codec::decode_ctrl(&record)
    }

    /// Write only the level record.
    pub fn set_capture_level(&mut self, level: &CaptureLevel) -> Result<()> {
        let record = codec::encode_level(level);
        let result = self
            .transport
            .config_write(object::EXT_DPD_CAPTURE, LEVEL_OFFSET, &record)
            .map_err(DpdError::from);
        self.track("set capture level", result)
    }

    /// Read the level record.
    pub fn capture_level(&mut self) -> Result<CaptureLevel> {
        let mut record = [0u8; LEVEL_LEN];
        let result = self
            .transport
            .config_read(object::EXT_DPD_CAPTURE, LEVEL_OFFSET, &mut record)
            .map_err(DpdError::from);
        self.track("get capture level", result)?;
        codec::decode_level(&record)
    }

    /// Write the threshold record for one band boundary.
    pub fn set_pwr_thresh(&mut self, band: ThresholdBand, thresh: &CapturePwrThresh) -> Result<()> {
        if self.range_check() {
            validate_pwr_thresh(thresh)?;
        }
        let record = codec::encode_pwr_thresh(thresh);
        let result = self
            .transport
            .config_write(object::EXT_DPD_CAPTURE, codec::thresh_offset(band), &record)
            .map_err(DpdError::from);
        self.track("set power threshold", result)
    }

    /// Read the threshold record for one band boundary.
    pub fn pwr_thresh(&mut self, band: ThresholdBand) -> Result<CapturePwrThresh> {
        let mut record = [0u8; THRESH_LEN];
        let result = self
            .transport
            .config_read(object::EXT_DPD_CAPTURE, codec::thresh_offset(band), &mut record)
            .map_err(DpdError::from);
        self.track("get power threshold", result)?;
        codec::decode_pwr_thresh(&record)
    }
}
