//! GPIO resource arbitration for capture trigger and done pins.
//!
//! The capture-done pin is a shared chip resource: it is tagged with the
//! [`SharedFeature::ExtDpdCaptureDone`] feature in the shared-resource table,
//! driven as an output, and its source-control nibble is switched to the
//! memory-element source. Re-assigning the pin first reclaims whichever pin
//! currently carries the tag.
//!
//! A failure part-way through reassignment replays an [`UndoLog`] so the
//! previously held pin is re-acquired where possible. Rollback is best
//! effort: the original error is always returned.

pub mod undo;

pub use undo::{UndoLog, UndoStep};

use crate::error::{DpdError, Result};
use crate::session::DpdSession;
use crate::transport::{GpioDirection, SharedFeature, Transport};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Source-control value selecting the default GPIO source.
pub const SRC_CTRL_DEFAULT: u8 = 0x0;
/// Source-control value routing a pin from the memory element.
pub const SRC_CTRL_MEMORY_ELEMENT: u8 = 0x3;

/// Highest digital GPIO number.
pub const GPIO_MAX: u8 = 18;
/// Highest GPIO searched for the capture-done tag.
pub const DONE_PIN_SCAN_MAX: u8 = 15;

/// A digital GPIO (GPIO00..GPIO18) or the invalid sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GpioPin(u8);

impl GpioPin {
    /// Sentinel for "no pin assigned".
    pub const INVALID: GpioPin = GpioPin(GPIO_MAX + 1);

    /// Pin from its number; 0..=18 or the sentinel value 19.
    pub fn new(number: u8) -> Result<Self> {
        if number <= GPIO_MAX + 1 {
            Ok(Self(number))
        } else {
            Err(DpdError::invalid(
                "gpioPin",
                number,
                "must be GPIO00..GPIO18 or the invalid sentinel",
            ))
        }
    }

    /// Whether this is a real pin rather than the sentinel.
    pub fn is_valid(self) -> bool {
        self.0 <= GPIO_MAX
    }

    /// Pin number, or `None` for the sentinel.
    pub fn number(self) -> Option<u8> {
        self.is_valid().then_some(self.0)
    }

    /// Raw value, including the sentinel.
    pub fn raw(self) -> u8 {
        self.0
    }
}

impl Default for GpioPin {
    fn default() -> Self {
        Self::INVALID
    }
}

impl TryFrom<u8> for GpioPin {
    type Error = DpdError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<GpioPin> for u8 {
    fn from(pin: GpioPin) -> Self {
        pin.0
    }
}

impl fmt::Display for GpioPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number() {
            Some(n) => write!(f, "GPIO{n:02}"),
            None => write!(f, "GPIO_INVALID"),
        }
    }
}

/// Hardware register group holding a pin's source-control nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceControlGroup {
    /// GPIO00..03: lower byte, lower nibble
    Gpio00To03,
    /// GPIO04..07: lower byte, upper nibble
    Gpio04To07,
    /// GPIO08..11: upper byte, lower nibble
    Gpio08To11,
    /// GPIO12..15: upper byte, upper nibble
    Gpio12To15,
    /// GPIO16..18: extra bits
    Gpio16To18,
}

impl SourceControlGroup {
    /// Group controlling `pin`. The invalid sentinel has no group.
    pub fn for_pin(pin: GpioPin) -> Result<Self> {
        match pin.number() {
            Some(0..=3) => Ok(Self::Gpio00To03),
            Some(4..=7) => Ok(Self::Gpio04To07),
            Some(8..=11) => Ok(Self::Gpio08To11),
            Some(12..=15) => Ok(Self::Gpio12To15),
            Some(16..=18) => Ok(Self::Gpio16To18),
            _ => Err(DpdError::invalid(
                "gpioPin",
                pin,
                "no source-control group for this pin",
            )),
        }
    }
}

impl<T: Transport> DpdSession<T> {
    /// Assign the capture-done indication to `pin`, reclaiming any pin that
    /// currently carries it. [`GpioPin::INVALID`] unassigns the indication.
    pub fn setup_done_status_pin(&mut self, pin: GpioPin) -> Result<()> {
        if pin.is_valid() {
            let current = self.source_control_get(pin)?;
            if current != SRC_CTRL_DEFAULT && current != SRC_CTRL_MEMORY_ELEMENT {
                return Err(DpdError::ResourceConflict {
                    pin: pin.raw(),
                    message: format!(
                        "source control 0x{current:X} is in use by another function"
                    ),
                });
            }
        }

        let mut undo = UndoLog::new();
        match self.assign_done_pin(pin, &mut undo) {
            Ok(()) => {
                info!(pin = %pin, "Capture done pin assigned");
                Ok(())
            }
            Err(err) => {
                let steps = undo.len();
                let failed = undo.rollback(&mut self.transport);
                warn!(
                    pin = %pin,
                    error = %err,
                    steps,
                    failed,
                    "Capture done pin setup failed, rolled back"
                );
                Err(err)
            }
        }
    }

    fn assign_done_pin(&mut self, pin: GpioPin, undo: &mut UndoLog) -> Result<()> {
        let feature = SharedFeature::ExtDpdCaptureDone;
        let previous = self.done_status_pin()?;

        if previous.is_valid() {
            if !self.transport.shared_resource_release(previous, feature)? {
                return Err(DpdError::ResourceConflict {
                    pin: previous.raw(),
                    message: "unable to release capture done pin".to_string(),
                });
            }
            undo.record(UndoStep::Reacquire {
                pin: previous,
                feature,
            });

            self.transport
                .gpio_direction_set(previous, GpioDirection::Input)?;
            undo.record(UndoStep::Direction {
                pin: previous,
                previous: GpioDirection::Output,
            });
            debug!(pin = %previous, "Released previous capture done pin");
        }

        if pin.is_valid() {
            if !self.transport.shared_resource_acquire(pin, feature)? {
                return Err(DpdError::ResourceConflict {
                    pin: pin.raw(),
                    message: "pin is owned by another feature".to_string(),
                });
            }
            undo.record(UndoStep::Release { pin, feature });

            self.transport.gpio_direction_set(pin, GpioDirection::Output)?;
            undo.record(UndoStep::Direction {
                pin,
                previous: GpioDirection::Input,
            });

            let group = SourceControlGroup::for_pin(pin)?;
            let prior = self.transport.gpio_source_control_get(group)?;
            self.transport
                .gpio_source_control_set(group, SRC_CTRL_MEMORY_ELEMENT)?;
            undo.record(UndoStep::SourceControl {
                group,
                previous: prior,
            });
        } else if previous.is_valid() {
            let group = SourceControlGroup::for_pin(previous)?;
            let prior = self.transport.gpio_source_control_get(group)?;
            self.transport
                .gpio_source_control_set(group, SRC_CTRL_DEFAULT)?;
            undo.record(UndoStep::SourceControl {
                group,
                previous: prior,
            });
        }

        Ok(())
    }

    /// Pin currently tagged as the capture-done indication, or
    /// [`GpioPin::INVALID`] if none.
    pub fn done_status_pin(&mut self) -> Result<GpioPin> {
        for number in 0..=DONE_PIN_SCAN_MAX {
            let pin = GpioPin(number);
            if self.transport.shared_resource_feature(pin)? == SharedFeature::ExtDpdCaptureDone {
                return Ok(pin);
            }
        }
        Ok(GpioPin::INVALID)
    }

    /// Write the source-control nibble for the group containing `pin`.
    pub fn source_control_set(&mut self, pin: GpioPin, value: u8) -> Result<()> {
        if value > 0x0F {
            return Err(DpdError::invalid(
                "gpioSourceControl",
                value,
                "must fit in one nibble",
            ));
        }
        let group = SourceControlGroup::for_pin(pin)?;
        self.transport.gpio_source_control_set(group, value)?;
        Ok(())
    }

    /// Read the source-control nibble for the group containing `pin`.
    pub fn source_control_get(&mut self, pin: GpioPin) -> Result<u8> {
        let group = SourceControlGroup::for_pin(pin)?;
        Ok(self.transport.gpio_source_control_get(group)? & 0x0F)
    }

    /// Route the capture trigger pin to the stream processor and cache it.
    pub(crate) fn setup_trigger_pin(&mut self, pin: GpioPin) -> Result<()> {
        let signal_id = pin.number().unwrap_or(0);
        self.transport.stream_gpio_pin_set(signal_id, pin)?;
        self.trigger_pin = pin;
        debug!(pin = %pin, "Capture trigger pin routed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_validity() {
        assert!(GpioPin::new(0).unwrap().is_valid());
        assert!(GpioPin::new(18).unwrap().is_valid());
        assert!(!GpioPin::new(19).unwrap().is_valid());
        assert!(GpioPin::new(20).is_err());
        assert_eq!(GpioPin::INVALID.number(), None);
        assert_eq!(GpioPin::new(7).unwrap().to_string(), "GPIO07");
    }

    #[test]
    fn test_source_control_groups() {
        let group = |n| SourceControlGroup::for_pin(GpioPin::new(n).unwrap()).unwrap();
        assert_eq!(group(0), SourceControlGroup::Gpio00To03);
        assert_eq!(group(3), SourceControlGroup::Gpio00To03);
        assert_eq!(group(4), SourceControlGroup::Gpio04To07);
        assert_eq!(group(11), SourceControlGroup::Gpio08To11);
        assert_eq!(group(12), SourceControlGroup::Gpio12To15);
        assert_eq!(group(16), SourceControlGroup::Gpio16To18);
        assert_eq!(group(18), SourceControlGroup::Gpio16To18);
        assert!(SourceControlGroup::for_pin(GpioPin::INVALID).is_err());
    }

    #[test]
    fn test_pin_serde_rejects_out_of_range() {
        let pin: GpioPin = toml::Value::Integer(12).try_into().unwrap();
        assert_eq!(pin.number(), Some(12));
        let bad: std::result::Result<GpioPin, _> = toml::Value::Integer(40).try_into();
        assert!(bad.is_err());
    }
}
