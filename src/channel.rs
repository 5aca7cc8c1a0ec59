//! Transmit channel identifiers.
//!
//! Single-target operations (model config, LUT access, status reads) take a
//! [`TxChannel`]. Batch operations (actuator enable, gain monitor, hard clipper)
//! take a [`TxChannelMask`] with any combination of the four channels.

use crate::error::{DpdError, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// OR-mask of transmit channels, matching the chip's channel bit encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TxChannelMask: u8 {
        /// Transmitter 1
        const TX1 = 0x01;
        /// Transmitter 2
        const TX2 = 0x02;
        /// Transmitter 3
        const TX3 = 0x04;
        /// Transmitter 4
        const TX4 = 0x08;
    }
}

impl TxChannelMask {
    /// Validate a raw mask: must be non-empty and contain only Tx1..Tx4 bits.
    pub fn from_raw(raw: u8) -> Result<Self> {
        match Self::from_bits(raw) {
            Some(mask) if !mask.is_empty() => Ok(mask),
            _ => Err(DpdError::invalid(
                "txChannelMask",
                format!("0x{raw:02X}"),
                "must be a non-empty combination of Tx1..Tx4",
            )),
        }
    }

    /// Iterate the member channels in ascending order.
    pub fn channels(self) -> impl Iterator<Item = TxChannel> {
        TxChannel::ALL
            .into_iter()
            .filter(move |ch| self.contains(ch.mask()))
    }
}

/// A single transmit channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TxChannel {
    /// Transmitter 1
    Tx1,
    /// Transmitter 2
    Tx2,
    /// Transmitter 3
    Tx3,
    /// Transmitter 4
    Tx4,
}

impl TxChannel {
    /// All channels in index order.
    pub const ALL: [TxChannel; 4] = [Self::Tx1, Self::Tx2, Self::Tx3, Self::Tx4];

    /// Zero-based index used for per-channel tables and record offsets.
    pub fn index(self) -> usize {
        match self {
            Self::Tx1 => 0,
            Self::Tx2 => 1,
            Self::Tx3 => 2,
            Self::Tx4 => 3,
        }
    }

    /// Channel from a zero-based index.
    pub fn from_index(index: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(index))
            .copied()
            .ok_or_else(|| DpdError::invalid("txChannelIndex", index, "must be in 0..=3"))
    }

    /// Single-bit mask for this channel.
    pub fn mask(self) -> TxChannelMask {
        match self {
            Self::Tx1 => TxChannelMask::TX1,
            Self::Tx2 => TxChannelMask::TX2,
            Self::Tx3 => TxChannelMask::TX3,
            Self::Tx4 => TxChannelMask::TX4,
        }
    }

    /// Raw channel bit as carried in mailbox selectors and debug registers.
    pub fn bit(self) -> u8 {
        self.mask().bits()
    }

    /// Channel from a raw mask that must have exactly one bit set.
    pub fn from_mask(raw: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ch| ch.bit() == raw)
            .ok_or_else(|| {
                DpdError::invalid(
                    "txChannel",
                    format!("0x{raw:02X}"),
                    "must be exactly one of Tx1..Tx4",
                )
            })
    }
}

impl fmt::Display for TxChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tx{}", self.index() + 1)
    }
}

impl From<TxChannel> for TxChannelMask {
    fn from(ch: TxChannel) -> Self {
        ch.mask()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_and_mask_tables_agree() {
        for (i, ch) in TxChannel::ALL.into_iter().enumerate() {
            assert_eq!(ch.index(), i);
            assert_eq!(ch.bit(), 1 << i);
            assert_eq!(TxChannel::from_mask(ch.bit()).unwrap(), ch);
            assert_eq!(TxChannel::from_index(i as u8).unwrap(), ch);
        }
    }

    #[test]
    fn test_from_mask_rejects_multi_bit() {
        assert!(TxChannel::from_mask(0x03).is_err());
        assert!(TxChannel::from_mask(0x00).is_err());
        assert!(TxChannel::from_mask(0x10).is_err());
        assert!(TxChannel::from_index(4).is_err());
    }

    #[test]
    fn test_mask_iteration() {
        let mask = TxChannelMask::from_raw(0b0101).unwrap();
        let chans: Vec<_> = mask.channels().collect();
        assert_eq!(chans, vec![TxChannel::Tx1, TxChannel::Tx3]);
    }

    #[test]
    fn test_mask_validation() {
        assert!(TxChannelMask::from_raw(0).is_err());
        assert!(TxChannelMask::from_raw(0x1F).is_err());
        assert_eq!(TxChannelMask::from_raw(0x0F).unwrap(), TxChannelMask::all());
    }

    #[test]
    fn test_display() {
        assert_eq!(TxChannel::Tx3.to_string(), "Tx3");
    }
}
