//! Capture buffer read-back.

use super::codec;
use super::types::{CaptureSize, CaptureType};
use crate::actuator::{Lut, LutBank};
use crate::channel::TxChannel;
use crate::error::{DpdError, Result};
use crate::session::DpdSession;
use crate::transport::regmap::{ALT_TX_CAPTURE_ADDR, ORX_CAPTURE_ADDR, TX_CAPTURE_ADDR};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Most samples a capture buffer holds.
pub const MAX_CAPTURE_SAMPLES: usize = 4096;
/// Bytes per I/Q sample pair.
pub const BYTES_PER_SAMPLE: usize = 4;

/// First LUT holding extended peak-search samples.
const EXT_PEAK_FIRST_LUT: u8 = 27;
/// Bytes in one LUT bank page.
const LUT_PAGE_BYTES: usize = 1024;
const BANKS_PER_LUT: usize = 4;

/// On-chip capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureBuffer {
    /// Tx observation
    Tx,
    /// Tx alternate observation
    TxAlt,
    /// Observation receiver
    Orx,
}

impl CaptureBuffer {
    /// Chip address of the buffer.
    pub fn addr(self) -> u32 {
        match self {
            Self::Tx => TX_CAPTURE_ADDR,
            Self::TxAlt => ALT_TX_CAPTURE_ADDR,
            Self::Orx => ORX_CAPTURE_ADDR,
        }
    }
}

/// De-interleaved I/Q samples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IqBuffer {
    /// In-phase samples
    pub i: Vec<i16>,
    /// Quadrature samples
    pub q: Vec<i16>,
}

impl IqBuffer {
    /// Number of sample pairs.
    pub fn len(&self) -> usize {
        self.i.len()
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.i.is_empty()
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let (i, q) = codec::decode_iq(bytes);
        Self { i, q }
    }
}

/// All buffers of one capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureData {
    /// Tx observation samples
    pub tx: IqBuffer,
    /// Tx alternate observation samples (empty for extended peak search)
    pub tx_alt: IqBuffer,
    /// ORx samples
    pub orx: IqBuffer,
}

/// Samples and LUT bank pages for a capture size.
pub fn capture_extent(size: CaptureSize) -> (usize, usize) {
    match size {
        CaptureSize::Samples4096 => (4096, 16),
        CaptureSize::Samples2048 => (2048, 8),
        CaptureSize::Samples1024 => (1024, 4),
        CaptureSize::Samples512 => (512, 2),
        CaptureSize::Samples256 => (256, 1),
        CaptureSize::Samples128 => (128, 1),
        CaptureSize::Samples64 => (64, 1),
        CaptureSize::Samples32 => (32, 1),
    }
}

impl<T: Transport> DpdSession<T> {
    /// Read up to `max_samples` pairs from one capture buffer.
    ///
    /// Requests above 4096 samples are clamped with a warning. Zero samples
    /// returns an empty buffer without touching the device.
    pub fn capture_buffer(&mut self, which: CaptureBuffer, max_samples: usize) -> Result<IqBuffer> {
        let samples = if max_samples > MAX_CAPTURE_SAMPLES {
            warn!(
                requested = max_samples,
                max = MAX_CAPTURE_SAMPLES,
                "Capture read clamped to buffer size"
            );
            MAX_CAPTURE_SAMPLES
        } else {
            max_samples
        };
        if samples == 0 {
            return Ok(IqBuffer::default());
        }

        let mut bytes = vec![0u8; samples * BYTES_PER_SAMPLE];
        let result = self
            .transport
            .dma_read(which.addr(), &mut bytes, true)
            .map_err(DpdError::from);
        self.track("read capture buffer", result)?;
        debug!(buffer = ?which, samples, "Capture buffer read");
        Ok(IqBuffer::from_bytes(&bytes))
    }

    /// Read every buffer of the configured capture, then release the buffers
    /// to the firmware.
    ///
    /// The read-done command is always issued. If both the read and the
    /// release fail, the read error is returned.
    pub fn capture_data(&mut self) -> Result<CaptureData> {
        let data = self.read_all_buffers();
        let released = self.issue_read_done();

        let result = match (data, released) {
            (Ok(data), Ok(())) => Ok(data),
            (Err(err), released) => {
                if let Err(release_err) = released {
                    warn!(error = %release_err, "Capture read done failed after read error");
                }
                Err(err)
            }
            (Ok(_), Err(err)) => Err(err),
        };
        let data = self.track("read capture data", result)?;
        self.capture_state = super::CaptureState::Idle;
        Ok(data)
    }

    fn read_all_buffers(&mut self) -> Result<CaptureData> {
        let ctrl = self.capture_ctrl()?;
        let (samples, banks) = capture_extent(ctrl.size);

        if ctrl.capture_type == CaptureType::ExtendedPeakSearch {
            debug!(samples, banks, "Reading extended peak-search capture from LUT memory");
            return Ok(CaptureData {
                tx: self.read_lut_capture(TxChannel::Tx1, samples, banks)?,
                tx_alt: IqBuffer::default(),
                orx: self.read_lut_capture(TxChannel::Tx2, samples, banks)?,
            });
        }

        Ok(CaptureData {
            tx: self.capture_buffer(CaptureBuffer::Tx, samples)?,
            tx_alt: self.capture_buffer(CaptureBuffer::TxAlt, samples)?,
            orx: self.capture_buffer(CaptureBuffer::Orx, samples)?,
        })
    }

    /// Extended peak-search samples parked in LUTs 27.. of `channel`.
    fn read_lut_capture(&mut self, channel: TxChannel, samples: usize, banks: usize) -> Result<IqBuffer> {
        let mut out = IqBuffer {
            i: Vec::with_capacity(samples),
            q: Vec::with_capacity(samples),
        };
        let mut page = [0u8; LUT_PAGE_BYTES];

        for index in 0..banks {
            if out.len() >= samples {
                break;
            }
            let bank = LutBank::from_index(index % BANKS_PER_LUT)?;
            let lut = Lut::new(EXT_PEAK_FIRST_LUT + (index / BANKS_PER_LUT) as u8)?;
            self.read_lut(channel, lut, bank, &mut page)?;

            let want = (samples - out.len()).min(LUT_PAGE_BYTES / BYTES_PER_SAMPLE);
            let (i, q) = codec::decode_iq(&page[..want * BYTES_PER_SAMPLE]);
            out.i.extend(i);
            out.q.extend(q);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::resolve_address;
    use crate::capture::types::{CaptureConfig, CaptureCtrl};
    use crate::capture::CaptureState;
    use crate::transport::{SimDevice, SimFault, SimOp};
    use tracing_test::traced_test;

    fn session_with(ctrl: CaptureCtrl) -> (SimDevice, DpdSession<SimDevice>) {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        session
            .set_capture_config(&CaptureConfig {
                ctrl,
                ..Default::default()
            })
            .unwrap();
        (sim, session)
    }

    #[test]
    fn test_extent_table() {
        assert_eq!(capture_extent(CaptureSize::Samples4096), (4096, 16));
        assert_eq!(capture_extent(CaptureSize::Samples1024), (1024, 4));
        assert_eq!(capture_extent(CaptureSize::Samples128), (128, 1));
    }

    #[test]
    #[traced_test]
    fn test_buffer_read_is_clamped() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim);
        let buffer = session.capture_buffer(CaptureBuffer::Orx, 5000).unwrap();
        assert_eq!(buffer.len(), 4096);
        assert!(logs_contain("Capture read clamped"));
    }

    #[test]
    fn test_zero_samples_skips_device() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        let buffer = session.capture_buffer(CaptureBuffer::Tx, 0).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(sim.op_count(SimOp::DmaRead), 0);
    }

    #[test]
    fn test_samples_decode_q_first() {
        let sim = SimDevice::new();
        sim.load_capture(TX_CAPTURE_ADDR, &[(100, -100), (-7, 3)]);
        let mut session = DpdSession::with_defaults(sim);
        let buffer = session.capture_buffer(CaptureBuffer::Tx, 2).unwrap();
        assert_eq!(buffer.i, vec![100, -7]);
        assert_eq!(buffer.q, vec![-100, 3]);
    }

    #[test]
    fn test_extended_peak_reads_lut_memory() {
        let (sim, mut session) = session_with(CaptureCtrl {
            capture_type: CaptureType::ExtendedPeakSearch,
            size: CaptureSize::Samples512,
            ..Default::default()
        });
        let tx1_lut27 = resolve_address(TxChannel::Tx1, Lut::new(27).unwrap(), LutBank::Bank1);
        sim.load_capture(tx1_lut27, &[(11, 22)]);
        let tx2_lut27 = resolve_address(TxChannel::Tx2, Lut::new(27).unwrap(), LutBank::Bank0);
        sim.load_capture(tx2_lut27, &[(-5, 6)]);

        let data = session.capture_data().unwrap();
        assert_eq!(data.tx.len(), 512);
        assert_eq!(data.orx.len(), 512);
        assert!(data.tx_alt.is_empty());
        // bank 1 starts at sample 256
        assert_eq!((data.tx.i[256], data.tx.q[256]), (11, 22));
        assert_eq!((data.orx.i[0], data.orx.q[0]), (-5, 6));
        assert_eq!(sim.read_done_count(), 1);
    }

    #[test]
    fn test_read_done_issued_after_failed_read() {
        let (sim, mut session) = session_with(CaptureCtrl {
            size: CaptureSize::Samples64,
            ..Default::default()
        });
        sim.inject(SimFault::FailAfterN {
            op: SimOp::DmaRead,
            count: 1,
        });

        let err = session.capture_data().unwrap_err();
        assert!(matches!(err, DpdError::Transport { .. }));
        assert_eq!(sim.read_done_count(), 1);
        assert_eq!(session.capture_state(), CaptureState::Error);
    }
}
