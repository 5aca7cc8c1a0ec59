//! DPD actuator: model records, LUT memory, clock gating, swap mode and
//! multi-model staging.
//!
//! LUT writes are the expensive path. Each one saves and restores actuator
//! state and gates the actuator clock, so prefer [`DpdSession::write_swap_mode_luts`]
//! or [`DpdSession::write_multi_model_luts`] over looping by hand.
//!
//! [`DpdSession::write_swap_mode_luts`]: crate::DpdSession::write_swap_mode_luts
//! [`DpdSession::write_multi_model_luts`]: crate::DpdSession::write_multi_model_luts

pub mod clock;
pub mod control;
pub mod lut;
pub mod model;
pub mod multimodel;
pub mod swap;

pub use lut::{resolve_address, validate_lut_access, Lut, LUT_BANK_BYTES, LUT_BYTES};
pub use model::{CompanderSize, ExtDpdModel, LutBank, ModelSel, MODEL_RECORD_LEN};
pub use multimodel::{
    validate_multi_model_lut, MultiModelUpdateStatus, MULTI_MODEL_LUTS, MULTI_MODEL_ROW_BYTES,
};
pub use swap::{validate_swap_mode_luts, SwapModeLuts, SWAP_LUT_ENTRIES};
