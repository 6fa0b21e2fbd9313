// src/error.rs
//
// Two failure classes exist in the core:
//   - ConfigError: detected once at load time, always fatal.
//   - MalformedInput: a single bad detection or audio chunk. Dropped and
//     counted where it is found, never returned to the caller.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("distance table for `{class}` is not monotonic: very_close={very_close}, close={close}, near={near} (need 1 >= very_close > close > near > 0)")]
    NonMonotonicBands {
        class: &'static str,
        very_close: f32,
        close: f32,
        near: f32,
    },

    #[error("`{field}` must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("`{field}` must be a positive duration, got {value}")]
    NonPositiveWindow { field: &'static str, value: f64 },

    #[error("frequency band `{field}` is empty or inverted: {low}..{high} Hz")]
    InvalidBand {
        field: &'static str,
        low: f32,
        high: f32,
    },

    #[error("frequency band `{field}` tops out at {high} Hz, above Nyquist ({nyquist} Hz)")]
    BandAboveNyquist {
        field: &'static str,
        high: f32,
        nyquist: f32,
    },

    #[error("`{field}` must be at least 1")]
    ZeroCount { field: &'static str },

    #[error("corroboration cap {cap} is below the minimum alert level {min}")]
    CapBelowAlertLevel { cap: &'static str, min: &'static str },
}

/// Why a single input item was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MalformedInput {
    NonFinite,
    NonPositiveSize,
    OutOfFrame,
    EmptyFrame,
    ConfidenceOutOfRange,
    ShortChunk,
    SampleRateMismatch,
}

impl MalformedInput {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonFinite => "non-finite value",
            Self::NonPositiveSize => "non-positive box size",
            Self::OutOfFrame => "box outside frame",
            Self::EmptyFrame => "zero-sized frame",
            Self::ConfidenceOutOfRange => "confidence outside [0,1]",
            Self::ShortChunk => "audio chunk too short",
            Self::SampleRateMismatch => "unexpected sample rate",
        }
    }
}
