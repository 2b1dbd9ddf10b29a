//! Conversion of raw source samples into 8-bit output samples.
//!
//! One [`SampleLayout`] is selected when a decoder is constructed and then
//! reused for every read, instead of a reader type per sample width.
//!
//! Numeric contract:
//! - narrowed integers (`abpp` < storage bits) are rescaled with rounding:
//!   `round(sample / (2^abpp - 1) * 255)`
//! - full-range integers are rescaled with truncation:
//!   `trunc(sample / max_of_type * 255)`
//! - floating point samples are assumed normalized to `[0, 1]` and are
//!   truncated after multiplying by 255

use serde::{Deserialize, Serialize};

/// Storage type of a source sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    U8,
    U16,
    U32,
    F32,
    F64,
}

impl SampleType {
    /// Storage width in bytes.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::U16 => 2,
            SampleType::U32 | SampleType::F32 => 4,
            SampleType::F64 => 8,
        }
    }

    /// Storage width in bits.
    pub const fn bits(self) -> u8 {
        (self.bytes_per_sample() * 8) as u8
    }

    pub const fn is_floating_point(self) -> bool {
        matches!(self, SampleType::F32 | SampleType::F64)
    }

    /// Pick the integer storage type for a byte width, if one exists.
    pub fn from_width(bytes_per_sample: usize, floating_point: bool) -> Option<Self> {
        match (bytes_per_sample, floating_point) {
            (1, false) => Some(SampleType::U8),
            (2, false) => Some(SampleType::U16),
            (4, false) => Some(SampleType::U32),
            (4, true) => Some(SampleType::F32),
            (8, true) => Some(SampleType::F64),
            _ => None,
        }
    }
}

/// How raw samples map onto the 8-bit output range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMode {
    /// Integer samples spanning the whole storage type
    FullRange,
    /// Integer samples whose true depth (`abpp`) is narrower than storage
    Narrowed { abpp: u8 },
    /// Floating point samples normalized to `[0, 1]`
    Normalized,
}

/// Decode strategy for one source sample type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    pub sample_type: SampleType,
    pub scale: ScaleMode,
}

impl SampleLayout {
    /// Build a layout for `sample_type` with an optional true bit depth.
    ///
    /// An `abpp` equal to or wider than the storage width selects full-range
    /// scaling. Depth is ignored for floating point samples.
    pub fn new(sample_type: SampleType, abpp: Option<u8>) -> Self {
        let scale = if sample_type.is_floating_point() {
            ScaleMode::Normalized
        } else {
            match abpp {
                Some(abpp) if abpp > 0 && abpp < sample_type.bits() => {
                    ScaleMode::Narrowed { abpp }
                }
                _ => ScaleMode::FullRange,
            }
        };

        Self { sample_type, scale }
    }

    pub const fn bytes_per_sample(&self) -> usize {
        self.sample_type.bytes_per_sample()
    }

    /// Convert one little-endian encoded sample to an output byte.
    ///
    /// `raw` must hold at least [`Self::bytes_per_sample`] bytes.
    pub fn to_u8(&self, raw: &[u8]) -> u8 {
        match self.sample_type {
            SampleType::F32 => {
                let v = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                scale_f32(v)
            }
            SampleType::F64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(&raw[..8]);
                scale_f64(f64::from_le_bytes(b))
            }
            SampleType::U8 => self.scale_integer(raw[0] as u32),
            SampleType::U16 => self.scale_integer(u16::from_le_bytes([raw[0], raw[1]]) as u32),
            SampleType::U32 => {
                self.scale_integer(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
        }
    }

    fn scale_integer(&self, sample: u32) -> u8 {
        match self.scale {
            ScaleMode::Narrowed { abpp } => scale_narrowed(sample, abpp),
            _ => match self.sample_type {
                // 8-bit full range is the identity
                SampleType::U8 => sample as u8,
                SampleType::U16 => scale_full_range(sample, u16::MAX as u32),
                _ => scale_full_range(sample, u32::MAX),
            },
        }
    }

    /// Convert a run of packed samples from `src` into `dst`.
    ///
    /// Converts `min(src.len() / bytes_per_sample, dst.len())` samples.
    pub fn convert(&self, src: &[u8], dst: &mut [u8]) {
        let bps = self.bytes_per_sample();
        for (out, raw) in dst.iter_mut().zip(src.chunks_exact(bps)) {
            *out = self.to_u8(raw);
        }
    }
}

/// Rescale a sample with true depth `abpp` to 8 bits, rounding.
#[inline]
pub fn scale_narrowed(sample: u32, abpp: u8) -> u8 {
    let abpp = abpp.clamp(1, 32) as u32;
    let max = (u32::MAX >> (32 - abpp)) as f64;
    ((sample as f64 / max) * 255.0 + 0.5) as u8
}

/// Rescale a full-range integer sample to 8 bits, truncating.
#[inline]
pub fn scale_full_range(sample: u32, max_of_type: u32) -> u8 {
    ((sample as f64 / max_of_type as f64) * 255.0) as u8
}

/// Scale a normalized single precision sample to 8 bits, truncating.
#[inline]
pub fn scale_f32(sample: f32) -> u8 {
    (sample as f64 * 255.0) as u8
}

/// Scale a normalized double precision sample to 8 bits, truncating.
#[inline]
pub fn scale_f64(sample: f64) -> u8 {
    (sample * 255.0) as u8
}
