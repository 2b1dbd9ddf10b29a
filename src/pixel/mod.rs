//! Pixel layout and sample conversion.
//!
//! This module describes how decoded tile bytes are laid out and how source
//! samples of various widths are converted into the 8-bit output range.
//!
//! # Components
//!
//! - [`PixelFormat`]: output pixel formats and their byte sizes
//! - [`Interleave`] / [`BandSpacing`]: memory layout of multi-band pixel data
//! - [`SampleLayout`] / [`ScaleMode`]: numeric conversion of source samples
//! - [`ColorTable`]: palette classification and in-place expansion

mod format;
mod palette;
mod scale;

pub use format::{BandSpacing, Interleave, PixelFormat};
pub use palette::{ColorTable, PaletteClass};
pub use scale::{
    scale_f32, scale_f64, scale_full_range, scale_narrowed, SampleLayout, SampleType, ScaleMode,
};
