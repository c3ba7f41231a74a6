//! # Frame Image Processing
//!
//! Compression, decompression and resizing of video frames. These wrap the
//! `image` crate and stand in for the capture pipeline's JPEG codec.

pub mod frames;

pub use frames::{compress, decompress, downscale};
