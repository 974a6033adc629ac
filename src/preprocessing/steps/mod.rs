//! Individual preprocessing stages, in pipeline order

pub mod codec;
pub mod resize;
pub mod grayscale;
pub mod denoise;
pub mod contrast;
pub mod sharpen;
pub mod threshold;
pub mod deskew;
pub mod composite;
