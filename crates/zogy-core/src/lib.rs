pub mod catalog;
pub mod consts;
pub mod error;
pub mod fft;
pub mod frame;
pub mod io;
pub mod pipeline;
pub mod psf;
pub mod stats;
pub mod tiles;
pub mod transform;
pub mod wcs;
