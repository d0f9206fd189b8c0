pub mod artifacts;
pub mod fits;
pub mod image_io;

pub use artifacts::{
    read_catalog, read_psf_artifact, read_wcs, write_json, FrameArtifacts, LoadedFrame,
};
pub use fits::{read_frame, read_raster, write_raster};
pub use image_io::{quicklook_limits, save_quicklook_png};
