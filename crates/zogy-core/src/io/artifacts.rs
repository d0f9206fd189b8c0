use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::catalog::{Catalog, CatalogArtifact};
use crate::error::{Result, ZogyError};
use crate::frame::Frame;
use crate::psf::{PsfArtifact, PsfFieldModel};
use crate::wcs::{SkyProjection, TanWcs};

use super::fits::{read_frame, read_raster};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(ZogyError::MissingArtifact(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write any artifact as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text)?;
    Ok(())
}

pub fn read_catalog(path: &Path) -> Result<CatalogArtifact> {
    read_json(path)
}

pub fn read_psf_artifact(path: &Path) -> Result<PsfArtifact> {
    read_json(path)
}

pub fn read_wcs(path: &Path) -> Result<TanWcs> {
    let wcs: TanWcs = read_json(path)?;
    wcs.validate()?;
    Ok(wcs)
}

/// File locations of everything produced upstream for one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameArtifacts {
    pub image: PathBuf,
    pub catalog: PathBuf,
    pub psf: PathBuf,
    pub wcs: Option<PathBuf>,
    pub background: Option<PathBuf>,
}

/// A frame with its catalog, PSF model and optional solution and background.
pub struct LoadedFrame {
    pub frame: Frame,
    pub catalog: Catalog,
    pub psf: PsfFieldModel,
    pub wcs: Option<TanWcs>,
    pub background: Option<Array2<f32>>,
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl FrameArtifacts {
    /// Resolve the artifacts of a frame from its identifier.
    ///
    /// `data/new` (or `data/new.fits`) resolves to `data/new.fits`,
    /// `data/new.cat.json`, `data/new.psf.json`, and the optional
    /// `data/new.wcs.json` and `data/new_bkg.fits`.
    pub fn discover(identifier: &Path) -> Result<Self> {
        let base = match identifier.extension().and_then(|e| e.to_str()) {
            Some("fits" | "fit") => identifier.with_extension(""),
            _ => identifier.to_path_buf(),
        };

        let required = |suffix: &str| -> Result<PathBuf> {
            let path = with_suffix(&base, suffix);
            if path.is_file() {
                Ok(path)
            } else {
                Err(ZogyError::MissingArtifact(path))
            }
        };
        let optional = |suffix: &str| Some(with_suffix(&base, suffix)).filter(|p| p.is_file());

        let artifacts = Self {
            image: required(".fits")?,
            catalog: required(".cat.json")?,
            psf: required(".psf.json")?,
            wcs: optional(".wcs.json"),
            background: optional("_bkg.fits"),
        };
        debug!(?artifacts, "Resolved frame artifacts");
        Ok(artifacts)
    }

    /// Load everything. `need_background` turns a missing background raster
    /// into an error.
    pub fn load(&self, need_background: bool) -> Result<LoadedFrame> {
        let frame = read_frame(&self.image)?;
        let psf = PsfFieldModel::from_artifact(read_psf_artifact(&self.psf)?)?;
        let wcs = self.wcs.as_deref().map(read_wcs).transpose()?;

        let catalog_artifact = read_catalog(&self.catalog)?;
        if catalog_artifact.sky.is_empty() && !catalog_artifact.detections.is_empty() && wcs.is_none() {
            return Err(ZogyError::MissingArtifact(with_suffix(
                &self.image.with_extension(""),
                ".wcs.json",
            )));
        }
        let catalog = Catalog::from_artifact(
            catalog_artifact,
            wcs.as_ref().map(|w| w as &dyn SkyProjection),
        );

        let background = match &self.background {
            Some(path) => {
                let bkg = read_raster(path)?;
                if bkg.dim() != frame.dim() {
                    return Err(ZogyError::ShapeMismatch {
                        expected: frame.dim(),
                        actual: bkg.dim(),
                    });
                }
                Some(bkg)
            }
            None if need_background => {
                return Err(ZogyError::MissingArtifact(with_suffix(
                    &self.image.with_extension(""),
                    "_bkg.fits",
                )));
            }
            None => None,
        };

        Ok(LoadedFrame {
            frame,
            catalog,
            psf,
            wcs,
            background,
        })
    }
}
