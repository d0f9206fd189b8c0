//! Astrometric solutions: pixel <-> sky mappings.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZogyError};

/// Right ascension / declination in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkyCoord {
    pub ra: f64,
    pub dec: f64,
}

/// A per-frame astrometric solution. Pixel coordinates are 0-based `(x, y)`
/// with `x` along columns.
pub trait SkyProjection: Send + Sync {
    fn pixel_to_sky(&self, x: f64, y: f64) -> SkyCoord;
    fn sky_to_pixel(&self, sky: SkyCoord) -> (f64, f64);
}

/// Map a pixel position of one frame to the matching pixel of another frame
/// through their shared sky coordinates.
pub fn remap_point(x: f64, y: f64, from: &dyn SkyProjection, to: &dyn SkyProjection) -> (f64, f64) {
    to.sky_to_pixel(from.pixel_to_sky(x, y))
}

/// Gnomonic (tangent-plane) projection with a linear CD matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TanWcs {
    /// Reference pixel `[x, y]`, 0-based.
    pub crpix: [f64; 2],
    /// Sky position of the reference pixel `[ra, dec]`, degrees.
    pub crval: [f64; 2],
    /// Linear pixel -> intermediate world transform, degrees per pixel.
    pub cd: [[f64; 2]; 2],
}

impl TanWcs {
    /// North up, east left, square pixels of `scale_arcsec` arcseconds.
    pub fn simple(crpix: [f64; 2], crval: [f64; 2], scale_arcsec: f64) -> Self {
        let s = scale_arcsec / 3600.0;
        Self {
            crpix,
            crval,
            cd: [[-s, 0.0], [0.0, s]],
        }
    }

    /// Reject singular CD matrices up front.
    pub fn validate(&self) -> Result<()> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-30 {
            return Err(ZogyError::InvalidConfig(format!(
                "WCS CD matrix is singular (det = {det})"
            )));
        }
        Ok(())
    }

    fn determinant(&self) -> f64 {
        self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0]
    }
}

impl SkyProjection for TanWcs {
    fn pixel_to_sky(&self, x: f64, y: f64) -> SkyCoord {
        let u = x - self.crpix[0];
        let v = y - self.crpix[1];
        let xi = (self.cd[0][0] * u + self.cd[0][1] * v).to_radians();
        let eta = (self.cd[1][0] * u + self.cd[1][1] * v).to_radians();

        let ra0 = self.crval[0].to_radians();
        let dec0 = self.crval[1].to_radians();
        let denom = dec0.cos() - eta * dec0.sin();

        let ra = ra0 + xi.atan2(denom);
        let dec = (eta * dec0.cos() + dec0.sin()).atan2((xi * xi + denom * denom).sqrt());

        SkyCoord {
            ra: ra.to_degrees().rem_euclid(360.0),
            dec: dec.to_degrees(),
        }
    }

    fn sky_to_pixel(&self, sky: SkyCoord) -> (f64, f64) {
        let ra0 = self.crval[0].to_radians();
        let dec0 = self.crval[1].to_radians();
        let ra = sky.ra.to_radians();
        let dec = sky.dec.to_radians();
        let dra = ra - ra0;

        let cos_c = dec0.sin() * dec.sin() + dec0.cos() * dec.cos() * dra.cos();
        let xi = (dec.cos() * dra.sin() / cos_c).to_degrees();
        let eta = ((dec0.cos() * dec.sin() - dec0.sin() * dec.cos() * dra.cos()) / cos_c)
            .to_degrees();

        let det = self.determinant();
        let u = (self.cd[1][1] * xi - self.cd[0][1] * eta) / det;
        let v = (-self.cd[1][0] * xi + self.cd[0][0] * eta) / det;
        (u + self.crpix[0], v + self.crpix[1])
    }
}
