//! Cross-matching of new/reference star lists and the flux-ratio / offset
//! statistics derived from the matches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::consts::{ARCSEC_PER_DEGREE, DEFAULT_MATCH_RADIUS_ARCSEC};
use crate::error::{Result, ZogyError};
use crate::stats::{effective_magnitude, median, sigma_clipped_stats, std_dev};
use crate::tiles::Bounds;
use crate::wcs::{SkyCoord, SkyProjection};

/// One detection from the PSF-fitting catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: u64,
    /// Column, 0-based pixels.
    pub x: f64,
    /// Row, 0-based pixels.
    pub y: f64,
    /// Normalized PSF-fit flux.
    pub flux: f64,
}

/// On-disk catalog: detections plus optional sky coordinates per id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogArtifact {
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub sky: Vec<SkyEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkyEntry {
    pub id: u64,
    pub ra: f64,
    pub dec: f64,
}

/// Detections plus the identifier -> sky coordinate lookup.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub detections: Vec<Detection>,
    sky: HashMap<u64, SkyCoord>,
}

impl Catalog {
    pub fn new(detections: Vec<Detection>, sky: HashMap<u64, SkyCoord>) -> Self {
        Self { detections, sky }
    }

    /// Fill the sky lookup from an astrometric solution.
    pub fn from_projection(detections: Vec<Detection>, projection: &dyn SkyProjection) -> Self {
        let sky = detections
            .iter()
            .map(|d| (d.id, projection.pixel_to_sky(d.x, d.y)))
            .collect();
        Self { detections, sky }
    }

    /// Build from an artifact; when it carries no sky entries the lookup is
    /// derived from `projection`.
    pub fn from_artifact(artifact: CatalogArtifact, projection: Option<&dyn SkyProjection>) -> Self {
        match projection {
            Some(p) if artifact.sky.is_empty() => Self::from_projection(artifact.detections, p),
            _ => {
                let sky = artifact
                    .sky
                    .iter()
                    .map(|e| (e.id, SkyCoord { ra: e.ra, dec: e.dec }))
                    .collect();
                Self::new(artifact.detections, sky)
            }
        }
    }

    pub fn sky_coord(&self, id: u64) -> Result<SkyCoord> {
        self.sky
            .get(&id)
            .copied()
            .ok_or(ZogyError::MissingSkyCoordinate(id))
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// Nearest reference source per new source; reference sources may be
    /// claimed by several new sources.
    #[default]
    Greedy,
    /// Keep a pair only if each side is the other's nearest neighbour.
    MutualNearest,
}

impl std::fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Greedy => write!(f, "Greedy"),
            Self::MutualNearest => write!(f, "Mutual nearest"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Maximum separation in arcseconds (exclusive).
    pub radius_arcsec: f64,
    #[serde(default)]
    pub policy: MatchPolicy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            radius_arcsec: DEFAULT_MATCH_RADIUS_ARCSEC,
            policy: MatchPolicy::Greedy,
        }
    }
}

/// A matched new/reference pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StarMatch {
    /// Position in the new frame.
    pub x: f64,
    pub y: f64,
    /// New flux / reference flux.
    pub flux_ratio: f64,
    /// RA offset (new - ref) in arcsec, scaled by cos(dec).
    pub dra: f64,
    /// Dec offset (new - ref) in arcsec.
    pub ddec: f64,
}

#[derive(Clone, Debug, Default)]
pub struct MatchSet {
    pub matches: Vec<StarMatch>,
    /// Matched fraction of new detections (diagnostic).
    pub match_fraction: f64,
}

/// Angular offset `new - ref` in arcseconds, RA wrapped and scaled by cos(dec_ref).
fn sky_offset(new: SkyCoord, reference: SkyCoord) -> (f64, f64) {
    let mut dra_deg = new.ra - reference.ra;
    dra_deg = (dra_deg + 180.0).rem_euclid(360.0) - 180.0;
    let dra = ARCSEC_PER_DEGREE * dra_deg * reference.dec.to_radians().cos();
    let ddec = ARCSEC_PER_DEGREE * (new.dec - reference.dec);
    (dra, ddec)
}

fn nearest(from: SkyCoord, candidates: &[SkyCoord], from_is_new: bool) -> Option<(usize, f64)> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let (dra, ddec) = if from_is_new {
                sky_offset(from, c)
            } else {
                sky_offset(c, from)
            };
            (i, (dra * dra + ddec * ddec).sqrt())
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Match every new detection to its nearest reference detection on the sky.
pub fn match_catalogs(new: &Catalog, reference: &Catalog, config: &MatchConfig) -> Result<MatchSet> {
    let new_sky = new
        .detections
        .iter()
        .map(|d| new.sky_coord(d.id))
        .collect::<Result<Vec<_>>>()?;
    let ref_sky = reference
        .detections
        .iter()
        .map(|d| reference.sky_coord(d.id))
        .collect::<Result<Vec<_>>>()?;

    let mut matches = Vec::new();
    for (i_new, det) in new.detections.iter().enumerate() {
        let Some((i_ref, dist)) = nearest(new_sky[i_new], &ref_sky, true) else {
            break;
        };
        if dist >= config.radius_arcsec {
            continue;
        }
        if config.policy == MatchPolicy::MutualNearest {
            match nearest(ref_sky[i_ref], &new_sky, false) {
                Some((back, _)) if back == i_new => {}
                _ => continue,
            }
        }

        let ref_det = &reference.detections[i_ref];
        let (dra, ddec) = sky_offset(new_sky[i_new], ref_sky[i_ref]);
        matches.push(StarMatch {
            x: det.x,
            y: det.y,
            flux_ratio: det.flux / ref_det.flux,
            dra,
            ddec,
        });
    }

    let match_fraction = if new.is_empty() {
        0.0
    } else {
        matches.len() as f64 / new.len() as f64
    };
    debug!(
        matched = matches.len(),
        new = new.len(),
        reference = reference.len(),
        match_fraction,
        "Catalog matching complete"
    );

    Ok(MatchSet {
        matches,
        match_fraction,
    })
}

/// Flux-ratio and positional-offset estimates for a set of matches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchSummary {
    /// Flux ratio new/ref (median).
    pub flux_ratio: f64,
    pub flux_ratio_std: f64,
    /// Effective offset magnitude along x (columns), pixels.
    pub dx: f64,
    /// Effective offset magnitude along y (rows), pixels.
    pub dy: f64,
    pub count: usize,
}

impl MatchSummary {
    /// Used when there are no matches at all.
    pub fn fallback() -> Self {
        Self {
            flux_ratio: 1.0,
            flux_ratio_std: 0.0,
            dx: 0.0,
            dy: 0.0,
            count: 0,
        }
    }

    /// Full-frame estimate: sigma-clipped flux ratio, effective offsets.
    ///
    /// Falls back to a ratio of 1 when no match carries a finite positive
    /// ratio, and to zero offsets along an axis whose estimate is not finite.
    pub fn global(matches: &[StarMatch], pixel_scale: f64, clip_sigma: f64, clip_iterations: usize) -> Self {
        if matches.is_empty() {
            warn!("No catalog matches; assuming flux ratio 1 and zero offsets");
            return Self::fallback();
        }
        let ratios: Vec<f64> = matches.iter().map(|m| m.flux_ratio).collect();
        let clipped = sigma_clipped_stats(&ratios, clip_sigma, clip_iterations);
        let (dx, dy) = pixel_offsets(matches, pixel_scale);
        let fallback = Self::fallback();

        let (flux_ratio, flux_ratio_std) =
            if clipped.count > 0 && clipped.median.is_finite() && clipped.median > 0.0 {
                (clipped.median, clipped.std_dev)
            } else {
                warn!(
                    matches = matches.len(),
                    "No usable flux ratio among matches; assuming flux ratio 1"
                );
                (fallback.flux_ratio, fallback.flux_ratio_std)
            };

        Self {
            flux_ratio,
            flux_ratio_std,
            dx: finite_or(effective_magnitude(&dx), fallback.dx, "x"),
            dy: finite_or(effective_magnitude(&dy), fallback.dy, "y"),
            count: matches.len(),
        }
    }

    /// Estimate from the matches strictly inside `inner`; `None` if there are none.
    pub fn local(matches: &[StarMatch], inner: &Bounds, pixel_scale: f64) -> Option<Self> {
        let subset: Vec<StarMatch> = matches
            .iter()
            .filter(|m| inner.contains_strict(m.x, m.y))
            .copied()
            .collect();
        if subset.is_empty() {
            return None;
        }
        let ratios: Vec<f64> = subset.iter().map(|m| m.flux_ratio).collect();
        let (dx, dy) = pixel_offsets(&subset, pixel_scale);

        Some(Self {
            flux_ratio: median(&ratios),
            flux_ratio_std: std_dev(&ratios),
            dx: effective_magnitude(&dx),
            dy: effective_magnitude(&dy),
            count: subset.len(),
        })
    }
}

fn finite_or(value: f64, fallback: f64, axis: &str) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!(axis, "Non-finite global offset; assuming zero");
        fallback
    }
}

fn pixel_offsets(matches: &[StarMatch], pixel_scale: f64) -> (Vec<f64>, Vec<f64>) {
    matches
        .iter()
        .map(|m| (m.dra / pixel_scale, m.ddec / pixel_scale))
        .unzip()
}
