use ndarray::{s, Array2, ArrayViewMut2, Axis};

use crate::error::{Result, ZogyError};

/// Half-open rectangle `[y0, y1) x [x0, x1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub y0: usize,
    pub y1: usize,
    pub x0: usize,
    pub x1: usize,
}

impl Bounds {
    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    /// Strict containment, matching how star positions are assigned to tiles.
    pub fn contains_strict(&self, x: f64, y: f64) -> bool {
        y > self.y0 as f64 && y < self.y1 as f64 && x > self.x0 as f64 && x < self.x1 as f64
    }
}

/// One processing tile.
#[derive(Clone, Debug)]
pub struct Tile {
    pub index: usize,
    /// Region of the frame this tile is responsible for.
    pub inner: Bounds,
    /// Inner region grown by the border, clipped to the frame.
    pub fetch: Bounds,
    /// Where `fetch` lands inside the padded tile buffer.
    pub dest: Bounds,
    /// Where `inner` lands inside the padded tile buffer.
    pub inner_in_buffer: Bounds,
    /// Center row in frame coordinates.
    pub cy: f64,
    /// Center column in frame coordinates.
    pub cx: f64,
}

impl Tile {
    /// Copy this tile's fetch region into a zero-filled padded buffer.
    pub fn extract(&self, data: &Array2<f32>, padded: usize) -> Array2<f64> {
        let mut buffer = Array2::<f64>::zeros((padded, padded));
        let src = data.slice(s![self.fetch.y0..self.fetch.y1, self.fetch.x0..self.fetch.x1]);
        buffer
            .slice_mut(s![self.dest.y0..self.dest.y1, self.dest.x0..self.dest.x1])
            .zip_mut_with(&src, |d, &v| *d = v as f64);
        buffer
    }

    /// Write the inner region of a padded tile raster, multiplied by `scale`,
    /// into `out` (the tile's cell of a mosaic).
    pub fn store_inner(&self, buffer: &Array2<f64>, out: &mut ArrayViewMut2<'_, f32>, scale: f64) -> Result<()> {
        let b = self.inner_in_buffer;
        if out.dim() != (b.height(), b.width()) {
            return Err(ZogyError::ShapeMismatch {
                expected: (b.height(), b.width()),
                actual: out.dim(),
            });
        }
        out.zip_mut_with(&buffer.slice(s![b.y0..b.y1, b.x0..b.x1]), |o, &v| {
            *o = (v * scale) as f32
        });
        Ok(())
    }
}

/// A regular grid of tiles covering a frame exactly once.
#[derive(Clone, Debug)]
pub struct TileGrid {
    pub tiles: Vec<Tile>,
    pub tile_size: usize,
    pub border: usize,
    pub frame_height: usize,
    pub frame_width: usize,
    pub ny: usize,
    pub nx: usize,
}

impl TileGrid {
    /// Plan the tiles for a `height x width` frame.
    ///
    /// Tile counts along each axis are `ceil(dim / tile_size)`; the last row
    /// and column absorb the remainder.
    pub fn plan(height: usize, width: usize, tile_size: usize, border: usize) -> Result<Self> {
        if tile_size == 0 {
            return Err(ZogyError::InvalidConfig("tile size must be positive".into()));
        }
        if height == 0 || width == 0 {
            return Err(ZogyError::InvalidConfig(format!(
                "cannot tile an empty {height}x{width} frame"
            )));
        }
        let padded = tile_size + 2 * border;
        if padded % 2 != 0 {
            return Err(ZogyError::OddDimension {
                what: "padded tile",
                height: padded,
                width: padded,
            });
        }

        let ny = height.div_ceil(tile_size);
        let nx = width.div_ceil(tile_size);
        let mut tiles = Vec::with_capacity(ny * nx);

        for j in 0..ny {
            let (y0, y1) = axis_span(j, ny, tile_size, height);
            for i in 0..nx {
                let (x0, x1) = axis_span(i, nx, tile_size, width);
                let inner = Bounds { y0, y1, x0, x1 };

                let fetch = Bounds {
                    y0: y0.saturating_sub(border),
                    y1: (y1 + border).min(height),
                    x0: x0.saturating_sub(border),
                    x1: (x1 + border).min(width),
                };
                // Buffer row of frame row y is y - (y0 - border).
                let dest = Bounds {
                    y0: fetch.y0 + border - y0,
                    y1: fetch.y1 + border - y0,
                    x0: fetch.x0 + border - x0,
                    x1: fetch.x1 + border - x0,
                };
                let inner_in_buffer = Bounds {
                    y0: border,
                    y1: border + inner.height(),
                    x0: border,
                    x1: border + inner.width(),
                };

                tiles.push(Tile {
                    index: tiles.len(),
                    inner,
                    fetch,
                    dest,
                    inner_in_buffer,
                    cy: y0 as f64 + inner.height() as f64 / 2.0,
                    cx: x0 as f64 + inner.width() as f64 / 2.0,
                });
            }
        }

        Ok(Self {
            tiles,
            tile_size,
            border,
            frame_height: height,
            frame_width: width,
            ny,
            nx,
        })
    }

    /// Split a frame-sized view into the disjoint inner regions of the tiles,
    /// in tile order.
    pub fn split_inner<'a, T>(&self, frame: ArrayViewMut2<'a, T>) -> Result<Vec<ArrayViewMut2<'a, T>>> {
        if frame.dim() != (self.frame_height, self.frame_width) {
            return Err(ZogyError::ShapeMismatch {
                expected: (self.frame_height, self.frame_width),
                actual: frame.dim(),
            });
        }
        let mut cells = Vec::with_capacity(self.len());
        let mut rest = frame;
        for row in self.tiles.chunks(self.nx) {
            let (mut band, tail) = rest.split_at(Axis(0), row[0].inner.height());
            rest = tail;
            for tile in row {
                let (cell, tail) = band.split_at(Axis(1), tile.inner.width());
                cells.push(cell);
                band = tail;
            }
        }
        Ok(cells)
    }

    /// Side length of every padded tile buffer.
    pub fn padded_size(&self) -> usize {
        self.tile_size + 2 * self.border
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

fn axis_span(index: usize, count: usize, tile_size: usize, dim: usize) -> (usize, usize) {
    let start = index * tile_size;
    let size = if index == count - 1 {
        dim - start
    } else {
        tile_size
    };
    (start, start + size)
}
