use ndarray::Array2;

use zogy_core::error::ZogyError;
use zogy_core::tiles::TileGrid;

#[test]
fn test_inner_regions_partition_frame() {
    let shapes = [(64, 64), (100, 37), (2048, 2048), (300, 1030), (17, 129)];
    let layouts = [(16, 4), (32, 0), (64, 8), (1024, 28)];

    for &(h, w) in &shapes {
        for &(tile, border) in &layouts {
            let grid = TileGrid::plan(h, w, tile, border).unwrap();
            let padded = grid.padded_size();
            let mut coverage = Array2::<u32>::zeros((h, w));

            for t in &grid.tiles {
                let b = t.inner;
                assert!(b.y1 <= h && b.x1 <= w);
                assert!(b.height() <= tile && b.width() <= tile);
                for y in b.y0..b.y1 {
                    for x in b.x0..b.x1 {
                        coverage[[y, x]] += 1;
                    }
                }
                assert!(t.fetch.y0 <= b.y0 && t.fetch.y1 >= b.y1);
                assert!(t.fetch.x0 <= b.x0 && t.fetch.x1 >= b.x1);
                assert_eq!(t.dest.height(), t.fetch.height());
                assert_eq!(t.dest.width(), t.fetch.width());
                assert!(t.dest.y1 <= padded && t.dest.x1 <= padded);
                assert_eq!(t.inner_in_buffer.y0, border);
                assert_eq!(t.inner_in_buffer.height(), b.height());
            }
            assert!(
                coverage.iter().all(|&c| c == 1),
                "{h}x{w} tile {tile} border {border} does not cover the frame exactly once"
            );
        }
    }
}

#[test]
fn test_tile_counts_per_axis() {
    let grid = TileGrid::plan(2500, 2048, 1024, 28).unwrap();
    assert_eq!(grid.ny, 3);
    assert_eq!(grid.nx, 2);
    assert_eq!(grid.len(), 6);
    let last = grid.tiles.last().unwrap();
    assert_eq!(last.inner.y0, 2048);
    assert_eq!(last.inner.height(), 452);
    assert_eq!(last.inner.width(), 1024);
}

#[test]
fn test_tile_centers() {
    let grid = TileGrid::plan(2048, 2048, 1024, 28).unwrap();
    let t = &grid.tiles[1];
    assert_eq!(t.cx, 1536.0);
    assert_eq!(t.cy, 512.0);
}

#[test]
fn test_split_inner_cells_match_tiles() {
    let grid = TileGrid::plan(70, 90, 32, 6).unwrap();
    let mut mosaic = Array2::<f32>::zeros((70, 90));
    let cells = grid.split_inner(mosaic.view_mut()).unwrap();
    assert_eq!(cells.len(), grid.len());
    for (t, mut cell) in grid.tiles.iter().zip(cells) {
        assert_eq!(cell.dim(), (t.inner.height(), t.inner.width()));
        cell.fill(t.index as f32 + 1.0);
    }
    for t in &grid.tiles {
        let b = t.inner;
        assert!(mosaic
            .slice(ndarray::s![b.y0..b.y1, b.x0..b.x1])
            .iter()
            .all(|&v| v == t.index as f32 + 1.0));
    }
}

#[test]
fn test_split_inner_rejects_wrong_shape() {
    let grid = TileGrid::plan(64, 64, 32, 4).unwrap();
    let mut mosaic = Array2::<f32>::zeros((64, 32));
    let err = grid.split_inner(mosaic.view_mut()).unwrap_err();
    assert!(matches!(err, ZogyError::ShapeMismatch { .. }));
}

#[test]
fn test_extract_then_store_restores_frame() {
    let data = Array2::from_shape_fn((70, 90), |(r, c)| (r * 90 + c) as f32);
    let grid = TileGrid::plan(70, 90, 32, 6).unwrap();
    let mut mosaic = Array2::<f32>::zeros((70, 90));
    let cells = grid.split_inner(mosaic.view_mut()).unwrap();
    for (t, mut cell) in grid.tiles.iter().zip(cells) {
        let buffer = t.extract(&data, grid.padded_size());
        t.store_inner(&buffer, &mut cell, 0.5).unwrap();
    }
    assert_eq!(mosaic, data.mapv(|v| v * 0.5));
}

#[test]
fn test_extract_zero_fills_outside_frame() {
    let data = Array2::from_elem((40, 40), 3.0f32);
    let grid = TileGrid::plan(40, 40, 20, 5).unwrap();
    let buffer = grid.tiles[0].extract(&data, grid.padded_size());
    assert_eq!(buffer[[0, 0]], 0.0);
    assert_eq!(buffer[[4, 10]], 0.0);
    assert_eq!(buffer[[5, 5]], 3.0);
    assert_eq!(buffer[[29, 29]], 3.0);
}

#[test]
fn test_odd_padded_size_rejected() {
    let err = TileGrid::plan(100, 100, 33, 4).unwrap_err();
    assert!(matches!(err, ZogyError::OddDimension { .. }));
}

#[test]
fn test_zero_tile_size_rejected() {
    assert!(TileGrid::plan(100, 100, 0, 4).is_err());
}
