// Copyright (c) 2026 rezky_nightky

use crate::cell::{CharacterCell, Vertex};

/// A depth bucket. Smaller `depth` is farther away: smaller cells, more
/// columns, more blur and a lower peak alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthLayer {
    pub depth: f32,
    pub fade_exponent: f32,
}

impl DepthLayer {
    pub const fn new(depth: f32, fade_exponent: f32) -> Self {
        Self {
            depth,
            fade_exponent,
        }
    }

    pub fn fade(&self) -> f32 {
        self.depth.powf(self.fade_exponent)
    }

    /// Side of one square cell, in view units.
    pub fn cell_size(&self, view_width: f32, column_count: u32) -> f32 {
        view_width / column_count.max(1) as f32 * self.depth
    }

    /// Virtual columns across the view at this depth.
    pub fn columns(&self, column_count: u32) -> u32 {
        ((column_count as f32 / self.depth) as u32).max(1)
    }
}

/// Farthest first; the last entry is the sharp foreground layer.
pub const DEFAULT_LAYERS: [DepthLayer; 5] = [
    DepthLayer::new(0.15, 0.6),
    DepthLayer::new(0.25, 0.55),
    DepthLayer::new(0.4, 0.5),
    DepthLayer::new(0.65, 0.45),
    DepthLayer::new(1.0, 0.0),
];

/// Per-layer vertex lists, rebuilt from scratch every frame.
#[derive(Clone, Debug, Default)]
pub struct LayerGrids {
    grids: Vec<Vec<Vertex>>,
}

impl LayerGrids {
    pub fn new(layers: usize) -> Self {
        Self {
            grids: vec![Vec::new(); layers],
        }
    }

    pub fn layer_count(&self) -> usize {
        self.grids.len()
    }

    /// Empties every grid but keeps the allocations.
    pub fn clear(&mut self) {
        for g in &mut self.grids {
            g.clear();
        }
    }

    /// Appends `cell` to `layer`. Zero-area cells (blank glyphs) add nothing.
    pub fn push(&mut self, layer: usize, cell: &CharacterCell) {
        if cell.is_degenerate() {
            return;
        }
        if let Some(g) = self.grids.get_mut(layer) {
            g.extend_from_slice(&cell.vertices);
        }
    }

    pub fn vertices(&self, layer: usize) -> &[Vertex] {
        self.grids.get(layer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell_count(&self, layer: usize) -> usize {
        self.vertices(layer).len() / 6
    }

    #[cfg(test)]
    pub fn total_cells(&self) -> usize {
        self.grids.iter().map(|g| g.len() / 6).sum()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.layer_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::Glyph;

    #[test]
    fn farther_layers_have_more_columns_and_less_fade() {
        let far = DEFAULT_LAYERS[0];
        let near = DEFAULT_LAYERS[DEFAULT_LAYERS.len() - 1];
        assert!(far.columns(64) > near.columns(64));
        assert_eq!(near.columns(64), 64);
        assert!(far.fade() < near.fade());
        assert_eq!(near.fade(), 1.0);
        assert!((far.cell_size(64.0, 64) - 0.15).abs() < 1e-6);
    }

    #[test]
    fn grids_clear_between_frames() {
        let glyph = Glyph {
            code_point: '1',
            uv0: [0.0, 1.0],
            uv1: [1.0, 0.0],
            advance: 1.0,
            offset: [0.0, 0.0],
            size: [1.0, 1.0],
        };
        let cell = CharacterCell::new(&glyph, [1.0; 4], [0.0, 0.0], 1.0);
        let mut g = LayerGrids::new(2);
        g.push(1, &cell);
        g.push(1, &cell);
        g.push(7, &cell);
        g.push(0, &CharacterCell::default());
        assert_eq!(g.cell_count(1), 2);
        assert_eq!(g.cell_count(0), 0);
        assert_eq!(g.total_cells(), 2);
        g.clear();
        assert_eq!(g.total_cells(), 0);
        assert_eq!(g.len(), 2);
    }
}
