// Copyright (c) 2026 rezky_nightky

use crate::glyph::Glyph;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// One glyph's worth of quad geometry: two triangles, six vertices.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CharacterCell {
    pub vertices: [Vertex; 6],
}

impl CharacterCell {
    /// Builds the quad for `glyph` in a square cell of side `size` whose top
    /// left corner is `pos` (view coordinates, y grows downwards). The glyph's
    /// normalized offset and size place it inside the cell.
    pub fn new(glyph: &Glyph, color: [f32; 4], pos: [f32; 2], size: f32) -> Self {
        let mut cell = Self::default();
        cell.set_color(color);
        cell.set_glyph(glyph);
        cell.set_position(glyph, pos, size);
        cell
    }

    pub fn set_color(&mut self, color: [f32; 4]) {
        for v in &mut self.vertices {
            v.color = color;
        }
    }

    pub fn set_glyph(&mut self, g: &Glyph) {
        let v = &mut self.vertices;
        v[0].uv = [g.uv0[0], g.uv1[1]];
        v[1].uv = [g.uv0[0], g.uv0[1]];
        v[2].uv = [g.uv1[0], g.uv1[1]];
        v[3].uv = [g.uv0[0], g.uv0[1]];
        v[4].uv = [g.uv1[0], g.uv0[1]];
        v[5].uv = [g.uv1[0], g.uv1[1]];
    }

    pub fn set_position(&mut self, g: &Glyph, pos: [f32; 2], size: f32) {
        let fx = pos[0] + g.offset[0] * size;
        let fy = pos[1] + g.offset[1] * size;
        let w = g.size[0] * size;
        let h = g.size[1] * size;

        let v = &mut self.vertices;
        v[0].position = [fx, fy];
        v[1].position = [fx, fy + h];
        v[2].position = [fx + w, fy];
        v[3].position = [fx, fy + h];
        v[4].position = [fx + w, fy + h];
        v[5].position = [fx + w, fy];
    }

    /// Top-left and bottom-right corners in view coordinates.
    pub fn bounds(&self) -> ([f32; 2], [f32; 2]) {
        (self.vertices[0].position, self.vertices[4].position)
    }

    pub fn is_degenerate(&self) -> bool {
        let (a, b) = self.bounds();
        b[0] <= a[0] || b[1] <= a[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph() -> Glyph {
        Glyph {
            code_point: 'A',
            uv0: [0.1, 0.4],
            uv1: [0.3, 0.2],
            advance: 1.0,
            offset: [0.25, 0.125],
            size: [0.5, 0.75],
        }
    }

    #[test]
    fn uv_rect_comes_from_the_glyph() {
        let c = CharacterCell::new(&glyph(), [1.0; 4], [0.0, 0.0], 1.0);
        let us: Vec<f32> = c.vertices.iter().map(|v| v.uv[0]).collect();
        let vs: Vec<f32> = c.vertices.iter().map(|v| v.uv[1]).collect();
        assert!(us.iter().all(|&u| u == 0.1 || u == 0.3));
        assert!(vs.iter().all(|&v| v == 0.4 || v == 0.2));
        assert_eq!(c.vertices[0].uv, [0.1, 0.2]);
    }

    #[test]
    fn position_is_scaled_by_glyph_metrics() {
        let c = CharacterCell::new(&glyph(), [1.0; 4], [4.0, 8.0], 2.0);
        let (tl, br) = c.bounds();
        assert_eq!(tl, [4.5, 8.25]);
        assert_eq!(br, [5.5, 9.75]);
        assert!(!c.is_degenerate());
    }

    #[test]
    fn color_is_shared_by_every_vertex() {
        let c = CharacterCell::new(&glyph(), [2.0, 1.0, 0.5, 0.25], [0.0, 0.0], 1.0);
        assert!(c.vertices.iter().all(|v| v.color == [2.0, 1.0, 0.5, 0.25]));
    }
}
