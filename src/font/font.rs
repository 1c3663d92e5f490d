use std::fmt;
use std::sync::Arc;

use bevy::{math::Vec2, prelude::*};
use lyon::math::{point, Point};
use lyon::path::Path;
use nalgebra::{Affine2, Point2, Similarity2, Vector2};
use owned_ttf_parser::{AsFaceRef, OutlineBuilder, Rect};

pub use owned_ttf_parser::GlyphId;

use super::loader::FontLoadError;

/// Metrics of a single glyph, in em units.
#[derive(Debug, Clone)]
pub struct GlyphInfo {
    pub id: GlyphId,
    pub advance: Vec2,
    pub offset: Vec2,
    pub size: Vec2,
}

/// A parsed outline font. Cloning is cheap and clones share the face.
#[derive(Asset, TypePath, Clone)]
pub struct Font {
    face: Arc<owned_ttf_parser::OwnedFace>,
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font")
            .field("family", &self.family_name())
            .field("units_per_em", &self.units_per_em())
            .finish()
    }
}

impl Font {
    pub fn from(face: owned_ttf_parser::OwnedFace) -> Self {
        Self {
            face: Arc::new(face),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FontLoadError> {
        let face = owned_ttf_parser::OwnedFace::from_vec(bytes, 0)?;
        Ok(Self::from(face))
    }

    /// True when both handles point at the same parsed face.
    pub fn same_face(&self, other: &Font) -> bool {
        Arc::ptr_eq(&self.face, &other.face)
    }

    pub fn units_per_em(&self) -> f32 {
        self.face.as_face_ref().units_per_em() as f32
    }

    pub fn family_name(&self) -> Option<String> {
        self.face
            .as_face_ref()
            .names()
            .into_iter()
            .find(|name| name.name_id == owned_ttf_parser::name_id::FAMILY && name.is_unicode())
            .and_then(|name| name.to_string())
    }

    pub fn glyph(&self, code_point: char) -> Option<GlyphInfo> {
        let id = self.face.as_face_ref().glyph_index(code_point)?;
        Some(self.glyph_by_id(id))
    }

    /// Glyph for `code_point`, or the font's `?`, or `.notdef`.
    pub fn glyph_or_substitute(&self, code_point: char) -> GlyphInfo {
        self.glyph(code_point)
            .or_else(|| self.glyph('?'))
            .unwrap_or_else(|| self.glyph_by_id(GlyphId(0)))
    }

    fn glyph_by_id(&self, id: GlyphId) -> GlyphInfo {
        let face = self.face.as_face_ref();

        let bounds = face.glyph_bounding_box(id).unwrap_or(Rect {
            x_min: 0,
            y_min: 0,
            x_max: 0,
            y_max: 0,
        });
        let scale = 1f32 / face.units_per_em() as f32;

        GlyphInfo {
            id,
            advance: Vec2::new(
                face.glyph_hor_advance(id).unwrap_or_default() as f32,
                face.glyph_ver_advance(id).unwrap_or_default() as f32,
            ) * scale,
            offset: Vec2::new(bounds.x_min as f32, bounds.y_min as f32) * scale,
            size: Vec2::new(
                (bounds.x_max - bounds.x_min) as f32,
                (bounds.y_max - bounds.y_min) as f32,
            ) * scale,
        }
    }

    /// Distance between two baselines, in em units.
    pub fn line_height(&self) -> f32 {
        let face = self.face.as_face_ref();
        face.height() as f32 / face.units_per_em() as f32
    }

    /// Outlines `text` laid out left to right on a baseline at y = 0, scaled so
    /// one em equals `size` world units. `\n` starts a new line below.
    pub fn outline_text(&self, text: &str, size: f32) -> Path {
        let face = self.face.as_face_ref();
        let line_height = self.line_height() * size;
        let scale = size / face.units_per_em() as f32;

        let mut builder = Path::builder();
        let mut cursor = Vec2::ZERO;
        for code_point in text.chars() {
            if code_point == '\n' {
                cursor = Vec2::new(0.0, cursor.y - line_height);
                continue;
            }
            let glyph = self.glyph_or_substitute(code_point);
            let transform = nalgebra::convert::<_, Affine2<f32>>(Similarity2::new(
                Vector2::new(cursor.x, cursor.y),
                0.0,
                scale,
            ));
            let mut sink = PathSink {
                builder: &mut builder,
                transform,
                open: false,
            };
            face.outline_glyph(glyph.id, &mut sink);
            sink.finish();
            cursor.x += glyph.advance.x * size;
        }
        builder.build()
    }
}

/// Feeds glyph outlines into a lyon path, mapping font units through `transform`.
struct PathSink<'a> {
    builder: &'a mut lyon::path::path::Builder,
    transform: Affine2<f32>,
    open: bool,
}

impl PathSink<'_> {
    fn map(&self, x: f32, y: f32) -> Point {
        let p = self.transform * Point2::new(x, y);
        point(p.x, p.y)
    }

    fn finish(&mut self) {
        if self.open {
            self.builder.end(true);
            self.open = false;
        }
    }
}

impl OutlineBuilder for PathSink<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        // some fonts omit the closing segment before starting the next contour
        self.finish();
        let at = self.map(x, y);
        self.builder.begin(at);
        self.open = true;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let to = self.map(x, y);
        self.builder.line_to(to);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let ctrl = self.map(x1, y1);
        let to = self.map(x, y);
        self.builder.quadratic_bezier_to(ctrl, to);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let ctrl1 = self.map(x1, y1);
        let ctrl2 = self.map(x2, y2);
        let to = self.map(x, y);
        self.builder.cubic_bezier_to(ctrl1, ctrl2, to);
    }

    fn close(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::test_font as fixture;

    #[test]
    fn reads_family_and_metrics() {
        let font = fixture();
        assert_eq!(font.family_name().as_deref(), Some("DejaVu Sans"));
        assert_eq!(font.units_per_em(), 2048.0);
        assert!(font.line_height() > 1.0);
    }

    #[test]
    fn substitutes_missing_glyphs() {
        let font = fixture();
        // DejaVu Sans has no Hangul syllables
        assert!(font.glyph('안').is_none());
        let substitute = font.glyph_or_substitute('안');
        assert_eq!(substitute.id, font.glyph('?').unwrap().id);
    }

    #[test]
    fn outlines_scale_with_size() {
        let font = fixture();
        let small = font.outline_text("A", 1.0);
        let large = font.outline_text("A", 10.0);
        let max_x = |path: &Path| {
            path.iter()
                .map(|event| event.to().x)
                .fold(f32::MIN, f32::max)
        };
        assert!(small.iter().count() > 0);
        assert!((max_x(&large) / max_x(&small) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn spaces_have_no_outline() {
        let font = fixture();
        assert_eq!(font.outline_text("   ", 4.0).iter().count(), 0);
    }
}
