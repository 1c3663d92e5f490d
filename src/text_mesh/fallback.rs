//! Box layout used when no outline font is available.
//!
//! Every visible character becomes a rounded rectangle extruded to the text
//! depth, sized after a rough guess of how wide the glyph would be.

use bevy::prelude::*;
use lyon::math::{point, Box2D};
use lyon::path::{builder::BorderRadii, Path, Winding};

use super::extrude::{extrude_path, ExtrudeOptions};
use super::geometry::MeshBuffers;
use super::GeometryError;

/// Gap between neighbouring boxes, relative to the font size.
pub const CHARACTER_SPACING: f32 = 0.1;
/// Advance of a space, relative to the font size.
pub const SPACE_ADVANCE: f32 = 0.5;

fn is_hangul_syllable(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

/// Width of the box standing in for `c`.
pub fn character_width(c: char, font_size: f32) -> f32 {
    let factor = match c {
        c if is_hangul_syllable(c) => 0.9,
        'm' | 'w' | 'M' | 'W' => 0.8,
        'i' | 'l' | 't' | 'j' | 'f' | 'I' => 0.4,
        _ => 0.6,
    };
    factor * font_size
}

/// Horizontal placement of one character box before the group is centered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterSlot {
    pub character: char,
    pub left: f32,
    pub width: f32,
}

impl CharacterSlot {
    pub fn center(&self) -> f32 {
        self.left + self.width * 0.5
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }
}

/// Lays `text` out left to right. Spaces only move the cursor.
pub fn layout_characters(text: &str, font_size: f32) -> Vec<CharacterSlot> {
    let mut cursor = 0.0;
    let mut slots = Vec::new();
    for character in text.chars() {
        if character == ' ' {
            cursor += SPACE_ADVANCE * font_size;
            continue;
        }
        let width = character_width(character, font_size);
        slots.push(CharacterSlot {
            character,
            left: cursor,
            width,
        });
        cursor += width + CHARACTER_SPACING * font_size;
    }
    slots
}

/// Offset that centers the horizontal extent of `slots` on the origin.
pub fn group_offset(slots: &[CharacterSlot]) -> f32 {
    let (Some(first), Some(last)) = (slots.first(), slots.last()) else {
        return 0.0;
    };
    -(first.left + last.right()) * 0.5
}

/// One extruded box, centered on its own origin.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterBox {
    pub character: char,
    /// Center of the box inside the group, before the group offset
    pub x: f32,
    pub size: Vec2,
    pub buffers: MeshBuffers,
}

fn rounded_rect(size: Vec2) -> Path {
    let half = size * 0.5;
    let radius = size.min_element() * 0.1;
    let mut builder = Path::builder();
    builder.add_rounded_rectangle(
        &Box2D::new(point(-half.x, -half.y), point(half.x, half.y)),
        &BorderRadii::new(radius),
        Winding::Positive,
    );
    builder.build()
}

pub fn build_character_boxes(
    text: &str,
    font_size: f32,
    depth: f32,
) -> Result<(f32, Vec<CharacterBox>), GeometryError> {
    let slots = layout_characters(text, font_size);
    let options = ExtrudeOptions {
        depth,
        bevel: None,
        tolerance: 0.01 * font_size,
    };
    let characters = slots
        .iter()
        .map(|slot| {
            let size = Vec2::new(slot.width, font_size);
            Ok(CharacterBox {
                character: slot.character,
                x: slot.center(),
                size,
                buffers: extrude_path(&rounded_rect(size), &options)?,
            })
        })
        .collect::<Result<Vec<_>, GeometryError>>()?;
    Ok((group_offset(&slots), characters))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_script() {
        assert_eq!(character_width('안', 10.0), 9.0);
        assert_eq!(character_width('W', 10.0), 8.0);
        assert_eq!(character_width('i', 10.0), 4.0);
        assert_eq!(character_width('a', 10.0), 6.0);
        assert_eq!(character_width('7', 10.0), 6.0);
    }

    #[test]
    fn lays_out_ab() {
        let slots = layout_characters("ab", 10.0);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].center(), 3.0);
        assert_eq!(slots[1].left, 7.0);
        assert_eq!(slots[1].center(), 10.0);
        assert_eq!(slots[1].right() - slots[0].left, 13.0);
        assert_eq!(group_offset(&slots), -6.5);
    }

    #[test]
    fn spaces_only_advance() {
        let slots = layout_characters("a b", 10.0);
        assert_eq!(slots.len(), 2);
        // 6 wide, 1 gap, 5 for the space
        assert_eq!(slots[1].left, 12.0);
    }

    #[test]
    fn blank_text_has_no_boxes() {
        let (offset, boxes) = build_character_boxes("   ", 4.0, 0.5).unwrap();
        assert!(boxes.is_empty());
        assert_eq!(offset, 0.0);
    }

    #[test]
    fn boxes_are_centered_on_their_origin() {
        let (_, boxes) = build_character_boxes("가", 4.0, 0.5).unwrap();
        let bounds = boxes[0].buffers.bounds().unwrap();
        assert!((bounds.center() - Vec3::new(0.0, 0.0, 0.25)).length() < 1e-4);
        assert!((bounds.size() - Vec3::new(3.6, 4.0, 0.5)).length() < 1e-4);
    }
}
