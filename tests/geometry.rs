mod common;

use proptest::prelude::*;

use bevy_extruded_text::font::Font;
use bevy_extruded_text::text_mesh::{build_text, group_offset, layout_characters, TextGeometry};
use bevy_extruded_text::TextStyleConfig;

fn fixture_font() -> Font {
    let bytes = std::fs::read(common::fixture_font_path()).unwrap();
    Font::from_bytes(bytes).unwrap()
}

fn outline_center(geometry: &TextGeometry) -> Option<(f32, f32)> {
    match geometry {
        TextGeometry::Outline(buffers) => {
            let center = buffers.bounds().unwrap().center();
            Some((center.x, center.y))
        }
        _ => None,
    }
}

#[test]
fn mixed_scripts_build_centered_outlines() {
    let font = fixture_font();
    // glyphs missing from the face are substituted, never dropped
    for text in ["A", "안녕", "Hello 세계", "a longer line of text to extrude"] {
        let built = build_text(&TextStyleConfig::new(text), Some(&font)).unwrap();
        let (x, y) = outline_center(&built.geometry)
            .unwrap_or_else(|| panic!("no outline for {text:?}"));
        assert!(x.abs() < 1e-3 && y.abs() < 1e-3, "{text:?} centered at ({x}, {y})");
    }
}

#[test]
fn multiline_text_stacks_downwards() {
    let font = fixture_font();
    let one = build_text(&TextStyleConfig::new("A"), Some(&font)).unwrap();
    let two = build_text(&TextStyleConfig::new("A\nA"), Some(&font)).unwrap();
    let height = |built: &bevy_extruded_text::BuiltText| match &built.geometry {
        TextGeometry::Outline(buffers) => buffers.bounds().unwrap().size().y,
        other => panic!("expected outline, got {other:?}"),
    };
    assert!(height(&two) > height(&one) * 1.5);
}

#[test]
fn empty_text_has_no_geometry() {
    let font = fixture_font();
    let built = build_text(&TextStyleConfig::new(""), Some(&font)).unwrap();
    assert_eq!(built.geometry, TextGeometry::Empty);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn outlines_stay_centered(
        text in "[A-Za-z0-9가-힣]{1,8}",
        font_size in 1.0f32..20.0,
        depth in 0.0f32..5.0,
    ) {
        let font = fixture_font();
        let config = TextStyleConfig::new(text)
            .with_font_size(font_size)
            .with_depth(depth);
        let built = build_text(&config, Some(&font)).unwrap();
        let (x, y) = outline_center(&built.geometry).unwrap();
        let tolerance = 1e-4 * font_size.max(1.0) * 10.0;
        prop_assert!(x.abs() < tolerance && y.abs() < tolerance, "centered at ({}, {})", x, y);
    }

    #[test]
    fn character_boxes_are_centered_as_a_group(
        text in "[a-zA-Z가-힣 ]{1,16}",
        font_size in 1.0f32..20.0,
    ) {
        let slots = layout_characters(&text, font_size);
        prop_assume!(!slots.is_empty());
        let offset = group_offset(&slots);
        let left = slots[0].left + offset;
        let right = slots[slots.len() - 1].right() + offset;
        prop_assert!((left + right).abs() < 1e-3 * font_size);
    }
}
