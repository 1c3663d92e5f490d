use bevy::prelude::*;

use super::extrude::{extrude_path, ExtrudeOptions, TEXT_BEVEL};
use super::fallback::{build_character_boxes, CharacterBox};
use super::geometry::MeshBuffers;
use super::{CharacterMesh, GeometryError, TextMesh};
use crate::config::TextStyleConfig;
use crate::font::Font;

/// Flattening tolerance for glyph curves, in em.
pub const CURVE_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub enum TextGeometry {
    /// All glyphs extruded into one mesh, centered on X/Y
    Outline(MeshBuffers),
    /// One box per visible character, shifted by `group_offset` along X
    CharacterGroup {
        group_offset: f32,
        characters: Vec<CharacterBox>,
    },
    /// Nothing visible to draw
    Empty,
}

/// Geometry plus everything needed to put it into the world.
#[derive(Debug, Clone)]
pub struct BuiltText {
    pub geometry: TextGeometry,
    pub config: TextStyleConfig,
}

/// Builds the mesh data for `config`, from `font` when there is one and from
/// character boxes otherwise. Pure: the same inputs give the same geometry.
pub fn build_text(
    config: &TextStyleConfig,
    font: Option<&Font>,
) -> Result<BuiltText, GeometryError> {
    if !config.font_size.is_finite() || config.font_size <= 0.0 {
        return Err(GeometryError::InvalidParameter {
            name: "font size",
            value: config.font_size,
        });
    }
    if !config.depth.is_finite() || config.depth < 0.0 {
        return Err(GeometryError::InvalidParameter {
            name: "depth",
            value: config.depth,
        });
    }

    let geometry = match font {
        Some(font) => build_outline(font, config)?,
        None => {
            let (group_offset, characters) =
                build_character_boxes(&config.text, config.font_size, config.depth)?;
            if characters.is_empty() {
                TextGeometry::Empty
            } else {
                TextGeometry::CharacterGroup {
                    group_offset,
                    characters,
                }
            }
        }
    };

    Ok(BuiltText {
        geometry,
        config: config.clone(),
    })
}

fn build_outline(font: &Font, config: &TextStyleConfig) -> Result<TextGeometry, GeometryError> {
    let path = font.outline_text(&config.text, config.font_size);
    let mut buffers = extrude_path(
        &path,
        &ExtrudeOptions {
            depth: config.depth,
            bevel: Some(TEXT_BEVEL),
            tolerance: CURVE_TOLERANCE * config.font_size,
        },
    )?;
    let Some(bounds) = buffers.bounds() else {
        return Ok(TextGeometry::Empty);
    };
    let center = bounds.center();
    buffers.translate(Vec3::new(-center.x, -center.y, 0.0));
    Ok(TextGeometry::Outline(buffers))
}

fn text_material(config: &TextStyleConfig) -> StandardMaterial {
    StandardMaterial {
        base_color: config.color.to_color(),
        perceptual_roughness: 0.35,
        metallic: 0.1,
        ..default()
    }
}

impl BuiltText {
    pub fn is_empty(&self) -> bool {
        matches!(self.geometry, TextGeometry::Empty)
    }

    /// Spawns the text as an entity tree and returns its root.
    ///
    /// The root carries the config transform and a [`TextMesh`] that owns every
    /// mesh and material created here.
    pub fn spawn(
        self,
        commands: &mut Commands,
        meshes: &mut Assets<Mesh>,
        materials: &mut Assets<StandardMaterial>,
    ) -> (Entity, TextMesh) {
        let transform = self.config.transform();
        let name = Name::new(format!("text `{}`", self.config.text));

        match self.geometry {
            TextGeometry::Outline(buffers) => {
                let mesh = meshes.add(buffers.into_mesh());
                let material = materials.add(text_material(&self.config));
                let text_mesh = TextMesh::Outline {
                    mesh: mesh.clone(),
                    material: material.clone(),
                };
                let entity = commands
                    .spawn((
                        PbrBundle {
                            mesh,
                            material,
                            transform,
                            ..default()
                        },
                        text_mesh.clone(),
                        name,
                    ))
                    .id();
                (entity, text_mesh)
            }
            TextGeometry::CharacterGroup {
                group_offset,
                characters,
            } => {
                let root = commands
                    .spawn((SpatialBundle::from_transform(transform), name))
                    .id();
                let characters: Vec<CharacterMesh> = characters
                    .into_iter()
                    .map(|character| {
                        let mesh = meshes.add(character.buffers.into_mesh());
                        // each box gets its own material
                        let material = materials.add(text_material(&self.config));
                        let entity = commands
                            .spawn((
                                PbrBundle {
                                    mesh: mesh.clone(),
                                    material: material.clone(),
                                    transform: Transform::from_xyz(
                                        character.x + group_offset,
                                        0.0,
                                        0.0,
                                    ),
                                    ..default()
                                },
                                Name::new(character.character.to_string()),
                            ))
                            .set_parent(root)
                            .id();
                        CharacterMesh {
                            entity,
                            character: character.character,
                            mesh,
                            material,
                        }
                    })
                    .collect();
                let text_mesh = TextMesh::CharacterGroup { characters };
                commands.entity(root).insert(text_mesh.clone());
                (root, text_mesh)
            }
            TextGeometry::Empty => {
                let entity = commands
                    .spawn((
                        SpatialBundle::from_transform(transform),
                        TextMesh::Empty,
                        name,
                    ))
                    .id();
                (entity, TextMesh::Empty)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::test_font;

    fn centered(buffers: &MeshBuffers) -> bool {
        let center = buffers.bounds().unwrap().center();
        center.x.abs() < 1e-3 && center.y.abs() < 1e-3
    }

    #[test]
    fn outline_is_centered() {
        let font = test_font();
        for text in ["A", "Hello, world", "g"] {
            let built = build_text(&TextStyleConfig::new(text), Some(&font)).unwrap();
            match &built.geometry {
                TextGeometry::Outline(buffers) => assert!(centered(buffers), "{text}"),
                other => panic!("expected outline for {text}, got {other:?}"),
            }
        }
    }

    #[test]
    fn outline_spans_the_extrusion() {
        let font = test_font();
        let config = TextStyleConfig::new("A").with_depth(2.0);
        let built = build_text(&config, Some(&font)).unwrap();
        let TextGeometry::Outline(buffers) = built.geometry else {
            panic!("expected outline");
        };
        let bounds = buffers.bounds().unwrap();
        assert!((bounds.min.z + TEXT_BEVEL.thickness).abs() < 1e-4);
        assert!((bounds.max.z - 2.0 - TEXT_BEVEL.thickness).abs() < 1e-4);
    }

    #[test]
    fn blank_text_is_empty() {
        let font = test_font();
        for font in [Some(&font), None] {
            for text in ["", "   "] {
                let built = build_text(&TextStyleConfig::new(text), font).unwrap();
                assert!(built.is_empty());
            }
        }
    }

    #[test]
    fn fallback_without_font() {
        let config = TextStyleConfig::new("ab").with_font_size(10.0);
        let built = build_text(&config, None).unwrap();
        let TextGeometry::CharacterGroup {
            group_offset,
            characters,
        } = built.geometry
        else {
            panic!("expected character group");
        };
        assert_eq!(group_offset, -6.5);
        let xs: Vec<f32> = characters.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![3.0, 10.0]);
        assert_eq!(characters[0].size, Vec2::new(6.0, 10.0));
    }

    #[test]
    fn rejects_nonsense_parameters() {
        let bad_size = TextStyleConfig::new("a").with_font_size(0.0);
        assert!(matches!(
            build_text(&bad_size, None),
            Err(GeometryError::InvalidParameter { .. })
        ));
        let bad_depth = TextStyleConfig::new("a").with_depth(f32::NAN);
        assert!(build_text(&bad_depth, None).is_err());
    }

    #[test]
    fn identical_inputs_build_identical_geometry() {
        let font = test_font();
        let config = TextStyleConfig::new("Rust 3D").with_font_size(3.0);
        let first = build_text(&config, Some(&font)).unwrap();
        let second = build_text(&config, Some(&font)).unwrap();
        assert_eq!(first.geometry, second.geometry);
    }
}
