use bevy::prelude::*;
use thiserror::Error;

mod builder;
mod extrude;
mod fallback;
mod geometry;

pub use builder::{build_text, BuiltText, TextGeometry, CURVE_TOLERANCE};
pub use extrude::{contours, extrude_path, signed_area, Bevel, ExtrudeOptions, TEXT_BEVEL};
pub use fallback::{
    build_character_boxes, character_width, group_offset, layout_characters, CharacterBox,
    CharacterSlot, CHARACTER_SPACING, SPACE_ADVANCE,
};
pub use geometry::{Bounds, MeshBuffers};

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },
    /// lyon could not fill the glyph outlines
    #[error("tessellation failed: {0}")]
    Tessellation(String),
}

/// A character box spawned as a child of a [`TextMesh::CharacterGroup`].
#[derive(Debug, Clone)]
pub struct CharacterMesh {
    pub entity: Entity,
    pub character: char,
    pub mesh: Handle<Mesh>,
    pub material: Handle<StandardMaterial>,
}

/// Root of a spawned text. Owns the meshes and materials of the whole tree.
#[derive(Component, Debug, Clone)]
pub enum TextMesh {
    Outline {
        mesh: Handle<Mesh>,
        material: Handle<StandardMaterial>,
    },
    CharacterGroup {
        characters: Vec<CharacterMesh>,
    },
    Empty,
}

impl TextMesh {
    pub fn meshes(&self) -> Vec<&Handle<Mesh>> {
        match self {
            TextMesh::Outline { mesh, .. } => vec![mesh],
            TextMesh::CharacterGroup { characters } => {
                characters.iter().map(|c| &c.mesh).collect()
            }
            TextMesh::Empty => Vec::new(),
        }
    }

    pub fn materials(&self) -> Vec<&Handle<StandardMaterial>> {
        match self {
            TextMesh::Outline { material, .. } => vec![material],
            TextMesh::CharacterGroup { characters } => {
                characters.iter().map(|c| &c.material).collect()
            }
            TextMesh::Empty => Vec::new(),
        }
    }

    pub fn is_character_group(&self) -> bool {
        matches!(self, TextMesh::CharacterGroup { .. })
    }

    /// Frees the GPU side of this text. The entities are despawned separately.
    pub fn release(&self, meshes: &mut Assets<Mesh>, materials: &mut Assets<StandardMaterial>) {
        for mesh in self.meshes() {
            meshes.remove(mesh);
        }
        for material in self.materials() {
            materials.remove(material);
        }
    }
}
