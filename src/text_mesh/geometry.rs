use bevy::{
    prelude::*,
    render::{
        mesh::{Indices, PrimitiveTopology},
        render_asset::RenderAssetUsages,
    },
};

/// Axis aligned bounds of a set of vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Indexed triangle list with per-vertex normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffers {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position.to_array());
        self.normals.push(normal.normalize_or_zero().to_array());
        index
    }

    pub fn position(&self, index: u32) -> Vec3 {
        Vec3::from_array(self.positions[index as usize])
    }

    /// Adds a triangle wound counter-clockwise when seen from the side `facing` points to.
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32, facing: Vec3) {
        let (pa, pb, pc) = (self.position(a), self.position(b), self.position(c));
        let normal = (pb - pa).cross(pc - pa);
        if normal.dot(facing) < 0.0 {
            self.indices.extend([a, c, b]);
        } else {
            self.indices.extend([a, b, c]);
        }
    }

    pub fn push_quad(&mut self, a: u32, b: u32, c: u32, d: u32, facing: Vec3) {
        self.push_triangle(a, b, c, facing);
        self.push_triangle(a, c, d, facing);
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut points = self.positions.iter().copied().map(Vec3::from_array);
        let first = points.next()?;
        Some(points.fold(Bounds::new(first, first), |bounds, p| {
            Bounds::new(bounds.min.min(p), bounds.max.max(p))
        }))
    }

    pub fn translate(&mut self, offset: Vec3) {
        for position in &mut self.positions {
            *position = (Vec3::from_array(*position) + offset).to_array();
        }
    }

    pub fn into_mesh(self) -> Mesh {
        Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
        )
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, self.positions)
        .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals)
        .with_inserted_indices(Indices::U32(self.indices))
    }
}
