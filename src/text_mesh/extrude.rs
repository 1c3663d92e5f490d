use std::f32::consts::FRAC_PI_2;

use bevy::prelude::*;
use lyon::math::point;
use lyon::path::{iterator::PathIterator, Path, PathEvent};
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, VertexBuffers,
};

use super::geometry::MeshBuffers;
use super::GeometryError;

/// Rounded edge between the caps and the side walls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bevel {
    /// How far the bevel reaches beyond the caps along Z
    pub thickness: f32,
    /// How far the side walls sit outside the outline
    pub size: f32,
    pub segments: u32,
}

/// The bevel every outline text mesh gets.
pub const TEXT_BEVEL: Bevel = Bevel {
    thickness: 0.03,
    size: 0.02,
    segments: 5,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrudeOptions {
    pub depth: f32,
    pub bevel: Option<Bevel>,
    /// Maximum distance between a curve and its flattened polyline
    pub tolerance: f32,
}

/// One loop of vertices around every contour, at a fixed depth and outline offset.
#[derive(Debug, Clone, Copy)]
struct Ring {
    z: f32,
    offset: f32,
    /// Normal split into its outward and Z parts
    normal: Vec2,
}

impl Ring {
    fn flat(z: f32) -> Self {
        Self {
            z,
            offset: 0.0,
            normal: Vec2::X,
        }
    }

    fn same_place(&self, other: &Ring) -> bool {
        (self.z - other.z).abs() <= f32::EPSILON
            && (self.offset - other.offset).abs() <= f32::EPSILON
    }
}

fn rings(depth: f32, bevel: Option<Bevel>) -> Vec<Ring> {
    let Some(bevel) = bevel.filter(|bevel| bevel.segments > 0) else {
        return vec![Ring::flat(0.0), Ring::flat(depth)];
    };
    let (t, s) = (bevel.thickness, bevel.size);
    let steps = bevel.segments;
    let quarter = |k: u32| k as f32 / steps as f32 * FRAC_PI_2;

    let back = (0..=steps).map(|k| {
        let theta = quarter(k);
        Ring {
            z: -t * theta.cos(),
            offset: s * theta.sin(),
            normal: Vec2::new(t * theta.sin(), -s * theta.cos())
                .try_normalize()
                .unwrap_or(Vec2::X),
        }
    });
    let front = (0..=steps).rev().map(|k| {
        let theta = quarter(k);
        Ring {
            z: depth + t * theta.cos(),
            offset: s * theta.sin(),
            normal: Vec2::new(t * theta.sin(), s * theta.cos())
                .try_normalize()
                .unwrap_or(Vec2::X),
        }
    });
    back.chain(front).collect()
}

/// Flattens `path` into closed polylines, dropping degenerate ones.
pub fn contours(path: &Path, tolerance: f32) -> Vec<Vec<Vec2>> {
    let mut contours = Vec::new();
    let mut current: Vec<Vec2> = Vec::new();
    for event in path.iter().flattened(tolerance) {
        match event {
            PathEvent::Begin { at } => {
                current.clear();
                current.push(Vec2::new(at.x, at.y));
            }
            PathEvent::Line { to, .. } => current.push(Vec2::new(to.x, to.y)),
            PathEvent::End { .. } => {
                let mut contour = std::mem::take(&mut current);
                contour.dedup_by(|a, b| a.distance_squared(*b) <= f32::EPSILON);
                if contour.len() > 1
                    && contour[0].distance_squared(contour[contour.len() - 1]) <= f32::EPSILON
                {
                    contour.pop();
                }
                if contour.len() >= 3 && signed_area(&contour).abs() > f32::EPSILON {
                    contours.push(contour);
                }
            }
            _ => {}
        }
    }
    contours
}

/// Shoelace area, positive for counter-clockwise loops.
pub fn signed_area(contour: &[Vec2]) -> f32 {
    let n = contour.len();
    (0..n)
        .map(|i| {
            let (a, b) = (contour[i], contour[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f32>()
        * 0.5
}

/// Extrudes the filled area of `path` along +Z from `0` to `depth`, adding
/// bevels beyond both ends when requested.
pub fn extrude_path(path: &Path, options: &ExtrudeOptions) -> Result<MeshBuffers, GeometryError> {
    let mut contours = contours(path, options.tolerance);
    if contours.is_empty() {
        return Ok(MeshBuffers::default());
    }

    // outer loops counter-clockwise, so filled area is left of every edge
    if contours.iter().map(|c| signed_area(c)).sum::<f32>() < 0.0 {
        for contour in &mut contours {
            contour.reverse();
        }
    }

    let rings = rings(options.depth, options.bevel);
    let mut buffers = MeshBuffers::default();
    for contour in &contours {
        side_walls(&mut buffers, contour, &rings);
    }

    let (Some(back), Some(front)) = (rings.first(), rings.last()) else {
        return Ok(buffers);
    };
    let cap = tessellate_caps(&contours, options.tolerance)?;
    push_cap(&mut buffers, &cap, back.z, Vec3::NEG_Z);
    push_cap(&mut buffers, &cap, front.z, Vec3::Z);
    Ok(buffers)
}

fn outward(edge: Vec2) -> Vec2 {
    Vec2::new(edge.y, -edge.x).normalize_or_zero()
}

fn side_walls(buffers: &mut MeshBuffers, contour: &[Vec2], rings: &[Ring]) {
    let n = contour.len();
    // miter direction and outward normal at every corner
    let corners: Vec<(Vec2, Vec2)> = (0..n)
        .map(|i| {
            let prev = contour[(i + n - 1) % n];
            let next = contour[(i + 1) % n];
            let before = outward(contour[i] - prev);
            let after = outward(next - contour[i]);
            let normal = (before + after).try_normalize().unwrap_or(after);
            let miter = normal / normal.dot(after).max(0.3);
            (miter, normal)
        })
        .collect();

    let loops: Vec<Vec<u32>> = rings
        .iter()
        .map(|ring| {
            contour
                .iter()
                .zip(&corners)
                .map(|(point, (miter, normal))| {
                    let xy = *point + *miter * ring.offset;
                    let normal = (*normal * ring.normal.x).extend(ring.normal.y);
                    buffers.push_vertex(xy.extend(ring.z), normal)
                })
                .collect()
        })
        .collect();

    for (r, pair) in rings.windows(2).enumerate() {
        if pair[0].same_place(&pair[1]) {
            continue;
        }
        let facing_z = (pair[0].normal.y + pair[1].normal.y) * 0.5;
        let facing_xy = (pair[0].normal.x + pair[1].normal.x) * 0.5;
        let (lower, upper) = (&loops[r], &loops[r + 1]);
        for i in 0..n {
            let j = (i + 1) % n;
            let facing = (outward(contour[j] - contour[i]) * facing_xy).extend(facing_z);
            buffers.push_quad(lower[i], lower[j], upper[j], upper[i], facing);
        }
    }
}

fn tessellate_caps(
    contours: &[Vec<Vec2>],
    tolerance: f32,
) -> Result<VertexBuffers<Vec2, u32>, GeometryError> {
    let mut builder = Path::builder();
    for contour in contours {
        builder.begin(point(contour[0].x, contour[0].y));
        for p in &contour[1..] {
            builder.line_to(point(p.x, p.y));
        }
        builder.end(true);
    }
    let outline = builder.build();

    let mut geometry: VertexBuffers<Vec2, u32> = VertexBuffers::new();
    FillTessellator::new()
        .tessellate_path(
            &outline,
            &FillOptions::tolerance(tolerance).with_fill_rule(FillRule::NonZero),
            &mut BuffersBuilder::new(&mut geometry, |vertex: FillVertex| {
                let p = vertex.position();
                Vec2::new(p.x, p.y)
            }),
        )
        .map_err(|err| GeometryError::Tessellation(format!("{err:?}")))?;
    Ok(geometry)
}

fn push_cap(buffers: &mut MeshBuffers, cap: &VertexBuffers<Vec2, u32>, z: f32, facing: Vec3) {
    let base: Vec<u32> = cap
        .vertices
        .iter()
        .map(|v| buffers.push_vertex(v.extend(z), facing))
        .collect();
    for tri in cap.indices.chunks_exact(3) {
        buffers.push_triangle(
            base[tri[0] as usize],
            base[tri[1] as usize],
            base[tri[2] as usize],
            facing,
        );
    }
}
