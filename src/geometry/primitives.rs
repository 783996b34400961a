// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Tessellated test geometry
//!
//! Stands in for the component tessellator: every primitive produces a
//! [`TMesh`] with outward-facing triangles and fresh nodes per triangle.

use super::mesh::{MeshInfo, TMesh};
use super::robust_predicates::face_normal;
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Geometric primitives
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Cube { center: Point3<f64>, size: Vector3<f64> },
    Sphere { center: Point3<f64>, r: f64, stacks: u32, slices: u32 },
    /// Open shell; `upper` keeps `z >= center.z`
    Hemisphere { center: Point3<f64>, r: f64, stacks: u32, slices: u32, upper: bool },
    Icosahedron { center: Point3<f64>, r: f64 },
    /// Flat square in the XY plane, normal +Z
    Square { center: Point3<f64>, size: f64 },
}

impl Primitive {
    pub fn cube(center: Point3<f64>, size: Vector3<f64>) -> Self {
        Self::Cube { center, size }
    }

    pub fn sphere(center: Point3<f64>, r: f64, stacks: u32, slices: u32) -> Self {
        Self::Sphere {
            center,
            r,
            stacks: stacks.max(2),
            slices: slices.max(3),
        }
    }

    pub fn hemisphere(center: Point3<f64>, r: f64, stacks: u32, slices: u32, upper: bool) -> Self {
        Self::Hemisphere {
            center,
            r,
            stacks: stacks.max(1),
            slices: slices.max(3),
            upper,
        }
    }

    pub fn icosahedron(center: Point3<f64>, r: f64) -> Self {
        Self::Icosahedron { center, r }
    }

    pub fn square(center: Point3<f64>, size: f64) -> Self {
        Self::Square { center, size }
    }

    pub fn to_mesh(&self, name: &str, comp_id: i32) -> TMesh {
        let info = MeshInfo::named(name, comp_id);
        match *self {
            Self::Cube { center, size } => cube_mesh(info, center, size),
            Self::Sphere {
                center,
                r,
                stacks,
                slices,
            } => TMesh::from_grid(info, &sphere_rows(center, r, stacks, slices, 0.0, PI)),
            Self::Hemisphere {
                center,
                r,
                stacks,
                slices,
                upper,
            } => {
                let (phi0, phi1) = if upper { (0.0, PI / 2.0) } else { (PI / 2.0, PI) };
                TMesh::from_grid(info, &sphere_rows(center, r, stacks, slices, phi0, phi1))
            }
            Self::Icosahedron { center, r } => icosahedron_mesh(info, center, r),
            Self::Square { center, size } => {
                let h = size / 2.0;
                let rows = vec![
                    vec![center + Vector3::new(-h, -h, 0.0), center + Vector3::new(-h, h, 0.0)],
                    vec![center + Vector3::new(h, -h, 0.0), center + Vector3::new(h, h, 0.0)],
                ];
                TMesh::from_grid(info, &rows)
            }
        }
    }
}

/// Latitude rows from polar angle `phi0` to `phi1`; each row is a closed
/// ring of `slices + 1` points. Rows run north to south, which makes the
/// grid winding face outward.
fn sphere_rows(center: Point3<f64>, r: f64, stacks: u32, slices: u32, phi0: f64, phi1: f64) -> Vec<Vec<Point3<f64>>> {
    (0..=stacks)
        .map(|i| {
            let phi = phi0 + (phi1 - phi0) * i as f64 / stacks as f64;
            // Collapse the pole rings exactly so their cells degenerate
            let ring = if phi.sin().abs() < 1e-12 { 0.0 } else { phi.sin() };
            (0..=slices)
                .map(|j| {
                    let theta = 2.0 * PI * (j % slices) as f64 / slices as f64;
                    center + Vector3::new(ring * theta.cos(), ring * theta.sin(), phi.cos()) * r
                })
                .collect()
        })
        .collect()
}

/// Add a triangle, flipping it if it faces toward `center`
fn add_outward(mesh: &mut TMesh, center: &Point3<f64>, p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>) {
    let norm = face_normal(&p0, &p1, &p2);
    let cent = Point3::from((p0.coords + p1.coords + p2.coords) / 3.0);
    if norm.dot(&(cent - center)) < 0.0 {
        mesh.add_tri(p0, p2, p1, -norm);
    } else {
        mesh.add_tri(p0, p1, p2, norm);
    }
}

fn cube_mesh(info: MeshInfo, center: Point3<f64>, size: Vector3<f64>) -> TMesh {
    let mut mesh = TMesh::new(info);
    let h = size / 2.0;

    let corner = |i: usize| {
        center
            + Vector3::new(
                if i & 1 != 0 { h.x } else { -h.x },
                if i & 2 != 0 { h.y } else { -h.y },
                if i & 4 != 0 { h.z } else { -h.z },
            )
    };

    // Quads by corner bit pattern
    let faces = [
        [0, 2, 6, 4], // -x
        [1, 3, 7, 5], // +x
        [0, 1, 5, 4], // -y
        [2, 3, 7, 6], // +y
        [0, 1, 3, 2], // -z
        [4, 5, 7, 6], // +z
    ];

    for [a, b, c, d] in faces {
        add_outward(&mut mesh, &center, corner(a), corner(b), corner(c));
        add_outward(&mut mesh, &center, corner(a), corner(c), corner(d));
    }

    mesh
}

fn icosahedron_mesh(info: MeshInfo, center: Point3<f64>, r: f64) -> TMesh {
    let t = (1.0 + 5f64.sqrt()) / 2.0;
    let raw = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ];
    let verts: Vec<Point3<f64>> = raw
        .iter()
        .map(|&(x, y, z)| center + Vector3::new(x, y, z).normalize() * r)
        .collect();

    const FACES: [[usize; 3]; 20] = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    let mut mesh = TMesh::new(info);
    for [a, b, c] in FACES {
        add_outward(&mut mesh, &center, verts[a], verts[b], verts[c]);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn outward(mesh: &TMesh, center: Point3<f64>) -> bool {
        mesh.tri_ids().all(|id| {
            let [p0, p1, p2] = mesh.tri_points(id);
            let cent = Point3::from((p0.coords + p1.coords + p2.coords) / 3.0);
            mesh.compute_normal(id).dot(&(cent - center)) > 0.0
        })
    }

    #[test]
    fn test_cube_faces_point_outward() {
        let center = Point3::new(1.0, 2.0, 3.0);
        let mesh = Primitive::cube(center, Vector3::new(1.0, 2.0, 3.0)).to_mesh("box", 1);
        assert_eq!(mesh.num_tris(), 12);
        assert!(outward(&mesh, center));
        for id in mesh.tri_ids() {
            assert_relative_eq!(mesh.tri(id).norm, mesh.compute_normal(id), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sphere_skips_pole_slivers() {
        let mesh = Primitive::sphere(Point3::origin(), 1.0, 8, 12).to_mesh("sphere", 1);
        // Two triangles per cell, minus one collapsed triangle per pole cell
        assert_eq!(mesh.num_tris(), 2 * 8 * 12 - 2 * 12);
        assert!(outward(&mesh, Point3::origin()));
    }

    #[test]
    fn test_hemispheres_share_equator() {
        let upper = Primitive::hemisphere(Point3::origin(), 1.0, 4, 12, true).to_mesh("top", 1);
        let lower = Primitive::hemisphere(Point3::origin(), 1.0, 4, 12, false).to_mesh("bottom", 1);
        assert!(upper.bounding_box().min.z > -1e-12);
        assert!(lower.bounding_box().max.z < 1e-12);
        assert!(outward(&upper, Point3::origin()));
        assert!(outward(&lower, Point3::origin()));
    }

    #[test]
    fn test_icosahedron() {
        let mesh = Primitive::icosahedron(Point3::origin(), 2.0).to_mesh("ico", 1);
        assert_eq!(mesh.num_tris(), 20);
        assert!(outward(&mesh, Point3::origin()));
        for node in &mesh.nodes {
            assert_relative_eq!(node.pnt.coords.norm(), 2.0, epsilon = 1e-12);
        }
    }
}
