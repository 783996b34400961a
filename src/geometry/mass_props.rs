// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mass property records and their accumulation
//!
//! Solid regions are decomposed into tetrahedra ([`TetraMassProp`]); thin
//! shells contribute one [`TriShellMassProp`] per exterior triangle. Each
//! record carries its own mass, centroid and inertia terms; totals are
//! formed by [`MassProperties::accumulate`] with a parallel-axis shift to
//! the combined centre of gravity.

use super::mesh::TMesh;
use super::robust_predicates::tetra_volume;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Second-moment terms shared by both record kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Inertia {
    pub ixx: f64,
    pub iyy: f64,
    pub izz: f64,
    pub ixy: f64,
    pub ixz: f64,
    pub iyz: f64,
}

impl Inertia {
    /// Polynomial moments of three corner vectors, scaled by `mass`
    fn from_corners(mass: f64, v: [Vector3<f64>; 3]) -> Self {
        let diag = |k: usize| {
            mass / 10.0
                * (v[0][k] * v[0][k]
                    + v[1][k] * v[1][k]
                    + v[2][k] * v[2][k]
                    + v[0][k] * v[1][k]
                    + v[0][k] * v[2][k]
                    + v[1][k] * v[2][k])
        };
        let prod = |a: usize, b: usize| {
            let mut same = 0.0;
            let mut cross = 0.0;
            for i in 0..3 {
                same += v[i][a] * v[i][b];
                for j in 0..3 {
                    if i != j {
                        cross += v[i][a] * v[j][b];
                    }
                }
            }
            mass / 20.0 * (2.0 * same + cross)
        };

        let (ix, iy, iz) = (diag(0), diag(1), diag(2));
        Self {
            ixx: iy + iz,
            iyy: ix + iz,
            izz: ix + iy,
            ixy: prod(0, 1),
            ixz: prod(0, 2),
            iyz: prod(1, 2),
        }
    }

    /// Add `other` moved from `from` to `to` by the parallel-axis theorem
    fn add_shifted(&mut self, other: &Inertia, mass: f64, from: &Point3<f64>, to: &Point3<f64>) {
        let d = to - from;
        self.ixx += other.ixx + mass * (d.y * d.y + d.z * d.z);
        self.iyy += other.iyy + mass * (d.x * d.x + d.z * d.z);
        self.izz += other.izz + mass * (d.x * d.x + d.y * d.y);
        self.ixy += other.ixy + mass * d.x * d.y;
        self.ixz += other.ixz + mass * d.x * d.z;
        self.iyz += other.iyz + mass * d.y * d.z;
    }
}

/// Solid tetrahedron `p0..p3` of uniform density
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TetraMassProp {
    pub comp_id: i32,
    pub density: f64,
    /// Signed volume; positive when `p1, p2, p3` wind counter-clockwise seen
    /// from `p0`
    pub vol: f64,
    pub mass: f64,
    pub cg: Point3<f64>,
    pub inertia: Inertia,
    pub point_mass: bool,
}

impl TetraMassProp {
    pub fn new(comp_id: i32, density: f64, p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>, p3: Point3<f64>) -> Self {
        let v1 = p1 - p0;
        let v2 = p2 - p0;
        let v3 = p3 - p0;

        let cg = p0 + (v1 + v2 + v3) * 0.25;
        let vol = tetra_volume(&v1, &v2, &v3);
        let mass = density * vol.abs();

        Self {
            comp_id,
            density,
            vol,
            mass,
            cg,
            inertia: Inertia::from_corners(mass, [v1, v2, v3]),
            point_mass: false,
        }
    }

    /// Concentrated mass with no volume or inertia of its own
    pub fn point(comp_id: i32, mass: f64, pos: Point3<f64>) -> Self {
        Self {
            comp_id,
            density: 0.0,
            vol: 0.0,
            mass,
            cg: pos,
            inertia: Inertia::default(),
            point_mass: true,
        }
    }

    /// Mass with the sign of the volume, for signed decompositions
    pub fn signed_mass(&self) -> f64 {
        self.density * self.vol
    }
}

/// Thin shell triangle with mass per unit area `mass_area`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriShellMassProp {
    pub comp_id: i32,
    pub mass_area: f64,
    pub area: f64,
    pub mass: f64,
    pub cg: Point3<f64>,
    pub inertia: Inertia,
}

impl TriShellMassProp {
    pub fn new(comp_id: i32, mass_area: f64, p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>) -> Self {
        let cg = Point3::from((p0.coords + p1.coords + p2.coords) / 3.0);
        let v = [p0 - cg, p1 - cg, p2 - cg];
        let area = 0.5 * (v[1] - v[0]).cross(&(v[2] - v[0])).norm();
        let mass = area * mass_area;

        Self {
            comp_id,
            mass_area,
            area,
            mass,
            cg,
            inertia: Inertia::from_corners(mass, v),
        }
    }
}

/// Combined mass, centre of gravity and inertia of a set of records
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass: f64,
    pub cg: Point3<f64>,
    pub inertia: Inertia,
    /// Sum of absolute tetra volumes
    pub volume: f64,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 0.0,
            cg: Point3::origin(),
            inertia: Inertia::default(),
            volume: 0.0,
        }
    }
}

impl MassProperties {
    pub fn accumulate(tetras: &[TetraMassProp], shells: &[TriShellMassProp]) -> Self {
        Self::accumulate_where(tetras, shells, |_| true)
    }

    /// Only records stamped with `comp_id`
    pub fn accumulate_component(tetras: &[TetraMassProp], shells: &[TriShellMassProp], comp_id: i32) -> Self {
        Self::accumulate_where(tetras, shells, |id| id == comp_id)
    }

    fn accumulate_where<F: Fn(i32) -> bool>(tetras: &[TetraMassProp], shells: &[TriShellMassProp], keep: F) -> Self {
        let tetras: Vec<&TetraMassProp> = tetras.iter().filter(|t| keep(t.comp_id)).collect();
        let shells: Vec<&TriShellMassProp> = shells.iter().filter(|s| keep(s.comp_id)).collect();

        let volume = tetras.iter().map(|t| t.vol.abs()).sum();

        let mut mass = 0.0;
        let mut moment = Vector3::zeros();
        for (m, cg) in tetras
            .iter()
            .map(|t| (t.mass, t.cg))
            .chain(shells.iter().map(|s| (s.mass, s.cg)))
        {
            mass += m;
            moment += cg.coords * m;
        }
        let cg = if mass != 0.0 {
            Point3::from(moment / mass)
        } else {
            Point3::origin()
        };

        let mut inertia = Inertia::default();
        for t in &tetras {
            inertia.add_shifted(&t.inertia, t.mass, &t.cg, &cg);
        }
        for s in &shells {
            inertia.add_shifted(&s.inertia, s.mass, &s.cg, &cg);
        }

        Self {
            mass,
            cg,
            inertia,
            volume,
        }
    }
}

/// Eight tetrahedra filling the prism swept by extruding `p` by `len / 2`
/// both ways along X, all apexed at the triangle centroid
pub fn prism_tetras(comp_id: i32, density: f64, p: &[Point3<f64>; 3], len: f64) -> [TetraMassProp; 8] {
    let cnt = Point3::from((p[0].coords + p[1].coords + p[2].coords) / 3.0);
    let up = Vector3::new(len / 2.0, 0.0, 0.0);
    let [a0, a1, a2] = p.map(|q| q + up);
    let [b0, b1, b2] = p.map(|q| q - up);

    [
        TetraMassProp::new(comp_id, density, cnt, a0, a1, a2),
        TetraMassProp::new(comp_id, density, cnt, b0, b1, b2),
        TetraMassProp::new(comp_id, density, cnt, a0, a1, b0),
        TetraMassProp::new(comp_id, density, cnt, b0, b1, a1),
        TetraMassProp::new(comp_id, density, cnt, a1, a2, b1),
        TetraMassProp::new(comp_id, density, cnt, b1, b2, a2),
        TetraMassProp::new(comp_id, density, cnt, a0, a2, b0),
        TetraMassProp::new(comp_id, density, cnt, b0, b2, a2),
    ]
}

/// Signed tetra decomposition of the exterior surface of `mesh` about
/// `reference`. For a closed outward mesh the signed masses sum to
/// `density * volume` wherever `reference` lies.
pub fn mesh_tetra_mass(mesh: &TMesh, density: f64, reference: Point3<f64>) -> Vec<TetraMassProp> {
    mesh.exterior_triangles()
        .iter()
        .map(|f| TetraMassProp::new(mesh.info.comp_id, density, reference, f.pnts[0], f.pnts[1], f.pnts[2]))
        .collect()
}
