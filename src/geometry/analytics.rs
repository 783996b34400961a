// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Area and volume integration over theoretical and trimmed surfaces

use super::mesh::{Facet, TMesh};
use super::robust_predicates::{area, tetra_volume};
use serde::{Deserialize, Serialize};

/// Summary of one mesh for reports and JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryStats {
    pub name: String,
    pub comp_id: i32,
    pub theo_area: f64,
    pub wet_area: f64,
    pub theo_vol: f64,
    pub wet_vol: f64,
    /// Bounding box [min_x, min_y, min_z, max_x, max_y, max_z]
    pub bbox: [f64; 6],
    pub node_count: usize,
    pub triangle_count: usize,
    /// Split children across all triangles
    pub child_count: usize,
    pub invalid_count: usize,
}

impl TMesh {
    /// Area of every parent triangle
    pub fn compute_theo_area(&mut self) -> f64 {
        let total = self.tri_ids().map(|id| self.tri_area(id)).sum();
        self.stats.theo_area = total;
        total
    }

    /// Area of the exterior surface
    pub fn compute_wet_area(&mut self) -> f64 {
        let total = self
            .exterior_triangles()
            .iter()
            .map(|f| area(&f.pnts[0], &f.pnts[1], &f.pnts[2]))
            .sum();
        self.stats.wet_area = total;
        total
    }

    /// Signed volume enclosed by the parent triangles
    pub fn compute_theo_vol(&mut self) -> f64 {
        let total = self
            .tri_ids()
            .map(|id| {
                let [p0, p1, p2] = self.tri_points(id);
                tetra_volume(&p0.coords, &p1.coords, &p2.coords)
            })
            .sum();
        self.stats.theo_vol = total;
        total
    }

    /// Signed volume contribution of the exterior surface. Summed over a
    /// set of trimmed meshes this is the volume of their union.
    pub fn compute_trim_vol(&self) -> f64 {
        self.exterior_triangles().iter().map(facet_volume).sum()
    }
}

fn facet_volume(f: &Facet) -> f64 {
    tetra_volume(&f.pnts[0].coords, &f.pnts[1].coords, &f.pnts[2].coords)
}

/// Compute (and cache) areas and volumes of `mesh`
pub fn analyze(mesh: &mut TMesh) -> GeometryStats {
    let theo_area = mesh.compute_theo_area();
    let wet_area = mesh.compute_wet_area();
    let theo_vol = mesh.compute_theo_vol();
    let wet_vol = mesh.compute_trim_vol();
    mesh.stats.wet_vol = wet_vol;

    let bbox = mesh.bounding_box();
    let bbox = if bbox.is_empty() {
        [0.0; 6]
    } else {
        [bbox.min.x, bbox.min.y, bbox.min.z, bbox.max.x, bbox.max.y, bbox.max.z]
    };

    GeometryStats {
        name: mesh.info.name.clone(),
        comp_id: mesh.info.comp_id,
        theo_area,
        wet_area,
        theo_vol,
        wet_vol,
        bbox,
        node_count: mesh.num_nodes(),
        triangle_count: mesh.num_tris(),
        child_count: mesh.num_pnts(),
        invalid_count: mesh.num_invalid(),
    }
}
