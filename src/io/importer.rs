// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL importer

use crate::geometry::{MeshInfo, TMesh};
use anyhow::{Context, Result};
use nalgebra::{Point3, Vector3};
use std::fs::File;
use std::path::Path;
use stl_io::read_stl;
use tracing::debug;

/// Load an ASCII or binary STL file into a fresh mesh. Facets with a zero
/// stored normal get one from their winding; zero-area facets are skipped.
pub fn import_stl(path: impl AsRef<Path>, info: MeshInfo) -> Result<TMesh> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("Failed to open STL file: {:?}", path))?;
    let stl = read_stl(&mut file).with_context(|| format!("Failed to read STL file: {:?}", path))?;

    let mut mesh = TMesh::new(info);
    let point = |i: usize| {
        let v = &stl.vertices[i];
        Point3::new(v[0] as f64, v[1] as f64, v[2] as f64)
    };

    let mut skipped = 0;
    for face in &stl.faces {
        let [p0, p1, p2] = face.vertices.map(|i| point(i));
        let normal = Vector3::new(face.normal[0] as f64, face.normal[1] as f64, face.normal[2] as f64);

        let added = if normal.norm_squared() > 0.0 && (p1 - p0).cross(&(p2 - p0)).norm_squared() > 0.0 {
            Some(mesh.add_tri(p0, p1, p2, normal.normalize()))
        } else {
            mesh.add_tri_auto(p0, p1, p2)
        };
        if added.is_none() {
            skipped += 1;
        }
    }

    debug!(path = ?path, tris = mesh.num_tris(), skipped, "Imported STL");
    Ok(mesh)
}
