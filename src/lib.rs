// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe Trim
//!
//! Triangle-mesh intersection and trimming for component geometry.
//! Overlapping closed meshes are intersected, re-triangulated along the
//! intersection curves and classified inside/outside, giving the wetted
//! surface with per-component areas and volumes. Sliced mass properties
//! and STL / Cart3D export are built on the same passes.

pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod kernel;

pub use config::TrimConfig;
pub use error::{MeshError, TriangulationError};
pub use geometry::{MeshInfo, Primitive, TMesh};
pub use io::{export_cart3d, export_stl, import_stl, Reporter};
pub use kernel::{AreaSliceReport, CompGeomResult, Kernel, MassReport};

use anyhow::Result;
use std::path::Path;

/// Trim a set of STL files, one component per file
pub fn comp_geom_files<P: AsRef<Path>>(paths: &[P], config: TrimConfig, half: bool) -> Result<CompGeomResult> {
    let mut kernel = Kernel::new(config);
    for (i, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("comp_{i}"));
        kernel.add_mesh(import_stl(path, MeshInfo::named(name, i as i32))?);
    }
    Ok(kernel.intersect_trim(true, half)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};
    use tempfile::TempDir;

    #[test]
    fn test_comp_geom_files() -> Result<()> {
        let dir = TempDir::new()?;
        let a = dir.path().join("a.stl");
        let b = dir.path().join("b.stl");
        export_stl(&[Primitive::cube(Point3::origin(), Vector3::repeat(2.0)).to_mesh("a", 0)], &a)?;
        export_stl(&[Primitive::cube(Point3::new(10.0, 0.0, 0.0), Vector3::repeat(2.0)).to_mesh("b", 1)], &b)?;

        let result = comp_geom_files(&[a, b], TrimConfig::default(), false)?;
        assert_eq!(result.num_comps, 2);
        assert!((result.total_wet_area - 48.0).abs() < 1e-6);
        assert_eq!(result.components[0].name, "a");
        Ok(())
    }
}
