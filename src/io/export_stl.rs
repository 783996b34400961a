// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL exporters for the exterior (wetted) surface

use crate::geometry::{Facet, TMesh};
use anyhow::{Context, Result};
use nalgebra::{Matrix4, Point3, Vector3};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Facets whose `v2 - v1` edge is this short are not written
const MIN_EDGE: f64 = 1.0e-6;

/// C `%2.10le` layout: ten-digit mantissa, signed exponent of at least two
/// digits
pub(crate) fn c_exp(v: f64) -> String {
    if !v.is_finite() {
        return format!("{v}").to_lowercase();
    }
    let s = format!("{:.10e}", v);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}

fn write_facet(out: &mut impl Write, v: &[Point3<f64>; 3]) -> std::io::Result<bool> {
    let d21 = v[2] - v[1];
    if d21.norm() <= MIN_EDGE {
        return Ok(false);
    }
    let n = d21.cross(&(v[0] - v[1]));
    let mag = n.norm();
    let n = if mag > 0.0 { n / mag } else { Vector3::zeros() };

    writeln!(out, " facet normal  {} {} {}", c_exp(n.x), c_exp(n.y), c_exp(n.z))?;
    writeln!(out, "   outer loop")?;
    for p in v {
        writeln!(out, "     vertex {} {} {}", c_exp(p.x), c_exp(p.y), c_exp(p.z))?;
    }
    writeln!(out, "   endloop")?;
    writeln!(out, " endfacet")?;
    Ok(true)
}

/// Write the exterior triangles of `mesh` placed by `xform`. With `reflect`
/// a mirrored copy follows; its winding is reversed so it still faces out.
/// Returns the number of facets written.
pub fn write_stl_tris(
    mesh: &TMesh,
    xform: &Matrix4<f64>,
    reflect: Option<&Matrix4<f64>>,
    out: &mut impl Write,
) -> std::io::Result<usize> {
    let facets = mesh.exterior_triangles();
    let mut written = 0;

    for f in &facets {
        let v = f.pnts.map(|p| xform.transform_point(&p));
        written += usize::from(write_facet(out, &v)?);
    }

    if let Some(reflect) = reflect {
        let m = reflect * xform;
        for f in &facets {
            let [a, b, c] = f.pnts.map(|p| m.transform_point(&p));
            written += usize::from(write_facet(out, &[a, c, b])?);
        }
    }

    Ok(written)
}

/// ASCII STL of every mesh's exterior surface
pub fn export_stl(meshes: &[TMesh], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create STL file: {:?}", path))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "solid")?;
    for mesh in meshes {
        write_stl_tris(mesh, &Matrix4::identity(), None, &mut out)
            .with_context(|| format!("Failed to write mesh '{}'", mesh.info.name))?;
    }
    writeln!(out, "endsolid")?;
    out.flush()?;
    Ok(())
}

fn stl_triangle(f: &Facet) -> stl_io::Triangle {
    let v = |p: &Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);
    stl_io::Triangle {
        normal: stl_io::Normal::new([f.norm.x as f32, f.norm.y as f32, f.norm.z as f32]),
        vertices: [v(&f.pnts[0]), v(&f.pnts[1]), v(&f.pnts[2])],
    }
}

/// Binary STL of every mesh's exterior surface
pub fn export_stl_binary(meshes: &[TMesh], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let triangles: Vec<stl_io::Triangle> = meshes
        .iter()
        .flat_map(|m| m.exterior_triangles())
        .map(|f| stl_triangle(&f))
        .collect();

    let mut file = File::create(path).with_context(|| format!("Failed to create STL file: {:?}", path))?;
    stl_io::write_stl(&mut file, triangles.iter()).context("Failed to write STL file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use tempfile::NamedTempFile;

    #[test]
    fn test_c_exp_layout() {
        assert_eq!(c_exp(1.0), "1.0000000000e+00");
        assert_eq!(c_exp(-0.5), "-5.0000000000e-01");
        assert_eq!(c_exp(0.0), "0.0000000000e+00");
        assert_eq!(c_exp(1.5e-120), "1.5000000000e-120");
        assert_eq!(c_exp(12345.0), "1.2345000000e+04");
    }

    #[test]
    fn test_facet_text() {
        let mut mesh = TMesh::named("tri");
        mesh.add_tri(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Vector3::z(),
        );
        let mut out = Vec::new();
        let n = write_stl_tris(&mesh, &Matrix4::identity(), None, &mut out).unwrap();
        assert_eq!(n, 1);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], " facet normal  0.0000000000e+00 0.0000000000e+00 1.0000000000e+00");
        assert_eq!(lines[1], "   outer loop");
        assert_eq!(lines[3], "     vertex 1.0000000000e+00 0.0000000000e+00 0.0000000000e+00");
        assert_eq!(lines[6], " endfacet");
    }

    #[test]
    fn test_reflected_copy_faces_out() {
        let mesh = Primitive::cube(Point3::new(0.0, 2.0, 0.0), Vector3::repeat(1.0)).to_mesh("box", 1);
        let mirror = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, -1.0, 1.0));
        let mut out = Vec::new();
        let n = write_stl_tris(&mesh, &Matrix4::identity(), Some(&mirror), &mut out).unwrap();
        assert_eq!(n, 24);
    }

    #[test]
    fn test_export_files() -> Result<()> {
        let mesh = Primitive::cube(Point3::origin(), Vector3::repeat(10.0)).to_mesh("box", 1);

        let ascii = NamedTempFile::with_suffix(".stl")?;
        export_stl(std::slice::from_ref(&mesh), ascii.path())?;
        let text = std::fs::read_to_string(ascii.path())?;
        assert!(text.starts_with("solid\n"));
        assert!(text.ends_with("endsolid\n"));
        assert_eq!(text.matches("endfacet").count(), 12);

        let binary = NamedTempFile::with_suffix(".stl")?;
        export_stl_binary(std::slice::from_ref(&mesh), binary.path())?;
        assert_eq!(std::fs::metadata(binary.path())?.len(), 84 + 50 * 12);
        Ok(())
    }
}
