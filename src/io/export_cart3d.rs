// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Cart3D `.tri` surface export

use crate::geometry::TMesh;
use ahash::AHashMap;
use anyhow::{Context, Result};
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Points closer than this on every axis are written once
const DUP_TOL: f64 = 1.0e-8;

/// Exterior surface with shared points, ready to write
#[derive(Debug, Clone, Default)]
pub struct Cart3DSurface {
    pub points: Vec<Point3<f64>>,
    /// Zero-based point indices
    pub tris: Vec<[usize; 3]>,
    /// Mesh index + 1 for every triangle
    pub tags: Vec<usize>,
}

/// Point welding on a grid of `DUP_TOL` cells
#[derive(Default)]
struct PointWelder {
    points: Vec<Point3<f64>>,
    cells: AHashMap<[i64; 3], Vec<usize>>,
}

impl PointWelder {
    fn cell(p: &Point3<f64>) -> [i64; 3] {
        [
            (p.x / DUP_TOL).floor() as i64,
            (p.y / DUP_TOL).floor() as i64,
            (p.z / DUP_TOL).floor() as i64,
        ]
    }

    fn find(&self, p: &Point3<f64>) -> Option<usize> {
        let [cx, cy, cz] = Self::cell(p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(list) = self.cells.get(&[cx + dx, cy + dy, cz + dz]) else {
                        continue;
                    };
                    let hit = list.iter().copied().find(|&i| {
                        let q = &self.points[i];
                        (q.x - p.x).abs() < DUP_TOL && (q.y - p.y).abs() < DUP_TOL && (q.z - p.z).abs() < DUP_TOL
                    });
                    if hit.is_some() {
                        return hit;
                    }
                }
            }
        }
        None
    }

    fn add(&mut self, p: Point3<f64>) -> usize {
        if let Some(i) = self.find(&p) {
            return i;
        }
        let i = self.points.len();
        self.points.push(p);
        self.cells.entry(Self::cell(&p)).or_default().push(i);
        i
    }
}

impl Cart3DSurface {
    /// Collect the exterior triangles of every mesh; triangles that lose a
    /// corner to point welding are dropped
    pub fn build(meshes: &[TMesh]) -> Self {
        let mut welder = PointWelder::default();
        let mut tris = Vec::new();
        let mut tags = Vec::new();

        for (m, mesh) in meshes.iter().enumerate() {
            for f in mesh.exterior_triangles() {
                let t = f.pnts.map(|p| welder.add(p));
                if t[0] != t[1] && t[0] != t[2] && t[1] != t[2] {
                    tris.push(t);
                    tags.push(m + 1);
                }
            }
        }

        Self {
            points: welder.points,
            tris,
            tags,
        }
    }

    pub fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "{} {}", self.points.len(), self.tris.len())?;
        for p in &self.points {
            writeln!(out, "{}, {}, {}", c_g(p.x), c_g(p.y), c_g(p.z))?;
        }
        for t in &self.tris {
            writeln!(out, "{} {} {}", t[0] + 1, t[1] + 1, t[2] + 1)?;
        }
        for tag in &self.tags {
            writeln!(out, "{tag}")?;
        }
        Ok(())
    }
}

/// C `%16.10g`: ten significant digits, trailing zeros trimmed, exponent
/// form outside `1e-4 ..= 1e10`, right-aligned in sixteen columns
fn c_g(v: f64) -> String {
    const PREC: i32 = 10;
    let body = if v == 0.0 || !v.is_finite() {
        format!("{v}").to_lowercase()
    } else {
        let exp = v.abs().log10().floor() as i32;
        // Rounding can carry into the next decade
        let rounded: f64 = format!("{:.*e}", (PREC - 1) as usize, v).parse().unwrap_or(v);
        let exp = if rounded.abs() >= 10f64.powi(exp + 1) { exp + 1 } else { exp };

        if exp < -4 || exp >= PREC {
            let s = format!("{:.*e}", (PREC - 1) as usize, v);
            match s.split_once('e') {
                Some((mantissa, e)) => {
                    let mantissa = trim_zeros(mantissa);
                    let (sign, digits) = match e.strip_prefix('-') {
                        Some(d) => ('-', d),
                        None => ('+', e),
                    };
                    format!("{mantissa}e{sign}{digits:0>2}")
                }
                None => s,
            }
        } else {
            let decimals = (PREC - 1 - exp).max(0) as usize;
            trim_zeros(&format!("{:.*}", decimals, v)).to_string()
        }
    };
    format!("{body:>16}")
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Write a Cart3D `.tri` file of every mesh's exterior surface
pub fn export_cart3d(meshes: &[TMesh], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let surface = Cart3DSurface::build(meshes);
    let file = File::create(path).with_context(|| format!("Failed to create tri file: {:?}", path))?;
    let mut out = BufWriter::new(file);
    surface.write_to(&mut out).context("Failed to write tri file")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    #[test]
    fn test_c_g_layout() {
        assert_eq!(c_g(1.0), "               1");
        assert_eq!(c_g(-0.5), "            -0.5");
        assert_eq!(c_g(0.1234567890123), "     0.123456789");
        assert_eq!(c_g(1.0e-5), "           1e-05");
        assert_eq!(c_g(123456.0), "          123456");
        assert_eq!(c_g(0.0), "               0");
    }

    #[test]
    fn test_cube_points_are_shared() {
        let meshes = vec![
            Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("a", 1),
            Primitive::cube(Point3::new(5.0, 0.0, 0.0), Vector3::repeat(1.0)).to_mesh("b", 2),
        ];
        let surface = Cart3DSurface::build(&meshes);
        assert_eq!(surface.points.len(), 16);
        assert_eq!(surface.tris.len(), 24);
        assert_eq!(surface.tags.iter().filter(|&&t| t == 2).count(), 12);

        let mut out = Vec::new();
        surface.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().next(), Some("16 24"));
        assert_eq!(text.lines().count(), 1 + 16 + 24 + 24);
    }

    #[test]
    fn test_collapsed_triangle_is_dropped() {
        let mut mesh = TMesh::named("sliver");
        mesh.add_tri(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1e-9, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Vector3::z(),
        );
        let surface = Cart3DSurface::build(&[mesh]);
        assert!(surface.tris.is_empty());
        assert_eq!(surface.points.len(), 2);
    }
}
