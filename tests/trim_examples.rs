// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! End-to-end scenarios: intersection loops, untouched meshes, punctured
//! and stitched shells

use anyhow::Result;
use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use polyframe_trim::geometry::{intersect_meshes, merge_non_closed, split_mesh, ConstrainedDelaunay, Primitive};
use polyframe_trim::{Kernel, TMesh, TrimConfig};

/// Distinct endpoints of every intersection segment recorded on `mesh`,
/// with how many segments touch each
fn endpoint_degrees(mesh: &TMesh, tol: f64) -> Vec<(Point3<f64>, usize)> {
    let mut points: Vec<(Point3<f64>, usize)> = Vec::new();
    for tri in &mesh.tris {
        for seg in &tri.isect_edges {
            for p in [seg.p0, seg.p1] {
                match points.iter_mut().find(|(q, _)| (q - p).norm() < tol) {
                    Some((_, n)) => *n += 1,
                    None => points.push((p, 1)),
                }
            }
        }
    }
    points
}

#[test]
fn test_overlapping_cubes_give_closed_loop() -> Result<()> {
    let cfg = TrimConfig::default();
    let mut a = Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("a", 0);
    let mut b = Primitive::cube(Point3::new(0.5, 0.1, 0.05), Vector3::repeat(1.0)).to_mesh("b", 1);
    a.load_bnd_box(cfg.tri_leaf_size);
    b.load_bnd_box(cfg.tri_leaf_size);

    let segments = intersect_meshes(&mut a, &mut b, &cfg)?;
    assert!(segments >= 4);

    for mesh in [&a, &b] {
        let degrees = endpoint_degrees(mesh, 1e-7);
        assert!(!degrees.is_empty());
        for (p, n) in &degrees {
            assert_eq!(n % 2, 0, "open end at {p:?} on {}", mesh.info.name);
        }
    }

    // Every segment lies on both surfaces
    for tri in &a.tris {
        for seg in &tri.isect_edges {
            for p in [seg.p0, seg.p1] {
                let on_a = [p.x, p.y, p.z].iter().any(|c| (c.abs() - 0.5).abs() < 1e-9);
                assert!(on_a);
            }
        }
    }
    Ok(())
}

#[test]
fn test_half_overlapping_unit_cubes() -> Result<()> {
    let cfg = TrimConfig::default();
    let centers = [Point3::origin(), Point3::new(0.5, 0.0, 0.0)];
    let mut a = Primitive::cube(centers[0], Vector3::repeat(1.0)).to_mesh("a", 0);
    let mut b = Primitive::cube(centers[1], Vector3::repeat(1.0)).to_mesh("b", 1);
    a.load_bnd_box(cfg.tri_leaf_size);
    b.load_bnd_box(cfg.tri_leaf_size);

    // Shared side faces give no segments; the ones found lie on both boxes
    intersect_meshes(&mut a, &mut b, &cfg)?;
    for tri in &a.tris {
        for seg in &tri.isect_edges {
            for p in [seg.p0, seg.p1] {
                for c in &centers {
                    assert!(((p - c).abs().max() - 0.5).abs() < 1e-9, "{p:?} off box at {c:?}");
                }
            }
        }
    }

    // The union is a 1.5 x 1 x 1 box
    let mut kernel = Kernel::new(cfg);
    kernel.add_mesh(Primitive::cube(centers[0], Vector3::repeat(1.0)).to_mesh("a", 0));
    kernel.add_mesh(Primitive::cube(centers[1], Vector3::repeat(1.0)).to_mesh("b", 1));
    let result = kernel.intersect_trim(false, false)?;
    assert_relative_eq!(result.total_wet_area, 8.0, epsilon = 1e-6);
    assert_relative_eq!(result.total_wet_vol, 1.5, epsilon = 1e-6);
    assert_relative_eq!(result.components[0].wet_area, 5.0, epsilon = 1e-6);
    assert_relative_eq!(result.components[1].wet_area, 3.0, epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_lonely_square_is_not_split() -> Result<()> {
    let cfg = TrimConfig::default();
    let mut kernel = Kernel::new(cfg.clone());
    let mut square = Primitive::square(Point3::origin(), 2.0).to_mesh("square", 0);
    square.load_bnd_box(cfg.tri_leaf_size);

    let stats = split_mesh(&mut square, &cfg, &ConstrainedDelaunay::default());
    assert_eq!(stats.split, 0);
    assert_eq!(square.num_pnts(), 0);
    assert_relative_eq!(square.compute_wet_area(), 4.0, epsilon = 1e-12);
    assert_relative_eq!(square.compute_theo_area(), 4.0, epsilon = 1e-12);

    // An open mesh on its own is dropped by the kernel before trimming
    kernel.add_mesh(square);
    let result = kernel.intersect_trim(false, false)?;
    assert_eq!(result.open.deleted, 1);
    assert!(result.components.is_empty());
    Ok(())
}

#[test]
fn test_punctured_icosahedron_is_not_watertight() -> Result<()> {
    let cfg = TrimConfig::default();
    let mut mesh = Primitive::icosahedron(Point3::origin(), 1.0).to_mesh("ico", 0);
    assert_eq!(mesh.check_if_closed(&cfg), 0);

    let mut punctured = Primitive::icosahedron(Point3::origin(), 1.0).to_mesh("ico", 0);
    punctured.tris.remove(0);
    punctured.load_bnd_box(cfg.tri_leaf_size);

    let mut log = Vec::new();
    let report = punctured.water_tight_check(&cfg, &mut log)?;
    let text = String::from_utf8(log)?;

    // The three neighbours of the hole each lose one edge
    assert_eq!(report.invalid, 3);
    assert!(!report.is_water_tight());
    assert!(text.contains("There are 3 Invalid Triangles"));
    assert!(!text.contains("Mesh IS WaterTight"));
    Ok(())
}

#[test]
fn test_hemispheres_merge_closed() -> Result<()> {
    let cfg = TrimConfig::default();
    let mut upper = Primitive::hemisphere(Point3::origin(), 1.0, 4, 12, true).to_mesh("upper", 0);
    let mut lower = Primitive::hemisphere(Point3::origin(), 1.0, 4, 12, false).to_mesh("lower", 0);
    assert!(upper.check_if_closed(&cfg) > 0);
    assert!(lower.check_if_closed(&cfg) > 0);

    assert!(merge_non_closed(&mut upper, &mut lower, &cfg));
    assert!(lower.delete_me);
    assert!(upper.non_closed.is_empty());
    assert!(upper.tris.iter().all(|t| !t.invalid));

    let mut log = Vec::new();
    assert!(upper.water_tight_check(&cfg, &mut log)?.is_water_tight());
    Ok(())
}

#[test]
fn test_kernel_stitches_hemispheres() -> Result<()> {
    let mut kernel = Kernel::new(TrimConfig::default());
    kernel.add_mesh(Primitive::hemisphere(Point3::origin(), 1.0, 4, 12, true).to_mesh("upper", 0));
    kernel.add_mesh(Primitive::hemisphere(Point3::origin(), 1.0, 4, 12, false).to_mesh("lower", 0));

    let open = kernel.merge_remove_open_meshes();
    assert_eq!(open.merged, 1);
    assert_eq!(open.deleted, 0);
    assert_eq!(kernel.meshes.len(), 1);
    Ok(())
}

#[test]
fn test_overlapping_cubes_trim_to_union() -> Result<()> {
    let mut kernel = Kernel::new(TrimConfig::default());
    kernel.add_mesh(Primitive::cube(Point3::origin(), Vector3::repeat(2.0)).to_mesh("a", 0));
    kernel.add_mesh(Primitive::cube(Point3::new(1.0, 0.3, 0.2), Vector3::repeat(2.0)).to_mesh("b", 1));

    let result = kernel.intersect_trim(true, false)?;

    // Overlap is [0,1] x [-0.7,1] x [-0.8,1]
    let overlap = 1.0 * 1.7 * 1.8;
    assert_relative_eq!(result.total_theo_vol, 16.0, epsilon = 1e-6);
    assert_relative_eq!(result.total_wet_vol, 16.0 - overlap, epsilon = 1e-3);

    let hidden_area = 2.0 * (1.0 * 1.7 + 1.0 * 1.8 + 1.7 * 1.8);
    assert_relative_eq!(result.total_wet_area, 48.0 - hidden_area, epsilon = 1e-3);

    assert!(result.watertight.is_some());
    assert!(result.watertight_log.contains("...WaterTight Check..."));
    assert_eq!(kernel.meshes.len(), 1);
    Ok(())
}
