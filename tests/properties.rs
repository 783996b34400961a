// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Invariants of the intersection, splitting, classification and mass
//! passes

use anyhow::Result;
use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use polyframe_trim::geometry::{
    crossing_count, intersect_meshes, mesh_tetra_mass, split_mesh, tri_tri_intersection, ConstrainedDelaunay,
    MassProperties, Primitive,
};
use polyframe_trim::{TMesh, TrimConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_tri(rng: &mut StdRng) -> [Point3<f64>; 3] {
    let mut p = || Point3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
    [p(), p(), p()]
}

fn tri_area(p: &[Point3<f64>; 3]) -> f64 {
    (p[1] - p[0]).cross(&(p[2] - p[0])).norm() * 0.5
}

#[test]
fn test_tri_tri_segment_is_symmetric() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut hits = 0;

    for _ in 0..2000 {
        let a = random_tri(&mut rng);
        let b = random_tri(&mut rng);
        if tri_area(&a) < 1e-3 || tri_area(&b) < 1e-3 {
            continue;
        }

        let ab = tri_tri_intersection(&a, &b).segment();
        let ba = tri_tri_intersection(&b, &a).segment();
        match (ab, ba) {
            (Some((p0, p1)), Some((q0, q1))) => {
                hits += 1;
                let same = (p0 - q0).norm() < 1e-9 && (p1 - q1).norm() < 1e-9;
                let swapped = (p0 - q1).norm() < 1e-9 && (p1 - q0).norm() < 1e-9;
                assert!(same || swapped, "{a:?} / {b:?}: {p0:?}-{p1:?} vs {q0:?}-{q1:?}");
            }
            (None, None) => {}
            (ab, ba) => panic!("asymmetric result for {a:?} / {b:?}: {ab:?} vs {ba:?}"),
        }
    }
    assert!(hits > 50);
}

#[test]
fn test_split_children_cover_parent() -> Result<()> {
    let cfg = TrimConfig::default();
    let mut a = Primitive::sphere(Point3::origin(), 1.0, 8, 12).to_mesh("a", 0);
    let mut b = Primitive::cube(Point3::new(0.6, 0.15, 0.1), Vector3::repeat(1.0)).to_mesh("b", 1);
    a.load_bnd_box(cfg.tri_leaf_size);
    b.load_bnd_box(cfg.tri_leaf_size);
    intersect_meshes(&mut a, &mut b, &cfg)?;

    let tri = ConstrainedDelaunay::default();
    for mesh in [&mut a, &mut b] {
        let stats = split_mesh(mesh, &cfg, &tri);
        assert!(stats.split > 0);

        for id in mesh.tri_ids() {
            let Some(patch) = mesh.tri(id).children() else {
                continue;
            };
            let parent = tri_area(&mesh.tri_points(id));
            let children: f64 = patch.tris.iter().map(|s| tri_area(&patch.corner_points(s))).sum();
            assert_relative_eq!(children, parent, epsilon = 1e-9, max_relative = 1e-7);
        }
    }
    Ok(())
}

#[test]
fn test_node_merge_is_idempotent() -> Result<()> {
    let cfg = TrimConfig::default();
    let mut mesh = Primitive::icosahedron(Point3::origin(), 2.0).to_mesh("ico", 0);
    mesh.tris.remove(3);

    let first = mesh.check_if_closed(&cfg);
    let nodes = mesh.num_nodes();

    assert_eq!(mesh.match_nodes(&cfg), 0);
    assert_eq!(mesh.num_nodes(), nodes);
    assert_eq!(mesh.check_valid(), first);

    let mut cube = Primitive::cube(Point3::origin(), Vector3::repeat(3.0)).to_mesh("box", 1);
    cube.load_bnd_box(cfg.tri_leaf_size);
    let mut log = Vec::new();
    let once = cube.water_tight_check(&cfg, &mut log)?;
    let twice = cube.water_tight_check(&cfg, &mut log)?;
    assert_eq!(once.invalid, 0);
    assert_eq!(twice.invalid, once.invalid);
    assert_eq!(cube.num_tris(), 12);
    Ok(())
}

#[test]
fn test_ray_parity() -> Result<()> {
    let cfg = TrimConfig::default();
    let mut meshes: Vec<TMesh> = vec![
        Primitive::sphere(Point3::origin(), 1.0, 10, 16).to_mesh("sphere", 0),
        Primitive::cube(Point3::new(4.0, 0.0, 0.0), Vector3::repeat(1.5)).to_mesh("box", 1),
        Primitive::icosahedron(Point3::new(0.0, 4.0, 0.0), 1.0).to_mesh("ico", 2),
    ];
    for mesh in &mut meshes {
        mesh.load_bnd_box(cfg.tri_leaf_size);
    }

    let mut rng = StdRng::seed_from_u64(11);
    let centers = [Point3::origin(), Point3::new(4.0, 0.0, 0.0), Point3::new(0.0, 4.0, 0.0)];

    for _ in 0..200 {
        // Outside everything: a point far off in -X
        let outside = Point3::new(
            rng.gen_range(-20.0..-10.0),
            rng.gen_range(-0.5..4.5),
            rng.gen_range(-0.5..0.5),
        );
        for mesh in &meshes {
            assert_eq!(crossing_count(&outside, mesh, &cfg)? % 2, 0);
        }

        // Inside exactly one mesh: near the centre of one of them
        let k = rng.gen_range(0..3);
        let inside = centers[k]
            + Vector3::new(
                rng.gen_range(-0.3..0.3),
                rng.gen_range(-0.3..0.3),
                rng.gen_range(-0.3..0.3),
            );
        for (j, mesh) in meshes.iter().enumerate() {
            let parity = crossing_count(&inside, mesh, &cfg)? % 2;
            assert_eq!(parity, usize::from(j == k), "point {inside:?} against {}", mesh.info.name);
        }
    }
    Ok(())
}

#[test]
fn test_tetra_mass_matches_density_times_volume() {
    let density = 2.5;
    for mut mesh in [
        Primitive::cube(Point3::new(1.0, -2.0, 0.5), Vector3::new(2.0, 3.0, 4.0)).to_mesh("box", 0),
        Primitive::sphere(Point3::new(0.5, 0.5, 0.5), 2.0, 12, 18).to_mesh("sphere", 0),
        Primitive::icosahedron(Point3::new(-3.0, 0.0, 1.0), 1.5).to_mesh("ico", 0),
    ] {
        let theo_vol = mesh.compute_theo_vol();
        for reference in [Point3::origin(), Point3::new(10.0, -4.0, 2.0)] {
            let tetras = mesh_tetra_mass(&mesh, density, reference);
            let mass: f64 = tetras.iter().map(|t| t.signed_mass()).sum();
            assert_relative_eq!(mass, density * theo_vol, epsilon = 1e-9, max_relative = 1e-9);
        }
    }

    // Convex shape seen from an interior point: every tetra is positive
    let mesh = Primitive::cube(Point3::origin(), Vector3::repeat(2.0)).to_mesh("box", 0);
    let tetras = mesh_tetra_mass(&mesh, density, Point3::origin());
    let props = MassProperties::accumulate(&tetras, &[]);
    assert_relative_eq!(props.mass, 20.0, epsilon = 1e-9);
    assert_relative_eq!(props.volume, 8.0, epsilon = 1e-9);
    assert_relative_eq!(props.cg.coords.norm(), 0.0, epsilon = 1e-12);
}
