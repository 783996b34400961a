// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh arenas, spatial trees and the trimming passes

mod analytics;
mod bbox;
mod classification;
mod intersect;
mod mass_props;
mod mesh;
mod node_octree;
mod primitives;
mod quality;
mod repair;
mod tri_octree;
mod triangle_intersection;
mod triangle_splitting;
mod triangulate;

pub mod robust_predicates;

pub use analytics::{analyze, GeometryStats};
pub use bbox::BoundingBox;
pub use classification::{crossing_count, deter_int_ext, deter_int_ext_all, mass_deter_int_ext, point_inside};
pub use intersect::{intersect_all, intersect_meshes, intersect_self, pair_mut};
pub use mass_props::{mesh_tetra_mass, prism_tetras, Inertia, MassProperties, TetraMassProp, TriShellMassProp};
pub use mesh::{
    share_edge, AreaVolume, DragFactors, Edge, EdgeId, Facet, IsectEdge, MassTag, MeshInfo, Node, NodeId, SplitPatch,
    SubTri, TMesh, Tri, TriId,
};
pub use node_octree::NodeOctree;
pub use primitives::Primitive;
pub use quality::{QualityStats, WaterTightReport};
pub use repair::merge_non_closed;
pub use tri_octree::{OctKind, OctNode, TriOctree};
pub use triangle_intersection::{tri_tri_intersection, TriTriIntersection};
pub use triangle_splitting::{flatten_axis, split_mesh, split_tri, SplitOutcome, SplitStats};
pub use triangulate::{ConstrainedDelaunay, Triangulation, Triangulator};
