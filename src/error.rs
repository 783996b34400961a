// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for the trimming engine

use thiserror::Error;

/// Failures reported by a [`crate::geometry::Triangulator`]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TriangulationError {
    #[error("triangulation needs at least 3 points, got {0}")]
    TooFewPoints(usize),

    #[error("points {0} and {1} coincide in the projection plane")]
    DuplicatePoints(usize, usize),

    #[error("constraint segment {0}-{1} references a missing point")]
    BadSegment(usize, usize),

    #[error("could not recover constraint segment {0}-{1}")]
    ConstraintNotRecovered(usize, usize),

    #[error("point {0} fell outside the triangulation")]
    PointNotLocated(usize),
}

/// Mesh-level failures
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("mesh '{0}' has no triangle octree; call load_bnd_box first")]
    MissingOctree(String),

    #[error("mesh '{0}' is empty")]
    Empty(String),

    #[error("slice axis must be non-zero")]
    ZeroAxis,

    #[error("mesh index {index} out of range ({len} meshes)")]
    BadMeshIndex { index: usize, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
