// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Broad classification of a [`GeodesicError`]. Every failure is fatal to the
/// request that triggered it; no partial results are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The mesh is structurally unusable (bad indices, non-manifold edges,
    /// coincident corners).
    InvalidMesh,
    /// The mesh is structurally fine but geometrically degenerate
    /// (zero-length edges, zero-area faces).
    DegenerateGeometry,
    /// The query parameters are unusable (bad vertex indices, negative cap).
    InvalidRequest,
}

/// The error type for every fallible operation in the crate. Each variant
/// names the offending entity so callers can point at the broken input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeodesicError {
    #[error("face {face} references vertex {index}, but the mesh has {num_vertices} vertices")]
    VertexIndexOutOfRange {
        face: usize,
        index: u32,
        num_vertices: usize,
    },

    #[error("edge ({v0}, {v1}) is shared by more than two faces")]
    NonManifoldEdge { v0: u32, v1: u32 },

    #[error("face {face} has two coincident corners")]
    CoincidentVertices { face: usize },

    #[error("edge {edge} has zero length")]
    ZeroLengthEdge { edge: usize },

    #[error("face {face} has zero area")]
    ZeroAreaFace { face: usize },

    #[error("source index {index} is out of range for a mesh with {num_vertices} vertices")]
    SourceIndexOutOfRange { index: u32, num_vertices: usize },

    #[error("target index {index} is out of range for a mesh with {num_vertices} vertices")]
    TargetIndexOutOfRange { index: u32, num_vertices: usize },

    #[error("at least one source vertex is required when targets are given")]
    NoSources,

    #[error("max_distance must be nonnegative, got {value}")]
    NegativeMaxDistance { value: f64 },
}

impl GeodesicError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeodesicError::VertexIndexOutOfRange { .. }
            | GeodesicError::NonManifoldEdge { .. }
            | GeodesicError::CoincidentVertices { .. } => ErrorKind::InvalidMesh,
            GeodesicError::ZeroLengthEdge { .. } | GeodesicError::ZeroAreaFace { .. } => {
                ErrorKind::DegenerateGeometry
            }
            GeodesicError::SourceIndexOutOfRange { .. }
            | GeodesicError::TargetIndexOutOfRange { .. }
            | GeodesicError::NoSources
            | GeodesicError::NegativeMaxDistance { .. } => ErrorKind::InvalidRequest,
        }
    }
}

pub type Result<T> = std::result::Result<T, GeodesicError>;
