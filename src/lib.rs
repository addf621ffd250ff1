// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exact geodesic distances on triangulated surfaces, computed by wavefront
//! propagation in the style of Mitchell, Mount and Papadimitriou.

/// Some useful re-exports
pub mod prelude;

/// The error type shared by every fallible operation in the crate
pub mod error;

/// Planar geometry helpers: triangle unfolding, cone clipping, tolerances
pub mod math;

/// The immutable triangle mesh and its adjacency tables
pub mod mesh;

/// Wavefront windows: interval-on-edge fragments radiating from a pseudosource
pub mod window;

/// Ordered per-edge window lists with pointwise-minimum overlap resolution
pub mod interval_list;

/// The best-first wavefront propagation engine
pub mod propagate;

/// The public distance queries built on top of the engine
pub mod query;


pub use error::{ErrorKind, GeodesicError, Result};
pub use mesh::SurfaceMesh;
pub use propagate::{Propagator, Step, StopReason};
pub use query::{
    compute_gdist, distance_matrix_of_selected_points, local_gdist_matrix, DistanceTriples,
    DEFAULT_MAX_DISTANCE,
};
