// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::math;
use crate::prelude::*;

slotmap::new_key_type! {
    /// Generational handle to a live window. The arena slot dies whenever
    /// overlap resolution replaces or removes the window, so a stale priority
    /// queue entry simply fails to resolve and is skipped on pop.
    pub struct WindowId;
}

/// A live wavefront fragment on a mesh edge.
///
/// The interval `[b0, b1]` is measured along the edge from its first stored
/// endpoint. `source` is the pseudosource expressed in that edge frame,
/// normalized to `y <= 0`: the distance function is even in the sign of
/// `source.y`, so the sign is only a storage convention meaning "the face the
/// wavefront crosses next unfolds into `y > 0`".
#[derive(Debug, Clone)]
pub struct Window {
    pub edge: u32,
    /// Face this wavefront came through. Propagation continues across the
    /// edge into the other adjacent face, if there is one.
    pub from_face: u32,
    pub b0: f64,
    pub b1: f64,
    /// Distances from the pseudosource to the interval endpoints.
    pub d0: f64,
    pub d1: f64,
    pub source: DVec2,
    /// Geodesic distance from the true source to the pseudosource.
    pub d_source: f64,
    /// Lower bound on every distance this window can still deliver; the
    /// priority key of the best-first drain.
    pub key: f64,
}

impl Window {
    pub fn new(edge: u32, from_face: u32, b0: f64, b1: f64, source: DVec2, d_source: f64) -> Self {
        let source = DVec2::new(source.x, -source.y.abs());
        let d_source = d_source.max(0.0);
        let d0 = source.distance(DVec2::new(b0, 0.0));
        let d1 = source.distance(DVec2::new(b1, 0.0));
        let key = d_source + math::span_distance(source, b0, b1);
        Self {
            edge,
            from_face,
            b0,
            b1,
            d0,
            d1,
            source,
            d_source,
            key,
        }
    }

    /// Geodesic distance delivered by this window at parameter `t` of its
    /// edge. Only meaningful inside `[b0, b1]`.
    pub fn distance_at(&self, t: f64) -> f64 {
        self.d_source + self.source.distance(DVec2::new(t, 0.0))
    }

    /// The same wavefront restricted to a sub-interval of its edge.
    pub fn narrowed(&self, b0: f64, b1: f64) -> Window {
        Window::new(self.edge, self.from_face, b0, b1, self.source, self.d_source)
    }
}
