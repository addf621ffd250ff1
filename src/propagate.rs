// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use float_ord::FloatOrd;
use slotmap::SlotMap;

use crate::interval_list::IntervalList;
use crate::math;
use crate::mesh::SurfaceMesh;
use crate::prelude::*;
use crate::window::{Window, WindowId};

/// Priority queue entry. The ordering key is the window's distance lower
/// bound, tie-broken by edge index and interval start so equally distant
/// fronts always drain in the same order.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct QueueEntry {
    key: FloatOrd<f64>,
    edge: u32,
    b0: FloatOrd<f64>,
    id: WindowId,
}

/// Why a propagation run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every live window has been drained.
    Exhausted,
    /// The cheapest remaining window is beyond the distance cap, and so is
    /// everything it could still produce.
    CapReached,
    /// Every target vertex is settled at or below the queue head, so no
    /// further work can improve them.
    TargetsSettled,
}

/// Outcome of a single engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Stopped(StopReason),
}

/// Single-request wavefront propagation state: the window arena, the
/// per-edge interval lists, the priority queue and the best distance found
/// so far for every vertex.
///
/// The mesh is borrowed read-only, so concurrent requests can each own a
/// `Propagator` over the same mesh. Everything else is request-local.
pub struct Propagator<'mesh> {
    mesh: &'mesh SurfaceMesh,
    arena: SlotMap<WindowId, Window>,
    lists: Vec<IntervalList>,
    queue: BinaryHeap<Reverse<QueueEntry>>,
    distances: Vec<f64>,
    max_distance: f64,
    /// Target vertices not yet known to be final. Empty when running without
    /// early termination.
    unsettled: Vec<u32>,
    has_targets: bool,
    /// Scratch buffer for ids produced by a merge, waiting to be queued.
    pending: Vec<WindowId>,
    processed: u64,
}

impl<'mesh> Propagator<'mesh> {
    pub fn new(mesh: &'mesh SurfaceMesh, max_distance: f64) -> Result<Self> {
        if !(max_distance >= 0.0) {
            return Err(GeodesicError::NegativeMaxDistance {
                value: max_distance,
            });
        }
        Ok(Self {
            mesh,
            arena: SlotMap::with_key(),
            lists: vec![IntervalList::default(); mesh.num_edges()],
            queue: BinaryHeap::new(),
            distances: vec![f64::INFINITY; mesh.num_vertices()],
            max_distance,
            unsettled: Vec::new(),
            has_targets: false,
            pending: Vec::new(),
            processed: 0,
        })
    }

    /// Enables early termination once every listed vertex is settled.
    pub fn set_targets(&mut self, targets: &[u32]) -> Result<()> {
        for &t in targets {
            if t as usize >= self.mesh.num_vertices() {
                return Err(GeodesicError::TargetIndexOutOfRange {
                    index: t,
                    num_vertices: self.mesh.num_vertices(),
                });
            }
        }
        self.unsettled = targets.to_vec();
        self.has_targets = !targets.is_empty();
        Ok(())
    }

    /// Seeds the propagation from the given source vertices. The resulting
    /// distance field measures the distance to the nearest source.
    pub fn seed(&mut self, sources: &[u32]) -> Result<()> {
        for &s in sources {
            if s as usize >= self.mesh.num_vertices() {
                return Err(GeodesicError::SourceIndexOutOfRange {
                    index: s,
                    num_vertices: self.mesh.num_vertices(),
                });
            }
        }
        for &s in sources {
            self.distances[s as usize] = 0.0;
        }
        for &s in sources {
            self.emit_from_vertex(s, 0.0);
        }
        log::debug!(
            "seeded {} source(s), {} initial window(s)",
            sources.len(),
            self.queue.len()
        );
        Ok(())
    }

    /// Runs the best-first drain to one of its terminal states.
    #[profiling::function]
    pub fn run(&mut self) -> StopReason {
        loop {
            if let Step::Stopped(reason) = self.step() {
                log::debug!(
                    "propagation stopped ({reason:?}) after {} window(s)",
                    self.processed
                );
                return reason;
            }
        }
    }

    /// Pops and processes the cheapest live window. Exposed so callers can
    /// interleave their own bookkeeping (timeouts, cancellation) with the
    /// drain; after an abandoned drain the distance map holds valid lower
    /// bounds.
    pub fn step(&mut self) -> Step {
        // Drop stale entries until the head refers to a live window.
        let (key, id) = loop {
            let head = match self.queue.peek() {
                None => return Step::Stopped(StopReason::Exhausted),
                Some(Reverse(entry)) => (entry.key.0, entry.id),
            };
            if self.arena.contains_key(head.1) {
                break head;
            }
            self.queue.pop();
        };

        if key > self.max_distance {
            return Step::Stopped(StopReason::CapReached);
        }
        if self.has_targets {
            let distances = &self.distances;
            self.unsettled.retain(|&t| distances[t as usize] > key);
            if self.unsettled.is_empty() {
                return Step::Stopped(StopReason::TargetsSettled);
            }
        }

        self.queue.pop();
        let window = self.arena[id].clone();
        self.processed += 1;
        self.process(&window);
        Step::Continue
    }

    pub fn distance(&self, vertex: u32) -> f64 {
        self.distances[vertex as usize]
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    /// Handles one popped window: settles the edge endpoints, then crosses
    /// the opposite face.
    fn process(&mut self, window: &Window) {
        let edge_len = self.mesh.edge_length(window.edge);
        let (va, vb) = self.mesh.edge(window.edge).endpoints();

        // Settle the endpoints by walking from the interval ends along the
        // edge. When an interval reaches an endpoint the walk is empty and
        // the value is exact.
        self.offer(va, window.d_source + window.d0 + window.b0);
        self.offer(vb, window.d_source + window.d1 + (edge_len - window.b1));

        self.cross_face(window, edge_len);
    }

    /// Propagates a window across the face on the far side of its edge,
    /// emitting up to two children on the far edges.
    fn cross_face(&mut self, window: &Window, edge_len: f64) {
        let to_face = match self.mesh.opposite_face(window.edge, window.from_face) {
            Some(f) => f,
            None => return, // boundary edge, the wavefront stops here
        };
        let eps = math::eps_parameter(edge_len);
        if window.source.y.abs() < eps {
            // The pseudosource sits on the edge line; the visibility cone has
            // zero width and illuminates nothing across the face.
            return;
        }

        let (va, vb) = self.mesh.edge(window.edge).endpoints();
        let far = self.mesh.far_corner(to_face, window.edge);
        let edge_a = self.mesh.opposite_edge(to_face, vb); // joins va and far
        let edge_b = self.mesh.opposite_edge(to_face, va); // joins far and vb

        // Unfold the far corner into the window's frame, on the receiving
        // side of the edge.
        let apex = math::triangle_apex(
            edge_len,
            self.mesh.edge_length(edge_a),
            self.mesh.edge_length(edge_b),
        );

        // The corner soaks up the wavefront whenever the cone contains it.
        let apex_shadow = math::shadow(window.source, apex);
        if apex_shadow >= window.b0 - eps && apex_shadow <= window.b1 + eps {
            self.offer(far, window.d_source + window.source.distance(apex));
        }

        let base_b = DVec2::new(edge_len, 0.0);
        if let Some((u0, u1)) =
            math::clip_to_cone(window.source, window.b0, window.b1, DVec2::ZERO, apex, eps)
        {
            self.emit_child(window, to_face, edge_a, va, DVec2::ZERO, apex, u0, u1);
        }
        if let Some((u0, u1)) =
            math::clip_to_cone(window.source, window.b0, window.b1, apex, base_b, eps)
        {
            self.emit_child(window, to_face, edge_b, far, apex, base_b, u0, u1);
        }
    }

    /// Materializes the part of a far edge lit by the parent window,
    /// reprojected into the far edge's own frame.
    #[allow(clippy::too_many_arguments)]
    fn emit_child(
        &mut self,
        parent: &Window,
        to_face: u32,
        edge: u32,
        first_vertex: u32,
        p: DVec2,
        q: DVec2,
        u0: f64,
        u1: f64,
    ) {
        let edge_len = self.mesh.edge_length(edge);
        let axis = (q - p) / edge_len;
        let rel = parent.source - p;
        let along = rel.dot(axis);
        let off = axis.perp_dot(rel);

        let (mut b0, mut b1) = (u0 * edge_len, u1 * edge_len);
        let mut source = DVec2::new(along, off);
        // The child lives in the frame of its own edge; flip when the mesh
        // stores that edge with the opposite orientation.
        if self.mesh.edge(edge).endpoints().0 != first_vertex {
            (b0, b1) = (edge_len - b1, edge_len - b0);
            source.x = edge_len - source.x;
        }
        let child = Window::new(
            edge,
            to_face,
            b0.max(0.0),
            b1.min(edge_len),
            source,
            parent.d_source,
        );
        self.insert_window(child);
    }

    /// Record a candidate distance for a vertex. Meaningful improvements at
    /// saddle or boundary vertices turn the vertex into a new pseudosource.
    fn offer(&mut self, vertex: u32, distance: f64) {
        let distance = distance.max(0.0);
        let best = self.distances[vertex as usize];
        if distance >= best {
            return;
        }
        self.distances[vertex as usize] = distance;
        let significant = best.is_infinite() || best - distance > math::eps_distance(distance, best);
        if significant && self.mesh.is_pseudosource_site(vertex) {
            log::trace!("vertex {vertex} respawns the wavefront at distance {distance}");
            self.emit_from_vertex(vertex, distance);
        }
    }

    /// Emits one window per face around `vertex`, covering the full edge
    /// opposite the vertex. Used both for true sources and for saddle or
    /// boundary vertices reached during propagation.
    fn emit_from_vertex(&mut self, vertex: u32, d_source: f64) {
        for &face in self.mesh.vertex_faces(vertex) {
            let edge = self.mesh.opposite_edge(face, vertex);
            let (ea, eb) = self.mesh.edge(edge).endpoints();
            let edge_len = self.mesh.edge_length(edge);
            let pv = self.mesh.position(vertex);
            let left = pv.distance(self.mesh.position(ea));
            let right = pv.distance(self.mesh.position(eb));
            let apex = math::triangle_apex(edge_len, left, right);
            let window = Window::new(
                edge,
                face,
                0.0,
                edge_len,
                DVec2::new(apex.x, -apex.y),
                d_source,
            );
            self.insert_window(window);
        }
    }

    /// Merges a window into its edge list and queues every id the merge
    /// produced.
    fn insert_window(&mut self, window: Window) {
        let edge_len = self.mesh.edge_length(window.edge);
        self.lists[window.edge as usize].insert(
            window,
            edge_len,
            &mut self.arena,
            &mut self.pending,
        );
        while let Some(id) = self.pending.pop() {
            let entry = {
                let w = &self.arena[id];
                QueueEntry {
                    key: FloatOrd(w.key),
                    edge: w.edge,
                    b0: FloatOrd(w.b0),
                    id,
                }
            };
            self.queue.push(Reverse(entry));
        }
    }

    /// Checks the interval-list invariant on every edge.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        for (e, list) in self.lists.iter().enumerate() {
            list.assert_invariants(&self.arena, self.mesh.edge_length(e as u32));
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    /// Two triangles sharing the diagonal of a unit square.
    fn square() -> SurfaceMesh {
        SurfaceMesh::build(
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    pub fn test_seed_and_drain() {
        let mesh = square();
        let mut engine = Propagator::new(&mesh, f64::INFINITY).unwrap();
        engine.seed(&[0]).unwrap();
        assert_eq!(engine.run(), StopReason::Exhausted);
        engine.assert_invariants();

        assert_eq!(engine.distance(0), 0.0);
        for (v, expected) in [(1, 1.0), (2, 2.0f64.sqrt()), (3, 1.0)] {
            assert!((engine.distance(v) - expected).abs() < 1e-9);
        }
    }

    #[test]
    pub fn test_bad_requests_are_rejected() {
        let mesh = square();
        assert!(matches!(
            Propagator::new(&mesh, -0.5),
            Err(GeodesicError::NegativeMaxDistance { .. })
        ));

        let mut engine = Propagator::new(&mesh, 1.0).unwrap();
        assert!(matches!(
            engine.seed(&[4]),
            Err(GeodesicError::SourceIndexOutOfRange { index: 4, .. })
        ));
        assert!(matches!(
            engine.set_targets(&[9]),
            Err(GeodesicError::TargetIndexOutOfRange { index: 9, .. })
        ));
    }
}
