// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use float_ord::FloatOrd;
use slotmap::SlotMap;

use crate::math;
use crate::prelude::*;
use crate::window::{Window, WindowId};

/// The live windows on one edge, ordered by `b0`. Intervals never overlap
/// beyond tolerance; together they realize the pointwise minimum of every
/// wavefront that ever reached the edge.
#[derive(Debug, Default, Clone)]
pub struct IntervalList {
    windows: Vec<WindowId>,
}

/// Appends `[a, b]` to `pieces`, fusing it with the last piece when the two
/// are contiguous within tolerance.
fn push_merged(pieces: &mut SVecN<(f64, f64), 4>, a: f64, b: f64, eps: f64) {
    if let Some(last) = pieces.last_mut() {
        if a - last.1 <= eps {
            last.1 = last.1.max(b);
            return;
        }
    }
    pieces.push((a, b));
}

/// Decides the survivor at one point of the edge. Near-exact ties go to the
/// wavefront with the smaller pseudosource distance, then the smaller `b0`,
/// then the incumbent, so resolution is deterministic.
fn incoming_wins(incoming: &Window, incumbent: &Window, t: f64) -> bool {
    let d_in = incoming.distance_at(t);
    let d_old = incumbent.distance_at(t);
    if (d_in - d_old).abs() > math::eps_distance(d_in, d_old) {
        return d_in < d_old;
    }
    if incoming.d_source != incumbent.d_source {
        return incoming.d_source < incumbent.d_source;
    }
    incoming.b0 < incumbent.b0
}

impl IntervalList {
    pub fn windows(&self) -> &[WindowId] {
        &self.windows
    }

    /// Inserts a wavefront into the list, resolving every overlap so the edge
    /// keeps the pointwise-minimum window at each parameter.
    ///
    /// Incumbents that lose part of their range are replaced by narrowed
    /// copies under fresh ids; the old ids are removed from the arena, which
    /// invalidates any queue entry still pointing at them. Every freshly
    /// allocated id (incoming pieces and narrowed incumbents alike) is
    /// appended to `changed` for the caller to (re)queue.
    pub fn insert(
        &mut self,
        incoming: Window,
        edge_len: f64,
        arena: &mut SlotMap<WindowId, Window>,
        changed: &mut Vec<WindowId>,
    ) {
        let eps = math::eps_parameter(edge_len);
        if incoming.b1 - incoming.b0 < eps {
            return;
        }

        let mut result: Vec<WindowId> = Vec::with_capacity(self.windows.len() + 2);
        let mut incoming_pieces: SVecN<(f64, f64), 4> = SVecN::new();
        // Start of the part of the incoming interval not yet accounted for.
        let mut cursor = incoming.b0;

        for &old_id in &self.windows {
            let old = arena[old_id].clone();
            if old.b1 <= incoming.b0 + eps || old.b0 >= incoming.b1 - eps {
                result.push(old_id);
                continue;
            }

            let lo = old.b0.max(incoming.b0);
            let hi = old.b1.min(incoming.b1);
            if lo > cursor {
                // Uncontested stretch of the incoming window before this
                // incumbent.
                push_merged(&mut incoming_pieces, cursor, lo, eps);
            }

            // Partition the contested range at the (possibly spurious)
            // crossings of the two distance functions and let the midpoint of
            // each piece pick its survivor.
            let mut cuts: SVecN<f64, 4> = smallvec::smallvec![lo];
            cuts.extend(math::equal_distance_points(
                old.source,
                old.d_source,
                incoming.source,
                incoming.d_source,
                lo,
                hi,
            ));
            cuts.push(hi);

            let mut old_keeps: SVecN<(f64, f64), 4> = SVecN::new();
            if old.b0 < lo {
                old_keeps.push((old.b0, lo));
            }
            for (a, b) in cuts.iter().copied().tuple_windows() {
                if incoming_wins(&incoming, &old, 0.5 * (a + b)) {
                    push_merged(&mut incoming_pieces, a, b, eps);
                } else {
                    push_merged(&mut old_keeps, a, b, eps);
                }
            }
            if old.b1 > hi {
                push_merged(&mut old_keeps, hi, old.b1, eps);
            }

            let intact = old_keeps.len() == 1
                && (old_keeps[0].0 - old.b0).abs() <= eps
                && (old_keeps[0].1 - old.b1).abs() <= eps;
            if intact {
                result.push(old_id);
            } else {
                arena.remove(old_id);
                for (a, b) in old_keeps {
                    if b - a < eps {
                        continue;
                    }
                    let id = arena.insert(old.narrowed(a, b));
                    result.push(id);
                    changed.push(id);
                }
            }
            cursor = hi;
        }

        if incoming.b1 > cursor {
            push_merged(&mut incoming_pieces, cursor, incoming.b1, eps);
        }
        for (a, b) in incoming_pieces {
            if b - a < eps {
                continue;
            }
            let id = arena.insert(incoming.narrowed(a, b));
            result.push(id);
            changed.push(id);
        }

        result.sort_by_key(|&id| FloatOrd(arena[id].b0));
        self.windows = result;
    }

    /// Checks the list invariants: sorted by `b0`, intervals inside the edge,
    /// no overlap beyond tolerance.
    #[cfg(test)]
    pub fn assert_invariants(&self, arena: &SlotMap<WindowId, Window>, edge_len: f64) {
        let eps = math::eps_parameter(edge_len);
        let mut prev_end = -eps;
        for &id in &self.windows {
            let w = &arena[id];
            assert!(w.b0 >= -eps && w.b1 <= edge_len + eps, "interval out of edge");
            assert!(w.b1 - w.b0 >= eps, "empty interval survived");
            assert!(w.b0 >= prev_end - eps, "overlapping intervals on one edge");
            prev_end = w.b1;
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    fn arena() -> SlotMap<WindowId, Window> {
        SlotMap::with_key()
    }

    fn insert(
        list: &mut IntervalList,
        arena: &mut SlotMap<WindowId, Window>,
        w: Window,
    ) -> Vec<WindowId> {
        let mut changed = Vec::new();
        list.insert(w, 1.0, arena, &mut changed);
        list.assert_invariants(arena, 1.0);
        changed
    }

    #[test]
    pub fn test_disjoint_windows() {
        let mut arena = arena();
        let mut list = IntervalList::default();
        insert(&mut list, &mut arena, Window::new(0, 0, 0.0, 0.3, DVec2::new(0.1, -0.5), 0.0));
        insert(&mut list, &mut arena, Window::new(0, 0, 0.6, 1.0, DVec2::new(0.8, -0.5), 0.0));
        assert_eq!(list.windows().len(), 2);
        assert!(arena[list.windows()[0]].b0 < arena[list.windows()[1]].b0);
    }

    #[test]
    pub fn test_full_shadow_keeps_incumbent() {
        let mut arena = arena();
        let mut list = IntervalList::default();
        let near = Window::new(0, 0, 0.0, 1.0, DVec2::new(0.5, -0.1), 0.0);
        insert(&mut list, &mut arena, near);
        let keep = list.windows()[0];

        // A wavefront from much farther away adds nothing.
        let far = Window::new(0, 0, 0.0, 1.0, DVec2::new(0.5, -5.0), 0.0);
        let changed = insert(&mut list, &mut arena, far);
        assert!(changed.is_empty());
        assert_eq!(list.windows(), &[keep]);
    }

    #[test]
    pub fn test_full_shadow_replaces_incumbent() {
        let mut arena = arena();
        let mut list = IntervalList::default();
        let far = Window::new(0, 0, 0.0, 1.0, DVec2::new(0.5, -5.0), 0.0);
        insert(&mut list, &mut arena, far);
        let dead = list.windows()[0];

        let near = Window::new(0, 0, 0.0, 1.0, DVec2::new(0.5, -0.1), 0.0);
        let changed = insert(&mut list, &mut arena, near);
        assert_eq!(changed.len(), 1);
        assert_eq!(list.windows(), &changed[..]);
        // The shadowed incumbent is gone from the arena, so any queued
        // reference to it is now stale.
        assert!(!arena.contains_key(dead));
    }

    #[test]
    pub fn test_crossing_split() {
        let mut arena = arena();
        let mut list = IntervalList::default();
        // Mirrored sources: each should win the half of the edge it hangs
        // under, with the crossing at the middle.
        insert(&mut list, &mut arena, Window::new(0, 0, 0.0, 1.0, DVec2::new(0.0, -0.2), 0.0));
        insert(&mut list, &mut arena, Window::new(0, 0, 0.0, 1.0, DVec2::new(1.0, -0.2), 0.0));

        assert_eq!(list.windows().len(), 2);
        let left = &arena[list.windows()[0]];
        let right = &arena[list.windows()[1]];
        assert!((left.b1 - 0.5).abs() < 1e-9);
        assert!((right.b0 - 0.5).abs() < 1e-9);
        assert_eq!(left.source.x, 0.0);
        assert_eq!(right.source.x, 1.0);
    }

    #[test]
    pub fn test_partial_overlap_trims_loser() {
        let mut arena = arena();
        let mut list = IntervalList::default();
        // Incumbent hugging the edge on the right half.
        insert(&mut list, &mut arena, Window::new(0, 0, 0.4, 1.0, DVec2::new(0.7, -0.05), 0.0));
        // Incoming covers everything but is farther away; it must keep only
        // the uncovered left part plus whatever it wins near b = 0.4.
        insert(&mut list, &mut arena, Window::new(0, 0, 0.0, 1.0, DVec2::new(0.2, -0.3), 0.0));

        let ws = list.windows();
        assert!(ws.len() >= 2);
        assert_eq!(arena[ws[0]].b0, 0.0);
        let total: f64 = ws.iter().map(|&id| arena[id].b1 - arena[id].b0).sum();
        assert!(total <= 1.0 + 1e-9);
        // The pointwise minimum is realized: probe a few parameters.
        for t in [0.05, 0.3, 0.5, 0.7, 0.95] {
            let best = ws
                .iter()
                .map(|&id| {
                    let w = &arena[id];
                    if w.b0 - 1e-9 <= t && t <= w.b1 + 1e-9 {
                        w.distance_at(t)
                    } else {
                        f64::INFINITY
                    }
                })
                .fold(f64::INFINITY, f64::min);
            let a = 0.0 + DVec2::new(0.7 - t, 0.05).length().min(f64::INFINITY);
            let b = DVec2::new(0.2 - t, 0.3).length();
            let expected = if (0.4..=1.0).contains(&t) { a.min(b) } else { b };
            assert!((best - expected).abs() < 1e-7, "at {t}: {best} vs {expected}");
        }
    }

    #[test]
    pub fn test_identical_window_is_dropped() {
        let mut arena = arena();
        let mut list = IntervalList::default();
        let w = Window::new(0, 0, 0.0, 1.0, DVec2::new(0.5, -0.2), 0.0);
        insert(&mut list, &mut arena, w.clone());
        let keep = list.windows().to_vec();
        let changed = insert(&mut list, &mut arena, w);
        assert!(changed.is_empty());
        assert_eq!(list.windows(), &keep[..]);
    }
}
