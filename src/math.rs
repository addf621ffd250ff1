// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

/// Relative tolerance for all planar comparisons. Absolute tolerances are
/// derived from it by scaling with the local edge length or distance.
pub const RELATIVE_TOLERANCE: f64 = 1e-10;

/// Absolute tolerance for parameters measured along an edge of this length.
pub fn eps_parameter(edge_len: f64) -> f64 {
    RELATIVE_TOLERANCE * edge_len
}

/// Absolute tolerance for comparing the two given distance values.
pub fn eps_distance(d0: f64, d1: f64) -> f64 {
    RELATIVE_TOLERANCE * d0.max(d1).max(1.0)
}

/// Planar unfolding step: the apex of a triangle with side lengths `base`
/// (along +x from the origin), `left` (origin to apex) and `right` (far base
/// endpoint to apex), placed in the upper half-plane.
///
/// Follows the law of cosines. A near-zero `y` means the triangle is
/// degenerate; the mesh builder rejects such faces up front.
pub fn triangle_apex(base: f64, left: f64, right: f64) -> DVec2 {
    let x = (base * base + left * left - right * right) / (2.0 * base);
    let y2 = left * left - x * x;
    DVec2::new(x, y2.max(0.0).sqrt())
}

/// X-intercept of the line through `source` (strictly below the x axis) and
/// `p` (on or above it). This is where a ray of the wavefront aimed at `p`
/// pierces the edge line.
pub fn shadow(source: DVec2, p: DVec2) -> f64 {
    source.x + (p.x - source.x) * (-source.y) / (p.y - source.y)
}

/// Clips the segment `p -> q` (both endpoints on or above the x axis) against
/// the cone of rays cast from `source` through the slit `[b0, b1]` of the x
/// axis. Returns the illuminated sub-range as fractions of the segment, or
/// `None` when the cone misses it entirely.
///
/// The x-intercept is a Möbius function of the segment parameter with no pole
/// above the axis, hence monotone; clipping reduces to solving it at the two
/// slit ends.
pub fn clip_to_cone(
    source: DVec2,
    b0: f64,
    b1: f64,
    p: DVec2,
    q: DVec2,
    eps: f64,
) -> Option<(f64, f64)> {
    debug_assert!(source.y < 0.0);
    let sp = shadow(source, p);
    let sq = shadow(source, q);
    let (x0, x1) = if sp <= sq { (sp, sq) } else { (sq, sp) };
    if x1 <= b0 + eps || x0 >= b1 - eps {
        return None;
    }

    let u_at = |b: f64| -> f64 {
        let dir = DVec2::new(b - source.x, -source.y);
        let u = -dir.perp_dot(p - source) / dir.perp_dot(q - p);
        if u.is_finite() {
            u.clamp(0.0, 1.0)
        } else {
            // Grazing ray; fall back to interpolating between the intercepts.
            ((b - sp) / (sq - sp)).clamp(0.0, 1.0)
        }
    };

    let (ua, ub) = if sp <= sq {
        (
            if b0 <= sp { 0.0 } else { u_at(b0) },
            if b1 >= sq { 1.0 } else { u_at(b1) },
        )
    } else {
        (
            if b1 >= sp { 0.0 } else { u_at(b1) },
            if b0 <= sq { 1.0 } else { u_at(b0) },
        )
    };
    if ub <= ua {
        return None;
    }
    Some((ua, ub))
}

/// Distance from a 2D point to the interval `[b0, b1]` of the x axis.
pub fn span_distance(p: DVec2, b0: f64, b1: f64) -> f64 {
    if p.x < b0 {
        p.distance(DVec2::new(b0, 0.0))
    } else if p.x > b1 {
        p.distance(DVec2::new(b1, 0.0))
    } else {
        p.y.abs()
    }
}

/// Parameter values in the open interval `(lo, hi)` where the distance
/// functions of two wavefronts along the x axis may be equal.
///
/// Solving `da + |t - a| = db + |t - b|` requires squaring twice, so the
/// returned cut points can include spurious roots. Callers decide each
/// sub-piece by comparing the two functions at its midpoint, which makes an
/// extra cut harmless.
pub fn equal_distance_points(
    a_source: DVec2,
    a_dist: f64,
    b_source: DVec2,
    b_dist: f64,
    lo: f64,
    hi: f64,
) -> SVecN<f64, 2> {
    let mut out = SVecN::new();
    let c = b_dist - a_dist;
    let (x1, y1) = (a_source.x, a_source.y);
    let (x2, y2) = (b_source.x, b_source.y);

    let alpha = 2.0 * (x2 - x1);
    let beta = x1 * x1 + y1 * y1 - x2 * x2 - y2 * y2;
    let c2 = c * c;

    let qa = alpha * alpha - 4.0 * c2;
    let qb = 2.0 * alpha * (beta - c2) + 8.0 * c2 * x2;
    let qc = (beta - c2) * (beta - c2) - 4.0 * c2 * (x2 * x2 + y2 * y2);

    let mut push = |t: f64| {
        if t.is_finite() && t > lo && t < hi {
            out.push(t);
        }
    };

    if qa.abs() <= f64::EPSILON * qb.abs().max(qc.abs()).max(1.0) {
        if qb != 0.0 {
            push(-qc / qb);
        }
    } else {
        let disc = qb * qb - 4.0 * qa * qc;
        if disc >= 0.0 {
            // Stable quadratic formula: compute the larger-magnitude root
            // first, derive the other from the product.
            let q = -0.5 * (qb + qb.signum() * disc.sqrt());
            push(q / qa);
            if q != 0.0 {
                push(qc / q);
            }
        }
    }

    out.sort_by(|a: &f64, b: &f64| a.partial_cmp(b).unwrap());
    out
}
