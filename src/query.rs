// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::mesh::SurfaceMesh;
use crate::prelude::*;
use crate::propagate::Propagator;

/// Sentinel cap meaning "unbounded" for any realistic mesh. Matches the
/// convention of passing a huge double instead of an infinity through
/// foreign call layers.
pub const DEFAULT_MAX_DISTANCE: f64 = 1e100;

/// A sparse distance result as parallel triple arrays. Callers assemble
/// these into whatever sparse matrix container they use; diagonals are
/// omitted.
#[derive(Debug, Clone, Default)]
pub struct DistanceTriples {
    pub rows: Vec<u32>,
    pub cols: Vec<u32>,
    pub values: Vec<f64>,
}

impl DistanceTriples {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, f64)> + '_ {
        itertools::izip!(&self.rows, &self.cols, &self.values).map(|(&r, &c, &v)| (r, c, v))
    }

    fn push(&mut self, row: u32, col: u32, value: f64) {
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(value);
    }
}

fn check_max_distance(max_distance: f64) -> Result<()> {
    if !(max_distance >= 0.0) {
        return Err(GeodesicError::NegativeMaxDistance {
            value: max_distance,
        });
    }
    Ok(())
}

/// Unreached targets report the cap itself rather than an infinity, so the
/// output array is always finite and directly comparable against the cap.
fn clamp_unreached(distance: f64, max_distance: f64) -> f64 {
    if distance <= max_distance {
        distance
    } else {
        max_distance
    }
}

/// Geodesic distances from the nearest of `sources` to each of `targets`,
/// capped at `max_distance`.
///
/// Passing both lists empty selects the full-field mode: the result has one
/// entry per mesh vertex, holding the distance from vertex 0. Empty sources
/// with non-empty targets is an invalid request; non-empty sources with
/// empty targets trivially yields an empty array.
pub fn compute_gdist(
    mesh: &SurfaceMesh,
    sources: &[u32],
    targets: &[u32],
    max_distance: f64,
) -> Result<Vec<f64>> {
    check_max_distance(max_distance)?;

    if sources.is_empty() && targets.is_empty() {
        if mesh.num_vertices() == 0 {
            return Ok(Vec::new());
        }
        let mut engine = Propagator::new(mesh, max_distance)?;
        engine.seed(&[0])?;
        engine.run();
        return Ok(engine
            .distances()
            .iter()
            .map(|&d| clamp_unreached(d, max_distance))
            .collect());
    }
    if sources.is_empty() {
        return Err(GeodesicError::NoSources);
    }
    if targets.is_empty() {
        return Ok(Vec::new());
    }

    let mut engine = Propagator::new(mesh, max_distance)?;
    engine.set_targets(targets)?;
    engine.seed(sources)?;
    engine.run();
    Ok(targets
        .iter()
        .map(|&t| clamp_unreached(engine.distance(t), max_distance))
        .collect())
}

/// All pairwise geodesic distances up to `max_distance`, as triples
/// `(source vertex, reached vertex, distance)`. One single-source propagation
/// per vertex, each with fresh engine state over the shared mesh.
pub fn local_gdist_matrix(mesh: &SurfaceMesh, max_distance: f64) -> Result<DistanceTriples> {
    check_max_distance(max_distance)?;
    let mut out = DistanceTriples::default();
    for v in 0..mesh.num_vertices() as u32 {
        let mut engine = Propagator::new(mesh, max_distance)?;
        engine.seed(&[v])?;
        engine.run();
        for (u, &d) in engine.distances().iter().enumerate() {
            if u as u32 != v && d <= max_distance {
                out.push(v, u as u32, d);
            }
        }
    }
    log::debug!(
        "local distance matrix: {} entries over {} vertices",
        out.len(),
        mesh.num_vertices()
    );
    Ok(out)
}

/// Dense pairwise distances among a selected set of vertices, as triples
/// indexed by position within `points` (the result is conceptually a
/// `|points| x |points|` matrix). Uncapped; pairs in different connected
/// components are omitted.
pub fn distance_matrix_of_selected_points(
    mesh: &SurfaceMesh,
    points: &[u32],
) -> Result<DistanceTriples> {
    let mut out = DistanceTriples::default();
    for (i, &p) in points.iter().enumerate() {
        let mut engine = Propagator::new(mesh, f64::INFINITY)?;
        engine.set_targets(points)?;
        engine.seed(&[p])?;
        engine.run();
        for (j, &q) in points.iter().enumerate() {
            let d = engine.distance(q);
            if i != j && d.is_finite() {
                out.push(i as u32, j as u32, d);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    pub fn test_triples_accessors() {
        let mut triples = DistanceTriples::default();
        assert!(triples.is_empty());

        triples.push(0, 1, 0.5);
        triples.push(1, 0, 0.5);
        assert!(!triples.is_empty());
        assert_eq!(triples.len(), 2);
        assert_eq!(
            triples.iter().collect_vec(),
            vec![(0, 1, 0.5), (1, 0, 0.5)]
        );
    }

    #[test]
    pub fn test_clamp_unreached() {
        assert_eq!(clamp_unreached(0.4, 1.0), 0.4);
        assert_eq!(clamp_unreached(2.0, 1.0), 1.0);
        assert_eq!(clamp_unreached(f64::INFINITY, 1.0), 1.0);
        assert_eq!(clamp_unreached(f64::INFINITY, DEFAULT_MAX_DISTANCE), DEFAULT_MAX_DISTANCE);
    }
}
