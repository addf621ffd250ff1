// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use nonmax::NonMaxU32;

use crate::math;
use crate::prelude::*;

/// Extra slack on top of the exact flat angle when classifying saddle
/// vertices, so floating point noise on flat fans never promotes them.
const SADDLE_ANGLE_SLACK: f64 = 1e-10;

/// An undirected mesh edge. Endpoints are stored lower index first.
#[derive(Debug, Clone)]
pub struct Edge {
    endpoints: [u32; 2],
    length: f64,
    face: u32,
    /// Second adjacent face. `None` on the boundary. Uses NonMaxU32 so the
    /// whole option packs into four bytes.
    other_face: Option<NonMaxU32>,
}

impl Edge {
    pub fn endpoints(&self) -> (u32, u32) {
        (self.endpoints[0], self.endpoints[1])
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn is_boundary(&self) -> bool {
        self.other_face.is_none()
    }
}

/// An immutable triangle surface with the adjacency tables and per-face
/// planar frames needed for wavefront propagation.
///
/// Vertices, faces and edges are identified by dense `u32` indices. Edges are
/// deduplicated at build time; each one borders one or two faces.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    positions: Vec<DVec3>,
    triangles: Vec<[u32; 3]>,
    edges: Vec<Edge>,
    /// `face_edges[f][k]` is the edge of face `f` opposite its corner `k`.
    face_edges: Vec<[u32; 3]>,
    /// Canonical planar embedding of each face: corner 0 at the origin,
    /// corner 1 on the +x axis, corner 2 in the upper half-plane.
    face_frames: Vec<[DVec2; 3]>,
    vertex_edges: Vec<SVec<u32>>,
    vertex_faces: Vec<SVec<u32>>,
    total_angle: Vec<f64>,
    boundary_vertex: Vec<bool>,
}

impl SurfaceMesh {
    /// Builds the mesh, deduplicating edges and precomputing adjacency,
    /// lengths, frames and the per-vertex angle totals.
    #[profiling::function]
    pub fn build(positions: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        let num_vertices = positions.len();
        for (f, tri) in triangles.iter().enumerate() {
            for &index in tri {
                if index as usize >= num_vertices {
                    return Err(GeodesicError::VertexIndexOutOfRange {
                        face: f,
                        index,
                        num_vertices,
                    });
                }
            }
        }

        // Deduplicate edges. The map is only used for lookups, so its
        // iteration order cannot leak into the edge numbering.
        let mut edge_indices = HashMap::<(u32, u32), u32>::new();
        let mut edges: Vec<Edge> = Vec::new();
        let mut face_edges = vec![[0u32; 3]; triangles.len()];
        for (f, tri) in triangles.iter().enumerate() {
            for k in 0..3 {
                let a = tri[(k + 1) % 3];
                let b = tri[(k + 2) % 3];
                let key = (a.min(b), a.max(b));
                let edge_ix = match edge_indices.get(&key) {
                    Some(&e) => {
                        if edges[e as usize].other_face.is_some() {
                            return Err(GeodesicError::NonManifoldEdge {
                                v0: key.0,
                                v1: key.1,
                            });
                        }
                        edges[e as usize].other_face = NonMaxU32::new(f as u32);
                        e
                    }
                    None => {
                        let e = edges.len() as u32;
                        edges.push(Edge {
                            endpoints: [key.0, key.1],
                            length: positions[key.0 as usize]
                                .distance(positions[key.1 as usize]),
                            face: f as u32,
                            other_face: None,
                        });
                        edge_indices.insert(key, e);
                        e
                    }
                };
                face_edges[f][k] = edge_ix;
            }
        }

        for (e, edge) in edges.iter().enumerate() {
            if edge.length == 0.0 {
                return Err(GeodesicError::ZeroLengthEdge { edge: e });
            }
        }

        // Reject faces whose corners collapse within tolerance of each other,
        // then the slivers that are still collinear.
        let mut face_frames = Vec::with_capacity(triangles.len());
        for (f, tri) in triangles.iter().enumerate() {
            let [a, b, c] = [
                positions[tri[0] as usize],
                positions[tri[1] as usize],
                positions[tri[2] as usize],
            ];
            let (lab, lac, lbc) = (a.distance(b), a.distance(c), b.distance(c));
            let scale = lab.max(lac).max(lbc);
            if lab.min(lac).min(lbc) <= math::eps_parameter(scale) {
                return Err(GeodesicError::CoincidentVertices { face: f });
            }
            let apex = math::triangle_apex(lab, lac, lbc);
            if apex.y <= math::eps_parameter(scale) {
                return Err(GeodesicError::ZeroAreaFace { face: f });
            }
            face_frames.push([DVec2::ZERO, DVec2::new(lab, 0.0), apex]);
        }

        let mut vertex_edges = vec![SVec::new(); num_vertices];
        let mut vertex_faces = vec![SVec::new(); num_vertices];
        for (e, edge) in edges.iter().enumerate() {
            vertex_edges[edge.endpoints[0] as usize].push(e as u32);
            vertex_edges[edge.endpoints[1] as usize].push(e as u32);
        }
        for (f, tri) in triangles.iter().enumerate() {
            for &v in tri {
                vertex_faces[v as usize].push(f as u32);
            }
        }

        // Accumulated corner angles decide which vertices act as saddles.
        let mut total_angle = vec![0.0; num_vertices];
        for (f, tri) in triangles.iter().enumerate() {
            let frame = &face_frames[f];
            for k in 0..3 {
                let u = frame[(k + 1) % 3] - frame[k];
                let v = frame[(k + 2) % 3] - frame[k];
                let cos = (u.dot(v) / (u.length() * v.length())).clamp(-1.0, 1.0);
                total_angle[tri[k] as usize] += cos.acos();
            }
        }

        let mut boundary_vertex = vec![false; num_vertices];
        for edge in &edges {
            if edge.other_face.is_none() {
                boundary_vertex[edge.endpoints[0] as usize] = true;
                boundary_vertex[edge.endpoints[1] as usize] = true;
            }
        }

        Ok(Self {
            positions,
            triangles,
            edges,
            face_edges,
            face_frames,
            vertex_edges,
            vertex_faces,
            total_angle,
            boundary_vertex,
        })
    }

    /// Builds the mesh from the flat buffers of a foreign caller: `3 * V`
    /// vertex coordinates and `3 * F` triangle indices. With `one_indexed`
    /// set, every index is decremented before validation.
    pub fn from_flat(vertices: &[f64], triangles: &[u32], one_indexed: bool) -> Result<Self> {
        let positions = vertices
            .chunks_exact(3)
            .map(|c| DVec3::new(c[0], c[1], c[2]))
            .collect();
        let triangles = triangles
            .chunks_exact(3)
            .enumerate()
            .map(|(f, c)| -> Result<[u32; 3]> {
                let mut tri = [0u32; 3];
                for (slot, &index) in tri.iter_mut().zip(c) {
                    *slot = if one_indexed {
                        index
                            .checked_sub(1)
                            .ok_or(GeodesicError::VertexIndexOutOfRange {
                                face: f,
                                index,
                                num_vertices: vertices.len() / 3,
                            })?
                    } else {
                        index
                    };
                }
                Ok(tri)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::build(positions, triangles)
    }

    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    pub fn num_faces(&self) -> usize {
        self.triangles.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn position(&self, vertex: u32) -> DVec3 {
        self.positions[vertex as usize]
    }

    pub fn edge(&self, edge: u32) -> &Edge {
        &self.edges[edge as usize]
    }

    pub fn edge_length(&self, edge: u32) -> f64 {
        self.edges[edge as usize].length
    }

    /// The face on the other side of `edge` as seen from `face`, or `None`
    /// when the edge is on the boundary.
    pub fn opposite_face(&self, edge: u32, face: u32) -> Option<u32> {
        let e = &self.edges[edge as usize];
        if e.face == face {
            e.other_face.map(|f| f.get())
        } else {
            Some(e.face)
        }
    }

    pub fn face_corners(&self, face: u32) -> [u32; 3] {
        self.triangles[face as usize]
    }

    pub fn face_edges(&self, face: u32) -> [u32; 3] {
        self.face_edges[face as usize]
    }

    pub fn face_frame(&self, face: u32) -> [DVec2; 3] {
        self.face_frames[face as usize]
    }

    /// The edge of `face` opposite the given corner vertex.
    pub fn opposite_edge(&self, face: u32, corner: u32) -> u32 {
        let tri = self.triangles[face as usize];
        let k = tri
            .iter()
            .position(|&v| v == corner)
            .expect("vertex is not a corner of the face");
        self.face_edges[face as usize][k]
    }

    /// The corner of `face` opposite the given edge.
    pub fn far_corner(&self, face: u32, edge: u32) -> u32 {
        let fe = self.face_edges[face as usize];
        let k = fe
            .iter()
            .position(|&e| e == edge)
            .expect("edge does not border the face");
        self.triangles[face as usize][k]
    }

    pub fn vertex_edges(&self, vertex: u32) -> &[u32] {
        &self.vertex_edges[vertex as usize]
    }

    pub fn vertex_faces(&self, vertex: u32) -> &[u32] {
        &self.vertex_faces[vertex as usize]
    }

    pub fn total_angle(&self, vertex: u32) -> f64 {
        self.total_angle[vertex as usize]
    }

    pub fn is_boundary_vertex(&self, vertex: u32) -> bool {
        self.boundary_vertex[vertex as usize]
    }

    /// A saddle vertex concentrates more than a full turn of surface angle.
    pub fn is_saddle_vertex(&self, vertex: u32) -> bool {
        self.total_angle[vertex as usize] > std::f64::consts::TAU + SADDLE_ANGLE_SLACK
    }

    /// Whether geodesics may bend at this vertex, spawning new wavefronts
    /// from it during propagation.
    pub fn is_pseudosource_site(&self, vertex: u32) -> bool {
        self.is_saddle_vertex(vertex) || self.boundary_vertex[vertex as usize]
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
    pub fn test_square_adjacency() {
        let mesh = square();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(mesh.num_edges(), 5);

        let diagonal = (0..mesh.num_edges() as u32)
            .filter(|&e| !mesh.edge(e).is_boundary())
            .collect_vec();
        assert_eq!(diagonal.len(), 1);
        assert_eq!(mesh.edge(diagonal[0]).endpoints(), (0, 2));
        assert!((mesh.edge_length(diagonal[0]) - 2.0f64.sqrt()).abs() < 1e-12);

        assert_eq!(mesh.opposite_face(diagonal[0], 0), Some(1));
        assert_eq!(mesh.opposite_face(diagonal[0], 1), Some(0));
        assert_eq!(mesh.far_corner(0, diagonal[0]), 1);
        assert_eq!(mesh.far_corner(1, diagonal[0]), 3);
        assert_eq!(mesh.opposite_edge(0, 1), diagonal[0]);

        for v in 0..4 {
            assert!(mesh.is_boundary_vertex(v));
            assert!(mesh.is_pseudosource_site(v));
        }
    }

    #[test]
    pub fn test_face_frames() {
        let mesh = square();
        let frame = mesh.face_frame(0);
        assert_eq!(frame[0], DVec2::ZERO);
        assert!((frame[1].x - 1.0).abs() < 1e-12 && frame[1].y == 0.0);
        assert!(frame[2].y > 0.0);
        // The frame is isometric to the 3D face.
        assert!(
            (frame[2].distance(frame[0]) - mesh.position(2).distance(mesh.position(0))).abs()
                < 1e-12
        );
    }

    #[test]
    pub fn test_flat_fan_angles() {
        // A 2x2 grid of squares; the center vertex has a full flat fan.
        let mut positions = Vec::new();
        for iy in 0..3 {
            for ix in 0..3 {
                positions.push(DVec3::new(ix as f64, iy as f64, 0.0));
            }
        }
        let mut triangles = Vec::new();
        for iy in 0..2u32 {
            for ix in 0..2u32 {
                let v = iy * 3 + ix;
                triangles.push([v, v + 1, v + 4]);
                triangles.push([v, v + 4, v + 3]);
            }
        }
        let mesh = SurfaceMesh::build(positions, triangles).unwrap();
        assert!((mesh.total_angle(4) - std::f64::consts::TAU).abs() < 1e-12);
        assert!(!mesh.is_saddle_vertex(4));
        assert!(!mesh.is_pseudosource_site(4));
        assert!(mesh.is_boundary_vertex(1));
    }

    #[test]
    pub fn test_out_of_range_index() {
        let err = SurfaceMesh::build(
            vec![DVec3::ZERO, DVec3::X, DVec3::Y],
            vec![[0, 1, 3]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            GeodesicError::VertexIndexOutOfRange {
                face: 0,
                index: 3,
                num_vertices: 3
            }
        );
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidMesh);
    }

    #[test]
    pub fn test_non_manifold_edge() {
        let err = SurfaceMesh::build(
            vec![DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::Z, DVec3::new(0.0, -1.0, 0.0)],
            vec![[0, 1, 2], [0, 1, 3], [0, 1, 4]],
        )
        .unwrap_err();
        assert_eq!(err, GeodesicError::NonManifoldEdge { v0: 0, v1: 1 });
    }

    #[test]
    pub fn test_zero_length_edge() {
        let err = SurfaceMesh::build(
            vec![DVec3::ZERO, DVec3::ZERO, DVec3::Y],
            vec![[0, 1, 2]],
        )
        .unwrap_err();
        assert!(matches!(err, GeodesicError::ZeroLengthEdge { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::DegenerateGeometry);
    }

    #[test]
    pub fn test_coincident_vertices() {
        // Distinct but far closer together than the tolerance scale.
        let err = SurfaceMesh::build(
            vec![DVec3::ZERO, DVec3::new(1e-14, 0.0, 0.0), DVec3::Y],
            vec![[0, 1, 2]],
        )
        .unwrap_err();
        assert_eq!(err, GeodesicError::CoincidentVertices { face: 0 });
    }

    #[test]
    pub fn test_zero_area_face() {
        let err = SurfaceMesh::build(
            vec![DVec3::ZERO, DVec3::X, DVec3::new(2.0, 0.0, 0.0)],
            vec![[0, 1, 2]],
        )
        .unwrap_err();
        assert_eq!(err, GeodesicError::ZeroAreaFace { face: 0 });
    }

    #[test]
    pub fn test_from_flat_one_indexed() {
        let vertices = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let zero = SurfaceMesh::from_flat(&vertices, &[0, 1, 2], false).unwrap();
        let one = SurfaceMesh::from_flat(&vertices, &[1, 2, 3], true).unwrap();
        assert_eq!(zero.face_corners(0), one.face_corners(0));

        let err = SurfaceMesh::from_flat(&vertices, &[0, 1, 2], true).unwrap_err();
        assert!(matches!(err, GeodesicError::VertexIndexOutOfRange { .. }));
    }
}
