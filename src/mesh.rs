//! Mesh & connectivity store (component A, §3 "Mesh", §4.2).
//!
//! Follows the arena-plus-stable-id design note in §9: vertices, edges,
//! triangles and quads each live in a flat `Vec` and are referenced by the
//! index they were assigned at creation, which never changes until the mesh
//! is cleared.

use crate::error::{CoreError, Result};
use crate::geometry::{convex_quad_oracle, distance, BoundingBox, Coord};

pub type VertexId = usize;

#[derive(Debug, Clone, Copy)]
pub struct Edge(pub VertexId, pub VertexId);

impl Edge {
    /// Two edges are the same connectivity primitive iff they share the
    /// same unordered endpoint set (§4.2: `createUniqueEdge` dedup rule).
    fn same_endpoints(&self, a: VertexId, b: VertexId) -> bool {
        (self.0 == a && self.1 == b) || (self.0 == b && self.1 == a)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub vertices: [VertexId; 3],
    pub edges: [usize; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct Quad {
    pub vertices: [VertexId; 4],
    /// The two triangles this quad was decomposed into.
    pub triangles: [usize; 2],
}

#[derive(Debug, Clone, Copy)]
pub struct Tetrahedron {
    pub vertices: [VertexId; 4],
    pub triangles: [usize; 4],
    pub edges: [usize; 6],
}

/// A named, identified mesh: vertices plus optional connectivity (§3).
pub struct Mesh {
    id: i32,
    name: String,
    dims: usize,
    vertices: Vec<Coord>,
    edges: Vec<Edge>,
    triangles: Vec<Triangle>,
    quads: Vec<Quad>,
    tetrahedra: Vec<Tetrahedron>,
    /// Locked after `initialize` completes partitioning (§3 Lifecycle).
    locked: bool,
}

impl Mesh {
    pub fn new(id: i32, name: impl Into<String>, dims: usize) -> Self {
        Self {
            id,
            name: name.into(),
            dims,
            vertices: Vec::new(),
            edges: Vec::new(),
            triangles: Vec::new(),
            quads: Vec::new(),
            tetrahedra: Vec::new(),
            locked: false,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// §4.1 `resetMesh`: clears the partition (here: all connectivity and
    /// vertices) and unlocks the mesh. Per §9's open question, the
    /// resulting state is explicitly undefined for further exchange until
    /// the next `initialize`; this crate only guarantees the mesh becomes
    /// writable again.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.triangles.clear();
        self.quads.clear();
        self.tetrahedra.clear();
        self.locked = false;
    }

    fn check_writable(&self) -> Result<()> {
        if self.locked {
            return Err(CoreError::precondition(format!(
                "mesh '{}' is locked; call resetMesh first",
                self.name
            )));
        }
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, id: VertexId) -> Result<&Coord> {
        self.vertices
            .get(id)
            .ok_or_else(|| CoreError::precondition(format!("invalid vertex id {}", id)))
    }

    pub fn vertices(&self) -> &[Coord] {
        &self.vertices
    }

    /// Creates one vertex by value copy. The returned id equals the mesh's
    /// vertex count prior to insertion (§4.2, §8 invariant).
    pub fn set_vertex(&mut self, position: Coord) -> Result<VertexId> {
        self.check_writable()?;
        let id = self.vertices.len();
        self.vertices.push(position);
        Ok(id)
    }

    /// Bulk insertion; returns ids in `[old_size, old_size + n)` (§8).
    pub fn set_vertices(&mut self, positions: &[Coord]) -> Result<Vec<VertexId>> {
        self.check_writable()?;
        let start = self.vertices.len();
        self.vertices.extend_from_slice(positions);
        Ok((start..start + positions.len()).collect())
    }

    fn require_vertex(&self, id: VertexId) -> Result<()> {
        if id >= self.vertices.len() {
            return Err(CoreError::precondition(format!(
                "mesh '{}' has no vertex {}",
                self.name, id
            )));
        }
        Ok(())
    }

    /// §4.2: deduplicates against existing edges of the same endpoint set.
    pub fn create_unique_edge(&mut self, a: VertexId, b: VertexId) -> Result<usize> {
        self.check_writable()?;
        self.require_vertex(a)?;
        self.require_vertex(b)?;
        if let Some(i) = self.edges.iter().position(|e| e.same_endpoints(a, b)) {
            return Ok(i);
        }
        self.edges.push(Edge(a, b));
        Ok(self.edges.len() - 1)
    }

    /// §4.2: constructs missing edges idempotently, then the triangle.
    pub fn create_triangle_with_edges(
        &mut self,
        a: VertexId,
        b: VertexId,
        c: VertexId,
    ) -> Result<usize> {
        self.check_writable()?;
        let e0 = self.create_unique_edge(a, b)?;
        let e1 = self.create_unique_edge(b, c)?;
        let e2 = self.create_unique_edge(c, a)?;
        self.triangles.push(Triangle {
            vertices: [a, b, c],
            edges: [e0, e1, e2],
        });
        Ok(self.triangles.len() - 1)
    }

    /// §4.2 convex quad decomposition: split along the shorter diagonal,
    /// tie-breaking deterministically on `(v0,v2)`.
    pub fn create_quad(
        &mut self,
        a: VertexId,
        b: VertexId,
        c: VertexId,
        d: VertexId,
    ) -> Result<usize> {
        self.check_writable()?;
        let ids = [a, b, c, d];
        let mut seen = ids;
        seen.sort_unstable();
        for w in seen.windows(2) {
            if w[0] == w[1] {
                return Err(CoreError::user(format!(
                    "quad in mesh '{}' has a duplicate vertex",
                    self.name
                )));
            }
        }
        self.require_vertex(a)?;
        self.require_vertex(b)?;
        self.require_vertex(c)?;
        self.require_vertex(d)?;

        let points = [
            *self.vertex(a)?,
            *self.vertex(b)?,
            *self.vertex(c)?,
            *self.vertex(d)?,
        ];
        let quad = convex_quad_oracle(&points);
        if !quad.is_convex {
            return Err(CoreError::user(format!(
                "quad in mesh '{}' is not convex",
                self.name
            )));
        }
        let v = [
            ids[quad.order[0]],
            ids[quad.order[1]],
            ids[quad.order[2]],
            ids[quad.order[3]],
        ];
        let p = [points[quad.order[0]], points[quad.order[1]], points[quad.order[2]], points[quad.order[3]]];
        let d02 = distance(&p[0], &p[2], self.dims);
        let d13 = distance(&p[1], &p[3], self.dims);

        let (t0, t1) = if d02 <= d13 {
            // split along (v0, v2): tie-break favors this branch.
            (
                self.create_triangle_with_edges(v[0], v[1], v[2])?,
                self.create_triangle_with_edges(v[0], v[2], v[3])?,
            )
        } else {
            (
                self.create_triangle_with_edges(v[0], v[1], v[3])?,
                self.create_triangle_with_edges(v[1], v[2], v[3])?,
            )
        };
        self.quads.push(Quad {
            vertices: v,
            triangles: [t0, t1],
        });
        Ok(self.quads.len() - 1)
    }

    /// §4.2: stored as 4 triangles + 6 edges + the tetra record.
    pub fn create_tetrahedron(
        &mut self,
        a: VertexId,
        b: VertexId,
        c: VertexId,
        d: VertexId,
    ) -> Result<usize> {
        self.check_writable()?;
        self.require_vertex(a)?;
        self.require_vertex(b)?;
        self.require_vertex(c)?;
        self.require_vertex(d)?;
        let t0 = self.create_triangle_with_edges(a, b, c)?;
        let t1 = self.create_triangle_with_edges(a, b, d)?;
        let t2 = self.create_triangle_with_edges(a, c, d)?;
        let t3 = self.create_triangle_with_edges(b, c, d)?;
        let edges = [
            self.create_unique_edge(a, b)?,
            self.create_unique_edge(a, c)?,
            self.create_unique_edge(a, d)?,
            self.create_unique_edge(b, c)?,
            self.create_unique_edge(b, d)?,
            self.create_unique_edge(c, d)?,
        ];
        self.tetrahedra.push(Tetrahedron {
            vertices: [a, b, c, d],
            triangles: [t0, t1, t2, t3],
            edges,
        });
        Ok(self.tetrahedra.len() - 1)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    pub fn tetrahedra(&self) -> &[Tetrahedron] {
        &self.tetrahedra
    }

    /// The union of all vertex positions, used as a mesh's own bounding box
    /// (§4.3 filter step).
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bb = BoundingBox::empty(self.dims);
        for v in &self.vertices {
            bb.expand_point(v);
        }
        bb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::coord2;

    #[test]
    fn vertex_ids_are_sequential_and_unique() {
        let mut m = Mesh::new(1, "M", 2);
        let ids = m
            .set_vertices(&[coord2(0.0, 0.0), coord2(1.0, 0.0), coord2(1.0, 1.0)])
            .unwrap();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(m.vertex_count(), 3);
        let more = m.set_vertex(coord2(0.0, 1.0)).unwrap();
        assert_eq!(more, 3);
        assert_eq!(m.vertex_count(), 4);
    }

    #[test]
    fn unique_edge_dedups_regardless_of_order() {
        let mut m = Mesh::new(1, "M", 2);
        let ids = m
            .set_vertices(&[coord2(0.0, 0.0), coord2(1.0, 0.0)])
            .unwrap();
        let e0 = m.create_unique_edge(ids[0], ids[1]).unwrap();
        let e1 = m.create_unique_edge(ids[1], ids[0]).unwrap();
        assert_eq!(e0, e1);
        assert_eq!(m.edges().len(), 1);
    }

    #[test]
    fn quad_splits_along_shorter_diagonal() {
        // A unit square: diagonals (v0,v2) and (v1,v3) are equal length, so
        // the tie-break picks (v0, v2).
        let mut m = Mesh::new(1, "M", 2);
        let ids = m
            .set_vertices(&[
                coord2(0.0, 0.0),
                coord2(1.0, 0.0),
                coord2(1.0, 1.0),
                coord2(0.0, 1.0),
            ])
            .unwrap();
        let q = m.create_quad(ids[0], ids[1], ids[2], ids[3]).unwrap();
        let quad = &m.quads()[q];
        let t0 = &m.triangles()[quad.triangles[0]];
        let t1 = &m.triangles()[quad.triangles[1]];
        assert_eq!(t0.vertices, [ids[0], ids[1], ids[2]]);
        assert_eq!(t1.vertices, [ids[0], ids[2], ids[3]]);
    }

    #[test]
    fn quad_rejects_duplicate_vertex() {
        let mut m = Mesh::new(1, "M", 2);
        let ids = m
            .set_vertices(&[coord2(0.0, 0.0), coord2(1.0, 0.0), coord2(1.0, 1.0)])
            .unwrap();
        assert!(m.create_quad(ids[0], ids[1], ids[2], ids[0]).is_err());
    }

    #[test]
    fn locked_mesh_rejects_writes() {
        let mut m = Mesh::new(1, "M", 2);
        m.lock();
        assert!(m.set_vertex(coord2(0.0, 0.0)).is_err());
    }

    #[test]
    fn reset_unlocks_and_clears() {
        let mut m = Mesh::new(1, "M", 2);
        m.set_vertex(coord2(0.0, 0.0)).unwrap();
        m.lock();
        m.reset();
        assert!(!m.is_locked());
        assert_eq!(m.vertex_count(), 0);
        assert!(m.set_vertex(coord2(1.0, 1.0)).is_ok());
    }
}
