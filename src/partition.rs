//! Partitioning and mesh-exchange subsystem (component C, §4.3).
//!
//! The provider side wraps a locally-owned mesh and broadcasts it to
//! receivers on demand; the receiver side communicates the global mesh (or a
//! pre-filtered per-rank slice under two-level initialization), filters it
//! against this rank's bounding box, and remaps surviving vertices to dense
//! local ids while retaining the global-id translation mappings need.

use crate::error::{CoreError, Result};
use crate::geometry::{BoundingBox, Coord};
use crate::message::Communicator;
use std::cmp::Ordering;

/// Mesh-connectivity requirement, ordered `VERTEX < FULL` (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MeshRequirement {
    Vertex,
    Full,
}

impl Default for MeshRequirement {
    fn default() -> Self {
        MeshRequirement::Vertex
    }
}

/// The provider side of a used mesh: owns the full local mesh and
/// broadcasts it to receivers on demand (§4.3).
pub struct ProvidedPartition {
    requirement: MeshRequirement,
}

impl ProvidedPartition {
    pub fn new() -> Self {
        Self {
            requirement: MeshRequirement::Vertex,
        }
    }

    /// Folds in a receiver's declared requirement; the provider's overall
    /// requirement is the max across its own and every receiver's (§4.3).
    pub fn combine_requirement(&mut self, other: MeshRequirement) {
        if other.cmp(&self.requirement) == Ordering::Greater {
            self.requirement = other;
        }
    }

    pub fn requirement(&self) -> MeshRequirement {
        self.requirement
    }

    /// Serializes this mesh's vertex coordinates for the wire (§6: a
    /// contiguous buffer, vertex-major).
    pub fn serialize_vertices(vertices: &[Coord], dims: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(vertices.len() * dims);
        for v in vertices {
            for d in 0..dims {
                out.push(v[d]);
            }
        }
        out
    }

    /// Broadcasts this mesh's vertices to one receiver rank over the given
    /// channel (§4.3 step "Communicate").
    pub fn send_to<C: Communicator>(&self, comm: &C, receiver_rank: usize, vertices: &[Coord], dims: usize) {
        comm.send_buffer(receiver_rank, &Self::serialize_vertices(vertices, dims));
    }
}

impl Default for ProvidedPartition {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-rank processing result for a received mesh (§4.3).
pub struct ReceivedPartition {
    pub safety_factor: f64,
    pub access_region: Option<BoundingBox>,
    pub allow_direct_access: bool,
    /// Dense local id -> global id, established by `filter_and_remap`.
    local_to_global: Vec<usize>,
    local_vertices: Vec<Coord>,
}

impl ReceivedPartition {
    pub fn new(safety_factor: f64, access_region: Option<BoundingBox>, allow_direct_access: bool) -> Self {
        Self {
            safety_factor,
            access_region,
            allow_direct_access,
            local_to_global: Vec::new(),
            local_vertices: Vec::new(),
        }
    }

    /// Deserializes a flat vertex buffer received over the wire (§6).
    pub fn deserialize_vertices(flat: &[f64], dims: usize) -> Vec<Coord> {
        flat.chunks_exact(dims)
            .map(|c| {
                let mut arr = [0.0; 3];
                arr[..dims].copy_from_slice(c);
                crate::num_vec::Vector::from(arr)
            })
            .collect()
    }

    /// Receives the global mesh (or its pre-filtered per-rank slice under
    /// two-level initialization) over the given channel (§4.3 step
    /// "Communicate").
    pub fn recv_from<C: Communicator>(comm: &C, dims: usize) -> Vec<Coord> {
        Self::deserialize_vertices(&comm.recv_buffer(), dims)
    }

    /// Computes this rank's interest bounding box: the union of owned
    /// interface points, expanded by the safety factor, unioned with the
    /// access region if set (§4.3 step "Filter").
    ///
    /// §9's open question: when the access region is strictly smaller than
    /// the owned mesh's own bounding box, the source is undefined and this
    /// spec recommends rejecting it with a `UserError` instead.
    pub fn compute_interest_box(
        &self,
        owned_interface_points: &[Coord],
        dims: usize,
    ) -> Result<BoundingBox> {
        let mut owned = BoundingBox::empty(dims);
        for p in owned_interface_points {
            owned.expand_point(p);
        }
        let inflated = owned.inflate(1.0 + self.safety_factor);

        let mut result = inflated.clone();
        if let Some(region) = &self.access_region {
            if !owned.is_empty()
                && !region.is_empty()
                && region_strictly_smaller(region, &owned)
            {
                return Err(CoreError::user(
                    "access region is strictly smaller than the owned mesh bounding box",
                ));
            }
            result.expand(region);
        }
        Ok(result)
    }

    /// Discards remote vertices outside `interest_box`, and assigns dense
    /// local ids while preserving the global-id translation (§4.3 steps
    /// "Filter" and "Index remap"). If the interest box is empty, all local
    /// sizes report zero — not an error (§4.3).
    pub fn filter_and_remap(&mut self, remote_vertices: &[Coord], interest_box: &BoundingBox) {
        self.local_to_global.clear();
        self.local_vertices.clear();
        if interest_box.is_empty() {
            return;
        }
        for (global_id, v) in remote_vertices.iter().enumerate() {
            if interest_box.contains(v) {
                self.local_to_global.push(global_id);
                self.local_vertices.push(*v);
            }
        }
    }

    pub fn local_size(&self) -> usize {
        self.local_vertices.len()
    }

    pub fn local_vertices(&self) -> &[Coord] {
        &self.local_vertices
    }

    pub fn local_to_global(&self, local_id: usize) -> Option<usize> {
        self.local_to_global.get(local_id).copied()
    }
}

fn region_strictly_smaller(region: &BoundingBox, owned: &BoundingBox) -> bool {
    (0..region.dims()).any(|d| region.min(d) > owned.min(d) || region.max(d) < owned.max(d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::coord2;

    #[test]
    fn requirement_ordering_takes_max() {
        let mut p = ProvidedPartition::new();
        assert_eq!(p.requirement(), MeshRequirement::Vertex);
        p.combine_requirement(MeshRequirement::Full);
        assert_eq!(p.requirement(), MeshRequirement::Full);
        p.combine_requirement(MeshRequirement::Vertex);
        assert_eq!(p.requirement(), MeshRequirement::Full);
    }

    #[test]
    fn filter_keeps_only_vertices_in_region() {
        // §8 scenario 5.
        let mut region = BoundingBox::empty(2);
        region.expand_point(&coord2(0.5, 0.5));
        region.expand_point(&coord2(1.5, 1.5));

        let mut rp = ReceivedPartition::new(0.0, Some(region.clone()), true);
        let remote = vec![
            coord2(0.0, 0.0),
            coord2(0.6, 0.6),
            coord2(0.9, 0.4),
            coord2(0.7, 0.8),
        ];
        rp.filter_and_remap(&remote, &region);
        assert_eq!(rp.local_size(), 2);
        assert_eq!(rp.local_to_global(0), Some(1));
        assert_eq!(rp.local_to_global(1), Some(3));
    }

    #[test]
    fn empty_interest_box_yields_zero_sized_partition_not_error() {
        let empty = BoundingBox::empty(2);
        let mut rp = ReceivedPartition::new(0.0, None, false);
        rp.filter_and_remap(&[coord2(0.0, 0.0)], &empty);
        assert_eq!(rp.local_size(), 0);
    }

    #[test]
    fn direct_access_scenario_sizes_match_spec() {
        // §8 scenario 1: A sets access region [0,1]x[0,1] over MeshB; B's 5
        // vertices all fall inside, so A sees all 5.
        let mut region = BoundingBox::empty(2);
        region.expand_point(&coord2(0.0, 0.0));
        region.expand_point(&coord2(1.0, 1.0));

        let mesh_b = vec![
            coord2(0.0, 0.0),
            coord2(0.0, 0.05),
            coord2(0.1, 0.1),
            coord2(0.1, 0.0),
            coord2(0.5, 0.5),
        ];
        let mut rp = ReceivedPartition::new(0.0, Some(region.clone()), true);
        rp.filter_and_remap(&mesh_b, &region);
        assert_eq!(rp.local_size(), 5);
        assert_eq!(rp.local_vertices(), mesh_b.as_slice());
    }

    #[test]
    fn strictly_smaller_access_region_is_rejected() {
        let mut owned = BoundingBox::empty(2);
        owned.expand_point(&coord2(0.0, 0.0));
        owned.expand_point(&coord2(2.0, 2.0));

        let mut small_region = BoundingBox::empty(2);
        small_region.expand_point(&coord2(0.5, 0.5));
        small_region.expand_point(&coord2(1.0, 1.0));

        let rp = ReceivedPartition::new(0.0, Some(small_region), false);
        let result = rp.compute_interest_box(&[coord2(0.0, 0.0), coord2(2.0, 2.0)], 2);
        assert!(result.is_err());
    }
}
