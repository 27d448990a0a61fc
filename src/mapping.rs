//! Mapping kernels and the data/mapping context plumbing (component E).
//!
//! §1 lists nearest-neighbor / nearest-projection / RBF mapping kernels as
//! out-of-scope external collaborators, "consumed via a uniform `Mapping`
//! interface". This module defines that interface and one concrete
//! implementation, nearest-neighbor, sufficient to drive §8 scenario 1
//! end to end (SPEC_FULL.md's supplemented-features note).

use crate::error::{CoreError, Result};
use crate::geometry::{distance, Coord};

/// Whether a mapping preserves point values (`Consistent`, used for e.g.
/// velocities) or integrated quantities (`Conservative`, used for e.g.
/// forces), per §6's `constraint=consistent|conservative`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Consistent,
    Conservative,
}

/// A uniform interface over interpolation kernels between two meshes of the
/// same field (component E's collaborator).
pub trait Mapping: Send {
    /// Build the interpolation stencil from the input mesh's vertex
    /// coordinates to the output mesh's vertex coordinates (§4.3 step 4,
    /// "register the decomposed mesh so the mapping kernel can build its
    /// interpolation stencil").
    fn compute(&mut self, from_vertices: &[Coord], to_vertices: &[Coord], dims: usize);

    /// Map one field's values (vertex-major, `dims` components per vertex)
    /// from the input mesh onto the output mesh.
    fn map(&self, from_values: &[f64], dims: usize) -> Result<Vec<f64>>;

    fn constraint(&self) -> Constraint;
}

/// Maps every output vertex to the value of its nearest input vertex
/// (Euclidean distance in the mesh's declared dimensionality).
pub struct NearestNeighborMapping {
    constraint: Constraint,
    space_dims: usize,
    /// For each output vertex, the index of its nearest input vertex.
    nearest: Vec<usize>,
}

impl NearestNeighborMapping {
    pub fn new(constraint: Constraint, space_dims: usize) -> Self {
        Self {
            constraint,
            space_dims,
            nearest: Vec::new(),
        }
    }
}

impl Mapping for NearestNeighborMapping {
    fn compute(&mut self, from_vertices: &[Coord], to_vertices: &[Coord], _dims: usize) {
        self.nearest = to_vertices
            .iter()
            .map(|to_v| {
                from_vertices
                    .iter()
                    .enumerate()
                    .map(|(i, from_v)| (i, distance(from_v, to_v, self.space_dims)))
                    .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            })
            .collect();
    }

    fn map(&self, from_values: &[f64], dims: usize) -> Result<Vec<f64>> {
        if self.nearest.is_empty() && !from_values.is_empty() {
            return Err(CoreError::internal("mapping used before compute"));
        }
        let mut out = vec![0.0; self.nearest.len() * dims];
        for (to_i, &from_i) in self.nearest.iter().enumerate() {
            let src = &from_values[from_i * dims..(from_i + 1) * dims];
            out[to_i * dims..(to_i + 1) * dims].copy_from_slice(src);
        }
        Ok(out)
    }

    fn constraint(&self) -> Constraint {
        self.constraint
    }
}

/// When a mapping's write/read is performed (§6: `timing=initial|onadvance`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingTiming {
    Initial,
    OnAdvance,
}

/// `(mapping object, fromDataId, toDataId, timing, hasMappedData)` tuple
/// (§3 "MappingContext"). Invariant: either `fromData` or `toData` equals
/// the owning `DataContext`'s provided data, and both share a name.
pub struct MappingContext {
    pub mapping: Box<dyn Mapping>,
    pub from_data: i32,
    pub to_data: i32,
    pub timing: MappingTiming,
    pub has_mapped_data: bool,
}

impl MappingContext {
    pub fn new(mapping: Box<dyn Mapping>, from_data: i32, to_data: i32, timing: MappingTiming) -> Self {
        Self {
            mapping,
            from_data,
            to_data,
            timing,
            has_mapped_data: false,
        }
    }
}

/// Binds a data field to a mesh and zero or more mappings (component E,
/// §3 "Data Context").
pub struct DataContext {
    pub provided_data: i32,
    pub mesh_id: i32,
    pub from_mappings: Vec<MappingContext>,
    pub to_mappings: Vec<MappingContext>,
}

impl DataContext {
    pub fn new(provided_data: i32, mesh_id: i32) -> Self {
        Self {
            provided_data,
            mesh_id,
            from_mappings: Vec::new(),
            to_mappings: Vec::new(),
        }
    }

    /// Applies every `fromMapping` (used on writes: map provided data onto
    /// a remote mesh) in order, feeding each the given source buffer.
    /// Returns `(to_data id, mapped values)` for each mapping, for the
    /// caller to write into the destination data buffer.
    pub fn apply_from_mappings(&mut self, source: &[f64], dims: usize) -> Result<Vec<(i32, Vec<f64>)>> {
        let mut out = Vec::with_capacity(self.from_mappings.len());
        for ctx in self.from_mappings.iter_mut() {
            let mapped = ctx.mapping.map(source, dims)?;
            ctx.has_mapped_data = true;
            out.push((ctx.to_data, mapped));
        }
        Ok(out)
    }

    /// Applies every `toMapping` (used on reads: map remote data onto this
    /// data context's own mesh) feeding each the given source buffer.
    pub fn apply_to_mappings(&mut self, source: &[f64], dims: usize) -> Result<Vec<(i32, Vec<f64>)>> {
        let mut out = Vec::with_capacity(self.to_mappings.len());
        for ctx in self.to_mappings.iter_mut() {
            let mapped = ctx.mapping.map(source, dims)?;
            ctx.has_mapped_data = true;
            out.push((ctx.to_data, mapped));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::coord2;

    #[test]
    fn nearest_neighbor_scenario_from_spec() {
        // §8 scenario 1: B writes [0,1,2,3,4] to Forces@MeshB, mapped to
        // MeshA via nearest-neighbor, A reads [2,4,3,3].
        let mesh_a = [
            coord2(0.2, 0.2),
            coord2(0.1, 0.6),
            coord2(0.1, 0.0),
            coord2(0.1, 0.0),
        ];
        let mesh_b = [
            coord2(0.0, 0.0),
            coord2(0.0, 0.05),
            coord2(0.1, 0.1),
            coord2(0.1, 0.0),
            coord2(0.5, 0.5),
        ];
        let mut map = NearestNeighborMapping::new(Constraint::Consistent, 2);
        map.compute(&mesh_b, &mesh_a, 2);
        let forces_b = [0.0, 1.0, 2.0, 3.0, 4.0];
        let mapped = map.map(&forces_b, 1).unwrap();
        assert_eq!(mapped, vec![2.0, 4.0, 3.0, 3.0]);
    }
}
