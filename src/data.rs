//! Data fields attached to a mesh, and meshless global data (component A,
//! §3 "Data", "GlobalData").

use crate::error::{CoreError, Result};

pub type DataId = i32;

/// A numeric field attached to a mesh: a dense, vertex-major buffer of
/// length `|vertices| * dims`, plus an optional gradient matrix of shape
/// `(spaceDim * (dims * |vertices|))` (§3).
pub struct Data {
    id: DataId,
    name: String,
    dims: usize,
    has_gradient: bool,
    space_dim: usize,
    values: Vec<f64>,
    gradients: Option<Vec<f64>>,
}

impl Data {
    pub fn new(id: DataId, name: impl Into<String>, dims: usize, space_dim: usize, has_gradient: bool) -> Self {
        Self {
            id,
            name: name.into(),
            dims,
            has_gradient,
            space_dim,
            values: Vec::new(),
            gradients: None,
        }
    }

    pub fn id(&self) -> DataId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn has_gradient(&self) -> bool {
        self.has_gradient
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn gradients(&self) -> Option<&[f64]> {
        self.gradients.as_deref()
    }

    /// Reallocates the value (and, if declared, gradient) buffer to match
    /// `vertex_count`; size is reallocated on every vertex insertion per
    /// §3's invariant, so this is the call made after each such insertion.
    pub fn allocate_data_values(&mut self, vertex_count: usize) {
        self.values.resize(vertex_count * self.dims, 0.0);
        if self.has_gradient {
            self.gradients
                .get_or_insert_with(Vec::new)
                .resize(self.space_dim * self.dims * vertex_count, 0.0);
        }
    }

    fn vertex_slice_range(&self, vertex_id: usize) -> (usize, usize) {
        let start = vertex_id * self.dims;
        (start, start + self.dims)
    }

    pub fn write_vertex(&mut self, vertex_id: usize, value: &[f64]) -> Result<()> {
        if value.len() != self.dims {
            return Err(CoreError::user(format!(
                "data '{}' expects {} components, got {}",
                self.name,
                self.dims,
                value.len()
            )));
        }
        let (s, e) = self.vertex_slice_range(vertex_id);
        if e > self.values.len() {
            return Err(CoreError::precondition(format!(
                "invalid vertex id {} for data '{}'",
                vertex_id, self.name
            )));
        }
        self.values[s..e].copy_from_slice(value);
        Ok(())
    }

    pub fn read_vertex(&self, vertex_id: usize) -> Result<&[f64]> {
        let (s, e) = self.vertex_slice_range(vertex_id);
        self.values
            .get(s..e)
            .ok_or_else(|| CoreError::precondition(format!("invalid vertex id {} for data '{}'", vertex_id, self.name)))
    }

    /// §4.1 gradient writes: validated against `spaceDim x dataDim` per
    /// vertex and stored column-blockwise.
    pub fn write_vertex_gradient(&mut self, vertex_id: usize, values: &[f64]) -> Result<()> {
        if !self.has_gradient {
            // Ignored no-op unless `requiresGradientDataFor` holds (§4.1);
            // the solver interface is responsible for that check, this
            // layer just refuses to store into a buffer that doesn't exist.
            return Ok(());
        }
        let expected = self.space_dim * self.dims;
        if values.len() != expected {
            return Err(CoreError::user(format!(
                "gradient for data '{}' expects {} values per vertex, got {}",
                self.name,
                expected,
                values.len()
            )));
        }
        let grads = self
            .gradients
            .as_mut()
            .ok_or_else(|| CoreError::internal("gradient buffer missing despite has_gradient"))?;
        let block = expected;
        let start = vertex_id * block;
        if start + block > grads.len() {
            return Err(CoreError::precondition(format!(
                "invalid vertex id {} for gradient of data '{}'",
                vertex_id, self.name
            )));
        }
        grads[start..start + block].copy_from_slice(values);
        Ok(())
    }
}

/// A field not attached to any mesh (§3 "GlobalData"): transported without
/// a mesh id, semantically equivalent to `Data` on a single-vertex mesh.
pub struct GlobalData {
    id: DataId,
    name: String,
    dims: usize,
    values: Vec<f64>,
}

impl GlobalData {
    pub fn new(id: DataId, name: impl Into<String>, dims: usize) -> Self {
        Self {
            id,
            name: name.into(),
            dims,
            values: vec![0.0; dims],
        }
    }

    pub fn id(&self) -> DataId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn write(&mut self, value: &[f64]) -> Result<()> {
        if value.len() != self.dims {
            return Err(CoreError::user(format!(
                "global data '{}' expects {} components, got {}",
                self.name,
                self.dims,
                value.len()
            )));
        }
        self.values.copy_from_slice(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_resizes_on_vertex_insertion() {
        let mut d = Data::new(1, "Velocities", 2, 2, false);
        d.allocate_data_values(3);
        assert_eq!(d.values().len(), 6);
        d.allocate_data_values(5);
        assert_eq!(d.values().len(), 10);
    }

    #[test]
    fn write_and_read_vertex_roundtrip() {
        let mut d = Data::new(1, "Velocities", 2, 2, false);
        d.allocate_data_values(2);
        d.write_vertex(1, &[3.0, 4.0]).unwrap();
        assert_eq!(d.read_vertex(1).unwrap(), &[3.0, 4.0]);
        assert_eq!(d.read_vertex(0).unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn gradient_requires_matching_size() {
        let mut d = Data::new(1, "Forces", 2, 3, true);
        d.allocate_data_values(1);
        assert!(d.write_vertex_gradient(0, &[0.0; 6]).is_ok());
        assert!(d.write_vertex_gradient(0, &[0.0; 5]).is_err());
    }

    #[test]
    fn global_data_dimension_mismatch_is_user_error() {
        let mut g = GlobalData::new(1, "Pressure", 1);
        assert!(g.write(&[1.0, 2.0]).is_err());
        assert!(g.write(&[1.0]).is_ok());
    }
}
