//! The public facade (component H, §4.1): owns every mesh/data primitive a
//! participant declares, drives the {Constructed -> Initialized ->
//! Finalized} lifecycle, and brokers calls into the coupling scheme.
//!
//! Scoped to one remote peer and the meshes exchanged with it directly;
//! N-participant topologies are served by [`crate::scheme::multi::MultiCoupling`]
//! and [`crate::scheme::compositional::Compositional`] driven independently of
//! this facade (see DESIGN.md).

use crate::data::{Data, DataId, GlobalData};
use crate::error::{CoreError, Result};
use crate::event::{EventScope, LoggingEventScope};
use crate::geometry::{BoundingBox, Coord};
use crate::iteration_log::IterationLogWriter;
use crate::mapping::{DataContext, Mapping, MappingContext, MappingTiming};
use crate::mesh::{Mesh, VertexId};
use crate::message::Communicator;
use crate::partition::{MeshRequirement, ProvidedPartition, ReceivedPartition};
use crate::scheme::{Action, CouplingScheme};
use crate::waveform::Waveform;
use log::info;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Constructed,
    Initialized,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshDirection {
    Provide,
    ReceiveFrom(String),
}

/// Per-participant, per-mesh record (§3 "MeshContext").
pub struct MeshContext {
    pub mesh: Mesh,
    pub direction: MeshDirection,
    pub requirement: MeshRequirement,
    pub safety_factor: f64,
    pub access_region: Option<BoundingBox>,
    pub access_region_set: bool,
    pub provided_partition: Option<ProvidedPartition>,
    pub received_partition: Option<ReceivedPartition>,
}

impl MeshContext {
    fn new(mesh: Mesh, direction: MeshDirection) -> Self {
        Self {
            mesh,
            direction,
            requirement: MeshRequirement::Vertex,
            safety_factor: 0.0,
            access_region: None,
            access_region_set: false,
            provided_partition: None,
            received_partition: None,
        }
    }
}

/// The public facade, generic over the transport used for both the
/// distributed mesh/data channel and the coupling scheme's primary channel.
pub struct SolverInterface<C: Communicator> {
    state: State,
    participant_name: String,
    partition_comm: C,
    scheme: CouplingScheme<C>,
    meshes: HashMap<i32, MeshContext>,
    mesh_name_to_id: HashMap<String, i32>,
    data: HashMap<DataId, Data>,
    global_data: HashMap<DataId, GlobalData>,
    data_contexts: HashMap<DataId, DataContext>,
    read_waveforms: HashMap<DataId, Waveform>,
    written_this_window: Vec<DataId>,
    scopes: Box<dyn EventScope>,
}

impl<C: Communicator> SolverInterface<C> {
    pub fn new(participant_name: impl Into<String>, partition_comm: C, scheme: CouplingScheme<C>) -> Self {
        Self::with_event_scope(participant_name, partition_comm, scheme, Box::new(LoggingEventScope))
    }

    /// §9: "event/trace registry becomes a process-local service passed in
    /// at construction" — this constructor lets a harness swap in its own.
    pub fn with_event_scope(
        participant_name: impl Into<String>,
        partition_comm: C,
        scheme: CouplingScheme<C>,
        scopes: Box<dyn EventScope>,
    ) -> Self {
        Self {
            state: State::Constructed,
            participant_name: participant_name.into(),
            partition_comm,
            scheme,
            meshes: HashMap::new(),
            mesh_name_to_id: HashMap::new(),
            data: HashMap::new(),
            global_data: HashMap::new(),
            data_contexts: HashMap::new(),
            read_waveforms: HashMap::new(),
            written_this_window: Vec::new(),
            scopes,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn participant_name(&self) -> &str {
        &self.participant_name
    }

    fn require_state(&self, expected: State, what: &str) -> Result<()> {
        if self.state != expected {
            return Err(CoreError::precondition(format!(
                "{} requires state {:?}, interface is {:?}",
                what, expected, self.state
            )));
        }
        Ok(())
    }

    // ---- §4.1 construction-time declarations ----

    pub fn add_mesh(&mut self, id: i32, name: impl Into<String>, dims: usize, direction: MeshDirection) -> Result<()> {
        self.require_state(State::Constructed, "add_mesh")?;
        let name = name.into();
        if self.meshes.contains_key(&id) {
            return Err(CoreError::configuration(format!("duplicate mesh id {}", id)));
        }
        self.mesh_name_to_id.insert(name.clone(), id);
        self.meshes.insert(id, MeshContext::new(Mesh::new(id, name, dims), direction));
        Ok(())
    }

    pub fn add_data(&mut self, data_id: DataId, mesh_id: i32, name: impl Into<String>, dims: usize, has_gradient: bool) -> Result<()> {
        self.require_state(State::Constructed, "add_data")?;
        if self.data.contains_key(&data_id) {
            return Err(CoreError::configuration(format!("duplicate data id {}", data_id)));
        }
        let space_dim = self
            .meshes
            .get(&mesh_id)
            .ok_or_else(|| CoreError::configuration(format!("data references unknown mesh {}", mesh_id)))?
            .mesh
            .dims();
        self.data.insert(data_id, Data::new(data_id, name, dims, space_dim, has_gradient));
        self.data_contexts.insert(data_id, DataContext::new(data_id, mesh_id));
        Ok(())
    }

    pub fn add_global_data(&mut self, data_id: DataId, name: impl Into<String>, dims: usize) -> Result<()> {
        self.require_state(State::Constructed, "add_global_data")?;
        if self.global_data.contains_key(&data_id) {
            return Err(CoreError::configuration(format!("duplicate global data id {}", data_id)));
        }
        self.global_data.insert(data_id, GlobalData::new(data_id, name, dims));
        Ok(())
    }

    /// §4.3 step 4 / §6: registers a mapping applied during the write phase
    /// (`perform_write_mappings`), taking `from_data`'s values and mapping
    /// them onto `to_data`. The interpolation stencil is built once both
    /// data fields' meshes are partitioned, during `initialize`.
    pub fn add_write_mapping(
        &mut self,
        from_data: DataId,
        to_data: DataId,
        timing: MappingTiming,
        mapping: Box<dyn Mapping>,
    ) -> Result<()> {
        self.require_state(State::Constructed, "add_write_mapping")?;
        self.add_mapping(from_data, to_data, timing, mapping, true)
    }

    /// Registers a mapping applied during the read phase
    /// (`perform_read_mappings`).
    pub fn add_read_mapping(
        &mut self,
        from_data: DataId,
        to_data: DataId,
        timing: MappingTiming,
        mapping: Box<dyn Mapping>,
    ) -> Result<()> {
        self.require_state(State::Constructed, "add_read_mapping")?;
        self.add_mapping(from_data, to_data, timing, mapping, false)
    }

    fn add_mapping(
        &mut self,
        from_data: DataId,
        to_data: DataId,
        timing: MappingTiming,
        mapping: Box<dyn Mapping>,
        is_write: bool,
    ) -> Result<()> {
        if !self.data.contains_key(&to_data) {
            return Err(CoreError::configuration(format!(
                "mapping references unknown data id {}",
                to_data
            )));
        }
        let ctx = self
            .data_contexts
            .get_mut(&from_data)
            .ok_or_else(|| CoreError::configuration(format!("mapping references unknown data id {}", from_data)))?;
        let mapping_ctx = MappingContext::new(mapping, from_data, to_data, timing);
        if is_write {
            ctx.from_mappings.push(mapping_ctx);
        } else {
            ctx.to_mappings.push(mapping_ctx);
        }
        Ok(())
    }

    // ---- §4.2 mesh writers (Constructed, or Initialized after resetMesh) ----

    fn check_mesh_writable(&self) -> Result<()> {
        match self.state {
            State::Constructed | State::Initialized => Ok(()),
            State::Finalized => Err(CoreError::precondition("interface is finalized")),
        }
    }

    pub fn set_mesh_vertex(&mut self, mesh_id: i32, position: Coord) -> Result<VertexId> {
        self.check_mesh_writable()?;
        let ctx = self.mesh_mut(mesh_id)?;
        let id = ctx.mesh.set_vertex(position)?;
        self.reallocate_data_for_mesh(mesh_id)?;
        Ok(id)
    }

    pub fn set_mesh_vertices(&mut self, mesh_id: i32, positions: &[Coord]) -> Result<Vec<VertexId>> {
        self.check_mesh_writable()?;
        let ctx = self.mesh_mut(mesh_id)?;
        let ids = ctx.mesh.set_vertices(positions)?;
        self.reallocate_data_for_mesh(mesh_id)?;
        Ok(ids)
    }

    fn reallocate_data_for_mesh(&mut self, mesh_id: i32) -> Result<()> {
        let vertex_count = self.meshes.get(&mesh_id).unwrap().mesh.vertex_count();
        for (data_id, ctx) in self.data_contexts.iter() {
            if ctx.mesh_id == mesh_id {
                if let Some(d) = self.data.get_mut(data_id) {
                    d.allocate_data_values(vertex_count);
                }
            }
        }
        Ok(())
    }

    pub fn create_edge(&mut self, mesh_id: i32, a: VertexId, b: VertexId) -> Result<usize> {
        self.check_mesh_writable()?;
        self.mesh_mut(mesh_id)?.mesh.create_unique_edge(a, b)
    }

    pub fn create_triangle(&mut self, mesh_id: i32, a: VertexId, b: VertexId, c: VertexId) -> Result<usize> {
        self.check_mesh_writable()?;
        self.mesh_mut(mesh_id)?.mesh.create_triangle_with_edges(a, b, c)
    }

    pub fn create_quad(&mut self, mesh_id: i32, a: VertexId, b: VertexId, c: VertexId, d: VertexId) -> Result<usize> {
        self.check_mesh_writable()?;
        self.mesh_mut(mesh_id)?.mesh.create_quad(a, b, c, d)
    }

    pub fn create_tetrahedron(&mut self, mesh_id: i32, a: VertexId, b: VertexId, c: VertexId, d: VertexId) -> Result<usize> {
        self.check_mesh_writable()?;
        self.mesh_mut(mesh_id)?.mesh.create_tetrahedron(a, b, c, d)
    }

    /// §4.1: clears a single mesh's partition and unlocks it for writes.
    pub fn reset_mesh(&mut self, mesh_id: i32) -> Result<()> {
        self.require_state(State::Initialized, "reset_mesh")?;
        let ctx = self.mesh_mut(mesh_id)?;
        ctx.mesh.reset();
        ctx.provided_partition = None;
        ctx.received_partition = None;
        Ok(())
    }

    /// §4.2: permitted only in Constructed, at most once per mesh.
    pub fn set_mesh_access_region(&mut self, mesh_id: i32, bbox: BoundingBox) -> Result<()> {
        self.require_state(State::Constructed, "set_mesh_access_region")?;
        let ctx = self.mesh_mut(mesh_id)?;
        if ctx.access_region_set {
            return Err(CoreError::precondition(format!(
                "access region for mesh {} already set",
                mesh_id
            )));
        }
        ctx.access_region = Some(bbox);
        ctx.access_region_set = true;
        Ok(())
    }

    pub fn get_mesh_vertex_size(&self, mesh_id: i32) -> Result<usize> {
        let ctx = self.mesh(mesh_id)?;
        match &ctx.received_partition {
            Some(rp) => Ok(rp.local_size()),
            None => Ok(ctx.mesh.vertex_count()),
        }
    }

    pub fn get_mesh_vertices_and_ids(&self, mesh_id: i32) -> Result<(Vec<Coord>, Vec<usize>)> {
        let ctx = self.mesh(mesh_id)?;
        match &ctx.received_partition {
            Some(rp) => {
                let ids = (0..rp.local_size()).filter_map(|i| rp.local_to_global(i)).collect();
                Ok((rp.local_vertices().to_vec(), ids))
            }
            None => Ok((ctx.mesh.vertices().to_vec(), (0..ctx.mesh.vertex_count()).collect())),
        }
    }

    fn mesh(&self, mesh_id: i32) -> Result<&MeshContext> {
        self.meshes
            .get(&mesh_id)
            .ok_or_else(|| CoreError::precondition(format!("unknown mesh id {}", mesh_id)))
    }

    fn mesh_mut(&mut self, mesh_id: i32) -> Result<&mut MeshContext> {
        self.meshes
            .get_mut(&mesh_id)
            .ok_or_else(|| CoreError::precondition(format!("unknown mesh id {}", mesh_id)))
    }

    // ---- §4.1 data writers/readers (Initialized only) ----

    pub fn write_block_vector_data(&mut self, data_id: DataId, vertex_ids: &[VertexId], values: &[f64]) -> Result<()> {
        self.require_state(State::Initialized, "write_block_vector_data")?;
        let d = self
            .data
            .get_mut(&data_id)
            .ok_or_else(|| CoreError::precondition(format!("unknown data id {}", data_id)))?;
        let dims = d.dims();
        for (i, &vid) in vertex_ids.iter().enumerate() {
            d.write_vertex(vid, &values[i * dims..(i + 1) * dims])?;
        }
        if !self.written_this_window.contains(&data_id) {
            self.written_this_window.push(data_id);
        }
        Ok(())
    }

    pub fn write_vertex_gradient(&mut self, data_id: DataId, vertex_id: VertexId, values: &[f64]) -> Result<()> {
        self.require_state(State::Initialized, "write_vertex_gradient")?;
        if !self.requires_gradient_data_for(data_id) {
            return Ok(());
        }
        let d = self
            .data
            .get_mut(&data_id)
            .ok_or_else(|| CoreError::precondition(format!("unknown data id {}", data_id)))?;
        d.write_vertex_gradient(vertex_id, values)
    }

    pub fn requires_gradient_data_for(&self, data_id: DataId) -> bool {
        self.data.get(&data_id).map(|d| d.has_gradient()).unwrap_or(false)
    }

    pub fn requires_mesh_connectivity_for(&self, mesh_id: i32) -> bool {
        self.meshes
            .get(&mesh_id)
            .map(|m| m.requirement == MeshRequirement::Full)
            .unwrap_or(false)
    }

    /// §4.1 "Read time sampling": `relative_read_time` in `[0, remainder]`.
    /// Converts to a normalized waveform position and samples it.
    pub fn read_block_vector_data(&self, data_id: DataId, relative_read_time: f64) -> Result<Vec<f64>> {
        self.require_state(State::Initialized, "read_block_vector_data")?;
        let remainder = self.scheme.get_this_time_window_remainder();
        if relative_read_time < 0.0 || relative_read_time > remainder + 1e-12 {
            return Err(CoreError::user(format!(
                "relativeReadTime {} outside [0, {}]",
                relative_read_time, remainder
            )));
        }
        // First-participant method: only tau = remainder is meaningful since
        // this participant cannot know the window size until it ends.
        if !self.scheme.has_time_window_size() && (relative_read_time - remainder).abs() > 1e-12 {
            return Err(CoreError::user(
                "first-participant window-size method only allows relativeReadTime = remainder",
            ));
        }
        let waveform = self
            .read_waveforms
            .get(&data_id)
            .ok_or_else(|| CoreError::precondition(format!("data {} is not a read-data", data_id)))?;
        let n = match self.scheme.get_time_window_size() {
            Some(w) if w > 0.0 => (w - remainder + relative_read_time) / w,
            _ => 1.0,
        };
        waveform.sample_at(n)
    }

    // ---- §6 action-requirement queries ----

    pub fn requires_initial_data(&mut self) -> bool {
        self.scheme.is_action_required(Action::InitializeData)
    }

    pub fn requires_reading_checkpoint(&mut self) -> bool {
        self.scheme.is_action_required(Action::ReadCheckpoint)
    }

    pub fn requires_writing_checkpoint(&mut self) -> bool {
        self.scheme.is_action_required(Action::WriteCheckpoint)
    }

    pub fn is_coupling_ongoing(&self) -> bool {
        self.scheme.is_coupling_ongoing()
    }

    /// §6: opts this participant into writing `precice-<name>-{iterations,
    /// convergence}.log` under `dir`. Not enabled by default since only the
    /// harness knows where logs belong; call before `initialize`.
    pub fn enable_iteration_log(&mut self, dir: &Path) -> Result<()> {
        self.require_state(State::Constructed, "enable_iteration_log")?;
        let writer = IterationLogWriter::create(dir, &self.participant_name, self.scheme.residual_log_names())?;
        self.scheme.set_iteration_log(writer);
        Ok(())
    }

    // ---- lifecycle ----

    /// §4.1 `initialize()` phase flow, steps 1-12 (simplified to the single
    /// remote-peer case this facade serves).
    pub fn initialize(&mut self) -> Result<f64> {
        self.require_state(State::Constructed, "initialize")?;
        let scope = self.scopes.enter("initialize");
        info!("participant '{}' entering initialize", self.participant_name);

        // Steps 1-6: preprocess, connect, compare bounding boxes, partition.
        let mut mesh_ids: Vec<i32> = self.meshes.keys().copied().collect();
        mesh_ids.sort_by_key(|id| self.meshes[id].mesh.name().to_string());
        for mesh_id in mesh_ids {
            self.compute_partition_for_mesh(mesh_id)?;
        }
        self.compute_mapping_stencils()?;

        // Step 7: initialize waveforms for every read-data, lock all meshes.
        for ctx in self.data_contexts.values() {
            self.read_waveforms.entry(ctx.provided_data).or_insert_with(|| Waveform::new(0));
        }
        for ctx in self.meshes.values_mut() {
            ctx.mesh.lock();
        }
        for (data_id, waveform) in self.read_waveforms.iter_mut() {
            if let Some(d) = self.data.get(data_id) {
                waveform.initialize(d.values());
            }
        }

        // Step 8.
        if self.scheme.sends_initialized_data() {
            self.perform_write_mappings()?;
        }

        // Step 9.
        self.scheme.initialize(0.0, 1)?;
        if self.scheme.has_data_been_received() {
            self.perform_read_mappings()?;
        }

        // Step 10.
        for waveform in self.read_waveforms.values_mut() {
            waveform.move_to_next_window();
        }

        // Step 11.
        self.scheme.receive_result_of_first_advance()?;
        if self.scheme.has_data_been_received() {
            self.perform_read_mappings()?;
        }

        // Step 12.
        self.written_this_window.clear();
        self.state = State::Initialized;
        Ok(self.scheme.get_next_timestep_max_length())
    }

    fn compute_partition_for_mesh(&mut self, mesh_id: i32) -> Result<()> {
        let dims = self.meshes[&mesh_id].mesh.dims();
        let direction = self.meshes[&mesh_id].direction.clone();
        match direction {
            MeshDirection::Provide => {
                let requirement = self.meshes[&mesh_id].requirement;
                let mut provided = ProvidedPartition::new();
                provided.combine_requirement(requirement);
                let vertices = self.meshes[&mesh_id].mesh.vertices().to_vec();
                provided.send_to(&self.partition_comm, 0, &vertices, dims);
                self.meshes.get_mut(&mesh_id).unwrap().provided_partition = Some(provided);
            }
            MeshDirection::ReceiveFrom(_peer) => {
                let (safety_factor, access_region) = {
                    let ctx = &self.meshes[&mesh_id];
                    (ctx.safety_factor, ctx.access_region.clone())
                };
                let allow_direct_access = access_region.is_some();
                let remote = ReceivedPartition::recv_from(&self.partition_comm, dims);
                let mut received = ReceivedPartition::new(safety_factor, access_region, allow_direct_access);
                let owned_interface_points = self.meshes[&mesh_id].mesh.vertices().to_vec();
                let interest_box = received.compute_interest_box(&owned_interface_points, dims)?;
                received.filter_and_remap(&remote, &interest_box);
                self.meshes.get_mut(&mesh_id).unwrap().received_partition = Some(received);
            }
        }
        Ok(())
    }

    fn mesh_vertices_for_data(&self, data_id: DataId) -> Result<Vec<Coord>> {
        let mesh_id = self
            .data_contexts
            .get(&data_id)
            .ok_or_else(|| CoreError::internal(format!("data {} has no data context", data_id)))?
            .mesh_id;
        Ok(self.get_mesh_vertices_and_ids(mesh_id)?.0)
    }

    /// §4.3 step 4: "register the decomposed mesh so the mapping kernel can
    /// build its interpolation stencil", run once every mesh's partition is
    /// known.
    fn compute_mapping_stencils(&mut self) -> Result<()> {
        let ids: Vec<DataId> = self.data_contexts.keys().copied().collect();
        for id in ids {
            let from_mesh_id = self.data_contexts[&id].mesh_id;
            let from_vertices = self.mesh_vertices_for_data(id)?;
            let space_dims = self.meshes.get(&from_mesh_id).map(|m| m.mesh.dims()).unwrap_or(0);

            let from_count = self.data_contexts[&id].from_mappings.len();
            for i in 0..from_count {
                let to_data = self.data_contexts[&id].from_mappings[i].to_data;
                let to_vertices = self.mesh_vertices_for_data(to_data)?;
                self.data_contexts.get_mut(&id).unwrap().from_mappings[i]
                    .mapping
                    .compute(&from_vertices, &to_vertices, space_dims);
            }

            let to_count = self.data_contexts[&id].to_mappings.len();
            for i in 0..to_count {
                let to_data = self.data_contexts[&id].to_mappings[i].to_data;
                let to_vertices = self.mesh_vertices_for_data(to_data)?;
                self.data_contexts.get_mut(&id).unwrap().to_mappings[i]
                    .mapping
                    .compute(&from_vertices, &to_vertices, space_dims);
            }
        }
        Ok(())
    }

    /// §4.1 advance phase (c)/(f): applies every registered `fromMapping`
    /// into its destination data buffer, and every `toMapping` likewise.
    fn perform_write_mappings(&mut self) -> Result<()> {
        let ids: Vec<DataId> = self.data_contexts.keys().copied().collect();
        for id in ids {
            let (source, dims) = {
                let d = self.data.get(&id).ok_or_else(|| CoreError::internal("missing data for mapping"))?;
                (d.values().to_vec(), d.dims())
            };
            let mapped = self
                .data_contexts
                .get_mut(&id)
                .ok_or_else(|| CoreError::internal("missing data context"))?
                .apply_from_mappings(&source, dims)?;
            for (to_id, values) in mapped {
                if let Some(to) = self.data.get_mut(&to_id) {
                    for (chunk_i, chunk) in values.chunks(to.dims()).enumerate() {
                        let _ = to.write_vertex(chunk_i, chunk);
                    }
                }
            }
        }
        Ok(())
    }

    fn perform_read_mappings(&mut self) -> Result<()> {
        let ids: Vec<DataId> = self.data_contexts.keys().copied().collect();
        for id in ids {
            let (source, dims) = {
                let d = self.data.get(&id).ok_or_else(|| CoreError::internal("missing data for mapping"))?;
                (d.values().to_vec(), d.dims())
            };
            let mapped = self
                .data_contexts
                .get_mut(&id)
                .ok_or_else(|| CoreError::internal("missing data context"))?
                .apply_to_mappings(&source, dims)?;
            for (to_id, values) in mapped {
                if let Some(to) = self.data.get_mut(&to_id) {
                    for (chunk_i, chunk) in values.chunks(to.dims()).enumerate() {
                        let _ = to.write_vertex(chunk_i, chunk);
                    }
                }
                if let Some(w) = self.read_waveforms.get_mut(&to_id) {
                    if w.is_initialized() {
                        let _ = w.store(&values);
                    }
                }
            }
        }
        Ok(())
    }

    /// §4.1 `advance(dt)` phase flow, steps (a)-(i).
    pub fn advance(&mut self, dt: f64) -> Result<f64> {
        self.require_state(State::Initialized, "advance")?;
        if dt <= 0.0 {
            return Err(CoreError::precondition("advance requires dt > 0"));
        }
        let scope = self.scopes.enter("advance");

        // (b)
        self.scheme.add_computed_time(dt)?;

        // (c)
        self.perform_write_mappings()?;

        // (d)
        self.scheme.first_synchronization()?;
        self.scheme.first_exchange()?;
        self.scheme.second_synchronization()?;
        self.scheme.second_exchange()?;

        // (e)
        if self.scheme.is_time_window_complete() {
            for waveform in self.read_waveforms.values_mut() {
                waveform.move_to_next_window();
            }
        }

        // (f)
        if self.scheme.has_data_been_received() {
            self.perform_read_mappings()?;
        }

        // (h)
        self.written_this_window.clear();

        // (i)
        Ok(self.scheme.get_next_timestep_max_length())
    }

    pub fn finalize(&mut self) -> Result<()> {
        if self.state == State::Finalized {
            return Err(CoreError::usage("finalize called twice"));
        }
        let scope = self.scopes.enter("finalize");
        info!("participant '{}' finalizing", self.participant_name);
        self.scheme.finalize()?;
        self.state = State::Finalized;
        drop(scope);
        Ok(())
    }
}

impl<C: Communicator> Drop for SolverInterface<C> {
    fn drop(&mut self) {
        if self.state == State::Initialized {
            let _ = self.finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Constraint, NearestNeighborMapping};
    use crate::message::NullCommunicator;
    use crate::scheme::{Role, SchemeConfig, SchemeOrdering, SchemeRigor, WindowSizeMethod};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    fn lone_scheme(role: Role) -> CouplingScheme<NullCommunicator> {
        CouplingScheme::new(
            SchemeConfig {
                ordering: SchemeOrdering::Serial,
                rigor: SchemeRigor::Explicit,
                role,
                max_time: Some(10.0),
                window_size_method: WindowSizeMethod::Fixed(1.0),
                valid_digits: 10,
                max_iterations: 1,
                extrapolation_order: 0,
                sends_initialized_data: false,
            },
            NullCommunicator::new(),
            vec![],
        )
    }

    /// An in-memory single-rank loopback, for tests that drive `initialize`
    /// past the partition channel's sends. `NullCommunicator`'s `send`/`recv`
    /// are `unimplemented!()`.
    struct LoopbackCommunicator {
        queue: RefCell<VecDeque<Vec<u8>>>,
    }

    impl LoopbackCommunicator {
        fn new() -> Self {
            Self {
                queue: RefCell::new(VecDeque::new()),
            }
        }
    }

    impl Communicator for LoopbackCommunicator {
        fn rank(&self) -> usize {
            0
        }

        fn size(&self) -> usize {
            1
        }

        fn send(&self, _rank: usize, message: Vec<u8>) {
            self.queue.borrow_mut().push_back(message);
        }

        fn recv(&self) -> Vec<u8> {
            self.queue.borrow_mut().pop_front().expect("no message queued")
        }

        fn next_time_stamp(&mut self) {}
    }

    fn lone_loopback_scheme(role: Role) -> CouplingScheme<LoopbackCommunicator> {
        CouplingScheme::new(
            SchemeConfig {
                ordering: SchemeOrdering::Serial,
                rigor: SchemeRigor::Explicit,
                role,
                max_time: Some(10.0),
                window_size_method: WindowSizeMethod::Fixed(1.0),
                valid_digits: 10,
                max_iterations: 1,
                extrapolation_order: 0,
                sends_initialized_data: false,
            },
            LoopbackCommunicator::new(),
            vec![],
        )
    }

    #[test]
    fn mesh_vertex_write_succeeds_before_initialize() {
        let mut s = SolverInterface::new("A", NullCommunicator::new(), lone_scheme(Role::First));
        s.add_mesh(1, "MeshA", 2, MeshDirection::Provide).unwrap();
        assert!(s.set_mesh_vertex(1, crate::geometry::coord2(0.0, 0.0)).is_ok());
    }

    #[test]
    fn mesh_writes_rejected_after_finalize() {
        let mut s = SolverInterface::new("A", NullCommunicator::new(), lone_scheme(Role::First));
        s.add_mesh(1, "MeshA", 2, MeshDirection::Provide).unwrap();
        s.finalize().unwrap();
        assert!(s.set_mesh_vertex(1, crate::geometry::coord2(0.0, 0.0)).is_err());
    }

    #[test]
    fn access_region_can_only_be_set_once() {
        let mut s = SolverInterface::new("A", NullCommunicator::new(), lone_scheme(Role::First));
        s.add_mesh(1, "MeshA", 2, MeshDirection::Provide).unwrap();
        let bbox = BoundingBox::empty(2);
        assert!(s.set_mesh_access_region(1, bbox.clone()).is_ok());
        assert!(s.set_mesh_access_region(1, bbox).is_err());
    }

    #[test]
    fn duplicate_mesh_id_is_configuration_error() {
        let mut s = SolverInterface::new("A", NullCommunicator::new(), lone_scheme(Role::First));
        s.add_mesh(1, "MeshA", 2, MeshDirection::Provide).unwrap();
        assert!(s.add_mesh(1, "MeshB", 2, MeshDirection::Provide).is_err());
    }

    #[test]
    fn enable_iteration_log_creates_log_files_under_the_given_directory() {
        let dir = std::env::temp_dir().join("coupling-core-solver-interface-iteration-log-test");
        std::fs::create_dir_all(&dir).unwrap();

        let mut s = SolverInterface::new("A", NullCommunicator::new(), lone_scheme(Role::First));
        s.enable_iteration_log(&dir).unwrap();

        assert!(dir.join("precice-A-iterations.log").exists());
        assert!(dir.join("precice-A-convergence.log").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_mapping_runs_through_the_facade() {
        // §8 scenario 1: Forces@MeshB [0,1,2,3,4] mapped onto MeshA via
        // nearest-neighbor yields [2,4,3,3].
        let mut s = SolverInterface::new(
            "A",
            LoopbackCommunicator::new(),
            lone_loopback_scheme(Role::First),
        );
        s.add_mesh(1, "MeshA", 2, MeshDirection::Provide).unwrap();
        s.add_mesh(2, "MeshB", 2, MeshDirection::Provide).unwrap();
        s.add_data(10, 2, "Forces", 1, false).unwrap();
        s.add_data(20, 1, "ForcesOnA", 1, false).unwrap();
        s.add_write_mapping(
            10,
            20,
            MappingTiming::OnAdvance,
            Box::new(NearestNeighborMapping::new(Constraint::Consistent, 2)),
        )
        .unwrap();

        let mesh_a = [
            crate::geometry::coord2(0.2, 0.2),
            crate::geometry::coord2(0.1, 0.6),
            crate::geometry::coord2(0.1, 0.0),
            crate::geometry::coord2(0.1, 0.0),
        ];
        let mesh_b = [
            crate::geometry::coord2(0.0, 0.0),
            crate::geometry::coord2(0.0, 0.05),
            crate::geometry::coord2(0.1, 0.1),
            crate::geometry::coord2(0.1, 0.0),
            crate::geometry::coord2(0.5, 0.5),
        ];
        s.set_mesh_vertices(1, &mesh_a).unwrap();
        let b_ids = s.set_mesh_vertices(2, &mesh_b).unwrap();

        s.initialize().unwrap();
        s.write_block_vector_data(10, &b_ids, &[0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        s.advance(1.0).unwrap();

        assert_eq!(s.data.get(&20).unwrap().values().to_vec(), vec![2.0, 4.0, 3.0, 3.0]);
    }
}
