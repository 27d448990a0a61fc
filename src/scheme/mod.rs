//! The coupling scheme engine (component G, §4.5).
//!
//! A single generic [`CouplingScheme`] implements the four-phase contract
//! for every bi-participant variant (`SerialExplicit`, `SerialImplicit`,
//! `ParallelExplicit`, `ParallelImplicit`) by branching on a
//! [`SchemeConfig`], per §9's "closed sum type + match" design note.
//! [`multi::MultiCoupling`] and [`compositional::Compositional`] build on
//! top of it.

pub mod compositional;
pub mod convergence;
pub mod multi;

use crate::acceleration::Acceleration;
use crate::coupling_data::{CouplingData, CouplingDataMap, DataId};
use crate::error::{CoreError, Result};
use crate::iteration_log::{IterationLogWriter, LogRow};
use crate::message::Communicator;
use convergence::{any_strict_unmet, overall_converged, ConvergenceMeasure};
use std::collections::HashSet;

/// A named obligation the scheme places on the solver (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    InitializeData,
    WriteCheckpoint,
    ReadCheckpoint,
}

/// The outcome of one implicit iteration, modeled as an explicit enum
/// rather than driven by exceptions (§9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Converged,
    RetryWindow,
    ForcedConverged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeOrdering {
    Serial,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeRigor {
    Explicit,
    Implicit,
}

/// Which named participant this instance plays (§4.5 "Two named
/// participants (`first`, `second`)"). Also used by parallel schemes to
/// pick the designated convergence-measuring side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    First,
    Second,
}

/// How the time window size is established (§4.5 "Time model").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSizeMethod {
    Fixed(f64),
    /// Announced by the first participant at the end of its first window.
    FirstParticipant,
}

pub struct SchemeConfig {
    pub ordering: SchemeOrdering,
    pub rigor: SchemeRigor,
    pub role: Role,
    pub max_time: Option<f64>,
    pub window_size_method: WindowSizeMethod,
    pub valid_digits: i32,
    pub max_iterations: usize,
    pub extrapolation_order: usize,
    /// §4.1 step 8: whether this scheme declares that it sends data
    /// already available before the first `advance` (write mappings run
    /// eagerly during `initialize`).
    pub sends_initialized_data: bool,
}

impl SchemeConfig {
    fn epsilon(&self) -> f64 {
        10f64.powi(-self.valid_digits)
    }
}

/// One data field bound into the scheme, naming which side writes it.
pub struct Exchange {
    pub data_id: DataId,
    pub dims: usize,
    pub size: usize,
    /// `true` if this rank/participant sends this data; `false` if it
    /// receives it.
    pub sends: bool,
    pub initialize: bool,
}

/// The coupling-scheme state machine (§4.5). Generic over the primary
/// channel's transport so the same engine drives tests with an in-memory
/// loopback and production code with TCP/MPI.
pub struct CouplingScheme<C: Communicator> {
    config: SchemeConfig,
    comm: C,
    time: f64,
    time_windows: i64,
    computed_time_window_part: f64,
    window_size: Option<f64>,
    iterations: usize,
    total_iterations: usize,
    data: CouplingDataMap,
    exchanges: Vec<Exchange>,
    convergence_measures: Vec<(DataId, Box<dyn ConvergenceMeasure>)>,
    acceleration: Option<Box<dyn Acceleration>>,
    ongoing: bool,
    window_complete: bool,
    data_received: bool,
    pending_outcome: Option<Outcome>,
    required_actions: HashSet<Action>,
    fulfilled_actions: HashSet<Action>,
    last_window_length: f64,
    iteration_log: Option<IterationLogWriter>,
}

impl<C: Communicator> CouplingScheme<C> {
    pub fn new(config: SchemeConfig, comm: C, exchanges: Vec<Exchange>) -> Self {
        let mut data = CouplingDataMap::new();
        for ex in &exchanges {
            data.get_or_insert_with(ex.data_id, || {
                let mut cd = CouplingData::new(ex.data_id, None, ex.dims, ex.size, config.extrapolation_order);
                cd.requires_initialization = ex.initialize;
                cd
            });
        }
        let window_size = match config.window_size_method {
            WindowSizeMethod::Fixed(w) => Some(w),
            WindowSizeMethod::FirstParticipant => None,
        };
        Self {
            config,
            comm,
            time: 0.0,
            time_windows: 0,
            computed_time_window_part: 0.0,
            window_size,
            iterations: 0,
            total_iterations: 0,
            data,
            exchanges,
            convergence_measures: Vec::new(),
            acceleration: None,
            ongoing: true,
            window_complete: false,
            data_received: false,
            pending_outcome: None,
            required_actions: HashSet::new(),
            fulfilled_actions: HashSet::new(),
            last_window_length: 0.0,
            iteration_log: None,
        }
    }

    pub fn add_convergence_measure(&mut self, data_id: DataId, measure: Box<dyn ConvergenceMeasure>) {
        self.convergence_measures.push((data_id, measure));
    }

    pub fn set_acceleration(&mut self, acceleration: Box<dyn Acceleration>) {
        self.acceleration = Some(acceleration);
    }

    /// §6: the writer is supplied by the harness (mirrors `EventScope`'s
    /// construction-time injection) rather than constructed here, since only
    /// the caller knows the participant's log directory.
    pub fn set_iteration_log(&mut self, writer: IterationLogWriter) {
        self.iteration_log = Some(writer);
    }

    /// The `Res<name>` column names the convergence log will carry, derived
    /// from each configured measure's abbreviation and the data id it
    /// watches. Used by the caller to construct a matching
    /// [`IterationLogWriter`].
    pub fn residual_log_names(&self) -> Vec<String> {
        self.convergence_measures
            .iter()
            .map(|(id, m)| format!("{}{}", m.abbreviation(), id))
            .collect()
    }

    pub fn data_mut(&mut self, data_id: DataId) -> Option<&mut CouplingData> {
        self.data.get_mut(data_id)
    }

    pub fn data(&self, data_id: DataId) -> Option<&CouplingData> {
        self.data.get(data_id)
    }

    fn is_measuring_side(&self) -> bool {
        // §4.5: for serial schemes, the Second measures convergence; for
        // parallel schemes one side is designated. We use `Role::Second` as
        // that designated side uniformly, matching the serial rule.
        self.config.role == Role::Second
    }

    fn send_all(&mut self) -> Result<()> {
        let ids: Vec<DataId> = self.exchanges.iter().filter(|e| e.sends).map(|e| e.data_id).collect();
        for id in ids {
            let cd = self
                .data
                .get(id)
                .ok_or_else(|| CoreError::internal("exchange references unknown data id"))?;
            self.comm.send_buffer(0, &cd.values);
        }
        Ok(())
    }

    fn recv_all(&mut self) -> Result<()> {
        let ids: Vec<DataId> = self.exchanges.iter().filter(|e| !e.sends).map(|e| e.data_id).collect();
        for id in ids {
            let values = self.comm.recv_buffer();
            let cd = self
                .data
                .get_mut(id)
                .ok_or_else(|| CoreError::internal("exchange references unknown data id"))?;
            if values.len() != cd.values.len() {
                return Err(CoreError::protocol(format!(
                    "received {} values for data {}, expected {}",
                    values.len(),
                    id,
                    cd.values.len()
                )));
            }
            cd.values = values;
        }
        Ok(())
    }

    fn require(&mut self, action: Action) {
        self.required_actions.insert(action);
    }

    /// §6: "The solver fulfills them by calling the matching
    /// `requires*Checkpoint`/`requiresInitialData` query, which returns true
    /// and simultaneously marks the action fulfilled."
    pub fn is_action_required(&mut self, action: Action) -> bool {
        if self.required_actions.contains(&action) {
            self.fulfilled_actions.insert(action);
            true
        } else {
            false
        }
    }

    /// Actions raised during one `advance` (or `initialize`) can only be
    /// fulfilled by the solver *after* that call returns control, so this is
    /// checked at the start of the next call that could raise new ones
    /// (`add_computed_time`, `finalize`) rather than at the end of the phase
    /// that raised them.
    fn check_actions_fulfilled(&mut self) -> Result<()> {
        let unfulfilled: Vec<_> = self
            .required_actions
            .difference(&self.fulfilled_actions)
            .copied()
            .collect();
        if !unfulfilled.is_empty() {
            return Err(CoreError::user(format!(
                "unfulfilled coupling-scheme actions: {:?}",
                unfulfilled
            )));
        }
        self.required_actions.clear();
        self.fulfilled_actions.clear();
        Ok(())
    }

    // ---- §4.5 contract ----

    pub fn initialize(&mut self, start_time: f64, start_window: i64) -> Result<()> {
        self.time = start_time;
        self.time_windows = start_window;
        if let Some(acc) = &mut self.acceleration {
            acc.initialize(&mut self.data);
        }
        if self.exchanges.iter().any(|e| e.initialize) {
            self.require(Action::InitializeData);
        }
        Ok(())
    }

    pub fn receive_result_of_first_advance(&mut self) -> Result<()> {
        // Serial schemes' second participant receives an early sample at
        // the very start, before its own first `advance` (§4.1 step 11).
        if self.config.ordering == SchemeOrdering::Serial && self.config.role == Role::Second {
            self.recv_all()?;
            self.data_received = true;
        }
        Ok(())
    }

    pub fn add_computed_time(&mut self, dt: f64) -> Result<()> {
        // Actions raised by the previous `advance` must be fulfilled by the
        // solver in between calls; this is the first opportunity to check.
        self.check_actions_fulfilled()?;
        if dt <= 0.0 {
            return Err(CoreError::precondition("addComputedTime requires dt > 0"));
        }
        self.computed_time_window_part += dt;
        if let Some(w) = self.window_size {
            if self.computed_time_window_part > w + self.config.epsilon() {
                return Err(CoreError::user(format!(
                    "computed time window part {} exceeds window size {}",
                    self.computed_time_window_part, w
                )));
            }
        }
        Ok(())
    }

    fn reached_end_of_time_window(&self) -> bool {
        match self.window_size {
            None => true,
            Some(w) => (w - self.computed_time_window_part).abs() <= self.config.epsilon(),
        }
    }

    pub fn first_synchronization(&mut self) -> Result<()> {
        Ok(())
    }

    pub fn first_exchange(&mut self) -> Result<()> {
        self.data_received = false;
        match self.config.ordering {
            SchemeOrdering::Serial => match self.config.role {
                Role::First => self.send_all()?,
                Role::Second => {
                    self.recv_all()?;
                    self.data_received = true;
                }
            },
            SchemeOrdering::Parallel => {
                self.send_all()?;
                self.recv_all()?;
                self.data_received = true;
            }
        }
        Ok(())
    }

    pub fn second_synchronization(&mut self) -> Result<()> {
        if self.config.rigor != SchemeRigor::Implicit {
            return Ok(());
        }
        self.iterations += 1;
        self.total_iterations += 1;

        for cd in self.data.iter_mut() {
            cd.store_extrapolation_data();
        }

        let mut strict_unmet_at_cap = false;
        let converged = if self.is_measuring_side() {
            let mut results = Vec::new();
            for (data_id, measure) in self.convergence_measures.iter_mut() {
                if let Some(cd) = self.data.get(*data_id) {
                    results.push(measure.measure(cd.previous_iteration(), &cd.values));
                }
            }
            let converged = overall_converged(&results);
            if !converged && self.iterations >= self.config.max_iterations {
                strict_unmet_at_cap = any_strict_unmet(&results);
            }

            // §6: one row per iteration, written by the measuring side only.
            let residuals: Vec<(String, f64)> = self
                .convergence_measures
                .iter()
                .zip(results.iter())
                .map(|((id, m), r)| (format!("{}{}", m.abbreviation(), id), r.value))
                .collect();
            if let Some(log) = self.iteration_log.as_mut() {
                let _ = log.write_row(&LogRow {
                    time_window: self.time_windows,
                    total_iterations: self.total_iterations as i64,
                    iterations: self.iterations as i64,
                    converged,
                    qn_columns: self.acceleration.as_ref().map(|a| a.ls_system_cols()),
                    deleted_qn_columns: self.acceleration.as_ref().map(|a| a.deleted_columns()),
                    dropped_qn_columns: self.acceleration.as_ref().map(|a| a.dropped_columns()),
                    residuals,
                });
            }

            self.comm.send_bool(0, converged);
            converged
        } else {
            self.comm.recv_bool()
        };

        // §4.5 step 2: a strict measure still unmet at the iteration cap is
        // fatal, not forced-converged.
        if strict_unmet_at_cap {
            return Err(CoreError::user(
                "strict convergence measure unmet at the iteration cap",
            ));
        }

        let outcome = if converged {
            Outcome::Converged
        } else if self.iterations < self.config.max_iterations {
            Outcome::RetryWindow
        } else {
            Outcome::ForcedConverged
        };
        self.pending_outcome = Some(outcome);
        Ok(())
    }

    pub fn second_exchange(&mut self) -> Result<()> {
        match self.config.ordering {
            SchemeOrdering::Serial => match self.config.role {
                Role::Second => self.send_all()?,
                Role::First => {
                    self.recv_all()?;
                    self.data_received = true;
                }
            },
            SchemeOrdering::Parallel => {}
        }

        if self.config.rigor == SchemeRigor::Implicit {
            self.apply_outcome()?;
        } else {
            self.window_complete = self.reached_end_of_time_window();
            if self.window_complete {
                self.finish_window()?;
            }
        }
        self.maybe_exchange_window_size()?;
        Ok(())
    }

    fn apply_outcome(&mut self) -> Result<()> {
        let outcome = self
            .pending_outcome
            .take()
            .ok_or_else(|| CoreError::internal("second_exchange called before second_synchronization"))?;

        match outcome {
            Outcome::Converged | Outcome::ForcedConverged => {
                if let Some(acc) = &mut self.acceleration {
                    acc.iterations_converged(&mut self.data);
                }
                for cd in self.data.iter_mut() {
                    cd.move_to_next_window();
                    cd.extrapolate(self.config.extrapolation_order);
                }
                self.iterations = 0;
                self.window_complete = self.reached_end_of_time_window();
                if self.window_complete {
                    self.finish_window()?;
                    // §4.5 step 3: only the implicit converged path requests
                    // a checkpoint write; an explicit window never does.
                    if self.ongoing {
                        self.require(Action::WriteCheckpoint);
                    }
                }
            }
            Outcome::RetryWindow => {
                if let Some(acc) = &mut self.acceleration {
                    acc.perform_acceleration(&mut self.data);
                }
                self.require(Action::ReadCheckpoint);
                self.time -= self.computed_time_window_part;
                self.computed_time_window_part = 0.0;
                self.time_windows -= 1;
                self.window_complete = false;
            }
        }
        for cd in self.data.iter_mut() {
            cd.store_iteration();
        }
        Ok(())
    }

    /// Advances time/window bookkeeping on a completed window. Shared by the
    /// explicit path and the implicit converged path; neither the
    /// `WriteCheckpoint` action nor the extrapolation predictor belongs here
    /// since both are implicit-only (§4.5 step 3).
    fn finish_window(&mut self) -> Result<()> {
        self.last_window_length = self.computed_time_window_part;
        self.time += self.computed_time_window_part;
        self.computed_time_window_part = 0.0;
        self.time_windows += 1;
        if let Some(max_time) = self.config.max_time {
            if self.time >= max_time - self.config.epsilon() {
                self.ongoing = false;
            }
        }
        Ok(())
    }

    fn maybe_exchange_window_size(&mut self) -> Result<()> {
        if !self.window_complete {
            return Ok(());
        }
        if self.config.window_size_method == WindowSizeMethod::FirstParticipant {
            match self.config.role {
                Role::First => {
                    self.comm.send_scalar(0, self.last_window_length);
                }
                Role::Second => {
                    let w = self.comm.recv_scalar();
                    self.window_size = Some(w);
                }
            }
        }
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<()> {
        self.check_actions_fulfilled()?;
        self.ongoing = false;
        Ok(())
    }

    pub fn is_coupling_ongoing(&self) -> bool {
        self.ongoing
    }

    pub fn is_time_window_complete(&self) -> bool {
        self.window_complete
    }

    pub fn has_data_been_received(&self) -> bool {
        self.data_received
    }

    pub fn has_time_window_size(&self) -> bool {
        self.window_size.is_some()
    }

    pub fn get_time_window_size(&self) -> Option<f64> {
        self.window_size
    }

    pub fn get_time(&self) -> f64 {
        self.time
    }

    pub fn get_time_windows(&self) -> i64 {
        self.time_windows
    }

    pub fn get_this_time_window_remainder(&self) -> f64 {
        match self.window_size {
            Some(w) => (w - self.computed_time_window_part).max(0.0),
            None => 0.0,
        }
    }

    pub fn get_next_timestep_max_length(&self) -> f64 {
        match self.window_size {
            Some(w) => (w - self.computed_time_window_part).max(0.0),
            None => f64::INFINITY,
        }
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn total_iterations(&self) -> usize {
        self.total_iterations
    }

    pub fn sends_initialized_data(&self) -> bool {
        self.config.sends_initialized_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::NullCommunicator;
    use super::convergence::AbsoluteConvergenceMeasure;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// An in-memory single-rank loopback, for tests that drive the implicit
    /// path's convergence-verdict exchange without a real transport.
    /// `NullCommunicator` cannot stand in here since its `send`/`recv` are
    /// `unimplemented!()`.
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

    /// Records whether `initialize` was invoked, to verify the scheme wires
    /// it in (§4.6).
    struct SpyAcceleration {
        initialized: std::rc::Rc<std::cell::Cell<bool>>,
    }

    impl Acceleration for SpyAcceleration {
        fn initialize(&mut self, _data: &mut CouplingDataMap) {
            self.initialized.set(true);
        }

        fn perform_acceleration(&mut self, _data: &mut CouplingDataMap) {}
        fn iterations_converged(&mut self, _data: &mut CouplingDataMap) {}
    }

    fn basic_config(ordering: SchemeOrdering, rigor: SchemeRigor, role: Role, window: f64, max_iters: usize) -> SchemeConfig {
        SchemeConfig {
            ordering,
            rigor,
            role,
            max_time: Some(3.0),
            window_size_method: WindowSizeMethod::Fixed(window),
            valid_digits: 10,
            max_iterations: max_iters,
            extrapolation_order: 0,
            sends_initialized_data: false,
        }
    }

    #[test]
    fn add_computed_time_rejects_non_positive_dt() {
        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Explicit, Role::First, 1.0, 1),
            NullCommunicator::new(),
            vec![],
        );
        assert!(s.add_computed_time(0.0).is_err());
        assert!(s.add_computed_time(-1.0).is_err());
    }

    #[test]
    fn add_computed_time_rejects_overshoot_past_epsilon() {
        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Explicit, Role::First, 1.0, 1),
            NullCommunicator::new(),
            vec![],
        );
        assert!(s.add_computed_time(0.5).is_ok());
        assert!(s.add_computed_time(0.6).is_err());
    }

    #[test]
    fn reached_end_of_time_window_within_epsilon() {
        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Explicit, Role::First, 1.0, 1),
            NullCommunicator::new(),
            vec![],
        );
        s.add_computed_time(1.0).unwrap();
        assert!(s.reached_end_of_time_window());
    }

    #[test]
    fn action_query_marks_fulfilled_on_first_call_only() {
        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Explicit, Role::First, 1.0, 1),
            NullCommunicator::new(),
            vec![],
        );
        s.require(Action::WriteCheckpoint);
        assert!(s.is_action_required(Action::WriteCheckpoint));
        assert!(!s.is_action_required(Action::ReadCheckpoint));
        assert!(s.check_actions_fulfilled().is_ok());
    }

    #[test]
    fn unfulfilled_action_is_fatal() {
        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Explicit, Role::First, 1.0, 1),
            NullCommunicator::new(),
            vec![],
        );
        s.require(Action::WriteCheckpoint);
        assert!(s.check_actions_fulfilled().is_err());
    }

    #[test]
    fn explicit_window_completion_never_requires_write_checkpoint() {
        // §4.5 step 3: WriteCheckpoint is implicit-only.
        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Explicit, Role::First, 1.0, 1),
            NullCommunicator::new(),
            vec![],
        );
        s.add_computed_time(1.0).unwrap();
        s.first_synchronization().unwrap();
        s.first_exchange().unwrap();
        s.second_synchronization().unwrap();
        s.second_exchange().unwrap();
        assert!(s.is_time_window_complete());
        assert!(!s.is_action_required(Action::WriteCheckpoint));
    }

    #[test]
    fn action_required_mid_advance_is_not_checked_until_the_next_advance() {
        // §6: the solver can only fulfill an action after the advance that
        // raised it returns; the check belongs at the start of the next
        // advance, not inline in the phase that raised it.
        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Implicit, Role::First, 1.0, 3),
            NullCommunicator::new(),
            vec![],
        );
        s.add_computed_time(0.4).unwrap();
        s.pending_outcome = Some(Outcome::RetryWindow);
        assert!(s.apply_outcome().is_ok());
        assert!(s.required_actions.contains(&Action::ReadCheckpoint));

        // The unfulfilled action only trips the check on the *next* call
        // that can raise new ones.
        assert!(s.add_computed_time(0.1).is_err());
    }

    #[test]
    fn fulfilling_the_required_action_allows_the_next_advance() {
        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Implicit, Role::First, 1.0, 3),
            NullCommunicator::new(),
            vec![],
        );
        s.add_computed_time(0.4).unwrap();
        s.pending_outcome = Some(Outcome::RetryWindow);
        s.apply_outcome().unwrap();

        assert!(s.is_action_required(Action::ReadCheckpoint));
        assert!(s.add_computed_time(0.1).is_ok());
    }

    #[test]
    fn extrapolation_seeds_the_next_window_after_convergence() {
        let mut s = CouplingScheme::new(
            SchemeConfig {
                extrapolation_order: 0,
                ..basic_config(SchemeOrdering::Serial, SchemeRigor::Implicit, Role::First, 1.0, 3)
            },
            NullCommunicator::new(),
            vec![Exchange {
                data_id: 1,
                dims: 1,
                size: 1,
                sends: true,
                initialize: false,
            }],
        );
        s.data_mut(1).unwrap().values = vec![5.0];
        s.data.iter_mut().next().unwrap().store_extrapolation_data();
        s.data_mut(1).unwrap().values = vec![99.0];

        s.add_computed_time(1.0).unwrap();
        s.pending_outcome = Some(Outcome::Converged);
        s.apply_outcome().unwrap();

        // order 0: carries the last value pushed into the history ring
        // (5.0), not whatever was left in `values` (99.0) beforehand.
        assert_eq!(s.data(1).unwrap().values, vec![5.0]);
    }

    #[test]
    fn strict_measure_unmet_at_iteration_cap_is_fatal() {
        // §4.5 step 2: a strict measure failing with `iterations ==
        // max_iterations` is fatal, not forced-converged.
        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Implicit, Role::Second, 1.0, 1),
            LoopbackCommunicator::new(),
            vec![],
        );
        s.data.get_or_insert_with(1, || CouplingData::new(1, None, 1, 1, 0));
        s.data_mut(1).unwrap().values = vec![1.0];
        s.add_convergence_measure(
            1,
            Box::new(AbsoluteConvergenceMeasure {
                limit: 1e-9,
                suffices: false,
                strict: true,
            }),
        );

        s.add_computed_time(1.0).unwrap();
        s.first_synchronization().unwrap();
        assert!(s.second_synchronization().is_err());
    }

    #[test]
    fn non_strict_measure_unmet_at_cap_forces_convergence_instead_of_failing() {
        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Implicit, Role::Second, 1.0, 1),
            LoopbackCommunicator::new(),
            vec![],
        );
        s.data.get_or_insert_with(1, || CouplingData::new(1, None, 1, 1, 0));
        s.data_mut(1).unwrap().values = vec![1.0];
        s.add_convergence_measure(
            1,
            Box::new(AbsoluteConvergenceMeasure {
                limit: 1e-9,
                suffices: false,
                strict: false,
            }),
        );

        s.add_computed_time(1.0).unwrap();
        s.first_synchronization().unwrap();
        s.second_synchronization().unwrap();
        assert_eq!(s.pending_outcome, Some(Outcome::ForcedConverged));
    }

    #[test]
    fn iteration_log_receives_a_row_per_iteration() {
        let dir = std::env::temp_dir().join("coupling-core-scheme-iteration-log-test");
        std::fs::create_dir_all(&dir).unwrap();

        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Implicit, Role::Second, 1.0, 3),
            LoopbackCommunicator::new(),
            vec![],
        );
        s.data.get_or_insert_with(1, || CouplingData::new(1, None, 1, 1, 0));
        s.data_mut(1).unwrap().values = vec![1.0];
        s.add_convergence_measure(
            1,
            Box::new(AbsoluteConvergenceMeasure {
                limit: 1e-9,
                suffices: false,
                strict: false,
            }),
        );
        let writer = IterationLogWriter::create(&dir, "test-participant", s.residual_log_names()).unwrap();
        s.set_iteration_log(writer);

        s.add_computed_time(1.0).unwrap();
        s.first_synchronization().unwrap();
        s.second_synchronization().unwrap();

        let contents = std::fs::read_to_string(dir.join("precice-test-participant-iterations.log")).unwrap();
        assert_eq!(contents.lines().count(), 2); // header + one iteration row

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn acceleration_initialize_is_invoked_by_scheme_initialize() {
        let mut s = CouplingScheme::new(
            basic_config(SchemeOrdering::Serial, SchemeRigor::Implicit, Role::First, 1.0, 1),
            NullCommunicator::new(),
            vec![],
        );
        let initialized = std::rc::Rc::new(std::cell::Cell::new(false));
        s.set_acceleration(Box::new(SpyAcceleration {
            initialized: initialized.clone(),
        }));
        s.initialize(0.0, 0).unwrap();
        assert!(initialized.get());
    }
}
