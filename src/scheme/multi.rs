//! Multi-coupling (component G, §4.5): one designated central participant
//! exchanges with N peers in a fixed declared order, then runs one shared
//! implicit procedure over the union of all their data.

use crate::coupling_data::{CouplingData, CouplingDataMap, DataId};
use crate::error::{CoreError, Result};
use crate::message::Communicator;
use super::convergence::{overall_converged, ConvergenceMeasure};
use super::{Action, Outcome};
use std::collections::HashSet;

/// One peer's channel and the data ids it sends/receives, in participation
/// order.
pub struct Peer<C: Communicator> {
    pub comm: C,
    pub send_data_ids: Vec<DataId>,
    pub receive_data_ids: Vec<DataId>,
}

/// The central participant's view of a multi-coupling (§4.5: "the central
/// participant exchanges with N peers in fixed order"). The central side
/// always measures convergence, mirroring the serial scheme's `Second` role.
pub struct MultiCoupling<C: Communicator> {
    peers: Vec<Peer<C>>,
    data: CouplingDataMap,
    convergence_measures: Vec<(DataId, Box<dyn ConvergenceMeasure>)>,
    max_iterations: usize,
    iterations: usize,
    required_actions: HashSet<Action>,
    fulfilled_actions: HashSet<Action>,
    pending_outcome: Option<Outcome>,
}

impl<C: Communicator> MultiCoupling<C> {
    pub fn new(peers: Vec<Peer<C>>, max_iterations: usize) -> Self {
        let mut data = CouplingDataMap::new();
        for peer in &peers {
            for &id in peer.send_data_ids.iter().chain(peer.receive_data_ids.iter()) {
                data.get_or_insert_with(id, || CouplingData::new(id, None, 1, 0, 0));
            }
        }
        Self {
            peers,
            data,
            convergence_measures: Vec::new(),
            max_iterations,
            iterations: 0,
            required_actions: HashSet::new(),
            fulfilled_actions: HashSet::new(),
            pending_outcome: None,
        }
    }

    pub fn add_convergence_measure(&mut self, data_id: DataId, measure: Box<dyn ConvergenceMeasure>) {
        self.convergence_measures.push((data_id, measure));
    }

    pub fn data_mut(&mut self, data_id: DataId) -> Option<&mut CouplingData> {
        self.data.get_mut(data_id)
    }

    pub fn is_action_required(&mut self, action: Action) -> bool {
        if self.required_actions.contains(&action) {
            self.fulfilled_actions.insert(action);
            true
        } else {
            false
        }
    }

    /// Exchanges with every peer in declared order: first receive all
    /// inbound data, then send all outbound data, matching §4.5's "fixed
    /// order" requirement without assuming a particular peer topology.
    pub fn exchange_all(&mut self) -> Result<()> {
        for peer in &mut self.peers {
            for &id in &peer.receive_data_ids {
                let values = peer.comm.recv_buffer();
                let cd = self
                    .data
                    .get_mut(id)
                    .ok_or_else(|| CoreError::internal("multi-coupling peer references unknown data id"))?;
                cd.values = values;
            }
        }
        for peer in &mut self.peers {
            for &id in &peer.send_data_ids {
                let cd = self
                    .data
                    .get(id)
                    .ok_or_else(|| CoreError::internal("multi-coupling peer references unknown data id"))?;
                peer.comm.send_buffer(0, &cd.values);
            }
        }
        Ok(())
    }

    /// §4.5 step 2: the central participant measures convergence for the
    /// aggregated data set and broadcasts the verdict to every peer.
    pub fn measure_and_broadcast(&mut self) -> Outcome {
        self.iterations += 1;
        let mut results = Vec::new();
        for (data_id, measure) in self.convergence_measures.iter_mut() {
            if let Some(cd) = self.data.get(*data_id) {
                results.push(measure.measure(cd.previous_iteration(), &cd.values));
            }
        }
        let converged = overall_converged(&results);
        for peer in &self.peers {
            peer.comm.send_bool(0, converged);
        }
        let outcome = if converged {
            Outcome::Converged
        } else if self.iterations < self.max_iterations {
            Outcome::RetryWindow
        } else {
            Outcome::ForcedConverged
        };
        if matches!(outcome, Outcome::Converged | Outcome::ForcedConverged) {
            self.iterations = 0;
            for cd in self.data.iter_mut() {
                cd.move_to_next_window();
            }
        } else {
            self.required_actions.insert(Action::ReadCheckpoint);
        }
        for cd in self.data.iter_mut() {
            cd.store_iteration();
        }
        self.pending_outcome = Some(outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::NullCommunicator;

    #[test]
    fn measure_and_broadcast_forces_convergence_at_iteration_cap() {
        let peers: Vec<Peer<NullCommunicator>> = vec![];
        let mut mc = MultiCoupling::new(peers, 2);
        mc.data.get_or_insert_with(1, || CouplingData::new(1, None, 1, 1, 0));
        mc.add_convergence_measure(
            1,
            Box::new(crate::scheme::convergence::AbsoluteConvergenceMeasure {
                limit: 1e-12,
                suffices: false,
                strict: false,
            }),
        );
        mc.data_mut(1).unwrap().values = vec![1.0];

        let first = mc.measure_and_broadcast();
        assert_eq!(first, Outcome::RetryWindow);
        mc.data_mut(1).unwrap().values = vec![2.0];
        let second = mc.measure_and_broadcast();
        assert_eq!(second, Outcome::ForcedConverged);
    }
}
