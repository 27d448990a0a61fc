//! Compositional coupling (component G, §4.5): composes N independently
//! configured sub-schemes and delegates each phase call to every one of
//! them, in the order they were declared.

use super::{Action, CouplingScheme};
use crate::error::Result;
use crate::message::Communicator;

/// Wraps an ordered list of sub-schemes behind the same four-phase
/// contract. A phase is complete only once every sub-scheme has completed
/// it; `is_coupling_ongoing` is true while any sub-scheme still has work.
pub struct Compositional<C: Communicator> {
    schemes: Vec<CouplingScheme<C>>,
}

impl<C: Communicator> Compositional<C> {
    pub fn new(schemes: Vec<CouplingScheme<C>>) -> Self {
        Self { schemes }
    }

    pub fn initialize(&mut self, start_time: f64, start_window: i64) -> Result<()> {
        for s in &mut self.schemes {
            s.initialize(start_time, start_window)?;
        }
        Ok(())
    }

    pub fn first_synchronization(&mut self) -> Result<()> {
        for s in &mut self.schemes {
            s.first_synchronization()?;
        }
        Ok(())
    }

    pub fn first_exchange(&mut self) -> Result<()> {
        for s in &mut self.schemes {
            s.first_exchange()?;
        }
        Ok(())
    }

    pub fn second_synchronization(&mut self) -> Result<()> {
        for s in &mut self.schemes {
            s.second_synchronization()?;
        }
        Ok(())
    }

    pub fn second_exchange(&mut self) -> Result<()> {
        for s in &mut self.schemes {
            s.second_exchange()?;
        }
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<()> {
        for s in &mut self.schemes {
            s.finalize()?;
        }
        Ok(())
    }

    pub fn is_coupling_ongoing(&self) -> bool {
        self.schemes.iter().any(|s| s.is_coupling_ongoing())
    }

    pub fn is_time_window_complete(&self) -> bool {
        self.schemes.iter().all(|s| s.is_time_window_complete())
    }

    pub fn is_action_required(&mut self, action: Action) -> bool {
        // Any sub-scheme requiring the action is enough to surface it to the
        // solver; each sub-scheme tracks its own fulfillment independently.
        self.schemes.iter_mut().map(|s| s.is_action_required(action)).any(|r| r)
    }

    pub fn get_next_timestep_max_length(&self) -> f64 {
        self.schemes
            .iter()
            .map(|s| s.get_next_timestep_max_length())
            .fold(f64::INFINITY, f64::min)
    }

    pub fn scheme_mut(&mut self, index: usize) -> Option<&mut CouplingScheme<C>> {
        self.schemes.get_mut(index)
    }

    pub fn scheme(&self, index: usize) -> Option<&CouplingScheme<C>> {
        self.schemes.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::NullCommunicator;
    use crate::scheme::{Role, SchemeConfig, SchemeOrdering, SchemeRigor, WindowSizeMethod};

    fn explicit_config(role: Role) -> SchemeConfig {
        SchemeConfig {
            ordering: SchemeOrdering::Serial,
            rigor: SchemeRigor::Explicit,
            role,
            max_time: Some(1.0),
            window_size_method: WindowSizeMethod::Fixed(1.0),
            valid_digits: 10,
            max_iterations: 1,
            extrapolation_order: 0,
            sends_initialized_data: false,
        }
    }

    #[test]
    fn ongoing_until_every_subscheme_finalizes() {
        let a = CouplingScheme::new(explicit_config(Role::First), NullCommunicator::new(), vec![]);
        let b = CouplingScheme::new(explicit_config(Role::Second), NullCommunicator::new(), vec![]);
        let mut comp = Compositional::new(vec![a, b]);
        assert!(comp.is_coupling_ongoing());
        comp.finalize().unwrap();
        assert!(!comp.is_coupling_ongoing());
    }
}
