//! MPI-backed `Communicator`, feature `mpi`.
//!
//! The teacher links a hand-written C shim compiled by `build.rs`; that
//! shim's `.c` source isn't present in this crate's reference material, and
//! the teacher's own `euler` demo already shows the idiomatic alternative:
//! the `mpi` crate (rsmpi bindings), which this module uses instead. See
//! DESIGN.md for the substitution note.
#![cfg(feature = "mpi")]

use super::comm::Communicator;
use mpi::topology::Communicator as MpiTopology;
use mpi::traits::*;
use std::cell::Cell;

pub struct MpiCommunicator<'w> {
    world: &'w mpi::topology::SimpleCommunicator,
    time_stamp: Cell<i32>,
}

impl<'w> MpiCommunicator<'w> {
    pub fn new(world: &'w mpi::topology::SimpleCommunicator) -> Self {
        Self {
            world,
            time_stamp: Cell::new(0),
        }
    }
}

impl<'w> Communicator for MpiCommunicator<'w> {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn send(&self, rank: usize, message: Vec<u8>) {
        let tag = self.time_stamp.get();
        self.world
            .process_at_rank(rank as i32)
            .send_with_tag(&message[..], tag);
    }

    fn recv(&self) -> Vec<u8> {
        let tag = self.time_stamp.get();
        let (message, _status) = self.world.any_process().matched_probe_with_tag(tag);
        message.matched_receive_vec().0
    }

    fn next_time_stamp(&mut self) {
        self.time_stamp.set(self.time_stamp.get() + 1);
    }
}
