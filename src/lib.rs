//! Orchestration core for partitioned multi-physics coupling.
//!
//! This crate owns the parts of a coupled-simulation run that are
//! independent of any particular mesh, numerical, or transport library: the
//! public solver-facing API ([`solver_interface`]), the coupling schemes
//! that sequence two or more participants through a time window
//! ([`scheme`]), mesh decomposition ([`partition`]), data exchange and
//! extrapolation history ([`coupling_data`]), fixed-point acceleration
//! ([`acceleration`]), field mapping between non-matching meshes
//! ([`mapping`]), time-window waveform sampling ([`waveform`]), and the
//! message-passing abstraction the rest of the crate is built on
//! ([`message`]).
//!
//! Everything here is decoupled from a specific physics solver: a caller
//! links this crate, constructs a [`solver_interface::SolverInterface`] from
//! a parsed [`config::Configuration`] and a [`message::Communicator`], and
//! drives it through `initialize` / `advance` / `finalize`.

pub mod acceleration;
pub mod config;
pub mod coupling_data;
pub mod data;
pub mod error;
pub mod event;
pub mod geometry;
pub mod iteration_log;
pub mod mapping;
pub mod mesh;
pub mod message;
pub mod num_vec;
pub mod partition;
pub mod scheme;
pub mod solver_interface;
pub mod waveform;

pub use error::{CoreError, Result};
