//! A process-local event/trace scope service (§9: "event/trace registry
//! becomes a process-local service passed in at construction").
//!
//! Kept narrow: the core only needs to know that every scope it opens is
//! closed on every exit path, including the destructor-driven implicit
//! `finalize`. The default implementation logs scope entry/exit at `trace`
//! level; a configuration or test harness can swap in a no-op or a
//! recording implementation.

use log::trace;

/// A named, nested timing/trace scope. Implementations must make `close`
/// (or `Drop`) idempotent-safe to call from unwinding paths.
pub trait EventScope: Send {
    fn enter(&self, name: &str) -> Box<dyn ActiveScope>;
}

pub trait ActiveScope {
    fn close(&mut self);
}

/// Default scope service: logs enter/exit at `trace` level and does
/// nothing else. Adequate for a library that does not own its own metrics
/// pipeline (§1 non-goals exclude visualization/metrics surfaces, but
/// ambient logging is still carried per SPEC_FULL.md).
#[derive(Default)]
pub struct LoggingEventScope;

struct LoggingActiveScope {
    name: String,
    closed: bool,
}

impl EventScope for LoggingEventScope {
    fn enter(&self, name: &str) -> Box<dyn ActiveScope> {
        trace!("enter scope {}", name);
        Box::new(LoggingActiveScope {
            name: name.to_string(),
            closed: false,
        })
    }
}

impl ActiveScope for LoggingActiveScope {
    fn close(&mut self) {
        if !self.closed {
            trace!("exit scope {}", self.name);
            self.closed = true;
        }
    }
}

impl Drop for LoggingActiveScope {
    fn drop(&mut self) {
        self.close()
    }
}

/// A scope service that records nothing and does not log; useful in tests
/// where trace output would be noise.
#[derive(Default)]
pub struct NullEventScope;

struct NullActiveScope;

impl EventScope for NullEventScope {
    fn enter(&self, _name: &str) -> Box<dyn ActiveScope> {
        Box::new(NullActiveScope)
    }
}

impl ActiveScope for NullActiveScope {
    fn close(&mut self) {}
}
