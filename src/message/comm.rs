//! The minimal distributed message-passing API (component B).
//!
//! Implementors only need `rank`, `size`, `send`, `recv`, and
//! `next_time_stamp`; the trait provides default implementations for the
//! higher-level scalar/buffer operations named in §4.7, built on those five
//! primitives, in the same spirit as the teacher's doc comment: "the trait
//! then provides default implementations for broadcast, reduce, and
//! reduce-all operations."

/// A point-to-point channel between ranks of two communicating parties.
/// One instance models one of §5's two channel kinds (primary-rank or
/// distributed); a participant holds one instance per remote peer (and,
/// for distributed channels, per mesh).
pub trait Communicator {
    /// This rank's index within its own group.
    fn rank(&self) -> usize;

    /// The number of ranks in the remote group this communicator talks to.
    fn size(&self) -> usize;

    /// Send raw bytes to the given remote rank. Tagged internally by the
    /// communicator's own notion of "time stamp" (§4 `coordinate`), so that
    /// messages belonging to different windows/phases don't cross.
    fn send(&self, rank: usize, message: Vec<u8>);

    /// Block until a message tagged with the current time stamp arrives
    /// from any peer.
    fn recv(&self) -> Vec<u8>;

    /// Advances this communicator's internal time stamp, so that messages
    /// sent under the new stamp are not confused with stale ones from a
    /// prior phase (mirrors the teacher's `coordinate()` end-of-round call).
    fn next_time_stamp(&mut self);

    /// §4.7: send one `f64` scalar.
    fn send_scalar(&self, rank: usize, value: f64) {
        self.send(rank, value.to_le_bytes().to_vec())
    }

    /// §4.7: receive one `f64` scalar.
    fn recv_scalar(&self) -> f64 {
        let bytes = self.recv();
        f64::from_le_bytes(bytes[0..8].try_into().unwrap())
    }

    /// §4.7: send one `bool` (used for the convergence verdict, §6).
    fn send_bool(&self, rank: usize, value: bool) {
        self.send(rank, vec![value as u8])
    }

    fn recv_bool(&self) -> bool {
        self.recv()[0] != 0
    }

    /// §4.7 / §6: send a contiguous `f64` buffer (mesh vertex or data
    /// payload). The mesh id and dimension are carried by the caller, not
    /// on the wire, since each distributed channel is already scoped to one
    /// mesh (§5).
    fn send_buffer(&self, rank: usize, values: &[f64]) {
        let mut bytes = Vec::with_capacity(values.len() * 8);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.send(rank, bytes)
    }

    fn recv_buffer(&self) -> Vec<f64> {
        let bytes = self.recv();
        bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    /// Broadcasts a buffer from `root` to every other rank; `root` calls
    /// this once to send, every other rank once to receive.
    fn broadcast_buffer(&self, root: usize, values: Option<&[f64]>) -> Vec<f64> {
        if self.rank() == root {
            let values = values.expect("broadcast root must supply values");
            for r in 0..self.size() {
                if r != root {
                    self.send_buffer(r, values);
                }
            }
            values.to_vec()
        } else {
            self.recv_buffer()
        }
    }
}
