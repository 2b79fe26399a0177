//! Request/response transport contract between the engines and a memory device.
//!
//! Each direction uses a valid/accept handshake. Before a step, the system
//! samples a [`PortStatus`] from the transport; the engines decide which
//! requests to present and a handshake fires when a request is presented
//! while the matching side is ready. The fired handshakes are handed back as
//! [`PortActions`] and applied by [`Transport::step`].
//!
//! Read responses must come back in request order. The engines cannot detect
//! a transport that reorders them.

use crate::pattern::DataWord;

/// A write request presented on the write direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteRequest {
    /// Transport address.
    pub address: u32,
    /// Data word to store.
    pub data: DataWord,
}

/// Handshake inputs sampled from the transport at the start of a step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortStatus {
    /// The write direction would accept a request this step.
    pub write_ready: bool,
    /// The read direction would accept a request this step.
    pub read_ready: bool,
    /// Head of the read response stream, if one is available.
    pub response: Option<DataWord>,
}

/// Handshakes that fired during a step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortActions {
    /// Write request accepted this step.
    pub write: Option<WriteRequest>,
    /// Read request accepted this step.
    pub read: Option<u32>,
    /// The head read response was consumed this step.
    pub take_response: bool,
}

impl PortActions {
    /// Merges the write side of `self` with the read side of `other`.
    ///
    /// Used when one component drives writes and another drives reads.
    pub fn merge(self, other: PortActions) -> PortActions {
        PortActions {
            write: self.write.or(other.write),
            read: self.read.or(other.read),
            take_response: self.take_response || other.take_response,
        }
    }
}

/// A memory device reachable through independent write and read directions.
pub trait Transport {
    /// Returns the handshake inputs for the coming step.
    ///
    /// Must not change until [`step`](Transport::step) is called.
    fn status(&self) -> PortStatus;

    /// Applies the handshakes that fired and advances the device by one step.
    ///
    /// A request in `actions` is only present if the matching ready flag was
    /// set in the last [`status`](Transport::status); likewise
    /// `take_response` implies a response was available.
    fn step(&mut self, actions: &PortActions);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn status(&self) -> PortStatus {
        (**self).status()
    }

    fn step(&mut self, actions: &PortActions) {
        (**self).step(actions)
    }
}
