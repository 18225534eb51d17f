//! Per-call journal (§4.6/§4.7). Every contract invocation pushes a
//! [`Frame`] before running; the frame buffers undo closures, balance
//! deltas, newly created contract addresses, and emitted events. A frame
//! either commits into its parent (or, at the root, into the surfaces the
//! caller ultimately observes) or reverts, running its undo closures in
//! reverse registration order and discarding everything else it buffered.

use crate::event::Event;
use crate::RuntimeError;
use blockchain_crypto::Address;
use std::collections::HashSet;

pub struct Frame {
    undo: Vec<Box<dyn FnOnce() + Send>>,
    registered: HashSet<usize>,
    balance_buffer: Vec<(Address, i128)>,
    created_contracts: Vec<Address>,
    events: Vec<Event>,
    read_only: bool,
}

impl Frame {
    fn new(read_only: bool) -> Self {
        Self {
            undo: Vec::new(),
            registered: HashSet::new(),
            balance_buffer: Vec::new(),
            created_contracts: Vec::new(),
            events: Vec::new(),
            read_only,
        }
    }
}

/// Tracks the frame stack for one top-level call plus the set of
/// contract addresses currently active in the call chain, for reentrancy
/// rejection (§4.7: "a contract may not re-enter itself, directly or
/// through another contract, while one of its calls is on the stack").
pub struct CallLogger {
    frames: Vec<Frame>,
    active: HashSet<Address>,
    read_only_depth: usize,
}

impl CallLogger {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            active: HashSet::new(),
            read_only_depth: 0,
        }
    }

    pub fn push_frame(&mut self, read_only: bool) {
        if read_only {
            self.read_only_depth += 1;
        }
        self.frames.push(Frame::new(read_only));
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Marks `address` as active for the duration of the call about to run
    /// in the current frame. Returns an error if it is already on the
    /// chain (reentrancy).
    pub fn enter_contract(&mut self, address: Address) -> Result<(), RuntimeError> {
        if !self.active.insert(address) {
            return Err(RuntimeError::Reentrancy(address.to_hex()));
        }
        Ok(())
    }

    pub fn exit_contract(&mut self, address: &Address) {
        self.active.remove(address);
    }

    pub fn check_writable(&self) -> Result<(), RuntimeError> {
        if self.read_only_depth > 0 {
            return Err(RuntimeError::ReadOnlyViolation);
        }
        Ok(())
    }

    /// Registers `identity` as touched in the current frame if it has not
    /// been already; returns `true` exactly when the caller should capture
    /// and push an undo closure.
    pub fn register_if_new(&mut self, identity: usize) -> bool {
        self.frames
            .last_mut()
            .expect("register_if_new called with no active frame")
            .registered
            .insert(identity)
    }

    pub fn push_undo(&mut self, undo: Box<dyn FnOnce() + Send>) {
        self.frames
            .last_mut()
            .expect("push_undo called with no active frame")
            .undo
            .push(undo);
    }

    pub fn buffer_balance_delta(&mut self, address: Address, delta: i128) {
        self.frames
            .last_mut()
            .expect("buffer_balance_delta called with no active frame")
            .balance_buffer
            .push((address, delta));
    }

    pub fn record_created_contract(&mut self, address: Address) {
        self.frames
            .last_mut()
            .expect("record_created_contract called with no active frame")
            .created_contracts
            .push(address);
    }

    pub fn emit(&mut self, event: Event) {
        self.frames
            .last_mut()
            .expect("emit called with no active frame")
            .events
            .push(event);
    }

    /// Merge the top frame into its parent. At the root, the merged
    /// contents (balance deltas, created contracts, events) are returned
    /// to the caller for application to the ledger/registry.
    pub fn commit_frame(&mut self) -> Option<CommittedFrame> {
        let frame = self.frames.pop().expect("commit_frame called with no active frame");
        if frame.read_only {
            self.read_only_depth = self.read_only_depth.saturating_sub(1);
        }
        if let Some(parent) = self.frames.last_mut() {
            parent.registered.extend(frame.registered);
            parent.undo.extend(frame.undo);
            parent.balance_buffer.extend(frame.balance_buffer);
            parent.created_contracts.extend(frame.created_contracts);
            parent.events.extend(frame.events);
            None
        } else {
            Some(CommittedFrame {
                balance_buffer: frame.balance_buffer,
                created_contracts: frame.created_contracts,
                events: frame.events,
            })
        }
    }

    /// Convenience for tests / single-frame callers that don't need the
    /// root-commit payload.
    pub fn commit(&mut self) {
        self.commit_frame();
    }

    /// Undo every mutation this frame recorded, in reverse order, then
    /// drop the frame and everything it buffered.
    pub fn revert_frame(&mut self) {
        let frame = self.frames.pop().expect("revert_frame called with no active frame");
        if frame.read_only {
            self.read_only_depth = self.read_only_depth.saturating_sub(1);
        }
        for undo in frame.undo.into_iter().rev() {
            undo();
        }
    }

    /// Alias kept for call sites that talk in terms of "abort this call".
    pub fn revert(&mut self) {
        self.revert_frame();
    }
}

impl Default for CallLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// What the root frame hands back once fully committed: everything the
/// rest of the system (ledger, contract registry, event log) needs to
/// apply.
pub struct CommittedFrame {
    pub balance_buffer: Vec<(Address, i128)>,
    pub created_contracts: Vec<Address>,
    pub events: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrancy_is_rejected() {
        let mut logger = CallLogger::new();
        let addr = Address::from_bytes([9u8; 20]);
        logger.enter_contract(addr).unwrap();
        assert_eq!(logger.enter_contract(addr), Err(RuntimeError::Reentrancy(addr.to_hex())));
        logger.exit_contract(&addr);
        assert!(logger.enter_contract(addr).is_ok());
    }

    #[test]
    fn nested_commit_merges_into_parent_and_root_returns_payload() {
        let mut logger = CallLogger::new();
        logger.push_frame(false);
        logger.push_frame(false);
        logger.buffer_balance_delta(Address::from_bytes([1u8; 20]), 5);
        assert!(logger.commit_frame().is_none()); // inner merges into outer
        let root = logger.commit_frame().unwrap();
        assert_eq!(root.balance_buffer, vec![(Address::from_bytes([1u8; 20]), 5)]);
    }

    #[test]
    fn revert_drops_buffered_events_without_running_them() {
        let mut logger = CallLogger::new();
        logger.push_frame(false);
        logger.emit(Event::new(
            "Transfer",
            Address::from_bytes([2u8; 20]),
            vec![],
            vec![],
            blockchain_crypto::Hash::zero(),
            0,
            1,
            0,
        ));
        logger.revert_frame();
        logger.push_frame(false);
        let root = logger.commit_frame().unwrap();
        assert!(root.events.is_empty());
    }

    #[test]
    fn read_only_frame_rejects_writes_until_popped() {
        let mut logger = CallLogger::new();
        logger.push_frame(true);
        assert_eq!(logger.check_writable(), Err(RuntimeError::ReadOnlyViolation));
        logger.revert_frame();
        assert!(logger.check_writable().is_ok());
    }
}
