// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of OpenEthereum.

// OpenEthereum is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// OpenEthereum is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with OpenEthereum.  If not, see <http://www.gnu.org/licenses/>.

//! Worker lifecycle primitives: the `WorkState` atomic (spec.md §3, §5) and
//! a tiny io wake channel used to notify the worker of queued work without
//! waiting out its idle sleep.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of the background worker thread (spec.md §3): `Deleted` is
/// both the initial and final state; `Active` while ticking;
/// `Deleting` once the destructor has asked the worker to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkState {
    Deleted = 0,
    Active = 1,
    Deleting = 2,
}

impl WorkState {
    fn from_u8(v: u8) -> WorkState {
        match v {
            0 => WorkState::Deleted,
            1 => WorkState::Active,
            2 => WorkState::Deleting,
            _ => unreachable!("WorkState only ever stores 0..=2"),
        }
    }
}

/// Atomic cell holding a `WorkState`. Transitions are release-stored and
/// acquire-loaded so the destructor reliably observes `Deleted` once the
/// worker thread has actually exited its loop (spec.md §5).
pub struct WorkStateCell(AtomicU8);

impl WorkStateCell {
    pub fn new(initial: WorkState) -> WorkStateCell {
        WorkStateCell(AtomicU8::new(initial as u8))
    }

    pub fn load(&self) -> WorkState {
        WorkState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: WorkState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for WorkStateCell {
    fn default() -> WorkStateCell {
        WorkStateCell::new(WorkState::Deleted)
    }
}

/// Messages that can wake the worker out of its idle sleep ahead of the
/// 100ms mining/idle budget (spec.md §5, suspension point (i)).
#[derive(Debug, Clone)]
pub enum ClientIoMessage {
    /// New transactions were queued by a caller; worth an immediate tick.
    NewTransactions,
    /// A new block arrived from the network.
    NewBlock,
}

/// Thin wrapper over a bounded channel, mirroring `ethcore_io::IoChannel`'s
/// role in the teacher: off-loading a wake-up signal to the worker thread
/// without blocking the caller if the channel is full.
#[derive(Clone)]
pub struct IoChannel {
    sender: crossbeam_channel::Sender<ClientIoMessage>,
}

pub struct IoChannelReceiver {
    receiver: crossbeam_channel::Receiver<ClientIoMessage>,
}

impl IoChannel {
    pub fn new(capacity: usize) -> (IoChannel, IoChannelReceiver) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (IoChannel { sender }, IoChannelReceiver { receiver })
    }

    pub fn send(&self, message: ClientIoMessage) {
        if self.sender.try_send(message).is_err() {
            log::debug!(target: "client_io", "io channel full, dropping wake message");
        }
    }
}

impl IoChannelReceiver {
    pub fn try_recv(&self) -> Option<ClientIoMessage> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_deleted() {
        let cell = WorkStateCell::default();
        assert_eq!(cell.load(), WorkState::Deleted);
    }

    #[test]
    fn transitions_round_trip() {
        let cell = WorkStateCell::new(WorkState::Deleted);
        cell.store(WorkState::Active);
        assert_eq!(cell.load(), WorkState::Active);
        cell.store(WorkState::Deleting);
        assert_eq!(cell.load(), WorkState::Deleting);
        cell.store(WorkState::Deleted);
        assert_eq!(cell.load(), WorkState::Deleted);
    }

    #[test]
    fn channel_delivers_message() {
        let (tx, rx) = IoChannel::new(4);
        tx.send(ClientIoMessage::NewTransactions);
        match rx.try_recv() {
            Some(ClientIoMessage::NewTransactions) => {}
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
