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

//! Staging store for blocks received from peers, drained by `Chain.sync`
//! (spec.md §4.4).

use std::collections::VecDeque;

use client_types::{Block, Hash};

#[derive(Default)]
pub struct BlockQueue {
    queued: VecDeque<Block>,
    known: std::collections::BTreeSet<Hash>,
}

impl BlockQueue {
    pub fn new() -> BlockQueue {
        BlockQueue::default()
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Stage a block received from a peer. Dropped silently if already
    /// staged (spec.md §7 error kind 4 handles invalid blocks the same way,
    /// at import time rather than here).
    pub fn push(&mut self, block: Block) {
        let hash = block.hash();
        if self.known.insert(hash) {
            self.queued.push_back(block);
        }
    }

    /// Drain up to `max` queued blocks, in arrival order, for
    /// `Chain.sync` to attempt importing.
    pub fn drain(&mut self, max: usize) -> Vec<Block> {
        let mut out = Vec::with_capacity(max.min(self.queued.len()));
        for _ in 0..max {
            match self.queued.pop_front() {
                Some(block) => {
                    self.known.remove(&block.hash());
                    out.push(block);
                }
                None => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_types::Header;

    fn block(number: u64) -> Block {
        Block {
            header: Header {
                parent_hash: Hash::zero(),
                state_root: Hash::zero(),
                timestamp: number,
                number,
                difficulty: Default::default(),
                bloom: Default::default(),
                nonce: 0,
            },
            transactions: Vec::new(),
        }
    }

    #[test]
    fn duplicate_block_is_ignored() {
        let mut q = BlockQueue::new();
        q.push(block(1));
        q.push(block(1));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn drain_respects_max_and_order() {
        let mut q = BlockQueue::new();
        q.push(block(1));
        q.push(block(2));
        q.push(block(3));
        let drained = q.drain(2);
        assert_eq!(drained.iter().map(|b| b.header.number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(q.len(), 1);
    }
}
