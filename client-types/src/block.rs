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

//! Block header and block types.

use crate::{ids::BlockNumber, transaction::SignedTransaction};
use ethereum_types::{Bloom, H256, U256};

/// Block header. Carries everything the client's import and sync machinery
/// needs, per spec.md §3; field list intentionally stops short of full
/// consensus-rule fields (uncles hash, extra data, etc.) since those belong
/// to the EVM/consensus engine, out of scope here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub parent_hash: H256,
    pub state_root: H256,
    pub timestamp: u64,
    pub number: BlockNumber,
    pub difficulty: U256,
    /// Bloom summarizing the addresses/storage touched by this block.
    pub bloom: Bloom,
    /// Proof-of-work nonce found by `State::mine`.
    pub nonce: u64,
}

impl Header {
    pub fn hash(&self) -> H256 {
        use keccak_hash::keccak;
        use rlp::RlpStream;

        let mut s = RlpStream::new_list(7);
        s.append(&self.parent_hash);
        s.append(&self.state_root);
        s.append(&self.timestamp);
        s.append(&self.number);
        s.append(&self.difficulty);
        s.append(&self.bloom);
        s.append(&self.nonce);
        keccak(s.out())
    }

    /// Hash of everything but `nonce` — the value a miner searches for a
    /// nonce against.
    pub fn pow_hash(&self) -> H256 {
        use keccak_hash::keccak;
        use rlp::RlpStream;

        let mut s = RlpStream::new_list(6);
        s.append(&self.parent_hash);
        s.append(&self.state_root);
        s.append(&self.timestamp);
        s.append(&self.number);
        s.append(&self.difficulty);
        s.append(&self.bloom);
        keccak(s.out())
    }
}

/// A full block: header plus the transactions it includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<SignedTransaction>,
}

impl Block {
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }
}
