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

//! Account/state diff and call-manifest types used by the filter subsystem.

use std::collections::{BTreeMap, BTreeSet};

use ethereum_types::{Address, Bloom, BloomInput, H256, U256};
use parity_bytes::Bytes;

/// An account as held in `StateDB`: balance, nonce, code, and storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: U256,
    pub code: Bytes,
    pub storage: BTreeMap<U256, U256>,
}

impl Account {
    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }
}

/// Per-account changes produced by applying one transaction, keyed the way
/// `original_source`'s `StateDiff` is: account address to the set of storage
/// keys it wrote. Used only by the filter match algorithm (spec.md §4.5) to
/// test `altered`/`stateAltered` constraints against a specific pending
/// transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    pub accounts: BTreeMap<Address, BTreeSet<U256>>,
}

impl StateDiff {
    pub fn touches(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn touches_slot(&self, address: &Address, slot: &U256) -> bool {
        self.accounts
            .get(address)
            .map_or(false, |slots| slots.contains(slot))
    }
}

/// Tree structure produced when a transaction executes: one node per call
/// frame, each recording the addresses/storage it altered directly (not
/// transitively — that's what the `internal` children are for). Mirrors
/// `original_source`'s `Manifest` exactly; the EVM execution that would
/// populate `altered`/`internal` for a live transaction is out of scope
/// (spec.md §1), so this type is constructed directly by tests and by the
/// in-memory reference `Chain`/`StateDb`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub from: Address,
    pub to: Address,
    pub input: Bytes,
    pub output: Bytes,
    /// Storage slots this call frame altered directly.
    pub altered: BTreeSet<U256>,
    pub internal: Vec<Manifest>,
}

impl Manifest {
    pub fn leaf(from: Address, to: Address) -> Manifest {
        Manifest {
            from,
            to,
            input: Bytes::new(),
            output: Bytes::new(),
            altered: BTreeSet::new(),
            internal: Vec::new(),
        }
    }

    /// Bloom summarizing every address and altered storage slot across this
    /// whole subtree, used as the Bloom pre-filter (spec.md §4.5).
    pub fn bloom(&self) -> Bloom {
        let mut b = Bloom::default();
        self.accrue_bloom(&mut b);
        b
    }

    fn accrue_bloom(&self, b: &mut Bloom) {
        b.accrue(BloomInput::Raw(self.from.as_bytes()));
        b.accrue(BloomInput::Raw(self.to.as_bytes()));
        for slot in &self.altered {
            let slot_bytes: H256 = (*slot).into();
            b.accrue(BloomInput::Raw(slot_bytes.as_bytes()));
        }
        for child in &self.internal {
            child.accrue_bloom(b);
        }
    }
}

/// A flattened manifest node, stamped with its position in the chain once
/// it has been located — the output type of `Client::transactions(filter)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastMessage {
    /// Hash of the containing block; zero for pending transactions.
    pub block: H256,
    /// Block number; `chain.number + 1` for pending transactions.
    pub number: u64,
    pub timestamp: u64,
    /// Pre-order path within the transaction's manifest tree.
    pub path: Vec<usize>,
    pub from: Address,
    pub to: Address,
    /// Sender of the whole transaction (not necessarily this call frame).
    pub origin: Address,
    pub input: Bytes,
    pub output: Bytes,
}

impl PastMessage {
    /// Stamp an in-progress match with its final chain position, mirroring
    /// `original_source`'s `PastMessage::polish`.
    pub fn polish(mut self, block: H256, timestamp: u64, number: u64) -> PastMessage {
        self.block = block;
        self.timestamp = timestamp;
        self.number = number;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_bloom_includes_nested_altered_slots() {
        let a = Address::from_low_u64_be(1);
        let b = Address::from_low_u64_be(2);
        let mut child = Manifest::leaf(b, a);
        child.altered.insert(U256::from(7));
        let mut root = Manifest::leaf(a, b);
        root.internal.push(child);

        let bloom = root.bloom();
        let slot: H256 = U256::from(7).into();
        assert!(bloom.contains_input(BloomInput::Raw(slot.as_bytes())));
        assert!(bloom.contains_input(BloomInput::Raw(a.as_bytes())));
        assert!(bloom.contains_input(BloomInput::Raw(b.as_bytes())));
    }
}
