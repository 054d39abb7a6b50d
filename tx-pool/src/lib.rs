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

//! The at-most-once transaction staging store (spec.md §4.3). Deduplicates
//! by transaction id (hash of the signed RLP), keeps per-sender entries
//! ordered by nonce for `post`-state replay, and never mutates an entry in
//! place — a transaction is immutable once accepted, matching spec.md §3.

pub mod decode;
pub mod error;

use std::collections::{BTreeMap, HashMap};

use client_types::SignedTransaction;
use ethereum_types::{Address, H256, U256};

pub use error::Error;

/// Recovers the sender of a transaction from its signature. Implemented by
/// whatever `Crypto` collaborator the embedding `client-core` crate wires
/// up; kept as a narrow trait here so this crate does not depend back on
/// `client-core` (spec.md §6 keeps `Crypto` an external collaborator).
pub trait VerifyTransaction {
    fn recover(&self, message: H256, signature: &client_types::Signature) -> Option<Address>;
}

/// Default queue capacity, mirroring `crates/transaction-pool`'s own
/// bounded-pool default rather than an unbounded `Vec`.
pub const DEFAULT_MAX_SIZE: usize = 8_192;

#[derive(Default)]
pub struct TransactionQueue {
    by_hash: HashMap<H256, SignedTransaction>,
    by_sender: BTreeMap<Address, BTreeMap<U256, H256>>,
    max_size: usize,
}

impl TransactionQueue {
    pub fn new(max_size: usize) -> TransactionQueue {
        TransactionQueue { by_hash: HashMap::new(), by_sender: BTreeMap::new(), max_size }
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn contains(&self, hash: &H256) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn get(&self, hash: &H256) -> Option<&SignedTransaction> {
        self.by_hash.get(hash)
    }

    /// Insert an already-decoded, already-verified transaction. Used by
    /// tests and by `Network.sync` peer exchange, which hands over
    /// transactions whose signatures the peer protocol already checked.
    pub fn insert(&mut self, tx: SignedTransaction) -> Result<H256, Error> {
        if self.by_hash.contains_key(&tx.hash) {
            return Err(Error::AlreadyKnown);
        }
        if self.by_hash.len() >= self.max_size {
            return Err(Error::Full);
        }
        let hash = tx.hash;
        self.by_sender.entry(tx.sender).or_insert_with(BTreeMap::new).insert(tx.nonce(), hash);
        self.by_hash.insert(hash, tx);
        Ok(hash)
    }

    /// `attemptImport(rlp)` (spec.md §4.3): parse, recover the sender via
    /// `verifier`, and insert if unseen. Structural or signature failures
    /// are returned to the caller, who (per spec.md §7 kind 3) is expected
    /// to log and swallow them rather than propagate further.
    pub fn attempt_import(&mut self, rlp_bytes: &[u8], verifier: &dyn VerifyTransaction) -> Result<H256, Error> {
        let (unsigned, signature, tx_id) = decode::decode_unverified(rlp_bytes)?;
        let message = keccak_hash::keccak(rlp::encode(&unsigned));
        let sender = verifier.recover(message, &signature).ok_or(Error::InvalidSignature)?;
        let tx = decode::finish(unsigned, signature, sender, tx_id);
        self.insert(tx)
    }

    pub fn remove(&mut self, hash: &H256) -> Option<SignedTransaction> {
        let tx = self.by_hash.remove(hash)?;
        if let Some(by_nonce) = self.by_sender.get_mut(&tx.sender) {
            by_nonce.remove(&tx.nonce());
            if by_nonce.is_empty() {
                self.by_sender.remove(&tx.sender);
            }
        }
        Some(tx)
    }

    /// The highest nonce currently queued for this sender, if any. Callers
    /// wanting the next nonce a new transaction would need without leaving
    /// a gap add one to this (spec.md §5's "local nonce cache").
    pub fn last_nonce(&self, sender: &Address) -> Option<U256> {
        self.by_sender.get(sender).and_then(|m| m.keys().next_back().copied())
    }

    /// Every queued transaction, senders and nonces ascending — the order
    /// `post.sync(txQueue)` replays them in (spec.md §4.1 sync phase).
    pub fn pending(&self) -> Vec<&SignedTransaction> {
        self.by_sender
            .values()
            .flat_map(|by_nonce| by_nonce.values())
            .filter_map(|hash| self.by_hash.get(hash))
            .collect()
    }

    pub fn clear(&mut self) {
        self.by_hash.clear();
        self.by_sender.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_types::{Action, Signature, Transaction};

    fn tx(sender: Address, nonce: u64, hash: u64) -> SignedTransaction {
        SignedTransaction {
            unsigned: Transaction {
                nonce: U256::from(nonce),
                value: U256::zero(),
                gas_price: U256::from(1),
                gas: U256::from(21_000),
                action: Action::Create,
                data: Vec::new(),
            },
            signature: Signature { v: 27, r: H256::zero(), s: H256::zero() },
            sender,
            hash: H256::from_low_u64_be(hash),
        }
    }

    #[test]
    fn duplicate_hash_is_rejected() {
        let mut q = TransactionQueue::new(DEFAULT_MAX_SIZE);
        let sender = Address::from_low_u64_be(1);
        q.insert(tx(sender, 0, 1)).unwrap();
        assert!(matches!(q.insert(tx(sender, 1, 1)), Err(Error::AlreadyKnown)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn pending_is_ordered_by_sender_then_nonce() {
        let mut q = TransactionQueue::new(DEFAULT_MAX_SIZE);
        let a = Address::from_low_u64_be(1);
        let b = Address::from_low_u64_be(2);
        q.insert(tx(a, 1, 10)).unwrap();
        q.insert(tx(a, 0, 11)).unwrap();
        q.insert(tx(b, 0, 12)).unwrap();

        let order: Vec<u64> = q.pending().iter().map(|t| t.nonce().as_u64()).collect();
        assert_eq!(order, vec![0, 1, 0]);
    }

    #[test]
    fn full_queue_rejects_new_entries() {
        let mut q = TransactionQueue::new(1);
        q.insert(tx(Address::from_low_u64_be(1), 0, 1)).unwrap();
        assert!(matches!(q.insert(tx(Address::from_low_u64_be(2), 0, 2)), Err(Error::Full)));
    }

    #[test]
    fn last_nonce_is_the_highest_queued_not_one_past_it() {
        let mut q = TransactionQueue::new(DEFAULT_MAX_SIZE);
        let a = Address::from_low_u64_be(1);
        assert_eq!(q.last_nonce(&a), None);
        q.insert(tx(a, 0, 1)).unwrap();
        q.insert(tx(a, 2, 2)).unwrap();
        assert_eq!(q.last_nonce(&a), Some(U256::from(2)));
    }

    #[test]
    fn remove_drops_empty_sender_bucket() {
        let mut q = TransactionQueue::new(DEFAULT_MAX_SIZE);
        let a = Address::from_low_u64_be(1);
        q.insert(tx(a, 0, 1)).unwrap();
        assert!(q.remove(&H256::from_low_u64_be(1)).is_some());
        assert!(q.by_sender.is_empty());
    }

    struct AlwaysRecovers(Address);
    impl VerifyTransaction for AlwaysRecovers {
        fn recover(&self, _message: H256, _signature: &Signature) -> Option<Address> {
            Some(self.0)
        }
    }

    #[test]
    fn attempt_import_decodes_and_recovers_sender() {
        let mut q = TransactionQueue::new(DEFAULT_MAX_SIZE);
        let unsigned = Transaction {
            nonce: U256::from(3),
            value: U256::from(10),
            gas_price: U256::from(1),
            gas: U256::from(21_000),
            action: Action::Create,
            data: Vec::new(),
        };
        let signature = Signature { v: 27, r: H256::zero(), s: H256::zero() };
        let signed = SignedTransaction {
            unsigned: unsigned.clone(),
            signature: signature.clone(),
            sender: Address::zero(),
            hash: H256::zero(),
        };
        let bytes = rlp::encode(&signed);
        let sender = Address::from_low_u64_be(99);
        let hash = q.attempt_import(&bytes, &AlwaysRecovers(sender)).unwrap();
        assert_eq!(q.get(&hash).unwrap().sender, sender);
    }
}
