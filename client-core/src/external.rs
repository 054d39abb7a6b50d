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

//! The external collaborators (spec.md §6): `Chain`, `StateDB`, `Network`,
//! `Crypto`, `Compiler`. Each is a trait here; each ships one in-memory
//! reference implementation, the Rust-native analogue of `ethcore`'s own
//! `test_client::TestBlockChainClient` — a fake good enough to drive a real
//! `Client` in tests and in the demonstration binary without a real
//! database or network.

use std::collections::BTreeMap;

use client_types::{Account, Block, Bloom, Hash, Manifest};
use tx_pool::VerifyTransaction;

use crate::block_queue::BlockQueue;

/// Opaque store of blocks (spec.md §6).
pub trait Chain: Send + Sync {
    fn number(&self) -> u64;
    fn best_hash(&self) -> Hash;
    fn block(&self, hash: &Hash) -> Option<Block>;
    fn block_by_number(&self, number: u64) -> Option<Block>;
    fn bloom(&self, hash: &Hash) -> Option<Bloom>;
    fn traces(&self, hash: &Hash) -> Option<Vec<Manifest>>;

    /// Import one already-mined block. Returns the hash(es) actually
    /// accepted (a reorg may import more than the tip).
    fn attempt_import(&mut self, block: Block) -> Vec<Hash>;
}

/// Overlay key-value store backing `State` (spec.md §6). `snapshot`/
/// `commit` give the worker the lock-free sync-phase dance of spec.md §4.1:
/// snapshot under the lock, sync against the snapshot lock-free, commit
/// back under the lock.
pub trait StateDb: Send + Sync {
    fn account(&self, address: &client_types::Address) -> Option<Account>;
    fn set_account(&mut self, address: client_types::Address, account: Account);
    fn snapshot(&self) -> Box<dyn StateDb>;
    fn commit(&mut self, overlay: Box<dyn StateDb>);
    /// Every account the overlay holds, so `commit` can merge a boxed
    /// overlay back in without reaching for `Any`/downcasting.
    fn accounts_snapshot(&self) -> Vec<(client_types::Address, Account)>;
}

/// Peer-to-peer networking (spec.md §6). `sync` is the two-way exchange
/// spec.md §4.1 phase 1 describes — `Network.sync(txQueue, blockQueue)`,
/// ported verbatim from `original_source`'s `m_net->sync(m_tq, m_bq)` — so a
/// real implementation both broadcasts/receives transactions and stages
/// blocks it receives from peers into `blocks` for `Chain.sync` to drain.
/// The reference `NullNetwork` never has any peers; it exists so `Client`
/// can be constructed and ticked with networking "on" without a real socket
/// layer.
pub trait Network: Send + Sync {
    fn process(&mut self);
    fn sync(&mut self, transactions: &mut tx_pool::TransactionQueue, blocks: &mut BlockQueue);
    fn connect(&mut self, host: String, port: u16);
    fn peer_count(&self) -> usize;
}

/// Hashing and signature recovery (spec.md §6). `keccak256`/RLP addressing
/// live at the type level in `client-types`; this trait covers the
/// signature half, which genuinely is pluggable (production ECDSA vs. this
/// crate's toy scheme).
pub trait Crypto: VerifyTransaction {
    fn sha3(&self, data: &[u8]) -> Hash;
    fn sign(&self, secret: &client_types::Address, message: Hash) -> client_types::Signature;
    /// Upcast to the narrower `VerifyTransaction` seam `tx-pool::attempt_import`
    /// takes, since trait-object upcasting to a supertrait is not implicit.
    fn as_verifier(&self) -> &dyn VerifyTransaction;
}

/// Contract-language compiler (spec.md §6). Explicitly out of scope in
/// meaning; the trait exists only so the boundary is typed.
pub trait Compiler: Send + Sync {
    fn compile_lll(&self, source: &str, optimize: bool) -> Vec<u8>;
}

/// A canonical chain of committed blocks, kept in memory.
pub struct InMemoryChain {
    blocks: Vec<Block>,
    by_hash: BTreeMap<Hash, usize>,
}

impl InMemoryChain {
    pub fn new(genesis: Block) -> InMemoryChain {
        let hash = genesis.hash();
        let mut by_hash = BTreeMap::new();
        by_hash.insert(hash, 0);
        InMemoryChain { blocks: vec![genesis], by_hash }
    }
}

impl Chain for InMemoryChain {
    fn number(&self) -> u64 {
        self.blocks.last().map(|b| b.header.number).unwrap_or(0)
    }

    fn best_hash(&self) -> Hash {
        self.blocks.last().map(|b| b.hash()).unwrap_or_else(Hash::zero)
    }

    fn block(&self, hash: &Hash) -> Option<Block> {
        self.by_hash.get(hash).map(|&i| self.blocks[i].clone())
    }

    fn block_by_number(&self, number: u64) -> Option<Block> {
        self.blocks.iter().find(|b| b.header.number == number).cloned()
    }

    fn bloom(&self, hash: &Hash) -> Option<Bloom> {
        self.block(hash).map(|b| b.header.bloom)
    }

    fn traces(&self, _hash: &Hash) -> Option<Vec<Manifest>> {
        // No EVM execution in this crate (spec.md §1 Non-goals): a real
        // chain would replay the block to recover manifests; this fake has
        // none to offer.
        None
    }

    fn attempt_import(&mut self, block: Block) -> Vec<Hash> {
        let parent_known = self.by_hash.contains_key(&block.header.parent_hash);
        if !parent_known && block.header.number != 0 {
            log::debug!(target: "chain", "rejecting block {} with unknown parent", block.header.number);
            return Vec::new();
        }
        let hash = block.hash();
        if self.by_hash.contains_key(&hash) {
            return Vec::new();
        }
        self.by_hash.insert(hash, self.blocks.len());
        self.blocks.push(block);
        vec![hash]
    }
}

#[derive(Default, Clone)]
pub struct InMemoryStateDb {
    accounts: BTreeMap<client_types::Address, Account>,
}

impl StateDb for InMemoryStateDb {
    fn account(&self, address: &client_types::Address) -> Option<Account> {
        self.accounts.get(address).cloned()
    }

    fn set_account(&mut self, address: client_types::Address, account: Account) {
        self.accounts.insert(address, account);
    }

    fn snapshot(&self) -> Box<dyn StateDb> {
        Box::new(self.clone())
    }

    fn commit(&mut self, overlay: Box<dyn StateDb>) {
        // `overlay` was produced by `snapshot`, i.e. a boxed clone of this
        // same concrete type; merge it back in through the narrow
        // `accounts_snapshot` read surface rather than downcasting.
        for (address, account) in overlay.accounts_snapshot() {
            self.accounts.insert(address, account);
        }
    }

    fn accounts_snapshot(&self) -> Vec<(client_types::Address, Account)> {
        self.accounts.iter().map(|(a, acc)| (*a, acc.clone())).collect()
    }
}

pub struct NullNetwork;

impl Network for NullNetwork {
    fn process(&mut self) {}
    fn sync(&mut self, _transactions: &mut tx_pool::TransactionQueue, _blocks: &mut BlockQueue) {}
    fn connect(&mut self, host: String, port: u16) {
        log::warn!(target: "network", "NullNetwork cannot connect to {}:{}", host, port);
    }
    fn peer_count(&self) -> usize {
        0
    }
}

/// A scripted stand-in for a real peer connection: blocks and serialized
/// transactions queued via `push_block`/`push_transaction` are handed over
/// the next time `Client` ticks and calls `sync`, the same way a real
/// `Network` would surface gossip it received from peers. Exists to drive
/// the "blocks arrive from peers" half of spec.md §4.1/§8 scenario 5 in
/// tests without standing up a real wire protocol.
#[derive(Default)]
pub struct ScriptedNetwork {
    incoming_blocks: std::collections::VecDeque<Block>,
    incoming_transactions: std::collections::VecDeque<Vec<u8>>,
}

impl ScriptedNetwork {
    pub fn new() -> ScriptedNetwork {
        ScriptedNetwork::default()
    }

    pub fn push_block(&mut self, block: Block) {
        self.incoming_blocks.push_back(block);
    }

    pub fn push_transaction(&mut self, rlp_bytes: Vec<u8>) {
        self.incoming_transactions.push_back(rlp_bytes);
    }
}

impl Network for ScriptedNetwork {
    fn process(&mut self) {}

    fn sync(&mut self, transactions: &mut tx_pool::TransactionQueue, blocks: &mut BlockQueue) {
        while let Some(block) = self.incoming_blocks.pop_front() {
            blocks.push(block);
        }
        while let Some(rlp_bytes) = self.incoming_transactions.pop_front() {
            // Mirrors `Client::inject`: a peer-sourced transaction still has
            // to pass signature/structural verification before staging.
            if transactions.attempt_import(&rlp_bytes, &ToyCrypto).is_err() {
                log::debug!(target: "network", "scripted peer transaction rejected on import");
            }
        }
    }

    fn connect(&mut self, _host: String, _port: u16) {}

    fn peer_count(&self) -> usize {
        1
    }
}

/// A deterministic, non-cryptographic stand-in for real ECDSA (spec.md §6
/// explicitly leaves signature cryptography external; production signature
/// stacks are out of scope per SPEC_FULL §9). The "signature" over a
/// message for secret `s` is simply `(v=27, r=address(s), s=message)`, and
/// `recover` reads the sender straight back out of `r`. This is sufficient
/// to drive `attempt_import`/`transact` in tests without pulling in a real
/// signing library the spec deliberately excludes.
pub struct ToyCrypto;

impl ToyCrypto {
    fn address_to_r(secret: &client_types::Address) -> client_types::Hash {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(secret.as_bytes());
        client_types::Hash::from(bytes)
    }

    fn r_to_address(r: &client_types::Hash) -> client_types::Address {
        client_types::Address::from_slice(&r.as_bytes()[12..])
    }
}

impl Crypto for ToyCrypto {
    fn sha3(&self, data: &[u8]) -> Hash {
        keccak_hash::keccak(data)
    }

    fn sign(&self, secret: &client_types::Address, message: Hash) -> client_types::Signature {
        client_types::Signature { v: 27, r: Self::address_to_r(secret), s: message }
    }

    fn as_verifier(&self) -> &dyn VerifyTransaction {
        self
    }
}

impl VerifyTransaction for ToyCrypto {
    fn recover(&self, _message: Hash, signature: &client_types::Signature) -> Option<client_types::Address> {
        Some(Self::r_to_address(&signature.r))
    }
}

pub struct NullCompiler;

impl Compiler for NullCompiler {
    fn compile_lll(&self, source: &str, _optimize: bool) -> Vec<u8> {
        source.as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_types::Header;

    fn genesis() -> Block {
        Block {
            header: Header {
                parent_hash: Hash::zero(),
                state_root: Hash::zero(),
                timestamp: 0,
                number: 0,
                difficulty: Default::default(),
                bloom: Bloom::default(),
                nonce: 0,
            },
            transactions: Vec::new(),
        }
    }

    #[test]
    fn toy_crypto_round_trips_sender() {
        let crypto = ToyCrypto;
        let secret = client_types::Address::from_low_u64_be(42);
        let message = crypto.sha3(b"hello");
        let signature = crypto.sign(&secret, message);
        assert_eq!(crypto.recover(message, &signature), Some(secret));
    }

    #[test]
    fn in_memory_chain_rejects_unknown_parent() {
        let mut chain = InMemoryChain::new(genesis());
        let mut bad = genesis();
        bad.header.parent_hash = Hash::from_low_u64_be(0xdead);
        bad.header.number = 1;
        assert!(chain.attempt_import(bad).is_empty());
        assert_eq!(chain.number(), 0);
    }
}
