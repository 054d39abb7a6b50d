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

//! End-to-end scenarios from spec.md §8, driven against the real `Client`
//! with the in-memory reference collaborators (no real database, network or
//! EVM). Mirrors how `ethcore` keeps its whole-`Client` tests in a dedicated
//! integration crate behind the in-memory `test_client` fakes.

use std::sync::Arc;

use client_core::{
    external::{InMemoryChain, InMemoryStateDb, NullCompiler, ScriptedNetwork, ToyCrypto},
    Client, ClientConfig,
};
use client_types::{Address, Bloom, Filter, Header, Hash, NEW_PENDING_FILTER, U256};

fn genesis() -> client_types::Block {
    client_types::Block {
        header: Header {
            parent_hash: Hash::zero(),
            state_root: Hash::zero(),
            timestamp: 0,
            number: 0,
            difficulty: U256::zero(),
            bloom: Bloom::default(),
            nonce: 0,
        },
        transactions: Vec::new(),
    }
}

fn new_client(coinbase: Address, tempdir: &tempdir::TempDir) -> Arc<Client> {
    Client::new(
        ClientConfig::default(),
        tempdir.path(),
        coinbase,
        Box::new(InMemoryChain::new(genesis())),
        Box::new(InMemoryStateDb::default()),
        Box::new(ToyCrypto),
        Box::new(NullCompiler),
    )
    .expect("construction runs one synchronous tick and must not fail")
}

/// Scenario 1: empty start.
#[test]
fn empty_start_has_genesis_state_and_no_pending() {
    let dir = tempdir::TempDir::new("client-core-empty-start").unwrap();
    let coinbase = Address::from_low_u64_be(1);
    let client = new_client(coinbase, &dir);

    assert_eq!(client.addresses(client_types::BlockSelector::Pre).unwrap().len(), 0);
    assert_eq!(client.addresses(client_types::BlockSelector::Post).unwrap().len(), 0);
    assert!(client.transactions(&Filter::default()).is_empty());
}

/// Scenario 2: local transaction round-trip, before any mining.
#[test]
fn local_transaction_is_reflected_in_post_before_mining() {
    let dir = tempdir::TempDir::new("client-core-tx-roundtrip").unwrap();
    let a1 = Address::from_low_u64_be(1);
    let a2 = Address::from_low_u64_be(2);
    let client = new_client(a1, &dir);

    // Crediting a1 with a starting balance would require a mined block;
    // this scenario instead probes what §8 scenario 2 actually asks for —
    // nonce bookkeeping and recipient crediting — with a zero-gas-price
    // transfer so `checked_sub` never underflows the sender's balance.
    let pre_nonce = client.count_at(client_types::BlockSelector::Pre, &a1).unwrap();
    let hash = client.transact(&a1, U256::from(10), a2, Vec::new(), U256::from(21_000), U256::from(0));
    assert_ne!(hash, Hash::zero());

    // `post` only sees a submission once a tick's sync phase applies the
    // queue (spec.md §4.1); a local submit reflects same-thread nonce
    // visibility through the queue itself, not by pre-applying to `post`.
    client.flush_transactions();

    let post_nonce = client.count_at(client_types::BlockSelector::Post, &a1).unwrap();
    assert_eq!(post_nonce, pre_nonce + U256::from(1));
    assert_eq!(client.balance_at(client_types::BlockSelector::Post, &a2).unwrap(), U256::from(10));
}

/// Scenario 3: filter lifecycle.
#[test]
fn filter_lifecycle_checks_and_clears() {
    let dir = tempdir::TempDir::new("client-core-filter-lifecycle").unwrap();
    let a1 = Address::from_low_u64_be(1);
    let a2 = Address::from_low_u64_be(2);
    let client = new_client(a1, &dir);

    let mut filter = Filter::default();
    filter.from.insert(a1);
    let id = client.install_watch(filter);

    client.transact(&a1, U256::from(1), a2, Vec::new(), U256::from(21_000), U256::from(0));
    client.flush_transactions();

    assert!(client.check_watch(id));
    assert!(!client.check_watch(id));

    client.uninstall_watch(id);
}

/// Scenario 4: duplicate filter refcount.
#[test]
fn duplicate_filter_installs_share_one_registry_entry() {
    let dir = tempdir::TempDir::new("client-core-dup-filter").unwrap();
    let a1 = Address::from_low_u64_be(1);
    let client = new_client(a1, &dir);

    let mut filter = Filter::default();
    filter.from.insert(a1);
    let w1 = client.install_watch(filter.clone());
    let w2 = client.install_watch(filter);

    client.uninstall_watch(w1);
    client.uninstall_watch(w2);
    // Nothing public exposes registry size directly on `Client`; absence of
    // a panic on double-uninstall and `check_watch` returning false for both
    // stale ids is the externally-observable half of P4.
    assert!(!client.check_watch(w1));
    assert!(!client.check_watch(w2));
}

/// Scenario 6: clean shutdown.
#[test]
fn worker_shuts_down_without_deadlock() {
    let dir = tempdir::TempDir::new("client-core-shutdown").unwrap();
    let a1 = Address::from_low_u64_be(1);
    let client = new_client(a1, &dir);

    client.ensure_worker();
    client.start_mining();
    assert!(client.is_mining());

    // `shutdown` is the only thing that can actually stop the worker: it
    // keeps its own `Arc<Client>` clone alive for its whole run, so a plain
    // `drop(client)` here would only release this test's handle and leave
    // the worker (and its clone) running forever.
    client.shutdown();
    drop(client);
}

/// P3 (watch liveness): a `NewPendingFilter` watch fires when the pending
/// set changes.
#[test]
fn new_pending_filter_fires_on_pending_change() {
    let dir = tempdir::TempDir::new("client-core-new-pending").unwrap();
    let a1 = Address::from_low_u64_be(1);
    let a2 = Address::from_low_u64_be(2);
    let client = new_client(a1, &dir);

    let id = client.install_watch_builtin(NEW_PENDING_FILTER);
    client.transact(&a1, U256::from(1), a2, Vec::new(), U256::from(21_000), U256::from(0));
    client.flush_transactions();

    assert!(client.check_watch(id));
}

/// Scenario 5: a block arriving from the network advances `Chain` out from
/// under a pending local transaction. The worker's sync phase must notice
/// the head moved, reset `post` back to `pre`, and fire `NewPendingFilter`
/// — exercised end-to-end through `ScriptedNetwork`, the stand-in for a
/// real peer connection (spec.md §4.1 phase 1, §8 scenario 5).
#[test]
fn chain_advance_from_network_resets_post_and_notifies_pending_watchers() {
    let dir = tempdir::TempDir::new("client-core-chain-advance").unwrap();
    let a1 = Address::from_low_u64_be(1);
    let a2 = Address::from_low_u64_be(2);
    let client = new_client(a1, &dir);

    let id = client.install_watch_builtin(NEW_PENDING_FILTER);
    client.transact(&a1, U256::from(1), a2, Vec::new(), U256::from(21_000), U256::from(0));
    client.flush_transactions();
    assert_eq!(client.count_at(client_types::BlockSelector::Post, &a1).unwrap(), U256::from(1));
    // The flush above is itself a pending-set change (the local submit is
    // only now applied into `post`), so it fires this same watch; drain
    // that here so the poll below observes only the network-triggered one.
    assert!(client.check_watch(id));

    let genesis_hash = genesis().header.hash();
    let incoming = client_types::Block {
        header: Header {
            parent_hash: genesis_hash,
            state_root: Hash::zero(),
            timestamp: 1,
            number: 1,
            difficulty: U256::zero(),
            bloom: Bloom::default(),
            nonce: 0,
        },
        transactions: Vec::new(),
    };
    let mut network = ScriptedNetwork::new();
    network.push_block(incoming);
    client.start_network(Box::new(network));

    // The background worker ticks roughly every 100ms (spec.md §5); poll
    // with a generous timeout instead of assuming a fixed number of ticks.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while std::time::Instant::now() < deadline && !client.check_watch(id) {
        std::thread::sleep(std::time::Duration::from_millis(20));
    }

    assert_eq!(client.count_at(client_types::BlockSelector::Pre, &a1).unwrap(), U256::zero());
    assert_eq!(client.count_at(client_types::BlockSelector::Post, &a1).unwrap(), U256::zero());
    client.shutdown();
}
