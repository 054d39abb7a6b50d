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

//! `tick(justQueue)` (spec.md §4.1) and the background worker thread that
//! drives it. Grounded on `crates/ethcore/src/client/importer.rs`'s
//! lock-acquire/release shape: a phase takes what it needs, releases around
//! anything that can block on I/O, and logs rather than propagates.

use std::{
    collections::BTreeSet,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use client_io::WorkState;
use client_types::{Hash, NEW_BLOCK_FILTER, NEW_PENDING_FILTER};

use crate::client::Client;

/// `tick(justQueue)`: network phase, mine phase, sync phase, each under the
/// lock ordering `net-lock < client-lock < filter-lock` (spec.md §5).
pub(crate) fn tick(client: &Client, just_queue: bool) {
    let mut changed: BTreeSet<Hash> = BTreeSet::new();

    if !just_queue {
        network_phase(client);
        mine_phase(client, &mut changed);
    }
    sync_phase(client, &mut changed);

    if !changed.is_empty() {
        let mut filters = client.filter_lock.lock();
        filters.note_changed(&changed);
    }
}

/// Phase 1 (spec.md §4.1): `Network.process()` then `Network.sync(txQueue)`,
/// under `net-lock` only. The only place `Network` is touched.
fn network_phase(client: &Client) {
    let mut net = client.net_lock.lock();
    if let Some(network) = net.as_mut() {
        network.process();
        let mut locked = client.client_lock.lock();
        network.sync(&mut locked.tx_queue, &mut locked.block_queue);
    }
}

/// Phase 2 (spec.md §4.1): restart/paranoid-check the candidate, mine for
/// one budget, and import a completed block.
fn mine_phase(client: &Client, changed: &mut BTreeSet<Hash>) {
    let mut locked = client.client_lock.lock();

    if locked.mining_on && client.config.paranoid_mining {
        let chain = client.chain_lock.lock();
        if !locked.post.am_i_just_paranoid(&**chain) {
            log::warn!(target: "miner", "post state failed paranoid verification against chain, disabling mining");
            locked.mining_on = false;
        }
    }

    if locked.mining_on && locked.mining_restart {
        locked.mining_restart = false;
        let chain = client.chain_lock.lock();
        locked.post.commit_to_mine(&**chain);
    }

    if !locked.mining_on {
        thread::sleep(Duration::from_millis(client.config.mining_budget_ms));
        return;
    }

    let info = locked.post.mine(client.config.mining_budget_ms);
    log::trace!(target: "miner", "mine: {} hashes, best {:?}, requirement {}", info.hashes, info.best, info.requirement);
    if !info.completed {
        return;
    }

    let block = match locked.post.complete_mine() {
        Some(block) => block,
        None => return,
    };

    let mut chain = client.chain_lock.lock();
    let imported = chain.attempt_import(block.clone());
    drop(chain);

    if imported.is_empty() {
        log::warn!(target: "block_import", "mined block {} was rejected on import", block.header.number);
        return;
    }

    // Commit `post`'s resulting balances into `StateDB` (spec.md §3:
    // `StateDB` is a superset of every state root reachable from `Chain`).
    for address in locked.post.addresses() {
        if let Some(account) = locked.post.account_snapshot(&address) {
            locked.state_db.set_account(address, account);
        }
    }

    let filters = client.filter_lock.lock();
    filters.append_from_new_block(&block, changed);
    drop(filters);
    changed.insert(NEW_BLOCK_FILTER);
}

/// Phase 3 (spec.md §4.1): drain `BlockQueue` into `Chain`/`StateDB`
/// (releasing `client-lock` around the import), then rebuild `pre`/`post`
/// if the head moved, then replay queued transactions into `post`.
fn sync_phase(client: &Client, changed: &mut BTreeSet<Hash>) {
    let mut locked = client.client_lock.lock();
    let mut overlay = locked.state_db.snapshot();
    drop(locked);

    // Pull one block at a time, re-checking the deadline before each pop, so
    // anything left queued when the budget runs out stays in `block_queue`
    // for the next tick instead of being drained and then discarded.
    let mut imported_blocks = Vec::new();
    let deadline = Instant::now() + Duration::from_millis(client.config.mining_budget_ms);
    loop {
        if Instant::now() >= deadline {
            log::debug!(target: "block_import", "sync budget exhausted, remaining blocks wait for next tick");
            break;
        }
        let block = {
            let mut locked = client.client_lock.lock();
            match locked.block_queue.drain(1).pop() {
                Some(block) => block,
                None => break,
            }
        };
        let hashes = {
            let mut chain = client.chain_lock.lock();
            chain.attempt_import(block.clone())
        };
        if hashes.is_empty() {
            log::debug!(target: "block_import", "dropped unimportable block {}", block.header.number);
            continue;
        }
        crate::state::apply_block_to_overlay(&block, &mut *overlay);
        imported_blocks.push(block);
    }

    let mut locked = client.client_lock.lock();
    if !imported_blocks.is_empty() {
        locked.state_db.commit(overlay);
        let filters = client.filter_lock.lock();
        for block in &imported_blocks {
            filters.append_from_new_block(block, changed);
        }
        drop(filters);
        changed.insert(NEW_BLOCK_FILTER);
    }

    let chain = client.chain_lock.lock();
    let head_changed = locked.pre.sync_from_chain(&**chain, &*locked.state_db);
    let coinbase_drifted = locked.post.coinbase() != locked.pre.coinbase();
    drop(chain);

    if head_changed || coinbase_drifted {
        locked.mining_restart = true;
        locked.post = locked.pre.clone();
        changed.insert(NEW_PENDING_FILTER);
    }

    let head_number = locked.post.head_number() + 1;
    let blooms = locked.post.sync_from_queue(&locked.tx_queue);
    if !blooms.is_empty() {
        let filters = client.filter_lock.lock();
        for bloom in &blooms {
            filters.append_from_new_pending(head_number, bloom, changed);
        }
        drop(filters);
        changed.insert(NEW_PENDING_FILTER);
        locked.mining_restart = true;
    }
}

/// Background worker body (spec.md §4.1): `state <- Active; while state !=
/// Deleting: tick(false); state <- Deleted; pre <- resync(pre, Chain); post
/// <- pre`. Spawned lazily by the first `Client` operation that needs the
/// worker running.
pub(crate) fn run(client: Arc<Client>) {
    client.work_state.store(WorkState::Active);
    log::debug!(target: "client", "worker thread starting");

    while client.work_state.load() != WorkState::Deleting {
        tick(&client, false);
        // Drain any wake notifications queued while we were busy; their
        // only purpose is to avoid waiting out the idle sleep, so the
        // values themselves are not inspected.
        while client.io_receiver.try_recv().is_some() {}
    }

    let mut locked = client.client_lock.lock();
    let chain = client.chain_lock.lock();
    locked.pre.sync_from_chain(&**chain, &*locked.state_db);
    drop(chain);
    locked.post = locked.pre.clone();
    drop(locked);

    client.work_state.store(WorkState::Deleted);
    log::debug!(target: "client", "worker thread stopped");
}
