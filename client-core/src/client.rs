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

//! `Client` (spec.md §2, §4.1): the public surface composing the state
//! pair, transaction/block queues, filter registry, version gate and
//! external collaborators behind the `net-lock < client-lock < filter-lock`
//! ordering (spec.md §5).

use std::{
    path::Path,
    sync::Arc,
    thread,
};

use parking_lot::Mutex;

use client_io::{ClientIoMessage, IoChannel, IoChannelReceiver, WorkState, WorkStateCell};
use client_types::{
    Address, Block, BlockSelector, Filter, Hash, PastMessage, SignedTransaction, Transaction, U256,
};
use tx_pool::TransactionQueue;

use crate::{
    block_queue::BlockQueue,
    config::ClientConfig,
    error::EthcoreResult,
    external::{Chain, Compiler, Crypto, Network, StateDb},
    filter_registry::FilterRegistry,
    state::{self, State},
    version_gate::VersionChecker,
    worker,
};

/// Everything guarded by the coarse `client-lock` (spec.md §5): `pre`,
/// `post`, the `StateDB` handle, the transaction/block queues, and the
/// mining flags. `Chain` is guarded by its own lock (see `Client::chain_lock`)
/// since the sync phase must release `client-lock` around `Chain.sync`
/// while Chain access itself still needs to be exclusive.
pub(crate) struct ClientLockedState {
    pub(crate) pre: State,
    pub(crate) post: State,
    pub(crate) state_db: Box<dyn StateDb>,
    pub(crate) tx_queue: TransactionQueue,
    pub(crate) block_queue: BlockQueue,
    pub(crate) mining_on: bool,
    pub(crate) mining_restart: bool,
}

pub struct Client {
    pub(crate) config: ClientConfig,
    pub(crate) client_lock: Mutex<ClientLockedState>,
    pub(crate) chain_lock: Mutex<Box<dyn Chain>>,
    pub(crate) net_lock: Mutex<Option<Box<dyn Network>>>,
    pub(crate) filter_lock: Mutex<FilterRegistry>,
    crypto: Box<dyn Crypto>,
    #[allow(dead_code)]
    compiler: Box<dyn Compiler>,
    pub(crate) work_state: WorkStateCell,
    io_sender: IoChannel,
    pub(crate) io_receiver: IoChannelReceiver,
    worker_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Client {
    /// Open a `Client` (spec.md §3 Lifecycle): run the version gate,
    /// initialize `pre`/`post` from the chain head, and run one synchronous
    /// tick before returning. `Chain`/`StateDB` are handed in already open —
    /// this crate's reference collaborators (`external::InMemoryChain`,
    /// `external::InMemoryStateDb`) have no on-disk wipe mode to trigger, so
    /// a failed version gate here is logged rather than acted on; a real
    /// embedding would re-open both in wipe mode instead.
    pub fn new<P: AsRef<Path>>(
        config: ClientConfig,
        db_path: P,
        coinbase: Address,
        chain: Box<dyn Chain>,
        state_db: Box<dyn StateDb>,
        crypto: Box<dyn Crypto>,
        compiler: Box<dyn Compiler>,
    ) -> EthcoreResult<Arc<Client>> {
        let version_checker = VersionChecker::new(db_path);
        if crate::version_gate::VersionGateResult::ForceClean == version_checker.check() {
            log::warn!(target: "client", "version gate mismatch, database should be reopened clean");
        }
        version_checker.write_current()?;

        let head_number = chain.number();
        let head_hash = chain.best_hash();
        let pre = State::new(coinbase, head_number, head_hash, &*state_db);
        let post = pre.clone();

        let (io_sender, io_receiver) = IoChannel::new(64);

        let client = Client {
            client_lock: Mutex::new(ClientLockedState {
                pre,
                post,
                state_db,
                tx_queue: TransactionQueue::new(config.transaction_queue_size),
                block_queue: BlockQueue::new(),
                mining_on: false,
                mining_restart: false,
            }),
            chain_lock: Mutex::new(chain),
            net_lock: Mutex::new(None),
            filter_lock: Mutex::new(FilterRegistry::new()),
            crypto,
            compiler,
            work_state: WorkStateCell::default(),
            io_sender,
            io_receiver,
            worker_handle: Mutex::new(None),
            config,
        };

        worker::tick(&client, false);
        Ok(Arc::new(client))
    }

    /// Lazily spawn the background worker thread (spec.md §4.1: "the first
    /// call that needs work lazily spawns one thread").
    pub fn ensure_worker(self: &Arc<Self>) {
        let mut handle = self.worker_handle.lock();
        if handle.is_some() || self.work_state.load() != WorkState::Deleted {
            return;
        }
        let client = Arc::clone(self);
        *handle = Some(thread::spawn(move || worker::run(client)));
    }

    fn wake(&self) {
        self.io_sender.send(ClientIoMessage::NewTransactions);
    }

    /// Stop the background worker and wait for it to exit (spec.md §3
    /// Lifecycle, §5: `Active -> Deleting`, spin until `Deleted` is
    /// observed, then join). The worker keeps its own `Arc<Client>` clone
    /// alive for its whole run, so dropping the handle a caller got back
    /// from `Client::new` can never by itself bring the strong count to
    /// zero — this is the only way to actually ask it to stop. `Drop`
    /// below calls the same logic as a safety net for the ordinary case
    /// where the worker has already stopped itself.
    pub fn shutdown(&self) {
        if self.work_state.load() == WorkState::Deleted {
            return;
        }
        self.work_state.store(WorkState::Deleting);
        while self.work_state.load() != WorkState::Deleted {
            thread::sleep(std::time::Duration::from_millis(5));
        }
        if let Some(handle) = self.worker_handle.lock().take() {
            let _ = handle.join();
        }
    }

    // ---- transaction submission (spec.md §4.1) ----------------------------

    /// `transact(secret, value, dest, data, gas, gasPrice)`. The toy
    /// `Crypto` collaborator treats `secret` as the sender's address
    /// directly (see `external::ToyCrypto`), so `sender(secret) == *secret`
    /// here.
    pub fn transact(self: &Arc<Self>, secret: &Address, value: U256, dest: Address, data: Vec<u8>, gas: U256, gas_price: U256) -> Hash {
        self.submit(secret, value, client_types::Action::Call(dest), data, gas, gas_price).0
    }

    /// `transact(secret, endowment, init, gas, gasPrice)`, the contract
    /// creation variant. Returns the transaction id and the predicted
    /// contract address.
    pub fn transact_create(self: &Arc<Self>, secret: &Address, endowment: U256, init: Vec<u8>, gas: U256, gas_price: U256) -> (Hash, Address) {
        let (hash, recipient) = self.submit(secret, endowment, client_types::Action::Create, init, gas, gas_price);
        (hash, recipient.expect("Action::Create always predicts a recipient; qed"))
    }

    fn submit(
        self: &Arc<Self>,
        secret: &Address,
        value: U256,
        action: client_types::Action,
        data: Vec<u8>,
        gas: U256,
        gas_price: U256,
    ) -> (Hash, Option<Address>) {
        self.ensure_worker();
        let sender = *secret;
        let mut locked = self.client_lock.lock();
        // `post` does not see this submission until the next tick's sync
        // phase applies the queue (that is what drives the blooms behind
        // `NewPendingFilter`), so the local nonce cache is the queue's own
        // `last_nonce`, not `post`, to keep same-thread rapid submits
        // distinct (spec.md §5 "local nonce cache").
        let post_nonce = locked.post.transactions_from(&sender);
        let nonce = match locked.tx_queue.last_nonce(&sender) {
            Some(last) => post_nonce.max(last + U256::from(1)),
            None => post_nonce,
        };

        let predicted = match action {
            client_types::Action::Create => Some(state::predicted_contract_address(sender, nonce)),
            client_types::Action::Call(_) => None,
        };

        let unsigned = Transaction { nonce, value, gas_price, gas, action, data };
        let message = self.crypto.sha3(&rlp::encode(&unsigned));
        let signature = self.crypto.sign(&sender, message);
        let unsealed = SignedTransaction { unsigned, signature, sender, hash: Hash::zero() };
        let hash = self.crypto.sha3(&rlp::encode(&unsealed));
        let tx = SignedTransaction { hash, ..unsealed };

        match locked.tx_queue.insert(tx) {
            Ok(hash) => {
                drop(locked);
                self.wake();
                (hash, predicted)
            }
            Err(e) => {
                log::warn!(target: "client", "local transaction rejected: {}", e);
                (Hash::zero(), predicted)
            }
        }
    }

    /// `inject(rlp)` (spec.md §4.1, §4.3): attempt import of an
    /// already-serialized signed transaction. Fire-and-forget; failures are
    /// logged and swallowed (spec.md §7 kind 3).
    pub fn inject(self: &Arc<Self>, rlp_bytes: &[u8]) {
        self.ensure_worker();
        let mut locked = self.client_lock.lock();
        match locked.tx_queue.attempt_import(rlp_bytes, self.crypto.as_verifier()) {
            Ok(_) => {
                drop(locked);
                self.wake();
            }
            Err(e) => log::debug!(target: "client", "inject: rejected transaction: {}", e),
        }
    }

    /// `flushTransactions()` (spec.md §4.1): one synchronous tick with no
    /// mining.
    pub fn flush_transactions(&self) {
        worker::tick(self, true);
    }

    /// `clearPending()` (spec.md §4.1): drop `post`, reset it to `pre`, and
    /// fire `NewPendingFilter`.
    pub fn clear_pending(&self) {
        let mut locked = self.client_lock.lock();
        locked.post = locked.pre.clone();
        locked.mining_restart = true;
        drop(locked);

        let mut changed = std::collections::BTreeSet::new();
        changed.insert(client_types::NEW_PENDING_FILTER);
        let mut filters = self.filter_lock.lock();
        filters.note_changed(&changed);
    }

    // ---- mining (spec.md §4.1) --------------------------------------------

    pub fn start_mining(self: &Arc<Self>) {
        self.ensure_worker();
        let mut locked = self.client_lock.lock();
        locked.mining_on = true;
        locked.mining_restart = true;
    }

    pub fn stop_mining(&self) {
        self.client_lock.lock().mining_on = false;
    }

    pub fn is_mining(&self) -> bool {
        self.client_lock.lock().mining_on
    }

    // ---- network (spec.md §4.1, §6) ---------------------------------------

    pub fn start_network(self: &Arc<Self>, network: Box<dyn Network>) {
        self.ensure_worker();
        *self.net_lock.lock() = Some(network);
    }

    pub fn stop_network(&self) {
        *self.net_lock.lock() = None;
    }

    pub fn connect(&self, host: String, port: u16) {
        if let Some(network) = self.net_lock.lock().as_mut() {
            network.connect(host, port);
        }
    }

    pub fn peer_count(&self) -> usize {
        self.net_lock.lock().as_ref().map_or(0, |n| n.peer_count())
    }

    // ---- filters / watches (spec.md §4.5) ---------------------------------

    pub fn install_watch(&self, filter: Filter) -> u64 {
        self.filter_lock.lock().install_watch(filter)
    }

    pub fn install_watch_builtin(&self, sentinel: Hash) -> u64 {
        self.filter_lock.lock().install_builtin_watch(sentinel)
    }

    pub fn uninstall_watch(&self, id: u64) {
        self.filter_lock.lock().uninstall_watch(id);
    }

    pub fn check_watch(&self, id: u64) -> bool {
        self.filter_lock.lock().check_watch(id)
    }

    // ---- block-selector-parameterized reads (spec.md §4.1, §8 P8) --------

    fn with_state<T>(&self, selector: BlockSelector, f: impl FnOnce(&State) -> T) -> Option<T> {
        let locked = self.client_lock.lock();
        match selector {
            BlockSelector::Post => Some(f(&locked.post)),
            BlockSelector::Pre => Some(f(&locked.pre)),
            other => {
                let head = locked.pre.head_number();
                let target = other.number_of(head);
                if target == head {
                    Some(f(&locked.pre))
                } else {
                    // Not the confirmed head: replay `Chain`'s retained
                    // history up to `target` rather than answering from
                    // `pre`/`post` (spec.md §4.1 read semantics, P8).
                    let chain = self.chain_lock.lock();
                    let historical = State::at_block(locked.pre.coinbase(), &**chain, target);
                    drop(chain);
                    historical.map(|s| f(&s))
                }
            }
        }
    }

    pub fn balance_at(&self, selector: BlockSelector, address: &Address) -> Option<U256> {
        self.with_state(selector, |s| s.balance(address))
    }

    pub fn count_at(&self, selector: BlockSelector, address: &Address) -> Option<U256> {
        self.with_state(selector, |s| s.transactions_from(address))
    }

    pub fn state_at(&self, selector: BlockSelector, address: &Address, key: &U256) -> Option<U256> {
        self.with_state(selector, |s| s.storage(address, key))
    }

    pub fn code_at(&self, selector: BlockSelector, address: &Address) -> Option<Vec<u8>> {
        self.with_state(selector, |s| s.code(address))
    }

    pub fn addresses(&self, selector: BlockSelector) -> Option<Vec<Address>> {
        self.with_state(selector, |s| s.addresses())
    }

    /// `transactions(filter)` (spec.md §4.5): scan from
    /// `min(chain.number, filter.latest)` down to `filter.earliest`, tip's
    /// pending transactions first.
    pub fn transactions(&self, filter: &Filter) -> Vec<PastMessage> {
        let mut out = Vec::new();
        let mut skip_left = filter.skip;

        let locked = self.client_lock.lock();
        let chain = self.chain_lock.lock();
        let chain_number = chain.number();

        if filter.bounds_admit(chain_number + 1) {
            for (i, tx) in locked.post.pending().into_iter().enumerate() {
                if out.len() >= filter.max {
                    break;
                }
                let bloom = match locked.post.bloom(i) {
                    Some(b) => b,
                    None => continue,
                };
                if !filter.matches_bloom(&bloom) {
                    continue;
                }
                let manifest = match locked.post.changes_from_pending(i) {
                    Some(m) => m,
                    None => continue,
                };
                for message in filter.matches_manifest(manifest, tx.sender) {
                    if skip_left > 0 {
                        skip_left -= 1;
                        continue;
                    }
                    if out.len() >= filter.max {
                        break;
                    }
                    out.push(message.polish(Hash::zero(), 0, chain_number + 1));
                }
            }
        }

        let top = chain_number.min(filter.latest);
        let mut number = top;
        loop {
            if out.len() >= filter.max || number < filter.earliest {
                break;
            }
            if let Some(block) = chain.block_by_number(number) {
                self.scan_block(filter, &block, &mut skip_left, &mut out);
            }
            if number == 0 {
                break;
            }
            number -= 1;
        }

        out
    }

    fn scan_block(&self, filter: &Filter, block: &Block, skip_left: &mut usize, out: &mut Vec<PastMessage>) {
        if !filter.matches_bloom(&block.header.bloom) {
            return;
        }
        for tx in &block.transactions {
            if out.len() >= filter.max {
                return;
            }
            let (manifest, bloom) = state::manifest_for_transaction(tx);
            if !filter.matches_bloom(&bloom) {
                continue;
            }
            for message in filter.matches_manifest(&manifest, tx.sender) {
                if *skip_left > 0 {
                    *skip_left -= 1;
                    continue;
                }
                if out.len() >= filter.max {
                    return;
                }
                out.push(message.polish(block.hash(), block.header.timestamp, block.header.number));
            }
        }
    }
}

impl Drop for Client {
    /// Best-effort cleanup for callers who let every `Arc<Client>` (the
    /// worker's own included) drop without calling `shutdown` first. In
    /// that case the worker has already stopped itself and set `Deleted`
    /// before releasing its own clone, so this is a fast no-op; it only
    /// does real work if `shutdown` was never reached.
    fn drop(&mut self) {
        self.shutdown();
    }
}
