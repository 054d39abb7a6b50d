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

//! `State` and the `pre`/`post` pair (spec.md §4.2). No EVM lives here
//! (spec.md §1 Non-goals): applying a transaction is the toy value-transfer
//! semantics sufficient to exercise the queue/filter/mining machinery this
//! crate is actually about. Every transaction produces a one-node
//! `Manifest` — there are no internal calls to record without a real
//! interpreter.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use client_types::{
    Account, Address, Block, Bloom, BloomInput, Hash, Header, Manifest, StateDiff, U256,
};
use tx_pool::TransactionQueue;

use crate::external::{Chain, StateDb};

/// One transaction applied into `post`, with everything the filter
/// subsystem needs about it (spec.md §4.2's `changesFromPending`/
/// `pendingDiff`/`bloom`).
#[derive(Clone)]
struct Applied {
    tx: client_types::SignedTransaction,
    manifest: Manifest,
    diff: StateDiff,
    bloom: Bloom,
}

/// Progress of an in-flight mining attempt, reset by `commit_to_mine`.
#[derive(Default, Clone, Copy)]
struct MiningProgress {
    hashes: u64,
    best: Option<U256>,
}

/// Toy value-transfer application shared by `State::apply_unchecked` and the
/// sync phase's replay of externally-received blocks against a `StateDb`
/// overlay (spec.md §1 Non-goals: no EVM, so every transaction is a plain
/// balance transfer to either the named recipient or, for a contract
/// creation, the predicted contract address).
/// Predicted contract address for a creation at `(sender, nonce)` (spec.md
/// §4.1: "low-160-bits of `hash(rlp(sender, nonce))`"). Shared by
/// `apply_unchecked`/`apply_block_to_overlay` (to credit the right account)
/// and by `Client::transact`'s contract-creation variant (to hand the
/// address back to the caller).
pub fn predicted_contract_address(sender: Address, nonce: U256) -> Address {
    let mut s = rlp::RlpStream::new_list(2);
    s.append(&sender);
    s.append(&nonce);
    let digest = keccak_hash::keccak(s.out());
    Address::from_slice(&digest.as_bytes()[12..])
}

fn recipient_of(tx: &client_types::SignedTransaction) -> Address {
    match tx.action() {
        client_types::Action::Call(addr) => *addr,
        client_types::Action::Create => predicted_contract_address(tx.sender, tx.nonce()),
    }
}

fn manifest_and_bloom(tx: &client_types::SignedTransaction, recipient: Address) -> (Manifest, Bloom) {
    let mut bloom = Bloom::default();
    bloom.accrue(BloomInput::Raw(tx.sender.as_bytes()));
    bloom.accrue(BloomInput::Raw(recipient.as_bytes()));
    (Manifest::leaf(tx.sender, recipient), bloom)
}

/// Replay a block's transactions directly against a `StateDb` (spec.md §4.1
/// sync phase: blocks arriving from peers are applied to the `StateDB`
/// overlay, not to `post`, since they are already final). Used for blocks
/// drained from the block queue; locally-mined blocks instead flow their
/// balances through `post`'s own account map as they're applied.
/// Synthesize the `(Manifest, Bloom)` pair for a committed transaction, the
/// same way `apply_unchecked` does for a pending one. The reference `Chain`
/// never records real execution traces (spec.md §1 Non-goals), so
/// `Client::transactions(filter)` rebuilds them on demand for historical
/// blocks rather than reading `Chain.traces`.
pub fn manifest_for_transaction(tx: &client_types::SignedTransaction) -> (Manifest, Bloom) {
    let recipient = recipient_of(tx);
    manifest_and_bloom(tx, recipient)
}

pub fn apply_block_to_overlay(block: &Block, overlay: &mut dyn StateDb) {
    for tx in &block.transactions {
        let recipient = recipient_of(tx);
        let fee = tx.gas_price() * tx.gas();
        let value = tx.value();

        let mut sender_acct = overlay.account(&tx.sender).unwrap_or_default();
        sender_acct.balance = sender_acct
            .balance
            .checked_sub(value)
            .and_then(|b| b.checked_sub(fee))
            .unwrap_or_default();
        sender_acct.nonce = sender_acct.nonce + U256::from(1);
        overlay.set_account(tx.sender, sender_acct);

        let mut recipient_acct = overlay.account(&recipient).unwrap_or_default();
        recipient_acct.balance += value;
        overlay.set_account(recipient, recipient_acct);
    }
}

/// Replay every block from genesis through `target` (inclusive) against a
/// bare account map. `StateDB` only ever holds the current head's accounts
/// (spec.md §3: "superset of every state root reachable from `Chain`", not
/// an archive of each one individually), so reconstructing a historical
/// block's state means re-deriving it from `Chain`'s retained block history
/// rather than reading it back out of `StateDB`.
fn replay_accounts_to(chain: &dyn Chain, number: u64) -> Option<BTreeMap<Address, Account>> {
    let mut accounts = BTreeMap::new();
    for n in 0..=number {
        let block = chain.block_by_number(n)?;
        for tx in &block.transactions {
            let recipient = recipient_of(tx);
            let fee = tx.gas_price() * tx.gas();
            let value = tx.value();

            let sender_acct = accounts.entry(tx.sender).or_insert_with(Account::default);
            sender_acct.balance = sender_acct
                .balance
                .checked_sub(value)
                .and_then(|b| b.checked_sub(fee))
                .unwrap_or_default();
            sender_acct.nonce = sender_acct.nonce + U256::from(1);

            let recipient_acct = accounts.entry(recipient).or_insert_with(Account::default);
            recipient_acct.balance += value;
        }
    }
    Some(accounts)
}

/// Result of a `State::mine` call (spec.md §4.1, §4.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct MineInfo {
    pub hashes: u64,
    pub best: Option<U256>,
    pub requirement: U256,
    pub completed: bool,
}

/// A logical `Address -> Account` mapping parameterized by a chain head
/// (spec.md §3), plus the log of pending transactions applied on top of it.
#[derive(Clone)]
pub struct State {
    coinbase: Address,
    head_number: u64,
    head_hash: Hash,
    accounts: BTreeMap<Address, Account>,
    applied: Vec<Applied>,
    candidate: Option<Header>,
    progress: MiningProgress,
}

/// Easy-but-nonzero proof-of-work target: top byte of the hash must be
/// zero. Real difficulty adjustment is consensus-engine territory and out
/// of scope (spec.md §1); this keeps `mine` fast enough for the 100ms
/// budget spec.md §4.1/§5 prescribes.
fn difficulty_requirement() -> U256 {
    U256::max_value() >> 8
}

impl State {
    pub fn new(coinbase: Address, head_number: u64, head_hash: Hash, state_db: &dyn StateDb) -> State {
        let accounts = state_db.accounts_snapshot().into_iter().collect();
        State {
            coinbase,
            head_number,
            head_hash,
            accounts,
            applied: Vec::new(),
            candidate: None,
            progress: MiningProgress::default(),
        }
    }

    /// Reconstruct the state as of block `number` (spec.md §4.1 read
    /// semantics, P8) by replaying `Chain`'s retained history from genesis.
    /// Returns `None` only if `number` is past `chain`'s own head (no block
    /// to replay up to).
    pub fn at_block(coinbase: Address, chain: &dyn Chain, number: u64) -> Option<State> {
        let block = chain.block_by_number(number)?;
        let accounts = replay_accounts_to(chain, number)?;
        Some(State {
            coinbase,
            head_number: number,
            head_hash: block.hash(),
            accounts,
            applied: Vec::new(),
            candidate: None,
            progress: MiningProgress::default(),
        })
    }

    pub fn head_number(&self) -> u64 {
        self.head_number
    }

    pub fn head_hash(&self) -> Hash {
        self.head_hash
    }

    pub fn balance(&self, address: &Address) -> U256 {
        self.accounts.get(address).map(|a| a.balance).unwrap_or_default()
    }

    pub fn storage(&self, address: &Address, key: &U256) -> U256 {
        self.accounts
            .get(address)
            .and_then(|a| a.storage.get(key))
            .copied()
            .unwrap_or_default()
    }

    pub fn code(&self, address: &Address) -> Vec<u8> {
        self.accounts.get(address).map(|a| a.code.clone()).unwrap_or_default()
    }

    pub fn address_has_code(&self, address: &Address) -> bool {
        self.accounts.get(address).map_or(false, Account::has_code)
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.accounts.keys().copied().collect()
    }

    /// Next nonce this sender would need (spec.md §4.1: `transact`'s
    /// `nonce = post.transactionsFrom(sender)`): the account's committed
    /// nonce plus however many pending transactions from this sender have
    /// already been staged into `post`.
    pub fn transactions_from(&self, address: &Address) -> U256 {
        let base = self.accounts.get(address).map(|a| a.nonce).unwrap_or_default();
        let pending = self.applied.iter().filter(|a| a.tx.sender == *address).count();
        base + U256::from(pending as u64)
    }

    pub fn pending(&self) -> Vec<&client_types::SignedTransaction> {
        self.applied.iter().map(|a| &a.tx).collect()
    }

    pub fn changes_from_pending(&self, i: usize) -> Option<&Manifest> {
        self.applied.get(i).map(|a| &a.manifest)
    }

    pub fn pending_diff(&self, i: usize) -> Option<&StateDiff> {
        self.applied.get(i).map(|a| &a.diff)
    }

    pub fn bloom(&self, i: usize) -> Option<Bloom> {
        self.applied.get(i).map(|a| a.bloom)
    }

    fn apply_unchecked(&mut self, tx: client_types::SignedTransaction) {
        self.accounts.entry(tx.sender).or_default();
        let fee = tx.gas_price() * tx.gas();
        let value = tx.value();
        let recipient = recipient_of(&tx);

        {
            let sender_acct = self.accounts.get_mut(&tx.sender).unwrap();
            sender_acct.balance = sender_acct
                .balance
                .checked_sub(value)
                .and_then(|b| b.checked_sub(fee))
                .unwrap_or_default();
            sender_acct.nonce = sender_acct.nonce + U256::from(1);
        }
        {
            let recipient_acct = self.accounts.entry(recipient).or_default();
            recipient_acct.balance += value;
        }

        let mut diff = StateDiff::default();
        diff.accounts.entry(tx.sender).or_default();
        diff.accounts.entry(recipient).or_default();

        let (manifest, bloom) = manifest_and_bloom(&tx, recipient);
        self.applied.push(Applied { tx, manifest, diff, bloom });
    }

    /// Full account record for `address`, if known. Used by the mine phase
    /// to commit `post`'s resulting balances into `StateDB` once a block it
    /// mined has been accepted by `Chain` (spec.md §3: "`StateDB` contents
    /// are a superset of every state root reachable from any block in
    /// `Chain`").
    pub fn account_snapshot(&self, address: &Address) -> Option<Account> {
        self.accounts.get(address).cloned()
    }

    /// `post.sync(txQueue)` (spec.md §4.1 sync phase, §4.3): apply every
    /// queued transaction not yet reflected in `post`, in sender/nonce
    /// order, and return the Bloom of each newly-applied one.
    pub fn sync_from_queue(&mut self, queue: &TransactionQueue) -> Vec<Bloom> {
        let already: std::collections::BTreeSet<Hash> = self.applied.iter().map(|a| a.tx.hash).collect();
        let mut new_blooms = Vec::new();
        for tx in queue.pending() {
            if already.contains(&tx.hash) {
                continue;
            }
            self.apply_unchecked(tx.clone());
            new_blooms.push(self.applied.last().unwrap().bloom);
        }
        new_blooms
    }

    /// `pre.sync(Chain)` (spec.md §4.1 sync phase): rebuild from the chain
    /// head if it has moved since this `State` was built. Returns whether
    /// it changed.
    pub fn sync_from_chain(&mut self, chain: &dyn Chain, state_db: &dyn StateDb) -> bool {
        if chain.best_hash() == self.head_hash {
            return false;
        }
        self.head_hash = chain.best_hash();
        self.head_number = chain.number();
        self.accounts = state_db.accounts_snapshot().into_iter().collect();
        self.applied.clear();
        self.candidate = None;
        self.progress = MiningProgress::default();
        true
    }

    /// Reset mining progress and stage a candidate block atop `chain`'s
    /// head (spec.md §4.1 mine phase).
    pub fn commit_to_mine(&mut self, chain: &dyn Chain) {
        self.progress = MiningProgress::default();
        self.candidate = Some(Header {
            parent_hash: chain.best_hash(),
            state_root: Hash::zero(),
            timestamp: self.head_number,
            number: chain.number() + 1,
            difficulty: difficulty_requirement(),
            bloom: self.aggregate_bloom(),
            nonce: 0,
        });
    }

    fn aggregate_bloom(&self) -> Bloom {
        let mut b = Bloom::default();
        for applied in &self.applied {
            b.accrue_bloom(&applied.bloom);
        }
        b
    }

    /// `amIJustParanoid(Chain)` (spec.md §4.1): re-verify the candidate's
    /// parent still matches the chain's actual head before committing to
    /// mine it.
    pub fn am_i_just_paranoid(&self, chain: &dyn Chain) -> bool {
        match &self.candidate {
            Some(header) => header.parent_hash == chain.best_hash(),
            // Nothing staged yet to be paranoid about.
            None => true,
        }
    }

    /// `post.mine(budget_ms)` (spec.md §4.1, §4.2): search for a nonce
    /// under the given wall-clock budget.
    pub fn mine(&mut self, budget_ms: u64) -> MineInfo {
        let requirement = difficulty_requirement();
        let header = match &mut self.candidate {
            Some(h) => h,
            None => {
                return MineInfo { hashes: 0, best: self.progress.best, requirement, completed: false };
            }
        };

        let deadline = Instant::now() + Duration::from_millis(budget_ms);
        let pow_hash = header.pow_hash();
        let mut completed = false;

        while Instant::now() < deadline {
            self.progress.hashes += 1;
            let mut input = Vec::with_capacity(40);
            input.extend_from_slice(pow_hash.as_bytes());
            input.extend_from_slice(&header.nonce.to_be_bytes());
            let digest = keccak_hash::keccak(&input);
            let value = U256::from_big_endian(digest.as_bytes());

            if self.progress.best.map_or(true, |b| value < b) {
                self.progress.best = Some(value);
            }
            if value <= requirement {
                completed = true;
                break;
            }
            header.nonce += 1;
        }

        MineInfo { hashes: self.progress.hashes, best: self.progress.best, requirement, completed }
    }

    /// `post.completeMine()` (spec.md §4.1, §4.2).
    pub fn complete_mine(&mut self) -> Option<Block> {
        let header = self.candidate.take()?;
        let transactions = self.applied.iter().map(|a| a.tx.clone()).collect();
        Some(Block { header, transactions })
    }

    /// `post.blockData()` — the candidate as it currently stands, without
    /// consuming it.
    pub fn block_data(&self) -> Option<Block> {
        self.candidate.clone().map(|header| Block {
            header,
            transactions: self.applied.iter().map(|a| a.tx.clone()).collect(),
        })
    }

    pub fn info(&self) -> StateInfo {
        StateInfo { head_number: self.head_number, account_count: self.accounts.len(), pending_count: self.applied.len() }
    }

    pub fn coinbase(&self) -> Address {
        self.coinbase
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StateInfo {
    pub head_number: u64,
    pub account_count: usize,
    pub pending_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::InMemoryStateDb;
    use client_types::{Action, Signature, Transaction};

    fn signed(sender: Address, nonce: u64, value: u64, to: Address) -> client_types::SignedTransaction {
        client_types::SignedTransaction {
            unsigned: Transaction {
                nonce: U256::from(nonce),
                value: U256::from(value),
                gas_price: U256::from(1),
                gas: U256::from(0),
                action: Action::Call(to),
                data: Vec::new(),
            },
            signature: Signature { v: 27, r: Hash::zero(), s: Hash::zero() },
            sender,
            hash: Hash::from_low_u64_be(nonce + 1000 * sender.to_low_u64_be()),
        }
    }

    #[test]
    fn applying_a_transfer_moves_balance() {
        let a1 = Address::from_low_u64_be(1);
        let a2 = Address::from_low_u64_be(2);
        let mut db = InMemoryStateDb::default();
        db.set_account(a1, Account { balance: U256::from(100), ..Account::default() });

        let mut post = State::new(a1, 0, Hash::zero(), &db);
        let mut q = TransactionQueue::new(16);
        q.insert(signed(a1, 0, 10, a2)).unwrap();

        post.sync_from_queue(&q);
        assert_eq!(post.balance(&a2), U256::from(10));
        assert_eq!(post.balance(&a1), U256::from(90));
        assert_eq!(post.transactions_from(&a1), U256::from(1));
    }

    #[test]
    fn mine_eventually_completes_within_budget() {
        let a1 = Address::from_low_u64_be(1);
        let db = InMemoryStateDb::default();
        let mut post = State::new(a1, 0, Hash::zero(), &db);
        let chain = crate::external::InMemoryChain::new(Block {
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
        });
        post.commit_to_mine(&chain);
        let info = post.mine(500);
        assert!(info.completed, "expected to find a nonce within the budget");
    }
}
