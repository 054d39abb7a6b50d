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

//! Unique identifiers.

use ethereum_types::H256;

pub type BlockNumber = u64;

/// Uniquely identifies a block.
#[derive(Debug, PartialEq, Copy, Clone, Hash, Eq)]
pub enum BlockId {
    /// Block's hash.
    Hash(H256),
    /// Block number within the canon chain.
    Number(BlockNumber),
    /// Earliest block (genesis).
    Earliest,
    /// Latest imported block.
    Latest,
}

/// Uniquely identifies a transaction.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub enum TransactionId {
    /// Transaction hash.
    Hash(H256),
    /// Block id and transaction index within that block.
    Location(BlockId, usize),
}

/// The `int`-encoded block selector used by the read operations of §4.1 and
/// by the filter's `earliest`/`latest` bounds. Mirrors the `numberOf`/`asOf`
/// encoding of the original `Client`: `0` selects the post-mine (pending)
/// state, `-1` selects the pre-mine (confirmed head) state, positive values
/// are absolute block numbers, negative values below `-1` count back from
/// the chain head, and the sentinel `Genesis` always resolves to block 0.
#[derive(Debug, PartialEq, Copy, Clone, Hash, Eq)]
pub enum BlockSelector {
    /// `0` — post-mine (pending) state.
    Post,
    /// `-1` — pre-mine (confirmed head) state.
    Pre,
    /// Positive `n` — state at block number `n`.
    Number(BlockNumber),
    /// Negative `-k`, `k > 1` — state at block `head + 1 - k`.
    AgeFromHead(u64),
    /// Sentinel that always resolves to block 0.
    Genesis,
}

impl BlockSelector {
    /// Decode the raw signed-integer encoding used by the host binding
    /// surface (`GenesisBlock` is represented as `i64::min_value()` there;
    /// callers that already know they mean genesis should use
    /// `BlockSelector::Genesis` directly).
    pub fn from_raw(n: i64) -> BlockSelector {
        match n {
            0 => BlockSelector::Post,
            -1 => BlockSelector::Pre,
            n if n > 0 => BlockSelector::Number(n as u64),
            n => BlockSelector::AgeFromHead((-n) as u64),
        }
    }

    /// Resolve this selector to a concrete block number given the current
    /// chain head number, following `Client::numberOf` exactly: a selector
    /// that would count back past genesis saturates at block 0.
    pub fn number_of(&self, head: BlockNumber) -> BlockNumber {
        match *self {
            BlockSelector::Genesis => 0,
            BlockSelector::Number(n) => n,
            BlockSelector::AgeFromHead(k) => head.saturating_sub(k.saturating_sub(1)),
            // Post/Pre have no block-number meaning on their own; callers
            // needing a number for these should use the head number directly.
            BlockSelector::Post | BlockSelector::Pre => head,
        }
    }
}

/// Uniquely identifies a trace (a `Manifest` subtree position).
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct TraceId {
    /// Owning transaction.
    pub transaction: TransactionId,
    /// Path within the transaction's manifest tree.
    pub address: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_and_pre_decode() {
        assert_eq!(BlockSelector::from_raw(0), BlockSelector::Post);
        assert_eq!(BlockSelector::from_raw(-1), BlockSelector::Pre);
    }

    #[test]
    fn positive_is_absolute_number() {
        assert_eq!(BlockSelector::from_raw(42), BlockSelector::Number(42));
        assert_eq!(BlockSelector::Number(42).number_of(100), 42);
    }

    #[test]
    fn negative_counts_back_from_head() {
        // asOf(-k) == state at block (head - k + 1), for k <= head
        assert_eq!(BlockSelector::from_raw(-5), BlockSelector::AgeFromHead(5));
        assert_eq!(BlockSelector::AgeFromHead(5).number_of(100), 96);
    }

    #[test]
    fn age_from_head_saturates_at_genesis() {
        assert_eq!(BlockSelector::AgeFromHead(50).number_of(10), 0);
    }

    #[test]
    fn genesis_sentinel_is_always_zero() {
        assert_eq!(BlockSelector::Genesis.number_of(1_000_000), 0);
    }
}
