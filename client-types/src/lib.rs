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

//! Shared data model for the client core: addresses, hashes, transactions,
//! blocks, account/state diffs, manifests and the filter/watch query type.

pub mod block;
pub mod filter;
pub mod ids;
pub mod state;
pub mod transaction;

pub use ethereum_types::{Address, Bloom, BloomInput, H256 as Hash, U256};

pub use block::{Block, Header};
pub use filter::{Filter, NEW_BLOCK_FILTER, NEW_PENDING_FILTER};
pub use ids::{BlockId, BlockNumber, BlockSelector, TransactionId};
pub use state::{Account, Manifest, PastMessage, StateDiff};
pub use transaction::{Action, SignedTransaction, Signature, Transaction};
