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

//! Construction-time configuration for `Client`.

/// Construction-time configuration for a `Client`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum number of transactions the pool will stage at once.
    pub transaction_queue_size: usize,
    /// Re-verify `post` against `Chain` before committing to mine
    /// (spec.md §4.1 mine phase, "paranoid" mode).
    pub paranoid_mining: bool,
    /// Idle/mining tick budget, in milliseconds (spec.md §4.1, §5).
    pub mining_budget_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            transaction_queue_size: tx_pool::DEFAULT_MAX_SIZE,
            paranoid_mining: false,
            mining_budget_ms: 100,
        }
    }
}
