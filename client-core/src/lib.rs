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

//! The client core (spec.md §2): `Client`, the pre/post `State` pair, the
//! block queue, the filter/watch registry, the on-disk version gate, the
//! background worker loop, and the `external` trait boundary with its
//! in-memory reference collaborators.

pub mod block_queue;
pub mod client;
pub mod config;
pub mod error;
pub mod external;
pub mod filter_registry;
pub mod state;
pub mod version_gate;
mod worker;

pub use block_queue::BlockQueue;
pub use client::Client;
pub use config::ClientConfig;
pub use error::{Error, ErrorKind, EthcoreResult};
pub use filter_registry::FilterRegistry;
pub use state::{MineInfo, State, StateInfo};
pub use version_gate::{VersionChecker, VersionGateResult, DATABASE_VERSION, PROTOCOL_VERSION};
