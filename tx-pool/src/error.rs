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

use std::fmt;

/// Reasons `attempt_import` may decline a transaction (spec.md §4.3, §7
/// error kind 3). None of these are fatal to the caller: `Client::inject`
/// logs and swallows them, matching the "fire-and-forget" submission
/// contract.
#[derive(Debug)]
pub enum Error {
    /// Malformed RLP, wrong field count, or a field out of range.
    Decode(rlp::DecoderError),
    /// The signature does not recover to a valid sender.
    InvalidSignature,
    /// A transaction with this id is already staged.
    AlreadyKnown,
    /// The queue is at `max_size` and this transaction is not large enough
    /// (by gas price) to displace an existing entry.
    Full,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Decode(ref e) => write!(f, "could not decode transaction: {}", e),
            Error::InvalidSignature => write!(f, "invalid transaction signature"),
            Error::AlreadyKnown => write!(f, "transaction already known"),
            Error::Full => write!(f, "transaction queue full"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Decode(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<rlp::DecoderError> for Error {
    fn from(e: rlp::DecoderError) -> Error {
        Error::Decode(e)
    }
}
