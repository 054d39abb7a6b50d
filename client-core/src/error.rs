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

//! General error type for the client core. Most failures described by
//! spec.md §7 never reach here — they are logged and swallowed inside the
//! worker tick. This type covers the handful of operations that do return a
//! `Result`: version-gate I/O, db open, and `attempt_import`.

use error_chain::error_chain;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, EthcoreResult;
    }

    foreign_links {
        Io(::std::io::Error) #[doc = "Filesystem error opening or writing the version-gate files."];
        Decoder(rlp::DecoderError) #[doc = "Malformed RLP read back from a version-gate file."];
        Pool(tx_pool::Error) #[doc = "Transaction queue rejected an import."];
    }

    errors {
        #[doc = "The on-disk protocol/database version did not match and a clean re-open was required."]
        VersionMismatch(found: u64, expected: u64) {
            description("database version mismatch")
            display("database version mismatch: found {}, expected {}", found, expected)
        }

        #[doc = "The chain or state store reported import failure for a block."]
        BlockImport(reason: String) {
            description("block import failed")
            display("block import failed: {}", reason)
        }
    }
}
