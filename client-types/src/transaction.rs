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

//! Transaction types.

use ethereum_types::{Address, H256, U256};
use parity_bytes::Bytes;
use rlp::{Encodable, RlpStream};

/// Destination of a transaction.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Action {
    /// Plain transfer or contract call.
    Call(Address),
    /// Contract creation. The empty `receiveAddress` of spec.md §3.
    Create,
}

/// An unsigned transaction, as constructed by `Client::transact` before
/// signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Per-sender nonce.
    pub nonce: U256,
    /// Value transferred, in wei.
    pub value: U256,
    /// Gas price offered.
    pub gas_price: U256,
    /// Gas limit.
    pub gas: U256,
    /// Call or create.
    pub action: Action,
    /// Call data / init code.
    pub data: Bytes,
}

impl Encodable for Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(6);
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas);
        match self.action {
            Action::Call(ref addr) => {
                s.append(addr);
            }
            Action::Create => {
                s.append(&"");
            }
        }
        s.append(&self.value);
        s.append(&self.data);
    }
}

/// A signature over a transaction hash, in the `(v, r, s)` shape used
/// throughout the Ethereum ecosystem. Recovery of the sender from this
/// signature is delegated to the `Crypto` external collaborator (spec.md
/// §6); this crate only carries the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub v: u8,
    pub r: H256,
    pub s: H256,
}

/// A transaction once it has been signed. Immutable, per spec.md §3:
/// "A transaction is immutable once signed."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub unsigned: Transaction,
    pub signature: Signature,
    /// Sender, recovered from the signature at construction time.
    pub sender: Address,
    /// Transaction id: hash of the signed RLP encoding.
    pub hash: H256,
}

impl SignedTransaction {
    pub fn nonce(&self) -> U256 {
        self.unsigned.nonce
    }

    pub fn action(&self) -> &Action {
        &self.unsigned.action
    }

    pub fn gas(&self) -> U256 {
        self.unsigned.gas
    }

    pub fn gas_price(&self) -> U256 {
        self.unsigned.gas_price
    }

    pub fn value(&self) -> U256 {
        self.unsigned.value
    }
}

impl Encodable for SignedTransaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(9);
        s.append(&self.unsigned.nonce);
        s.append(&self.unsigned.gas_price);
        s.append(&self.unsigned.gas);
        match self.unsigned.action {
            Action::Call(ref addr) => {
                s.append(addr);
            }
            Action::Create => {
                s.append(&"");
            }
        }
        s.append(&self.unsigned.value);
        s.append(&self.unsigned.data);
        s.append(&self.signature.v);
        s.append(&self.signature.r);
        s.append(&self.signature.s);
    }
}
