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

//! Decoding of the wire-RLP a caller hands to `attempt_import` (spec.md
//! §4.3: `attemptImport(rlp)` "parses, verifies signature and structural
//! validity"). The field order mirrors `SignedTransaction`'s `Encodable`
//! impl in `client-types`.

use client_types::{Action, Signature, SignedTransaction, Transaction};
use ethereum_types::{H256, U256};
use rlp::Rlp;

use crate::error::Error;

pub fn decode_unverified(bytes: &[u8]) -> Result<(Transaction, Signature, H256), Error> {
    let rlp = Rlp::new(bytes);
    if rlp.item_count()? != 9 {
        return Err(rlp::DecoderError::RlpIncorrectListLen.into());
    }

    let nonce: U256 = rlp.val_at(0)?;
    let gas_price: U256 = rlp.val_at(1)?;
    let gas: U256 = rlp.val_at(2)?;
    let action = if rlp.at(3)?.is_empty() {
        Action::Create
    } else {
        Action::Call(rlp.val_at(3)?)
    };
    let value: U256 = rlp.val_at(4)?;
    let data = rlp.val_at(5)?;
    let v: u8 = rlp.val_at(6)?;
    let r: H256 = rlp.val_at(7)?;
    let s: H256 = rlp.val_at(8)?;

    let unsigned = Transaction { nonce, value, gas_price, gas, action, data };
    let signature = Signature { v, r, s };
    let tx_id = keccak_hash::keccak(bytes);
    Ok((unsigned, signature, tx_id))
}

/// Recombine a decoded-and-verified transaction into the immutable
/// `SignedTransaction`, as required once `sender` has been recovered.
pub fn finish(unsigned: Transaction, signature: Signature, sender: ethereum_types::Address, hash: H256) -> SignedTransaction {
    SignedTransaction { unsigned, signature, sender, hash }
}
