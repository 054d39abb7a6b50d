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

//! The transaction/state filter (spec.md §4.5) and its match algorithm.
//!
//! The Bloom pre-filter, the pending-transaction check and the manifest
//! pre-order/limbo walk are carried over from `original_source`'s
//! `TransactionFilter::matches` overloads without semantic change — per
//! spec.md's design notes, the limbo buffering is "the distinguishing
//! feature of the match algorithm" and must not be simplified away.

use std::collections::BTreeSet;

use ethereum_types::{Address, Bloom, BloomInput, H256, U256};
use rlp::RlpStream;

use crate::{
    state::{Manifest, PastMessage, StateDiff},
    BlockNumber,
};

/// The two sentinel filter fingerprints reserved outside the hash space of
/// real filters (spec.md §4.5 / §9).
pub const NEW_BLOCK_FILTER: H256 = H256([0xff; 32]);
pub const NEW_PENDING_FILTER: H256 = H256([0xfe; 32]);

/// A single `(address, storage-key)` pair constraint.
pub type StateAlteration = (Address, U256);

/// The query predicate installed by `installWatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub from: BTreeSet<Address>,
    pub to: BTreeSet<Address>,
    pub altered: BTreeSet<Address>,
    pub state_altered: BTreeSet<StateAlteration>,
    pub earliest: BlockNumber,
    pub latest: BlockNumber,
    pub max: usize,
    pub skip: usize,
}

impl Default for Filter {
    fn default() -> Filter {
        Filter {
            from: BTreeSet::new(),
            to: BTreeSet::new(),
            altered: BTreeSet::new(),
            state_altered: BTreeSet::new(),
            earliest: 0,
            latest: u64::max_value(),
            max: usize::max_value(),
            skip: 0,
        }
    }
}

impl Filter {
    /// Fingerprint used to dedupe identical filters (spec.md §4.5:
    /// `hash(rlp(fields))`).
    pub fn fingerprint(&self) -> H256 {
        let mut s = RlpStream::new_list(8);
        s.begin_list(self.from.len());
        for a in &self.from {
            s.append(a);
        }
        s.begin_list(self.to.len());
        for a in &self.to {
            s.append(a);
        }
        s.begin_list(self.altered.len());
        for a in &self.altered {
            s.append(a);
        }
        s.begin_list(self.state_altered.len());
        for (a, k) in &self.state_altered {
            s.begin_list(2);
            s.append(a);
            s.append(k);
        }
        s.append(&self.earliest);
        s.append(&self.latest);
        s.append(&self.max);
        s.append(&self.skip);
        keccak_hash::keccak(s.out())
    }

    /// Does `number` fall within `[earliest, latest]`?
    pub fn bounds_admit(&self, number: BlockNumber) -> bool {
        number >= self.earliest && number <= self.latest
    }

    fn group_admits(bloom: &Bloom, members: &BTreeSet<Address>) -> bool {
        members.is_empty()
            || members
                .iter()
                .any(|m| bloom.contains_input(BloomInput::Raw(m.as_bytes())))
    }

    fn altered_group_admits(bloom: &Bloom, altered: &BTreeSet<Address>, state_altered: &BTreeSet<StateAlteration>) -> bool {
        if altered.is_empty() && state_altered.is_empty() {
            return true;
        }
        let any_altered = altered
            .iter()
            .any(|a| bloom.contains_input(BloomInput::Raw(a.as_bytes())));
        if any_altered {
            return true;
        }
        state_altered.iter().any(|(a, k)| {
            let slot: H256 = (*k).into();
            bloom.contains_input(BloomInput::Raw(a.as_bytes()))
                && bloom.contains_input(BloomInput::Raw(slot.as_bytes()))
        })
    }

    /// Cheap Bloom pre-filter (spec.md §4.5, first bullet). `from`, `to` and
    /// the union of `altered`/`stateAltered` are ANDed; members within a
    /// group are ORed; empty groups are vacuously satisfied.
    pub fn matches_bloom(&self, bloom: &Bloom) -> bool {
        Self::group_admits(bloom, &self.from)
            && Self::group_admits(bloom, &self.to)
            && Self::altered_group_admits(bloom, &self.altered, &self.state_altered)
    }

    /// Match against a specific pending transaction in `post`: Bloom
    /// pre-filter, then exact sender/recipient, then an actual diff
    /// intersection against `altered`/`stateAltered`.
    pub fn matches_pending(
        &self,
        bloom: &Bloom,
        sender: &Address,
        recipient: Option<&Address>,
        diff: &StateDiff,
    ) -> bool {
        if !self.matches_bloom(bloom) {
            return false;
        }
        if !self.from.is_empty() && !self.from.contains(sender) {
            return false;
        }
        if !self.to.is_empty() {
            match recipient {
                Some(r) if self.to.contains(r) => {}
                _ => return false,
            }
        }
        if self.altered.is_empty() && self.state_altered.is_empty() {
            return true;
        }
        if !self.altered.is_empty() {
            return self.altered.iter().any(|a| diff.touches(a));
        }
        self.state_altered
            .iter()
            .any(|(a, k)| diff.touches_slot(a, k))
    }

    /// Walk a `Manifest` tree in pre-order, emitting `PastMessage`s for
    /// nodes admitted by `from`/`to` once an altering descendant is found.
    /// `origin` is the sender of the whole transaction. Deliberately
    /// preserves the "limbo" buffering of `original_source`: a node that
    /// matches `from`/`to` is held until *some* node in its subtree alters
    /// watched state, at which point the whole limbo is flushed.
    pub fn matches_manifest(&self, manifest: &Manifest, origin: Address) -> Vec<PastMessage> {
        let mut out = Vec::new();
        self.walk_manifest(manifest, &mut vec![0], origin, Vec::new(), &mut out);
        out
    }

    /// `limbo` is owned, not a shared `&mut` reference: `original_source`
    /// passes its `PastMessages _limbo` by value into each recursive call,
    /// so a child mutates only its own copy and a sibling that never alters
    /// cannot leave its admitted-but-unflushed entry behind for a *later*
    /// sibling to flush. This clone-per-child is the direct translation of
    /// that pass-by-value; `limbo.clear()` after a child returns `true`
    /// mirrors the caller-side `_limbo.clear()` in the original.
    fn walk_manifest(
        &self,
        node: &Manifest,
        path: &mut Vec<usize>,
        origin: Address,
        mut limbo: Vec<PastMessage>,
        out: &mut Vec<PastMessage>,
    ) -> bool {
        if out.len() >= self.max {
            return false;
        }

        let admitted = (self.from.is_empty() || self.from.contains(&node.from))
            && (self.to.is_empty() || self.to.contains(&node.to));
        if admitted {
            limbo.push(PastMessage {
                block: H256::zero(),
                number: 0,
                timestamp: 0,
                path: path.clone(),
                from: node.from,
                to: node.to,
                origin,
                input: node.input.clone(),
                output: node.output.clone(),
            });
        }

        let mut alters = self.altered.is_empty() && self.state_altered.is_empty();
        alters = alters || self.altered.contains(&node.from) || self.altered.contains(&node.to);
        if !alters {
            for slot in &node.altered {
                if self.altered.contains(&node.to) || self.state_altered.contains(&(node.to, *slot)) {
                    alters = true;
                    break;
                }
            }
        }

        let mut any_alters = false;
        if alters {
            out.append(&mut limbo);
            any_alters = true;
        }

        path.push(0);
        for (i, child) in node.internal.iter().enumerate() {
            *path.last_mut().unwrap() = i;
            if self.walk_manifest(child, path, origin, limbo.clone(), out) {
                limbo.clear();
                any_alters = true;
            }
            if out.len() >= self.max {
                break;
            }
        }
        path.pop();

        any_alters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn empty_groups_are_vacuously_satisfied() {
        let f = Filter::default();
        assert!(f.matches_bloom(&Bloom::default()));
    }

    #[test]
    fn from_group_requires_a_member_present() {
        let mut f = Filter::default();
        f.from.insert(addr(1));
        let mut bloom = Bloom::default();
        assert!(!f.matches_bloom(&bloom));
        bloom.accrue(BloomInput::Raw(addr(1).as_bytes()));
        assert!(f.matches_bloom(&bloom));
    }

    #[test]
    fn altered_and_state_altered_are_orred_together() {
        let mut f = Filter::default();
        f.altered.insert(addr(2));
        let mut bloom = Bloom::default();
        bloom.accrue(BloomInput::Raw(addr(2).as_bytes()));
        assert!(f.matches_bloom(&bloom));
    }

    #[test]
    fn duplicate_filters_fingerprint_identically() {
        let mut a = Filter::default();
        a.from.insert(addr(1));
        let b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn manifest_walk_emits_only_when_subtree_alters_watched_state() {
        // root -> child(altered=7) ; filter watches addr(9)'s storage slot 7
        let mut f = Filter::default();
        f.state_altered.insert((addr(9), U256::from(7)));

        let mut child = Manifest::leaf(addr(1), addr(9));
        child.altered.insert(U256::from(7));
        let mut root = Manifest::leaf(addr(0), addr(1));
        root.internal.push(child);

        let matches = f.matches_manifest(&root, addr(0));
        // Both root and child are admitted by from/to (both empty), and
        // the child's alteration flushes the whole limbo, including root.
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn manifest_walk_skips_subtrees_that_never_alter_watched_state() {
        let mut f = Filter::default();
        f.state_altered.insert((addr(9), U256::from(7)));

        let child = Manifest::leaf(addr(1), addr(2)); // no alteration at all
        let mut root = Manifest::leaf(addr(0), addr(1));
        root.internal.push(child);

        let matches = f.matches_manifest(&root, addr(0));
        assert!(matches.is_empty());
    }

    #[test]
    fn manifest_walk_does_not_leak_a_non_altering_siblings_message_to_a_later_sibling() {
        // root -> [child_a (admitted, never alters), child_b (admitted, alters)]
        // child_a's own message must not be resurrected by child_b's flush.
        let mut f = Filter::default();
        f.altered.insert(addr(3));

        let child_a = Manifest::leaf(addr(1), addr(2));
        let child_b = Manifest::leaf(addr(1), addr(3));
        let mut root = Manifest::leaf(addr(0), addr(1));
        root.internal.push(child_a);
        root.internal.push(child_b);

        let matches = f.matches_manifest(&root, addr(0));
        assert_eq!(matches.len(), 2, "expected only root and child_b, got {:?}", matches);
        assert!(matches.iter().all(|m| m.to != addr(2)));
    }

    #[test]
    fn matches_pending_requires_sender_recipient_and_diff_intersection() {
        let mut f = Filter::default();
        f.from.insert(addr(1));
        f.altered.insert(addr(9));

        let mut bloom = Bloom::default();
        bloom.accrue(BloomInput::Raw(addr(1).as_bytes()));
        bloom.accrue(BloomInput::Raw(addr(9).as_bytes()));

        let mut diff = StateDiff::default();
        diff.accounts.entry(addr(9)).or_default();

        assert!(f.matches_pending(&bloom, &addr(1), Some(&addr(9)), &diff));
        // Wrong sender: Bloom still matches but the exact-sender check fails.
        assert!(!f.matches_pending(&bloom, &addr(2), Some(&addr(9)), &diff));
        // Right sender, but nothing in the diff actually touches `altered`.
        assert!(!f.matches_pending(&bloom, &addr(1), Some(&addr(9)), &StateDiff::default()));
    }
}
