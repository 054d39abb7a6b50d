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

//! Filter/watch registry (spec.md §4.5). Guarded as a whole by the caller's
//! `filter-lock` (see `Client`), so this type itself needs no internal
//! synchronization.

use std::collections::BTreeMap;

use client_types::{Block, BlockNumber, Bloom, Filter, Hash, NEW_BLOCK_FILTER, NEW_PENDING_FILTER};

struct Watch {
    filter_id: Hash,
    change_counter: u64,
}

#[derive(Default)]
pub struct FilterRegistry {
    filters: BTreeMap<Hash, (Filter, usize)>,
    watches: BTreeMap<u64, Watch>,
}

impl FilterRegistry {
    pub fn new() -> FilterRegistry {
        FilterRegistry::default()
    }

    /// `installWatch(filter)` (spec.md §4.5). Ids are `max_existing_id + 1`
    /// (`0` if no watches are currently installed) — the literal reading of
    /// the operation description, which can recycle an id once the
    /// registry drains to empty; see spec.md §9 ambiguity (i).
    pub fn install_watch(&mut self, filter: Filter) -> u64 {
        let fingerprint = filter.fingerprint();
        self.filters
            .entry(fingerprint)
            .and_modify(|(_, refcount)| *refcount += 1)
            .or_insert((filter, 1));
        self.insert_watch(fingerprint)
    }

    /// `installWatch(builtin_id)` (spec.md §4.5): bind a watch directly to
    /// one of the two sentinel fingerprints.
    pub fn install_builtin_watch(&mut self, sentinel: Hash) -> u64 {
        debug_assert!(sentinel == NEW_BLOCK_FILTER || sentinel == NEW_PENDING_FILTER);
        self.insert_watch(sentinel)
    }

    fn insert_watch(&mut self, filter_id: Hash) -> u64 {
        let id = self.watches.keys().next_back().map_or(0, |max| max + 1);
        self.watches.insert(id, Watch { filter_id, change_counter: 0 });
        id
    }

    /// `uninstallWatch(id)` (spec.md §4.5).
    pub fn uninstall_watch(&mut self, id: u64) {
        let watch = match self.watches.remove(&id) {
            Some(w) => w,
            None => return,
        };
        if let Some((_, refcount)) = self.filters.get_mut(&watch.filter_id) {
            *refcount -= 1;
            if *refcount == 0 {
                self.filters.remove(&watch.filter_id);
            }
        }
    }

    /// `checkWatch(id)` (spec.md §4.5): atomically read-and-clear.
    pub fn check_watch(&mut self, id: u64) -> bool {
        match self.watches.get_mut(&id) {
            Some(watch) if watch.change_counter > 0 => {
                watch.change_counter = 0;
                true
            }
            _ => false,
        }
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    pub fn filter_refcount(&self, fingerprint: &Hash) -> Option<usize> {
        self.filters.get(fingerprint).map(|(_, rc)| *rc)
    }

    /// `appendFromNewPending(bloom, out)` (spec.md §4.5).
    pub fn append_from_new_pending(&self, number: BlockNumber, bloom: &Bloom, out: &mut std::collections::BTreeSet<Hash>) {
        for (fingerprint, (filter, _)) in &self.filters {
            if filter.bounds_admit(number) && filter.matches_bloom(bloom) {
                out.insert(*fingerprint);
            }
        }
    }

    /// `appendFromNewBlock(block, out)` (spec.md §4.5).
    pub fn append_from_new_block(&self, block: &Block, out: &mut std::collections::BTreeSet<Hash>) {
        for (fingerprint, (filter, _)) in &self.filters {
            if filter.bounds_admit(block.header.number) && filter.matches_bloom(&block.header.bloom) {
                out.insert(*fingerprint);
            }
        }
    }

    /// `noteChanged(ids)` (spec.md §4.5): bump every watch bound to one of
    /// `ids`.
    pub fn note_changed(&mut self, ids: &std::collections::BTreeSet<Hash>) {
        for watch in self.watches.values_mut() {
            if ids.contains(&watch.filter_id) {
                watch.change_counter += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_types::Address;

    fn filter_from(addr: Address) -> Filter {
        let mut f = Filter::default();
        f.from.insert(addr);
        f
    }

    #[test]
    fn duplicate_filter_shares_one_entry_with_refcount_two() {
        let mut r = FilterRegistry::new();
        let a = Address::from_low_u64_be(1);
        let w1 = r.install_watch(filter_from(a));
        let w2 = r.install_watch(filter_from(a));
        assert_eq!(r.filter_count(), 1);
        let fp = filter_from(a).fingerprint();
        assert_eq!(r.filter_refcount(&fp), Some(2));

        r.uninstall_watch(w1);
        assert_eq!(r.filter_refcount(&fp), Some(1));
        r.uninstall_watch(w2);
        assert_eq!(r.filter_count(), 0);
    }

    #[test]
    fn check_watch_is_read_and_clear() {
        let mut r = FilterRegistry::new();
        let a = Address::from_low_u64_be(1);
        let id = r.install_watch(filter_from(a));
        let mut changed = std::collections::BTreeSet::new();
        changed.insert(filter_from(a).fingerprint());
        r.note_changed(&changed);

        assert!(r.check_watch(id));
        assert!(!r.check_watch(id));
    }

    #[test]
    fn ids_grow_from_current_max_and_can_reuse_zero_once_drained() {
        let mut r = FilterRegistry::new();
        let a = Address::from_low_u64_be(1);
        let w1 = r.install_watch(filter_from(a));
        assert_eq!(w1, 0);
        let w2 = r.install_watch(filter_from(a));
        assert_eq!(w2, 1);
        r.uninstall_watch(w1);
        r.uninstall_watch(w2);
        // Registry is empty again; next id restarts at 0 per the literal
        // "max_existing_id + 1 (or 0 if empty)" reading (spec.md §9 (i)).
        let w3 = r.install_watch(filter_from(a));
        assert_eq!(w3, 0);
    }
}
