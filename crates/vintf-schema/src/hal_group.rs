//! A named multimap shared by manifests and matrices.

use crate::version::Version;
use std::collections::BTreeMap;
use std::fmt;

/// Entries stored in a [`HalGroup`] know their own name.
pub trait HasName {
    fn name(&self) -> &str;
}

/// Entries that can answer whether they provide or accept a version.
pub trait ContainsVersion {
    fn contains_version(&self, version: Version) -> bool;
}

/// Decides whether an entry may join the group in its current state.
pub type AddPolicy<H> = fn(&HalGroup<H>, &H) -> bool;

fn accept_all<H>(_: &HalGroup<H>, _: &H) -> bool {
    true
}

/// Entries keyed by name, in name order, then insertion order within a name.
pub struct HalGroup<H> {
    entries: BTreeMap<String, Vec<H>>,
    policy: AddPolicy<H>,
}

impl<H: HasName> HalGroup<H> {
    /// A group that accepts every entry.
    pub fn new() -> Self {
        Self::with_policy(accept_all)
    }

    pub fn with_policy(policy: AddPolicy<H>) -> Self {
        Self {
            entries: BTreeMap::new(),
            policy,
        }
    }

    /// Insert unless the policy rejects the entry. Returns whether it was inserted.
    pub fn add(&mut self, entry: H) -> bool {
        if !(self.policy)(self, &entry) {
            return false;
        }
        self.entries
            .entry(entry.name().to_owned())
            .or_default()
            .push(entry);
        true
    }

    /// Move every entry of `other` in through [`HalGroup::add`].
    ///
    /// Stops at the first rejection and returns the rejected entry's name.
    /// Entries before it have been applied; `other` is consumed either way.
    pub fn add_all(&mut self, other: Self) -> Result<(), String> {
        for entry in other.into_entries() {
            let name = entry.name().to_owned();
            if !self.add(entry) {
                return Err(name);
            }
        }
        Ok(())
    }

    pub fn get_all(&self, name: &str) -> &[H] {
        match self.entries.get(name) {
            Some(list) => list,
            None => &[],
        }
    }

    pub fn get_all_mut(&mut self, name: &str) -> impl Iterator<Item = &mut H> {
        self.entries.get_mut(name).into_iter().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = &H> {
        self.entries.values().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut H> {
        self.entries.values_mut().flatten()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry with this name.
    pub fn remove_all(&mut self, name: &str) -> Vec<H> {
        self.entries.remove(name).unwrap_or_default()
    }

    /// Keep only the entries of `name` for which `keep` holds.
    pub fn retain(&mut self, name: &str, keep: impl FnMut(&mut H) -> bool) {
        if let Some(list) = self.entries.get_mut(name) {
            list.retain_mut(keep);
            if list.is_empty() {
                self.entries.remove(name);
            }
        }
    }

    pub fn into_entries(self) -> impl Iterator<Item = H> {
        self.entries.into_values().flatten()
    }
}

impl<H: HasName + ContainsVersion> HalGroup<H> {
    /// The first entry of `name` that contains `version`.
    pub fn get_exact(&self, name: &str, version: Version) -> Option<&H> {
        self.get_all(name)
            .iter()
            .find(|entry| entry.contains_version(version))
    }
}

impl<H: HasName> Default for HalGroup<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Clone> Clone for HalGroup<H> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            policy: self.policy,
        }
    }
}

impl<H: fmt::Debug> fmt::Debug for HalGroup<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

/// Equal when every name holds the same entries, in any order.
impl<H: PartialEq> PartialEq for HalGroup<H> {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(name, mine)| {
                other
                    .entries
                    .get(name)
                    .is_some_and(|theirs| same_multiset(mine, theirs))
            })
    }
}

impl<H: Eq> Eq for HalGroup<H> {}

fn same_multiset<H: PartialEq>(a: &[H], b: &[H]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|x| {
        let slot = b
            .iter()
            .enumerate()
            .position(|(i, y)| !used[i] && x == y);
        match slot {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}
