//! # Archetype Signatures
//!
//! A signature is the exact set of component types an entity carries,
//! kept sorted and deduplicated so equal sets compare and hash equal.

use super::ComponentTypeId;

/// Canonical set of component identities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Sorted, no duplicates.
    components: Vec<ComponentTypeId>,
}

impl Signature {
    /// Creates the empty signature.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Inserts `id`. Does nothing if already present.
    pub fn add(&mut self, id: ComponentTypeId) {
        if let Err(pos) = self.components.binary_search(&id) {
            self.components.insert(pos, id);
        }
    }

    /// Removes `id`. Does nothing if absent.
    pub fn remove(&mut self, id: ComponentTypeId) {
        if let Ok(pos) = self.components.binary_search(&id) {
            self.components.remove(pos);
        }
    }

    /// Returns a copy with `id` added.
    #[must_use]
    pub fn with(&self, id: ComponentTypeId) -> Self {
        let mut sig = self.clone();
        sig.add(id);
        sig
    }

    /// Returns a copy with `id` removed.
    #[must_use]
    pub fn without(&self, id: ComponentTypeId) -> Self {
        let mut sig = self.clone();
        sig.remove(id);
        sig
    }

    /// Checks membership.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ComponentTypeId) -> bool {
        self.components.binary_search(&id).is_ok()
    }

    /// Returns true if every member of `self` is in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        if self.components.len() > other.components.len() {
            return false;
        }

        // Both sides are sorted, so one forward pass suffices.
        let mut theirs = other.components.iter();
        'outer: for mine in &self.components {
            for candidate in theirs.by_ref() {
                if candidate == mine {
                    continue 'outer;
                }
                if candidate > mine {
                    return false;
                }
            }
            return false;
        }
        true
    }

    /// Returns true if every member of `other` is in `self`.
    #[inline]
    #[must_use]
    pub fn is_superset_of(&self, other: &Self) -> bool {
        other.is_subset_of(self)
    }

    /// The members in ascending order.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[ComponentTypeId] {
        &self.components
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true for the empty signature.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl FromIterator<ComponentTypeId> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        let mut components: Vec<_> = iter.into_iter().collect();
        components.sort_unstable();
        components.dedup();
        Self { components }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(ids: &[u32]) -> Signature {
        ids.iter().map(|&i| ComponentTypeId(i)).collect()
    }

    #[test]
    fn test_canonical_form() {
        assert_eq!(sig(&[3, 1, 2, 1]), sig(&[1, 2, 3]));
        assert_eq!(
            sig(&[5, 0]).components(),
            &[ComponentTypeId(0), ComponentTypeId(5)]
        );
    }

    #[test]
    fn test_add_remove() {
        let mut s = Signature::new();
        s.add(ComponentTypeId(2));
        s.add(ComponentTypeId(0));
        s.add(ComponentTypeId(2));
        assert_eq!(s, sig(&[0, 2]));

        s.remove(ComponentTypeId(7));
        assert_eq!(s.len(), 2);
        s.remove(ComponentTypeId(0));
        assert_eq!(s, sig(&[2]));
        assert!(!s.contains(ComponentTypeId(0)));
    }

    #[test]
    fn test_with_without_copy() {
        let base = sig(&[1]);
        let grown = base.with(ComponentTypeId(4));
        assert_eq!(grown, sig(&[1, 4]));
        assert_eq!(grown.without(ComponentTypeId(1)), sig(&[4]));
        assert_eq!(base, sig(&[1]));
    }

    #[test]
    fn test_subset() {
        assert!(sig(&[]).is_subset_of(&sig(&[1, 2])));
        assert!(sig(&[1, 3]).is_subset_of(&sig(&[0, 1, 2, 3])));
        assert!(sig(&[1, 3]).is_subset_of(&sig(&[1, 3])));
        assert!(!sig(&[1, 4]).is_subset_of(&sig(&[0, 1, 2, 3])));
        assert!(!sig(&[0, 1, 2]).is_subset_of(&sig(&[1, 2])));
        assert!(!sig(&[9]).is_subset_of(&sig(&[1, 2])));
        assert!(sig(&[0, 1, 2, 3]).is_superset_of(&sig(&[2])));
    }

    #[test]
    fn test_hash_matches_equality() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(sig(&[2, 1]));
        assert!(set.contains(&sig(&[1, 2])));
        assert!(Signature::new().is_empty());
    }
}
