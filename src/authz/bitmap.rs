use std::fmt;

use roaring::RoaringBitmap;

use crate::errors::{PermsError, PermsResult};

/// Compressed set of u32 object or subject IDs.
///
/// Thin wrapper over a roaring bitmap so membership stays O(1)-ish and
/// memory stays proportional to the populated chunks, not the ID universe.
#[derive(Clone, Default, PartialEq)]
pub struct IdSet {
    inner: RoaringBitmap,
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id`, returning false if it was already present.
    pub fn add(&mut self, id: u32) -> bool {
        self.inner.insert(id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.inner.contains(id)
    }

    pub fn cardinality(&self) -> u64 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// IDs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.inner.iter()
    }

    pub fn union_with(&mut self, other: &IdSet) {
        self.inner |= &other.inner;
    }

    pub fn to_bytes(&self) -> PermsResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.inner.serialized_size());
        self.inner
            .serialize_into(&mut buf)
            .map_err(|err| PermsError::bitmap(format!("failed to serialize id set: {err}")))?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> PermsResult<Self> {
        RoaringBitmap::deserialize_from(bytes)
            .map(|inner| Self { inner })
            .map_err(|err| PermsError::bitmap(format!("failed to decode id set: {err}")))
    }
}

impl fmt::Debug for IdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdSet")
            .field("cardinality", &self.cardinality())
            .finish()
    }
}

impl FromIterator<u32> for IdSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl Extend<u32> for IdSet {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        self.inner.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_contains_cardinality() {
        let mut set = IdSet::new();
        assert!(set.is_empty());
        assert!(set.add(7));
        assert!(!set.add(7));
        assert!(set.add(u32::MAX));
        assert!(set.contains(7));
        assert!(set.contains(u32::MAX));
        assert!(!set.contains(8));
        assert_eq!(set.cardinality(), 2);
    }

    #[test]
    fn test_iter_is_ascending() {
        let set: IdSet = [42, 3, 100_000, 9].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 9, 42, 100_000]);
    }

    #[test]
    fn test_sparse_large_set() {
        let set: IdSet = (0..1_000_000u32).step_by(97).collect();
        assert_eq!(set.cardinality(), 10_310);
        assert!(set.contains(97 * 500));
        assert!(!set.contains(97 * 500 + 1));
    }

    #[test]
    fn test_union_with() {
        let mut a: IdSet = [1, 2].into_iter().collect();
        let b: IdSet = [2, 3].into_iter().collect();
        a.union_with(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_bytes_preserve_membership() {
        let set: IdSet = [1, 65_536, 70_000, 4_000_000_000].into_iter().collect();
        let bytes = set.to_bytes().unwrap();
        let decoded = IdSet::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, set);

        let empty = IdSet::from_bytes(&IdSet::new().to_bytes().unwrap()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let err = IdSet::from_bytes(&[0xde, 0xad]).unwrap_err();
        assert_eq!(err.kind(), "bitmap");
    }
}
