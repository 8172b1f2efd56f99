use core::fmt;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::hash::{Hash32, HASH32_SIZE};

/// A 32-byte content identifier, typically a block id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Value([u8; HASH32_SIZE]);

impl Value {
    pub const fn new(bytes: [u8; HASH32_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH32_SIZE] {
        &self.0
    }
}

impl From<[u8; HASH32_SIZE]> for Value {
    fn from(bytes: [u8; HASH32_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Deterministic identifier of a [`Set`], derived from its members only.
pub type SetId = Hash32;

/// An unordered, duplicate free collection of [`Value`]s.
///
/// Members are kept sorted so that iteration, [`Set::id`] and anything signed
/// over a set do not depend on insertion order.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Set {
    values: BTreeSet<Value>,
}

impl Set {
    /// `capacity_hint` is accepted for parity with hashed backends; an ordered set
    /// does not preallocate.
    pub fn new_empty(_capacity_hint: usize) -> Self {
        Self::default()
    }

    /// Idempotent insert. Returns `false` if the value was already present.
    pub fn add(&mut self, value: Value) -> bool {
        self.values.insert(value)
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Members in ascending order.
    pub fn values(&self) -> Vec<Value> {
        self.values.iter().copied().collect()
    }

    pub fn equals(&self, other: &Set) -> bool {
        self.values == other.values
    }

    pub fn union(&self, other: &Set) -> Set {
        self.values.union(&other.values).copied().collect()
    }

    pub fn intersection(&self, other: &Set) -> Set {
        self.values.intersection(&other.values).copied().collect()
    }

    pub fn id(&self) -> SetId {
        Hash32::calculate(self.values.iter().map(|v| &v.as_bytes()[..]))
    }
}

impl FromIterator<Value> for Set {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: BTreeSet::from_iter(iter),
        }
    }
}

impl Extend<Value> for Set {
    fn extend<I: IntoIterator<Item = Value>>(&mut self, iter: I) {
        self.values.extend(iter)
    }
}

impl<'a> IntoIterator for &'a Set {
    type Item = &'a Value;
    type IntoIter = std::collections::btree_set::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}{:?}", self.id().short(), self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    #[derive(Debug, Clone)]
    struct ArbValue(Value);

    impl Arbitrary for ArbValue {
        fn arbitrary(g: &mut Gen) -> Self {
            let mut bytes = [0u8; HASH32_SIZE];
            // a small alphabet so that duplicates actually occur
            bytes[0] = u8::arbitrary(g) % 8;
            ArbValue(Value::new(bytes))
        }
    }

    fn value(b: u8) -> Value {
        Value::new([b; HASH32_SIZE])
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut s = Set::new_empty(2);
        assert!(s.add(value(1)));
        assert!(!s.add(value(1)));
        assert_eq!(s.len(), 1);
        assert!(s.contains(&value(1)));
    }

    #[test]
    fn test_equals_ignores_insertion_order() {
        let mut a = Set::new_empty(3);
        a.add(value(1));
        a.add(value(2));
        a.add(value(3));

        let mut b = Set::new_empty(3);
        b.add(value(3));
        b.add(value(1));
        b.add(value(2));

        assert!(a.equals(&b));
        assert_eq!(a.id(), b.id());

        b.add(value(4));
        assert!(!a.equals(&b));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_empty_set_has_an_id() {
        assert_eq!(Set::new_empty(0).id(), Set::default().id());
        assert!(Set::new_empty(10).is_empty());
    }

    #[test]
    fn test_union_and_intersection() {
        let a = Set::from_iter([value(1), value(2)]);
        let b = Set::from_iter([value(2), value(3)]);
        assert_eq!(a.union(&b), Set::from_iter([value(1), value(2), value(3)]));
        assert_eq!(a.intersection(&b), Set::from_iter([value(2)]));
    }

    #[quickcheck]
    fn prop_id_is_independent_of_insertion_order(values: Vec<ArbValue>) -> bool {
        let forward = Set::from_iter(values.iter().map(|v| v.0));
        let backward = Set::from_iter(values.iter().rev().map(|v| v.0));
        forward.equals(&backward) && forward.id() == backward.id()
    }
}
