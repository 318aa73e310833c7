//! Message unique identifiers and UID sets.

use std::fmt;
use std::num::NonZeroU32;

/// A message UID. UIDs are never zero and only meaningful within one mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(NonZeroU32);

impl Uid {
    /// The smallest valid UID.
    pub const MIN: Self = Self(NonZeroU32::MIN);

    /// Creates a UID, returning `None` for zero.
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        match NonZeroU32::new(value) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Uid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<NonZeroU32>().map(Self)
    }
}

/// A set of UIDs, serialized in compressed range form (`1:3,7`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UidSet {
    uids: Vec<Uid>,
}

impl UidSet {
    /// Builds a set from any UIDs; duplicates are removed and order normalized.
    pub fn from_uids(uids: impl IntoIterator<Item = Uid>) -> Self {
        let mut uids: Vec<Uid> = uids.into_iter().collect();
        uids.sort_unstable();
        uids.dedup();
        Self { uids }
    }

    /// Returns true if the set holds no UIDs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    /// Number of UIDs in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.uids.len()
    }

    /// Iterates the UIDs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Uid> + '_ {
        self.uids.iter().copied()
    }
}

impl From<&[Uid]> for UidSet {
    fn from(uids: &[Uid]) -> Self {
        Self::from_uids(uids.iter().copied())
    }
}

impl fmt::Display for UidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.uids.iter().map(|u| u.get()).peekable();
        let mut first = true;
        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek() == Some(&(end + 1)) {
                end += 1;
                iter.next();
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}:{end}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uids(values: &[u32]) -> Vec<Uid> {
        values.iter().map(|&v| Uid::new(v).unwrap()).collect()
    }

    #[test]
    fn test_zero_is_not_a_uid() {
        assert!(Uid::new(0).is_none());
        assert!("0".parse::<Uid>().is_err());
        assert_eq!("42".parse::<Uid>().unwrap().get(), 42);
    }

    #[test]
    fn test_set_compresses_runs() {
        let set = UidSet::from_uids(uids(&[7, 1, 2, 3, 9, 10, 2]));
        assert_eq!(set.to_string(), "1:3,7,9:10");
        assert_eq!(set.len(), 6);
    }

    #[test]
    fn test_single_uid() {
        assert_eq!(UidSet::from_uids(uids(&[5])).to_string(), "5");
    }

    proptest! {
        #[test]
        fn prop_set_expands_to_inputs(values in proptest::collection::vec(1u32..500, 1..40)) {
            let set = UidSet::from_uids(uids(&values));
            let mut expanded = Vec::new();
            for piece in set.to_string().split(',') {
                match piece.split_once(':') {
                    Some((a, b)) => {
                        let (a, b): (u32, u32) = (a.parse().unwrap(), b.parse().unwrap());
                        expanded.extend(a..=b);
                    }
                    None => expanded.push(piece.parse().unwrap()),
                }
            }
            let mut expected = values.clone();
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(expanded, expected);
        }
    }
}
