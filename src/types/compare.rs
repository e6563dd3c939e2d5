//! Three-way comparison between a query type and a stored key type.

use std::borrow::Borrow;
use std::cmp::Ordering;

/// Compares a (possibly reduced) query key against a stored key.
///
/// The comparison must be a total order consistent with the stored keys'
/// own ordering. It is implemented for every `Q: Ord` that the stored key
/// borrows as, so a `String` tree can be queried with `&str`, and a wrapper
/// type can be queried with its inner key by implementing [`Borrow`].
pub trait Comparable<K: ?Sized> {
    /// Compare `self` with a stored key
    fn compare(&self, key: &K) -> Ordering;
}

impl<Q, K> Comparable<K> for Q
where
    Q: Ord + ?Sized,
    K: Borrow<Q> + ?Sized,
{
    #[inline]
    fn compare(&self, key: &K) -> Ordering {
        Ord::cmp(self, key.borrow())
    }
}

/// Whether `key` lies beyond the optional upper bound
#[inline]
pub(crate) fn exceeds_upper<Q, K>(upper: Option<&Q>, key: &K, inclusive: bool) -> bool
where
    Q: Comparable<K> + ?Sized,
    K: ?Sized,
{
    match upper.map(|bound| bound.compare(key)) {
        None | Some(Ordering::Greater) => false,
        Some(Ordering::Equal) => !inclusive,
        Some(Ordering::Less) => true,
    }
}
