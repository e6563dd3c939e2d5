//! Result type of nearest-neighbor queries.

/// The entries surrounding a query key.
///
/// Either `exact` is set (the key is stored) and both neighbors are absent,
/// or `exact` is absent and `lower`/`upper` hold the greatest entry below
/// and the least entry above the query. A neighbor is absent when the
/// query lies beyond that end of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nearest<E> {
    /// Entry equal to the query key
    pub exact: Option<E>,
    /// Greatest entry less than the query key
    pub lower: Option<E>,
    /// Least entry greater than the query key
    pub upper: Option<E>,
}

impl<E> Default for Nearest<E> {
    fn default() -> Self {
        Self {
            exact: None,
            lower: None,
            upper: None,
        }
    }
}

impl<E> Nearest<E> {
    pub(crate) fn exact(entry: E) -> Self {
        Self {
            exact: Some(entry),
            lower: None,
            upper: None,
        }
    }

    pub(crate) fn between(lower: Option<E>, upper: Option<E>) -> Self {
        Self {
            exact: None,
            lower,
            upper,
        }
    }

    /// Check if nothing is stored near the key (the tree is empty)
    pub fn is_empty(&self) -> bool {
        self.exact.is_none() && self.lower.is_none() && self.upper.is_none()
    }

    /// Both neighbors are known, or the key itself was found
    pub(crate) fn is_resolved(&self) -> bool {
        self.exact.is_some() || (self.lower.is_some() && self.upper.is_some())
    }

    /// Apply a function to every present entry
    pub fn map<F, R>(self, mut f: F) -> Nearest<R>
    where
        F: FnMut(E) -> R,
    {
        Nearest {
            exact: self.exact.map(&mut f),
            lower: self.lower.map(&mut f),
            upper: self.upper.map(&mut f),
        }
    }
}
