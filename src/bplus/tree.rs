//! Ordered B+tree map.
//!
//! Same handle shape as [`OrderedTree`](crate::OrderedTree), with separate
//! keys and values. Entries handed out by reads and iterators are clones.

use super::cursor::Cursor;
use super::node::{InsertOutcome, Node, Split};
use crate::error::Result;
use crate::guard::{CountObservers, IterationCounter, IterationGuard, SubscriptionId};
use crate::types::{exceeds_upper, Comparable, Halt, Nearest, NodeLimits, Traversal, TreeConfig};
use parking_lot::{RwLock, RwLockReadGuard};
use std::fmt;
use std::mem;
use std::ops::ControlFlow;

struct MapState<K, V> {
    root: Node<K, V>,
    count: usize,
}

/// An in-memory B+tree mapping keys to values.
///
/// Values live in the leaves only; internal nodes hold routing copies of
/// keys. Like the B-tree, mutations fail with
/// [`TreeError::IllegalState`](crate::TreeError::IllegalState) while a
/// traversal is running.
pub struct OrderedMap<K, V> {
    config: TreeConfig,
    limits: NodeLimits,
    state: RwLock<MapState<K, V>>,
    iterations: IterationCounter,
    observers: CountObservers,
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::with_config(TreeConfig::default())
    }
}

impl<K, V> OrderedMap<K, V> {
    /// Create an empty map with the default branching factor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map; factors below 3 are raised to 3
    pub fn with_branching_factor(branching_factor: usize) -> Self {
        Self::with_config(TreeConfig::new(branching_factor))
    }

    pub fn with_config(config: TreeConfig) -> Self {
        let config = TreeConfig::new(config.branching_factor);
        let limits = config.limits();
        Self {
            config,
            limits,
            state: RwLock::new(MapState {
                root: Node::new_leaf(limits),
                count: 0,
            }),
            iterations: IterationCounter::new(),
            observers: CountObservers::new(),
        }
    }

    pub fn config(&self) -> TreeConfig {
        self.config
    }

    pub fn branching_factor(&self) -> usize {
        self.config.branching_factor
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.state.read_recursive().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Height of the tree; all entries sit at this depth
    pub fn height(&self) -> usize {
        self.state.read_recursive().root.height()
    }

    /// Get the number of traversals currently running
    pub fn active_iterations(&self) -> usize {
        self.iterations.active()
    }

    /// Register a callback invoked with the new count whenever it changes
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Remove all entries
    pub fn clear(&self) -> Result<()> {
        self.iterations.ensure_idle()?;
        let previous = {
            let mut state = self.state.write();
            state.root = Node::new_leaf(self.limits);
            mem::replace(&mut state.count, 0)
        };
        tracing::debug!(removed = previous, "cleared ordered map");
        if previous != 0 {
            self.observers.notify(0);
        }
        Ok(())
    }

    /// Visit every entry in key order until the visitor breaks
    pub fn for_each<F>(&self, mut visitor: F) -> Traversal
    where
        K: Ord,
        F: FnMut(&K, &V) -> ControlFlow<()>,
    {
        let _guard = self.iterations.enter();
        let state = self.state.read_recursive();
        Halt::into_traversal(state.root.visit::<K, F>(None, None, false, &mut visitor))
    }

    /// Visit every entry with a key `>= lower` and below `upper` (or equal
    /// to it when `max_inclusive`) until the visitor breaks
    pub fn for_each_in_range<Q, F>(
        &self,
        lower: Option<&Q>,
        upper: Option<&Q>,
        max_inclusive: bool,
        mut visitor: F,
    ) -> Traversal
    where
        Q: Comparable<K> + ?Sized,
        F: FnMut(&K, &V) -> ControlFlow<()>,
    {
        let _guard = self.iterations.enter();
        let state = self.state.read_recursive();
        Halt::into_traversal(state.root.visit(lower, upper, max_inclusive, &mut visitor))
    }

    /// Check if an entry for `key` is stored
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: Comparable<K> + ?Sized,
    {
        self.state.read_recursive().root.get(key).is_some()
    }
}

impl<K: Clone, V> OrderedMap<K, V> {
    /// Remove the entry for `key`, returning its value
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        Q: Comparable<K> + ?Sized,
    {
        let removed = self.remove_with(|root, limits| root.remove(key, limits))?;
        Ok(removed.map(|(_, value)| value))
    }

    /// Remove and return the entry with the smallest key
    pub fn remove_min(&self) -> Result<Option<(K, V)>> {
        self.remove_with(|root, limits| root.remove_min(limits))
    }

    /// Remove and return the entry with the largest key
    pub fn remove_max(&self) -> Result<Option<(K, V)>> {
        self.remove_with(|root, limits| root.remove_max(limits))
    }

    fn remove_with<F>(&self, remove: F) -> Result<Option<(K, V)>>
    where
        F: FnOnce(&mut Node<K, V>, NodeLimits) -> Option<(K, V)>,
    {
        self.iterations.ensure_idle()?;
        let (removed, count) = {
            let mut state = self.state.write();
            let removed = remove(&mut state.root, self.limits);
            if removed.is_some() {
                if !state.root.is_leaf() && state.root.len() == 0 {
                    let old_root = mem::replace(&mut state.root, Node::new_leaf(self.limits));
                    state.root = old_root.into_only_child();
                    tracing::trace!(height = state.root.height(), "collapsed root");
                }
                state.count -= 1;
            }
            (removed, state.count)
        };
        if removed.is_some() {
            self.observers.notify(count);
        }
        Ok(removed)
    }
}

impl<K: Ord + Clone, V> OrderedMap<K, V> {
    /// Insert an entry, or overwrite the key and value of an existing one.
    ///
    /// Returns `true` if an existing entry was overwritten.
    pub fn insert_or_update(&self, key: K, value: V) -> Result<bool> {
        self.iterations.ensure_idle()?;
        let (updated, count) = {
            let mut state = self.state.write();
            match state.root.insert_or_update(key, value, self.limits) {
                InsertOutcome::Updated => (true, state.count),
                InsertOutcome::Inserted(split) => {
                    if let Some(Split { separator, right }) = split {
                        let left = mem::replace(&mut state.root, Node::new_leaf(self.limits));
                        state.root = Node::new_root(left, separator, right, self.limits);
                        tracing::trace!(height = state.root.height(), "split root");
                    }
                    state.count += 1;
                    (false, state.count)
                }
            }
        };
        if !updated {
            self.observers.notify(count);
        }
        Ok(updated)
    }
}

impl<K: Clone, V: Clone> OrderedMap<K, V> {
    /// Get the value stored for `key`
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        Q: Comparable<K> + ?Sized,
    {
        self.state.read_recursive().root.get(key).map(|(_, value)| value.clone())
    }

    /// Get the entry stored for `key`
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(K, V)>
    where
        Q: Comparable<K> + ?Sized,
    {
        self.state.read_recursive().root.get(key).map(cloned_entry)
    }

    pub fn min(&self) -> Option<(K, V)> {
        self.state.read_recursive().root.min().map(cloned_entry)
    }

    pub fn max(&self) -> Option<(K, V)> {
        self.state.read_recursive().root.max().map(cloned_entry)
    }

    /// Get the entry for `key`, or the entries on both sides of it
    pub fn nearest<Q>(&self, key: &Q) -> Nearest<(K, V)>
    where
        Q: Comparable<K> + ?Sized,
    {
        self.state.read_recursive().root.nearest(key).map(cloned_entry)
    }

    /// Lazily iterate over all entries in key order
    pub fn iter(&self) -> MapRange<'_, '_, K, V, K>
    where
        K: Ord,
    {
        MapRange::new(self, None, None, false)
    }

    /// Lazily iterate over entries with keys `>= lower` and below `upper`
    /// (or equal to it when `max_inclusive`)
    pub fn range<'a, 'q, Q>(
        &'a self,
        lower: Option<&'q Q>,
        upper: Option<&'q Q>,
        max_inclusive: bool,
    ) -> MapRange<'a, 'q, K, V, Q>
    where
        Q: Comparable<K> + ?Sized,
    {
        MapRange::new(self, lower, upper, max_inclusive)
    }
}

fn cloned_entry<K: Clone, V: Clone>((key, value): (&K, &V)) -> (K, V) {
    (key.clone(), value.clone())
}

#[cfg(feature = "diagnostics")]
impl<K: fmt::Debug, V: fmt::Debug> OrderedMap<K, V> {
    /// Export the node structure for inspection
    pub fn export_tree(&self) -> crate::diagnostics::TreeNode {
        self.state.read_recursive().root.snapshot()
    }

    pub fn export_json(&self) -> Result<String> {
        self.export_tree().to_json()
    }

    /// Render the tree sideways, largest keys first
    pub fn pretty_string(&self) -> String {
        self.export_tree().pretty_string()
    }
}

impl<K, V> fmt::Debug for OrderedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedMap")
            .field("count", &self.len())
            .field("branching_factor", &self.branching_factor())
            .finish()
    }
}

impl<'a, K: Ord + Clone, V: Clone> IntoIterator for &'a OrderedMap<K, V> {
    type Item = (K, V);
    type IntoIter = MapRange<'a, 'a, K, V, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy key-ordered iterator over an [`OrderedMap`].
///
/// Blocks mutations of the map until dropped.
pub struct MapRange<'a, 'q, K, V, Q: ?Sized = K> {
    state: RwLockReadGuard<'a, MapState<K, V>>,
    _guard: IterationGuard<'a>,
    cursor: Cursor,
    upper: Option<&'q Q>,
    max_inclusive: bool,
}

impl<'a, 'q, K, V, Q> MapRange<'a, 'q, K, V, Q>
where
    Q: Comparable<K> + ?Sized,
{
    fn new(
        map: &'a OrderedMap<K, V>,
        lower: Option<&'q Q>,
        upper: Option<&'q Q>,
        max_inclusive: bool,
    ) -> Self {
        let guard = map.iterations.enter();
        let state = map.state.read_recursive();
        let cursor = match lower {
            Some(key) => Cursor::seek(&state.root, key),
            None => Cursor::first(&state.root),
        };
        Self {
            state,
            _guard: guard,
            cursor,
            upper,
            max_inclusive,
        }
    }
}

impl<K, V, Q> Iterator for MapRange<'_, '_, K, V, Q>
where
    K: Clone,
    V: Clone,
    Q: Comparable<K> + ?Sized,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        let entry = self.cursor.next(&self.state.root)?;
        if exceeds_upper(self.upper, entry.0, self.max_inclusive) {
            self.cursor.finish();
            return None;
        }
        Some(cloned_entry(entry))
    }
}

impl<K, V, Q> std::iter::FusedIterator for MapRange<'_, '_, K, V, Q>
where
    K: Clone,
    V: Clone,
    Q: Comparable<K> + ?Sized,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const DEGREES: [usize; 4] = [3, 4, 5, 10];
    const COUNTS: [u32; 9] = [3, 4, 5, 6, 7, 12, 20, 100, 1000];

    fn shuffled(count: u32, seed: u64) -> Vec<u32> {
        let mut keys: Vec<u32> = (0..count).collect();
        keys.shuffle(&mut StdRng::seed_from_u64(seed));
        keys
    }

    fn filled(degree: usize, keys: impl IntoIterator<Item = u32>) -> OrderedMap<u32, String> {
        let map = OrderedMap::with_branching_factor(degree);
        for key in keys {
            map.insert_or_update(key, format!("v{key}")).unwrap();
        }
        map
    }

    fn check<V>(map: &OrderedMap<u32, V>) {
        let state = map.state.read();
        let (count, _) = state.root.check_invariants(map.limits, true);
        assert_eq!(count, state.count);
    }

    #[test]
    fn test_empty_map() {
        let map: OrderedMap<u32, String> = OrderedMap::new();
        assert!(map.is_empty());
        assert_eq!(map.branching_factor(), 64);
        assert_eq!(map.get(&1u32), None);
        assert_eq!(map.min(), None);
        assert_eq!(map.max(), None);
        assert!(map.nearest(&1u32).is_empty());
        assert_eq!(map.remove(&1u32).unwrap(), None);
        assert_eq!(map.remove_min().unwrap(), None);
        assert_eq!(map.remove_max().unwrap(), None);
        assert_eq!(map.iter().next(), None);
        assert_eq!(map.for_each(|_, _| ControlFlow::Continue(())), Traversal::Completed);
    }

    #[test]
    fn test_documented_scenario() {
        let map = filled(3, [7, 3, 1, 5, 0, 6, 2, 4, 8]);
        let keys: Vec<u32> = map.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, (0..9).collect::<Vec<_>>());
        check(&map);

        assert_eq!(map.remove(&4u32).unwrap(), Some("v4".to_string()));
        assert_eq!(map.len(), 8);
        check(&map);

        let nearest = map.nearest(&4u32);
        assert_eq!(nearest.exact, None);
        assert_eq!(nearest.lower, Some((3, "v3".to_string())));
        assert_eq!(nearest.upper, Some((5, "v5".to_string())));
    }

    #[test]
    fn test_insert_get_and_update() {
        for degree in DEGREES {
            for count in COUNTS {
                let map = filled(degree, shuffled(count, 7));
                assert_eq!(map.len(), count as usize);
                check(&map);

                for key in 0..count {
                    assert_eq!(map.get(&key), Some(format!("v{key}")));
                    assert!(map.contains(&key));
                }
                assert!(!map.contains(&count));

                for key in shuffled(count, 8) {
                    assert!(map.insert_or_update(key, format!("w{key}")).unwrap());
                }
                assert_eq!(map.len(), count as usize);
                assert_eq!(map.get(&0u32), Some("w0".to_string()));
                assert_eq!(map.min(), Some((0, "w0".to_string())));
                assert_eq!(map.max(), Some((count - 1, format!("w{}", count - 1))));
                check(&map);
            }
        }
    }

    #[test]
    fn test_remove_and_reinsert() {
        for degree in DEGREES {
            for count in COUNTS {
                let map = filled(degree, 0..count);
                let mut expected = count as usize;
                for key in shuffled(count, 11) {
                    assert_eq!(map.remove(&key).unwrap(), Some(format!("v{key}")));
                    expected -= 1;

                    map.insert_or_update(key, "again".to_string()).unwrap();
                    assert_eq!(map.get(&key), Some("again".to_string()));
                    assert_eq!(map.remove(&key).unwrap(), Some("again".to_string()));
                    assert_eq!(map.remove(&key).unwrap(), None);
                    assert!(!map.contains(&key));
                    assert_eq!(map.len(), expected);
                }
                check(&map);
                assert_eq!(map.height(), 1);
            }
        }
    }

    #[test]
    fn test_remove_min_and_max() {
        for degree in DEGREES {
            for count in COUNTS {
                let map = filled(degree, shuffled(count, 3));
                let mut low = 0;
                let mut high = count;
                while !map.is_empty() {
                    if (low + high) % 2 == 0 {
                        assert_eq!(map.remove_min().unwrap().map(|(k, _)| k), Some(low));
                        low += 1;
                    } else {
                        high -= 1;
                        assert_eq!(map.remove_max().unwrap(), Some((high, format!("v{high}"))));
                    }
                    assert_eq!(map.len(), (high - low) as usize);
                }
                check(&map);
            }
        }
    }

    #[test]
    fn test_random_operations_match_reference() {
        let mut rng = StdRng::seed_from_u64(42);
        for degree in DEGREES {
            let map = OrderedMap::with_branching_factor(degree);
            let mut reference = BTreeMap::new();
            for step in 0..3000u32 {
                let key = rng.gen_range(0..500u32);
                if rng.gen_bool(0.6) {
                    let updated = map.insert_or_update(key, step).unwrap();
                    assert_eq!(updated, reference.insert(key, step).is_some());
                } else {
                    assert_eq!(map.remove(&key).unwrap(), reference.remove(&key));
                }
                assert_eq!(map.len(), reference.len());
                if step % 100 == 0 {
                    check(&map);
                    assert!(map.iter().eq(reference.iter().map(|(k, v)| (*k, *v))));
                }
            }
            check(&map);
        }
    }

    #[test]
    fn test_range_matches_linear_scan() {
        for degree in DEGREES {
            for count in [3u32, 7, 20, 90] {
                let map = filled(degree, shuffled(count, 5));
                let bounds = [None, Some(0), Some(count), Some(count / 2), Some(count / 3)];

                for lower in bounds {
                    for upper in bounds {
                        for inclusive in [false, true] {
                            let expected: Vec<u32> = (0..count)
                                .filter(|&k| lower.map_or(true, |l| k >= l))
                                .filter(|&k| match upper {
                                    None => true,
                                    Some(u) if inclusive => k <= u,
                                    Some(u) => k < u,
                                })
                                .collect();

                            let pulled: Vec<u32> = map
                                .range(lower.as_ref(), upper.as_ref(), inclusive)
                                .map(|(key, value)| {
                                    assert_eq!(value, format!("v{key}"));
                                    key
                                })
                                .collect();
                            assert_eq!(pulled, expected, "{lower:?}..{upper:?} {inclusive}");

                            let mut pushed = Vec::new();
                            let traversal = map.for_each_in_range(
                                lower.as_ref(),
                                upper.as_ref(),
                                inclusive,
                                |key, _| {
                                    pushed.push(*key);
                                    ControlFlow::Continue(())
                                },
                            );
                            assert_eq!(traversal, Traversal::Completed);
                            assert_eq!(pushed, expected);

                            let mut visited = 0;
                            let traversal = map.for_each_in_range(
                                lower.as_ref(),
                                upper.as_ref(),
                                inclusive,
                                |_, _| {
                                    visited += 1;
                                    ControlFlow::Break(())
                                },
                            );
                            assert_eq!(visited, expected.len().min(1));
                            assert_eq!(traversal.is_canceled(), !expected.is_empty());
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_range_after_removals() {
        // Removing separator keys leaves routing copies behind
        let map = filled(3, 0..50);
        for key in (0..50).step_by(2) {
            map.remove(&key).unwrap();
        }
        check(&map);

        let keys: Vec<u32> = map.range(Some(&10u32), Some(&20u32), true).map(|(k, _)| k).collect();
        assert_eq!(keys, vec![11, 13, 15, 17, 19]);
        let nearest = map.nearest(&10u32).map(|(k, _)| k);
        assert_eq!(nearest, Nearest::between(Some(9), Some(11)));
    }

    #[test]
    fn test_nearest() {
        for degree in DEGREES {
            for count in [3u32, 5, 20, 90] {
                let map = filled(degree, shuffled(count, 13).into_iter().map(|k| (k + 1) * 10));

                for key in 0..=(10 * (count + 1)) {
                    let nearest = map.nearest(&key).map(|(k, _)| k);
                    if key < 10 {
                        assert_eq!(nearest, Nearest::between(None, Some(10)));
                    } else if key > count * 10 {
                        assert_eq!(nearest, Nearest::between(Some(count * 10), None));
                    } else if key % 10 == 0 {
                        assert_eq!(nearest, Nearest::exact(key));
                    } else {
                        let below = key / 10 * 10;
                        assert_eq!(nearest, Nearest::between(Some(below), Some(below + 10)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_borrowed_key_lookup() {
        let map = OrderedMap::with_branching_factor(4);
        for word in ["pear", "apple", "fig", "kiwi", "banana", "cherry"] {
            map.insert_or_update(word.to_string(), word.len()).unwrap();
        }
        assert_eq!(map.get("fig"), Some(3));
        assert!(map.contains("kiwi"));
        let fruits: Vec<String> = map.range(Some("b"), Some("g"), false).map(|(k, _)| k).collect();
        assert_eq!(fruits, vec!["banana", "cherry", "fig"]);
        assert_eq!(map.remove("apple").unwrap(), Some(5));
        assert_eq!(map.min().map(|(k, _)| k), Some("banana".to_string()));
    }

    #[test]
    fn test_mutation_during_traversal_rejected() {
        let map = filled(3, 0..10);

        let traversal = map.for_each(|key, _| {
            assert!(map.insert_or_update(key + 100, String::new()).unwrap_err().is_illegal_state());
            assert!(map.remove(key).unwrap_err().is_illegal_state());
            assert!(map.remove_min().unwrap_err().is_illegal_state());
            assert!(map.clear().unwrap_err().is_illegal_state());
            assert_eq!(map.get(key), Some(format!("v{key}")));
            ControlFlow::Continue(())
        });
        assert_eq!(traversal, Traversal::Completed);

        let mut iter = map.iter();
        assert_eq!(iter.next().map(|(k, _)| k), Some(0));
        assert!(map.remove_max().unwrap_err().is_illegal_state());
        drop(iter);

        assert!(!map.insert_or_update(100, String::new()).unwrap());
        assert_eq!(map.len(), 11);
        assert_eq!(map.active_iterations(), 0);
    }

    #[test]
    fn test_count_observers() {
        let map = OrderedMap::with_branching_factor(3);
        let calls = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));

        map.subscribe(|_| panic!("faulty observer"));
        let (calls_clone, last_clone) = (calls.clone(), last.clone());
        let id = map.subscribe(move |count| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            last_clone.store(count, Ordering::SeqCst);
        });

        for key in 0..5u32 {
            map.insert_or_update(key, ()).unwrap();
        }
        map.insert_or_update(3, ()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(last.load(Ordering::SeqCst), 5);

        map.remove_max().unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 4);

        assert!(map.unsubscribe(id));
        map.clear().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert!(map.is_empty());
    }

    #[test]
    fn test_into_iterator_and_debug() {
        let map = filled(5, 0..20);
        let mut total = 0;
        for (key, value) in &map {
            assert_eq!(value, format!("v{key}"));
            total += 1;
        }
        assert_eq!(total, 20);
        assert_eq!(format!("{map:?}"), "OrderedMap { count: 20, branching_factor: 5 }");
    }
}
