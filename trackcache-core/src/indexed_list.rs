//! Doubly linked list with a key index, backed by a slot arena.
//!
//! Nodes live in a `Vec` of slots and link to each other by slot index, so
//! adjacent nodes never own one another. The key index stores generational
//! [`NodeHandle`]s: once a node is removed its slot generation is bumped and
//! every outstanding handle to it stops resolving, even if the slot is reused.
//!
//! ```text
//!   slots
//!   idx 0 | Node { key: "b", prev: None,    next: Some(2) }   <- head (MRU)
//!   idx 1 | <free>
//!   idx 2 | Node { key: "a", prev: Some(0), next: None }      <- tail (LRU)
//!
//!   index: { "a" -> (2, gen), "b" -> (0, gen) }
//! ```
//!
//! The list is single-threaded; callers serialize access (the tiers do it
//! with their mutex).

use std::collections::HashMap;
use std::fmt;

/// Non-owning locator for a node in an [`IndexedList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: usize,
    generation: u64,
}

/// Returned by [`IndexedList::insert_front`] when the key already has a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey(pub String);

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key {:?} is already present", self.0)
    }
}

impl std::error::Error for DuplicateKey {}

#[derive(Debug)]
struct Node<T> {
    key: String,
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    node: Option<Node<T>>,
}

#[derive(Debug)]
pub struct IndexedList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    index: HashMap<String, NodeHandle>,
}

impl<T> IndexedList<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            index: HashMap::new(),
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Inserts a new node at the front (most recently used position).
    pub fn insert_front(&mut self, key: String, value: T) -> Result<NodeHandle, DuplicateKey> {
        if self.index.contains_key(&key) {
            return Err(DuplicateKey(key));
        }

        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: self.head,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx].node = Some(node);
                idx
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                self.slots.len() - 1
            }
        };

        match self.head {
            Some(old_head) => {
                if let Some(head_node) = self.node_mut(old_head) {
                    head_node.prev = Some(idx);
                }
            }
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);

        let handle = NodeHandle {
            index: idx,
            generation: self.slots[idx].generation,
        };
        self.index.insert(key, handle);
        Ok(handle)
    }

    /// Moves an existing node to the front; returns `false` for a stale handle.
    pub fn move_to_front(&mut self, handle: NodeHandle) -> bool {
        if !self.contains(handle) {
            return false;
        }
        if self.head == Some(handle.index) {
            return true;
        }
        self.detach(handle.index);
        self.attach_front(handle.index);
        true
    }

    /// Unlinks the node and returns its key and value.
    pub fn remove(&mut self, handle: NodeHandle) -> Option<(String, T)> {
        if !self.contains(handle) {
            return None;
        }
        self.detach(handle.index);
        let slot = &mut self.slots[handle.index];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.index.remove(&node.key);
        Some((node.key, node.value))
    }

    /// Removes the least recently used node.
    pub fn remove_last(&mut self) -> Option<(String, T)> {
        let handle = self.last()?;
        self.remove(handle)
    }

    pub fn get_by_key(&self, key: &str) -> Option<NodeHandle> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.slots
            .get(handle.index)
            .map(|slot| slot.generation == handle.generation && slot.node.is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        self.live_node(handle).map(|node| &node.value)
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut T> {
        if !self.contains(handle) {
            return None;
        }
        self.node_mut(handle.index).map(|node| &mut node.value)
    }

    pub fn key_of(&self, handle: NodeHandle) -> Option<&str> {
        self.live_node(handle).map(|node| node.key.as_str())
    }

    /// Handle of the head (most recently used) node.
    pub fn first(&self) -> Option<NodeHandle> {
        self.head.map(|idx| self.handle_at(idx))
    }

    /// Handle of the tail (least recently used) node.
    pub fn last(&self) -> Option<NodeHandle> {
        self.tail.map(|idx| self.handle_at(idx))
    }

    /// Successor of `handle` in head-to-tail order.
    pub fn next(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let next = self.live_node(handle)?.next?;
        Some(self.handle_at(next))
    }

    /// Predecessor of `handle` in head-to-tail order.
    pub fn prev(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let prev = self.live_node(handle)?.prev?;
        Some(self.handle_at(prev))
    }

    /// Iterates `(key, value)` from head to tail.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            current: self.head,
        }
    }

    /// Drops every node and resets the list to empty.
    ///
    /// Slots are kept (with bumped generations) so handles issued before the
    /// clear can never alias nodes inserted after it.
    pub fn clear(&mut self) {
        self.free.clear();
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(idx);
        }
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    fn handle_at(&self, idx: usize) -> NodeHandle {
        NodeHandle {
            index: idx,
            generation: self.slots[idx].generation,
        }
    }

    fn live_node(&self, handle: NodeHandle) -> Option<&Node<T>> {
        let slot = self.slots.get(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node(&self, idx: usize) -> Option<&Node<T>> {
        self.slots.get(idx).and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(idx).and_then(|slot| slot.node.as_mut())
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = match self.node(idx) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = self.node_mut(prev_idx) {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = self.node_mut(next_idx) {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = None;
        }
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = old_head;
        } else {
            return;
        }
        match old_head {
            Some(old) => {
                if let Some(head_node) = self.node_mut(old) {
                    head_node.prev = Some(idx);
                }
            }
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if self.head.is_none() || self.tail.is_none() {
            assert!(self.head.is_none());
            assert!(self.tail.is_none());
            assert!(self.index.is_empty());
            return;
        }

        let mut seen = std::collections::HashSet::new();
        let mut count = 0usize;
        let mut prev = None;
        let mut current = self.head;

        while let Some(idx) = current {
            assert!(seen.insert(idx), "node {idx} visited twice");
            let node = self.node(idx).expect("linked slot is empty");
            assert_eq!(node.prev, prev);
            assert_eq!(self.index.get(&node.key), Some(&self.handle_at(idx)));
            if node.next.is_none() {
                assert_eq!(self.tail, Some(idx));
            }
            prev = Some(idx);
            current = node.next;
            count += 1;
            assert!(count <= self.index.len());
        }

        assert_eq!(count, self.index.len());
    }
}

impl<T> Default for IndexedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Head-to-tail iterator over `(key, value)`.
pub struct Iter<'a, T> {
    list: &'a IndexedList<T>,
    current: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (&'a str, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.current?;
        let node = self.list.node(idx)?;
        self.current = node.next;
        Some((node.key.as_str(), &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<T>(list: &IndexedList<T>) -> Vec<String> {
        list.iter().map(|(k, _)| k.to_string()).collect()
    }

    #[test]
    fn test_insert_front_orders_most_recent_first() {
        let mut list = IndexedList::new();
        list.insert_front("a".into(), 1).unwrap();
        list.insert_front("b".into(), 2).unwrap();
        list.insert_front("c".into(), 3).unwrap();

        assert_eq!(keys(&list), vec!["c", "b", "a"]);
        assert_eq!(list.len(), 3);
        list.debug_validate_invariants();
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut list = IndexedList::new();
        list.insert_front("a".into(), 1).unwrap();
        let err = list.insert_front("a".into(), 2).unwrap_err();
        assert_eq!(err, DuplicateKey("a".into()));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_move_to_front() {
        let mut list = IndexedList::new();
        let a = list.insert_front("a".into(), 1).unwrap();
        list.insert_front("b".into(), 2).unwrap();
        list.insert_front("c".into(), 3).unwrap();

        assert!(list.move_to_front(a));
        assert_eq!(keys(&list), vec!["a", "c", "b"]);
        // Already at front
        assert!(list.move_to_front(a));
        assert_eq!(keys(&list), vec!["a", "c", "b"]);
        list.debug_validate_invariants();
    }

    #[test]
    fn test_remove_middle_head_and_tail() {
        let mut list = IndexedList::new();
        let a = list.insert_front("a".into(), 1).unwrap();
        let b = list.insert_front("b".into(), 2).unwrap();
        let c = list.insert_front("c".into(), 3).unwrap();

        assert_eq!(list.remove(b), Some(("b".to_string(), 2)));
        list.debug_validate_invariants();
        assert_eq!(list.remove(c), Some(("c".to_string(), 3)));
        list.debug_validate_invariants();
        assert_eq!(list.remove(a), Some(("a".to_string(), 1)));
        list.debug_validate_invariants();
        assert!(list.is_empty());
        assert!(list.first().is_none());
        assert!(list.last().is_none());
    }

    #[test]
    fn test_remove_last_pops_lru() {
        let mut list = IndexedList::new();
        list.insert_front("a".into(), 1).unwrap();
        list.insert_front("b".into(), 2).unwrap();

        assert_eq!(list.remove_last(), Some(("a".to_string(), 1)));
        assert_eq!(list.remove_last(), Some(("b".to_string(), 2)));
        assert_eq!(list.remove_last(), None);
    }

    #[test]
    fn test_stale_handle_does_not_resolve_after_reuse() {
        let mut list = IndexedList::new();
        let a = list.insert_front("a".into(), 1).unwrap();
        list.remove(a);
        let b = list.insert_front("b".into(), 2).unwrap();

        // Slot was reused, but the old handle carries an older generation
        assert!(!list.contains(a));
        assert_eq!(list.get(a), None);
        assert!(!list.move_to_front(a));
        assert_eq!(list.remove(a), None);
        assert_eq!(list.get(b), Some(&2));
        list.debug_validate_invariants();
    }

    #[test]
    fn test_cursor_navigation() {
        let mut list = IndexedList::new();
        list.insert_front("a".into(), 1).unwrap();
        list.insert_front("b".into(), 2).unwrap();
        list.insert_front("c".into(), 3).unwrap();

        let head = list.first().unwrap();
        assert_eq!(list.key_of(head), Some("c"));
        let mid = list.next(head).unwrap();
        assert_eq!(list.key_of(mid), Some("b"));
        let tail = list.last().unwrap();
        assert_eq!(list.key_of(tail), Some("a"));
        assert_eq!(list.prev(tail), Some(mid));
        assert_eq!(list.next(tail), None);
        assert_eq!(list.prev(head), None);
    }

    #[test]
    fn test_clear_resets() {
        let mut list = IndexedList::new();
        let mut handles = Vec::new();
        for i in 0..10 {
            handles.push(list.insert_front(i.to_string(), i).unwrap());
        }
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);
        list.insert_front("x".into(), 0).unwrap();
        assert_eq!(list.len(), 1);
        assert!(handles.iter().all(|h| !list.contains(*h)));
        list.debug_validate_invariants();
    }

    #[test]
    fn test_get_mut_updates_value() {
        let mut list = IndexedList::new();
        let h = list.insert_front("a".into(), 1).unwrap();
        *list.get_mut(h).unwrap() = 10;
        assert_eq!(list.get(list.get_by_key("a").unwrap()), Some(&10));
    }
}
