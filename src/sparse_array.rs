//! Integer-keyed sparse array backing every word's co-occurrence vector.
//!
//! Small arrays filled from index zero upwards are kept flat. As soon as a
//! value lands well past the dense extent the array is rebuilt as a binary
//! trie over the key bits, most significant bit first. Every trie node holds
//! one key, and a node's key is never larger than any key below it, so the
//! smallest key of a subtree is always its root. Nodes live in an arena and
//! link to their children by arena index; index 0 is the root, which is never
//! anybody's child, so a zero link means "no child".

use crate::error::{Error, Result};
use tracing::trace;

/// Writes further than this past the dense extent promote a flat array to a trie,
/// unless the key itself is below the limit.
const FLAT_GAP_LIMIT: u32 = 32;
const KEY_BITS: u32 = u32::BITS;
const NO_CHILD: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Flat,
    Trie,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    key: u32,
    zero: u32,
    one: u32,
}

impl Node {
    fn leaf(key: u32) -> Self {
        Node {
            key,
            zero: NO_CHILD,
            one: NO_CHILD,
        }
    }

    fn child(&self, one: bool) -> u32 {
        if one { self.one } else { self.zero }
    }

    fn set_child(&mut self, one: bool, index: u32) {
        if one {
            self.one = index;
        } else {
            self.zero = index;
        }
    }
}

#[derive(Debug, Clone)]
enum Storage<V> {
    Flat(Vec<V>),
    Trie { nodes: Vec<Node>, values: Vec<V> },
}

/// Mapping from `u32` keys to values, where absent keys read as `V::default()`.
///
/// `len()` is a pseudo-length: one past the highest key ever written, default
/// writes included. Iteration only ever yields keys holding a non-default value.
#[derive(Debug, Clone)]
pub struct SparseArray<V> {
    storage: Storage<V>,
    len: u64,
}

impl<V: Copy + Default + PartialEq> Default for SparseArray<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SparseArray<V> {
    pub fn mode(&self) -> Mode {
        match self.storage {
            Storage::Flat(_) => Mode::Flat,
            Storage::Trie { .. } => Mode::Trie,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<V: Copy + Default + PartialEq> SparseArray<V> {
    pub fn new() -> Self {
        Self::with_mode(Mode::Flat)
    }

    pub fn with_mode(mode: Mode) -> Self {
        let storage = match mode {
            Mode::Flat => Storage::Flat(Vec::new()),
            Mode::Trie => Storage::Trie {
                nodes: Vec::new(),
                values: Vec::new(),
            },
        };
        SparseArray { storage, len: 0 }
    }

    pub fn get(&self, key: u32) -> V {
        match &self.storage {
            Storage::Flat(values) => values.get(key as usize).copied().unwrap_or_default(),
            Storage::Trie { nodes, values } => find(nodes, key).map(|i| values[i]).unwrap_or_default(),
        }
    }

    pub fn set(&mut self, key: u32, value: V) {
        let is_default = value == V::default();
        let promote = match &mut self.storage {
            Storage::Flat(values) => {
                let extent = values.len();
                if (key as usize) < extent {
                    values[key as usize] = value;
                    false
                } else if is_default {
                    // nothing to store, only the pseudo-length moves
                    false
                } else if key as usize == extent || key < FLAT_GAP_LIMIT {
                    values.resize(key as usize + 1, V::default());
                    values[key as usize] = value;
                    false
                } else {
                    true
                }
            }
            Storage::Trie { nodes, values } => {
                trie_insert(nodes, values, key, value);
                false
            }
        };

        if promote {
            self.promote();
            self.set(key, value);
            return;
        }
        self.len = self.len.max(key as u64 + 1);
    }

    /// Appends at index `len()`.
    pub fn push(&mut self, value: V) -> Result<()> {
        let key = u32::try_from(self.len).map_err(|_| {
            Error::MapInvariantViolation("sparse array is full, cannot push".to_string())
        })?;
        self.set(key, value);
        Ok(())
    }

    /// Removes the last logical index and returns the value it held.
    pub fn pop(&mut self) -> Option<V> {
        let last = u32::try_from(self.len.checked_sub(1)?).ok()?;
        let value = self.get(last);
        self.set(last, V::default());
        self.len -= 1;
        Some(value)
    }

    /// Only the last logical index can be removed; anything else is an error
    /// and leaves the array untouched.
    pub fn remove_at(&mut self, index: u32) -> Result<V> {
        if self.len == 0 || index as u64 != self.len - 1 {
            return Err(Error::MapInvariantViolation(format!(
                "cannot remove index {index} from a sparse array of length {}",
                self.len
            )));
        }
        self.pop().ok_or_else(|| {
            Error::MapInvariantViolation(format!("index {index} vanished during removal"))
        })
    }

    pub fn clear(&mut self) {
        *self = Self::with_mode(self.mode());
    }

    /// Shrinks the pseudo-length to one past the last non-default entry.
    pub fn trim(&mut self) {
        self.len = match self.predecessor_entry(u32::MAX) {
            Some((key, _)) => key as u64 + 1,
            None => 0,
        };
    }

    /// Number of keys holding a non-default value.
    pub fn populated(&self) -> usize {
        let values = match &self.storage {
            Storage::Flat(values) => values,
            Storage::Trie { values, .. } => values,
        };
        values.iter().filter(|v| **v != V::default()).count()
    }

    /// Rebuilds a flat array as a trie, keeping every non-default entry and the
    /// pseudo-length. Does nothing for an array that is already a trie.
    pub fn promote(&mut self) {
        let Storage::Flat(flat) = &self.storage else {
            return;
        };

        let mut nodes = Vec::new();
        let mut values = Vec::new();
        for (key, &value) in flat.iter().enumerate() {
            if value != V::default() {
                trie_insert(&mut nodes, &mut values, key as u32, value);
            }
        }
        trace!(entries = nodes.len(), len = self.len, "promoting sparse array to trie");
        self.storage = Storage::Trie { nodes, values };
    }

    /// Smallest key `>= key` holding a non-default value.
    pub fn successor(&self, key: u32) -> Option<u32> {
        self.successor_entry(key).map(|(k, _)| k)
    }

    /// Largest key `<= key` holding a non-default value.
    pub fn predecessor(&self, key: u32) -> Option<u32> {
        self.predecessor_entry(key).map(|(k, _)| k)
    }

    pub fn ascending(&self) -> Ascending<'_, V> {
        Ascending {
            array: self,
            next: Some(0),
        }
    }

    pub fn descending(&self) -> Descending<'_, V> {
        let next = self
            .len
            .checked_sub(1)
            .map(|last| last.min(u32::MAX as u64) as u32);
        Descending { array: self, next }
    }

    fn successor_entry(&self, key: u32) -> Option<(u32, V)> {
        let mut from = key;
        loop {
            let (k, v) = self.stored_at_or_after(from)?;
            if v != V::default() {
                return Some((k, v));
            }
            from = k.checked_add(1)?;
        }
    }

    fn predecessor_entry(&self, key: u32) -> Option<(u32, V)> {
        let mut from = key;
        loop {
            let (k, v) = self.stored_at_or_before(from)?;
            if v != V::default() {
                return Some((k, v));
            }
            from = k.checked_sub(1)?;
        }
    }

    // Materialized entries, default values included.
    fn stored_at_or_after(&self, key: u32) -> Option<(u32, V)> {
        match &self.storage {
            Storage::Flat(values) => values.get(key as usize).map(|v| (key, *v)),
            Storage::Trie { nodes, values } => {
                trie_successor(nodes, key).map(|i| (nodes[i].key, values[i]))
            }
        }
    }

    fn stored_at_or_before(&self, key: u32) -> Option<(u32, V)> {
        match &self.storage {
            Storage::Flat(values) => {
                let last = values.len().checked_sub(1)?;
                let k = (key as usize).min(last);
                Some((k as u32, values[k]))
            }
            Storage::Trie { nodes, values } => {
                trie_predecessor(nodes, key).map(|i| (nodes[i].key, values[i]))
            }
        }
    }
}

/// Lazy ascending walk over the populated keys.
pub struct Ascending<'a, V> {
    array: &'a SparseArray<V>,
    next: Option<u32>,
}

impl<V: Copy + Default + PartialEq> Iterator for Ascending<'_, V> {
    type Item = (u32, V);

    fn next(&mut self) -> Option<Self::Item> {
        let from = self.next?;
        let entry = self.array.successor_entry(from);
        self.next = entry.and_then(|(k, _)| k.checked_add(1));
        entry
    }
}

/// Lazy descending walk over the populated keys.
pub struct Descending<'a, V> {
    array: &'a SparseArray<V>,
    next: Option<u32>,
}

impl<V: Copy + Default + PartialEq> Iterator for Descending<'_, V> {
    type Item = (u32, V);

    fn next(&mut self) -> Option<Self::Item> {
        let from = self.next?;
        let entry = self.array.predecessor_entry(from);
        self.next = entry.and_then(|(k, _)| k.checked_sub(1));
        entry
    }
}

fn bit(key: u32, depth: u32) -> bool {
    (key >> (KEY_BITS - 1 - depth)) & 1 == 1
}

fn find(nodes: &[Node], key: u32) -> Option<usize> {
    if nodes.is_empty() {
        return None;
    }
    // ids written in order tend to sit at the arena slot of the same number
    if let Some(node) = nodes.get(key as usize) {
        if node.key == key {
            return Some(key as usize);
        }
    }

    let mut i = 0;
    let mut depth = 0;
    loop {
        let node = nodes[i];
        if node.key == key {
            return Some(i);
        }
        if node.key > key || depth >= KEY_BITS {
            return None;
        }
        let next = node.child(bit(key, depth));
        if next == NO_CHILD {
            return None;
        }
        i = next as usize;
        depth += 1;
    }
}

fn trie_insert<V: Copy + Default + PartialEq>(
    nodes: &mut Vec<Node>,
    values: &mut Vec<V>,
    key: u32,
    value: V,
) {
    if let Some(i) = find(nodes, key) {
        values[i] = value;
        return;
    }
    if value == V::default() {
        return;
    }
    if nodes.is_empty() {
        nodes.push(Node::leaf(key));
        values.push(value);
        return;
    }

    let (mut key, mut value) = (key, value);
    let mut i = 0;
    let mut depth = 0;
    loop {
        let node = nodes[i];
        if node.key > key {
            // the smaller key takes this node, the displaced one sinks further down
            nodes[i].key = key;
            let displaced = std::mem::replace(&mut values[i], value);
            if displaced == V::default() {
                return;
            }
            key = node.key;
            value = displaced;
            continue;
        }

        debug_assert!(depth < KEY_BITS, "trie deeper than the key width");
        let one = bit(key, depth);
        let next = node.child(one);
        if next == NO_CHILD {
            let index = nodes.len() as u32;
            nodes.push(Node::leaf(key));
            values.push(value);
            nodes[i].set_child(one, index);
            return;
        }
        i = next as usize;
        depth += 1;
    }
}

fn trie_successor(nodes: &[Node], key: u32) -> Option<usize> {
    if nodes.is_empty() {
        return None;
    }

    // root of the nearest subtree lying entirely above `key`
    let mut fallback = None;
    let mut i = 0;
    let mut depth = 0;
    loop {
        let node = nodes[i];
        if node.key >= key {
            return Some(i);
        }
        if depth >= KEY_BITS {
            return fallback;
        }
        let next = if bit(key, depth) {
            node.one
        } else {
            if node.one != NO_CHILD {
                fallback = Some(node.one as usize);
            }
            node.zero
        };
        if next == NO_CHILD {
            return fallback;
        }
        i = next as usize;
        depth += 1;
    }
}

fn trie_predecessor(nodes: &[Node], key: u32) -> Option<usize> {
    if nodes.is_empty() {
        return None;
    }

    let mut best: Option<usize> = None;
    // root of the nearest subtree lying entirely below `key`
    let mut lower = None;
    let mut i = 0;
    let mut depth = 0;
    loop {
        let node = nodes[i];
        if node.key > key {
            break;
        }
        best = Some(i);
        if node.key == key || depth >= KEY_BITS {
            return best;
        }
        let next = if bit(key, depth) {
            if node.zero != NO_CHILD {
                lower = Some(node.zero as usize);
            }
            node.one
        } else {
            node.zero
        };
        if next == NO_CHILD {
            break;
        }
        i = next as usize;
        depth += 1;
    }

    let lower_max = lower.map(|root| subtree_max(nodes, root));
    match (best, lower_max) {
        (Some(b), Some(l)) => Some(if nodes[b].key >= nodes[l].key { b } else { l }),
        (b, l) => b.or(l),
    }
}

fn subtree_max(nodes: &[Node], mut i: usize) -> usize {
    loop {
        let node = nodes[i];
        if node.one != NO_CHILD {
            i = node.one as usize;
        } else if node.zero != NO_CHILD {
            i = node.zero as usize;
        } else {
            return i;
        }
    }
}
