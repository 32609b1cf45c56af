//! String-keyed hash map used for the vocabulary.
//!
//! Entries live in a vector in insertion order, which is also the iteration
//! order. A power-of-two slot table indexes them with open addressing.
//! Colliding slots are chained through `next` links: a new slot probes
//! forward in steps of 61 from the end of its chain and gets linked there.
//! The empty string is kept outside the table.

use tracing::trace;

const INITIAL_CAPACITY: usize = 4;
const PROBE_STEP: usize = 61;
const LONG_CHAIN: usize = 17;
const NO_NEXT: u32 = 0;
const FREE: u32 = 0;

#[derive(Debug, Clone, Copy)]
struct Slot {
    // slot index + 1, 0 ends the chain
    next: u32,
    // entry index + 1, 0 is a free slot
    entry: u32,
}

impl Slot {
    const EMPTY: Slot = Slot {
        next: NO_NEXT,
        entry: FREE,
    };

    fn is_free(&self) -> bool {
        self.entry == FREE
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    hash: u32,
    key: String,
    value: V,
}

/// Hash of a word. The length seeds the state so that short words spread well.
pub fn hash_key(key: &str) -> u32 {
    let mut h = (key.len() as u32).wrapping_mul(0x55) ^ 0x00e5_b5e5;
    for &b in key.as_bytes() {
        h = h
            .wrapping_add(h >> 28)
            .wrapping_add(h << 4)
            .wrapping_add(b as u32);
    }
    h
}

#[derive(Debug, Clone)]
pub struct StringMap<V> {
    slots: Vec<Slot>,
    // None where a key was removed; compacted on rebuild
    entries: Vec<Option<Entry<V>>>,
    count: usize,
    empty_key: Option<V>,
}

impl<V> Default for StringMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> StringMap<V> {
    pub fn new() -> Self {
        StringMap {
            slots: Vec::new(),
            entries: Vec::new(),
            count: 0,
            empty_key: None,
        }
    }

    /// Number of keys, the empty key included.
    pub fn len(&self) -> usize {
        self.count + usize::from(self.empty_key.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        if key.is_empty() {
            return self.empty_key.as_ref();
        }
        let e = self.entry_index(key)?;
        self.entries[e].as_ref().map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        if key.is_empty() {
            return self.empty_key.as_mut();
        }
        let e = self.entry_index(key)?;
        self.entries[e].as_mut().map(|entry| &mut entry.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or replaces, returning the previous value. A replaced key
    /// keeps its place in iteration order.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        if key.is_empty() {
            return self.empty_key.replace(value);
        }
        if let Some(e) = self.entry_index(key) {
            return self.entries[e]
                .as_mut()
                .map(|entry| std::mem::replace(&mut entry.value, value));
        }
        self.insert_new(hash_key(key), key.to_string(), value);
        None
    }

    /// Returns the value for `key`, inserting `make()` first if it is absent.
    pub fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> V) -> &mut V {
        if key.is_empty() {
            return self.empty_key.get_or_insert_with(make);
        }
        let e = match self.entry_index(key) {
            Some(e) => e,
            None => self.insert_new(hash_key(key), key.to_string(), make()),
        };
        match &mut self.entries[e] {
            Some(entry) => &mut entry.value,
            None => unreachable!("occupied slots point at live entries"),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        if key.is_empty() {
            return self.empty_key.take();
        }
        if self.slots.is_empty() {
            return None;
        }

        let hash = hash_key(key);
        let mut i = hash as usize & self.mask();
        let mut prev = None;
        loop {
            if self.holds(i, hash, key) {
                break;
            }
            match self.slots[i].next {
                NO_NEXT => return None,
                next => {
                    prev = Some(i);
                    i = next as usize - 1;
                }
            }
        }

        // unhook the rest of the chain, then link it again from its home slots
        let mut tail = Vec::new();
        let mut link = self.slots[i].next;
        while link != NO_NEXT {
            let slot = std::mem::replace(&mut self.slots[link as usize - 1], Slot::EMPTY);
            link = slot.next;
            tail.push(slot.entry as usize - 1);
        }

        let removed = std::mem::replace(&mut self.slots[i], Slot::EMPTY);
        if let Some(p) = prev {
            self.slots[p].next = NO_NEXT;
        }
        let value = self.entries[removed.entry as usize - 1]
            .take()
            .map(|entry| entry.value);
        self.count -= 1;

        for e in tail {
            let Some(hash) = self.entries[e].as_ref().map(|entry| entry.hash) else {
                continue;
            };
            match self.claim(hash) {
                Some(slot) => self.slots[slot].entry = e as u32 + 1,
                None => {
                    // the rebuild links every remaining entry
                    self.rebuild(self.slots.len() * 2);
                    break;
                }
            }
        }
        value
    }

    /// The empty key first when present, then insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        let empty = self.empty_key.as_ref().map(|v| ("", v));
        empty.into_iter().chain(
            self.entries
                .iter()
                .flatten()
                .map(|entry| (entry.key.as_str(), &entry.value)),
        )
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn holds(&self, slot: usize, hash: u32, key: &str) -> bool {
        match self.slots[slot].entry {
            FREE => false,
            e => matches!(&self.entries[e as usize - 1],
                Some(entry) if entry.hash == hash && entry.key == key),
        }
    }

    fn entry_index(&self, key: &str) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        let hash = hash_key(key);
        let mut i = hash as usize & self.mask();
        loop {
            if self.holds(i, hash, key) {
                return Some(self.slots[i].entry as usize - 1);
            }
            match self.slots[i].next {
                NO_NEXT => return None,
                next => i = next as usize - 1,
            }
        }
    }

    // Finds a free slot for `hash` and links it at the end of the chain.
    // Returns None, leaving the table untouched, when that chain is too long
    // for a table this full.
    fn claim(&mut self, hash: u32) -> Option<usize> {
        let mask = self.mask();
        let home = hash as usize & mask;
        if self.slots[home].is_free() {
            self.slots[home].next = NO_NEXT;
            return Some(home);
        }

        let mut end = home;
        let mut chain = 0;
        while self.slots[end].next != NO_NEXT {
            end = self.slots[end].next as usize - 1;
            chain += 1;
        }
        if chain > LONG_CHAIN && (self.count + 1) * 4 >= self.slots.len() {
            return None;
        }

        let mut free = (end + PROBE_STEP) & mask;
        while !self.slots[free].is_free() {
            free = (free + PROBE_STEP) & mask;
        }
        self.slots[end].next = free as u32 + 1;
        self.slots[free].next = NO_NEXT;
        Some(free)
    }

    // `key` must be absent. Returns the new entry's index.
    fn insert_new(&mut self, hash: u32, key: String, value: V) -> usize {
        if self.entries.len() >= 2 * self.count + INITIAL_CAPACITY {
            self.rebuild(self.slots.len());
        }
        if (self.count + 1) * 10 > self.slots.len() * 9 {
            self.rebuild(self.slots.len() * 2);
        }
        let slot = loop {
            match self.claim(hash) {
                Some(slot) => break slot,
                None => self.rebuild(self.slots.len() * 2),
            }
        };

        self.entries.push(Some(Entry { hash, key, value }));
        let e = self.entries.len() - 1;
        self.slots[slot].entry = e as u32 + 1;
        self.count += 1;
        e
    }

    // Drops removed entries and links the rest into a fresh table of at least
    // `capacity` slots, doubling further while a chain comes out too long.
    fn rebuild(&mut self, capacity: usize) {
        let mut capacity = capacity.max(INITIAL_CAPACITY);
        self.entries.retain(Option::is_some);
        'table: loop {
            self.slots = vec![Slot::EMPTY; capacity];
            for e in 0..self.entries.len() {
                let Some(hash) = self.entries[e].as_ref().map(|entry| entry.hash) else {
                    continue;
                };
                match self.claim(hash) {
                    Some(slot) => self.slots[slot].entry = e as u32 + 1,
                    None => {
                        capacity *= 2;
                        continue 'table;
                    }
                }
            }
            trace!(capacity, entries = self.count, "string map rebuilt");
            return;
        }
    }
}
