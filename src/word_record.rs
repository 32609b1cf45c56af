use crate::error::{Error, Result};
use crate::sparse_array::{Mode, SparseArray};
use std::cmp::Ordering;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

pub type WordId = u32;

/// Identifies the engine a record was created by. Ids from different engines
/// are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(u64);

impl EngineId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        EngineId(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// One vocabulary entry: its identity plus a sparse co-occurrence vector
/// indexed by neighbour word id.
///
/// Records produced by vector algebra, and records for unknown words, carry
/// no id. Results built from unit vectors are marked as such and are not
/// held to the noise floor.
#[derive(Debug, Clone)]
pub struct WordRecord {
    engine: EngineId,
    id: Option<WordId>,
    word: Option<String>,
    window_size: usize,
    vector: SparseArray<f64>,
    norm: OnceLock<f64>,
    unit_scaled: bool,
}

impl WordRecord {
    pub(crate) fn new(engine: EngineId, id: Option<WordId>, word: &str, window_size: usize) -> Self {
        WordRecord {
            engine,
            id,
            word: Some(word.to_string()),
            window_size,
            vector: SparseArray::with_mode(Mode::Trie),
            norm: OnceLock::new(),
            unit_scaled: false,
        }
    }

    fn synthetic(&self, vector: SparseArray<f64>, unit_scaled: bool) -> Self {
        WordRecord {
            engine: self.engine,
            id: None,
            word: None,
            window_size: self.window_size,
            vector,
            norm: OnceLock::new(),
            unit_scaled,
        }
    }

    pub fn id(&self) -> Option<WordId> {
        self.id
    }

    pub fn word(&self) -> Option<&str> {
        self.word.as_deref()
    }

    pub fn engine(&self) -> EngineId {
        self.engine
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub(crate) fn rename(&mut self, id: WordId, word: &str) {
        self.id = Some(id);
        self.word = Some(word.to_string());
    }

    pub fn weight(&self, neighbour: WordId) -> f64 {
        self.vector.get(neighbour)
    }

    pub fn set_weight(&mut self, neighbour: WordId, value: f64) {
        self.vector.set(neighbour, value);
        self.norm.take();
    }

    pub fn add_weight(&mut self, neighbour: WordId, delta: f64) {
        let w = self.vector.get(neighbour);
        self.set_weight(neighbour, w + delta);
    }

    /// L2 length of the vector, memoized until the next mutation.
    pub fn norm(&self) -> f64 {
        *self.norm.get_or_init(|| {
            self.vector
                .ascending()
                .map(|(_, w)| w * w)
                .sum::<f64>()
                .sqrt()
        })
    }

    /// Raw pseudo-length of the vector, one past the highest neighbour id ever touched.
    pub fn vector_len(&self) -> u64 {
        self.vector.len()
    }

    /// Non-zero weights in ascending neighbour id order.
    pub fn entries(&self) -> impl Iterator<Item = (WordId, f64)> + '_ {
        self.vector.ascending()
    }

    /// Raw sum. Stays on the unit scale only when both operands are.
    pub fn add(&self, other: &WordRecord) -> Result<WordRecord> {
        let unit_scaled = self.unit_scaled && other.unit_scaled;
        self.combine(other, 1.0, 1.0, unit_scaled)
    }

    pub fn subtract(&self, other: &WordRecord) -> Result<WordRecord> {
        let unit_scaled = self.unit_scaled && other.unit_scaled;
        self.combine(other, 1.0, -1.0, unit_scaled)
    }

    /// Sum of both vectors after scaling each to unit length.
    pub fn add_normalized(&self, other: &WordRecord) -> Result<WordRecord> {
        self.combine(other, self.inverse_norm(), other.inverse_norm(), true)
    }

    pub fn subtract_normalized(&self, other: &WordRecord) -> Result<WordRecord> {
        self.combine(other, self.inverse_norm(), -other.inverse_norm(), true)
    }

    /// Copy of the vector scaled to unit length, detached from any word.
    pub fn normalized(&self) -> WordRecord {
        let scale = self.inverse_norm();
        let mut vector = SparseArray::with_mode(Mode::Trie);
        if scale != 0.0 {
            for (k, w) in self.entries() {
                vector.set(k, w * scale);
            }
        }
        self.synthetic(vector, true)
    }

    /// Whether the vector was built from unit vectors rather than raw counts.
    pub fn is_unit_scaled(&self) -> bool {
        self.unit_scaled
    }

    /// Cosine of the angle between the two vectors, or 0 when either side has
    /// too little evidence.
    pub fn semantic_proximity(&self, other: &WordRecord) -> Result<f64> {
        self.check_engine(other)?;
        let (a, b) = (self.norm(), other.norm());
        if a == 0.0 || b == 0.0 || self.below_noise_floor(a) || other.below_noise_floor(b) {
            return Ok(0.0);
        }
        Ok(self.dot(other) / (a * b))
    }

    /// Strongest collocates first, weights divided by this record's norm.
    pub fn frequency_environment(&self) -> Vec<(WordId, f64)> {
        let norm = self.norm();
        if norm == 0.0 {
            return Vec::new();
        }
        let mut env: Vec<(WordId, f64)> = self.entries().map(|(k, w)| (k, w / norm)).collect();
        env.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        env
    }

    fn check_engine(&self, other: &WordRecord) -> Result<()> {
        if self.engine != other.engine {
            return Err(Error::CrossEngineOperation);
        }
        Ok(())
    }

    fn inverse_norm(&self) -> f64 {
        let norm = self.norm();
        if norm == 0.0 { 0.0 } else { 1.0 / norm }
    }

    // The floor is in raw co-occurrence counts.
    fn below_noise_floor(&self, norm: f64) -> bool {
        let floor = 7.0 * (self.window_size.saturating_sub(1)) as f64;
        !self.unit_scaled && norm < floor
    }

    fn combine(
        &self,
        other: &WordRecord,
        left_scale: f64,
        right_scale: f64,
        unit_scaled: bool,
    ) -> Result<WordRecord> {
        self.check_engine(other)?;
        let mut vector = SparseArray::with_mode(Mode::Trie);
        for (k, l, r) in MergeJoin::new(self.entries(), other.entries()) {
            let w = left_scale * l + right_scale * r;
            if w != 0.0 {
                vector.set(k, w);
            }
        }
        Ok(self.synthetic(vector, unit_scaled))
    }

    fn dot(&self, other: &WordRecord) -> f64 {
        let mut left = self.entries();
        let mut right = other.entries();
        let (Some(mut l), Some(mut r)) = (left.next(), right.next()) else {
            return 0.0;
        };

        let mut sum = 0.0;
        loop {
            match l.0.cmp(&r.0) {
                Ordering::Less => match left.next() {
                    Some(next) => l = next,
                    None => break,
                },
                Ordering::Greater => match right.next() {
                    Some(next) => r = next,
                    None => break,
                },
                Ordering::Equal => {
                    sum += l.1 * r.1;
                    match (left.next(), right.next()) {
                        (Some(a), Some(b)) => {
                            l = a;
                            r = b;
                        }
                        _ => break,
                    }
                }
            }
        }
        sum
    }
}

// Two-pointer walk over two ascending (id, weight) streams, yielding every id
// present on either side with the missing side reported as 0.
struct MergeJoin<A: Iterator, B: Iterator> {
    left: std::iter::Peekable<A>,
    right: std::iter::Peekable<B>,
}

impl<A, B> MergeJoin<A, B>
where
    A: Iterator<Item = (WordId, f64)>,
    B: Iterator<Item = (WordId, f64)>,
{
    fn new(left: A, right: B) -> Self {
        MergeJoin {
            left: left.peekable(),
            right: right.peekable(),
        }
    }
}

impl<A, B> Iterator for MergeJoin<A, B>
where
    A: Iterator<Item = (WordId, f64)>,
    B: Iterator<Item = (WordId, f64)>,
{
    type Item = (WordId, f64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let order = match (self.left.peek(), self.right.peek()) {
            (None, None) => return None,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(l), Some(r)) => l.0.cmp(&r.0),
        };
        match order {
            Ordering::Less => self.left.next().map(|(k, w)| (k, w, 0.0)),
            Ordering::Greater => self.right.next().map(|(k, w)| (k, 0.0, w)),
            Ordering::Equal => {
                let (k, l) = self.left.next()?;
                let (_, r) = self.right.next()?;
                Some((k, l, r))
            }
        }
    }
}
