use crate::error::{Error, Result};
use crate::preprocess;
use crate::string_map::StringMap;
use crate::word_record::{EngineId, WordId, WordRecord};
use parking_lot::{RwLock, RwLockReadGuard};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

// Tokens are separated by spaces and sentence ends; runs of separators
// produce empty tokens, which all map to the sentinel word.
const TOKEN_SEPARATORS: [char; 2] = [' ', '.'];
const SENTINEL: &str = "";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of consecutive tokens that see each other. At least 2.
    pub window_size: usize,
    pub noise_words: Vec<String>,
    /// Groups of surface forms to merge, the first form of each group is canonical.
    pub synonyms: Vec<Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            window_size: 2,
            noise_words: Vec::new(),
            synonyms: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size < 2 {
            return Err(Error::Configuration(format!(
                "window size must be at least 2, got {}",
                self.window_size
            )));
        }
        Ok(())
    }
}

/// Shared reference to a vocabulary record. Several words point at the same
/// record after a synonym merge.
#[derive(Debug, Clone)]
pub struct WordHandle {
    id: Option<WordId>,
    record: Arc<RwLock<WordRecord>>,
}

impl WordHandle {
    fn new(record: WordRecord) -> Self {
        WordHandle {
            id: record.id(),
            record: Arc::new(RwLock::new(record)),
        }
    }

    /// `None` for a word the engine has never seen.
    pub fn id(&self) -> Option<WordId> {
        self.id
    }

    pub fn is_known(&self) -> bool {
        self.id.is_some()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, WordRecord> {
        self.record.read()
    }

    /// Owned copy of the record as it is right now.
    pub fn snapshot(&self) -> WordRecord {
        self.record.read().clone()
    }

    fn same_record(&self, other: &WordHandle) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }
}

struct Vocabulary {
    words: StringMap<WordHandle>,
    // id -> record, for every id ever assigned
    by_id: Vec<WordHandle>,
}

impl Vocabulary {
    fn register(&mut self, engine: EngineId, window_size: usize, word: &str) -> WordHandle {
        let next_id = self.by_id.len() as WordId;
        let by_id = &mut self.by_id;
        self.words
            .get_or_insert_with(word, || {
                let handle = WordHandle::new(WordRecord::new(engine, Some(next_id), word, window_size));
                by_id.push(handle.clone());
                handle
            })
            .clone()
    }

    // Each record once, in vocabulary order, without the sentinel.
    fn distinct_records(&self) -> Vec<WordHandle> {
        let mut seen = HashSet::new();
        self.words
            .values()
            .filter(|h| h.id != Some(0))
            .filter(|h| seen.insert(Arc::as_ptr(&h.record)))
            .cloned()
            .collect()
    }
}

/// Co-occurrence statistics over a growing vocabulary.
///
/// `learn` may be called from many threads at once. Queries are meant to run
/// once learning is done; they see a consistent record each, but not a
/// consistent vocabulary while texts are still being learned.
///
/// Locks are taken in one direction only: the vocabulary lock may be held
/// while a record lock is taken, never the other way round.
pub struct Engine {
    id: EngineId,
    window_size: usize,
    vocabulary: RwLock<Vocabulary>,
    noise_words: RwLock<Vec<String>>,
}

impl Engine {
    pub fn new(window_size: usize) -> Result<Self> {
        Self::from_config(EngineConfig {
            window_size,
            ..EngineConfig::default()
        })
    }

    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let id = EngineId::next();
        let mut vocabulary = Vocabulary {
            words: StringMap::new(),
            by_id: Vec::new(),
        };
        vocabulary.register(id, config.window_size, SENTINEL);

        let engine = Engine {
            id,
            window_size: config.window_size,
            vocabulary: RwLock::new(vocabulary),
            noise_words: RwLock::new(Vec::new()),
        };
        engine.add_noise_words(config.noise_words);
        engine.add_synonyms(&config.synonyms)?;
        info!(
            window_size = engine.window_size,
            synonym_groups = config.synonyms.len(),
            "engine ready"
        );
        Ok(engine)
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Registered words, the sentinel included.
    pub fn word_count(&self) -> usize {
        self.vocabulary.read().words.len()
    }

    /// Looks a word up. Unseen words are registered when `create` is set,
    /// otherwise a detached handle without an id and with an empty vector is returned.
    pub fn resolve(&self, word: &str, create: bool) -> WordHandle {
        if let Some(handle) = self.vocabulary.read().words.get(word) {
            return handle.clone();
        }
        if !create {
            return WordHandle::new(WordRecord::new(self.id, None, word, self.window_size));
        }
        self.vocabulary.write().register(self.id, self.window_size, word)
    }

    pub fn word_by_id(&self, id: WordId) -> Option<WordHandle> {
        self.vocabulary.read().by_id.get(id as usize).cloned()
    }

    /// Raw pseudo-length of a word's vector.
    pub fn vector_len(&self, word: &str) -> Option<u64> {
        let handle = self.resolve(word, false);
        handle.is_known().then(|| handle.read().vector_len())
    }

    pub fn add_noise_words<I, S>(&self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.noise_words
            .write()
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
    }

    /// Prepares raw text for `learn`.
    pub fn normalize(&self, text: &str) -> String {
        preprocess::normalize(text, &self.noise_words.read())
    }

    pub fn learn(&self, text: &str) {
        let tokens: Vec<&str> = text.split(TOKEN_SEPARATORS).collect();
        // every token gets its id before any vector is touched
        let handles: Vec<WordHandle> = {
            let mut vocabulary = self.vocabulary.write();
            tokens
                .iter()
                .map(|t| vocabulary.register(self.id, self.window_size, t))
                .collect()
        };

        let w = self.window_size;
        let n = handles.len();
        // token index held by each window slot
        let mut window: Vec<Option<usize>> = vec![None; w];

        for i in 0..(w - 1).min(n) {
            window[i] = Some(i);
            if tokens[i].is_empty() {
                continue;
            }
            for j in (0..i).rev() {
                if handles[j].id != handles[i].id {
                    link(&handles[i], &handles[j], (j + 1) as f64);
                }
            }
        }

        let mut cur = w - 1;
        for i in (w - 1)..n {
            handles[i].record.write().set_weight(0, 0.0);
            window[cur] = Some(i);

            if !tokens[i].is_empty() {
                for j in (cur + 1..cur + w).rev() {
                    let Some(k) = window[j % w] else {
                        continue;
                    };
                    if tokens[k].is_empty() || handles[k].id == handles[i].id {
                        continue;
                    }
                    link(&handles[i], &handles[k], (j - cur) as f64);
                }
            }
            cur = (cur + 1) % w;
        }

        debug!(tokens = n, "learned text");
    }

    /// Merges each group of surface forms into one record holding the sum of
    /// their vectors. Every word that pointed at one of the merged records
    /// points at the new one afterwards, under the id of the group's first member.
    pub fn add_synonyms<G, S>(&self, groups: &[G]) -> Result<()>
    where
        G: AsRef<[S]>,
        S: AsRef<str>,
    {
        let mut vocabulary = self.vocabulary.write();
        for group in groups {
            let members: Vec<&str> = group.as_ref().iter().map(|s| s.as_ref()).collect();
            let Some(&canonical) = members.first() else {
                continue;
            };

            let handles: Vec<WordHandle> = members
                .iter()
                .map(|m| vocabulary.register(self.id, self.window_size, m))
                .collect();
            let mut merged_from: Vec<&WordHandle> = Vec::new();
            for h in &handles {
                if !merged_from.iter().any(|m| m.same_record(h)) {
                    merged_from.push(h);
                }
            }
            let Some(id) = handles[0].id else {
                continue;
            };

            let mut merged = merged_from[0].snapshot();
            for h in &merged_from[1..] {
                merged = merged.add(&h.read())?;
            }
            merged.rename(id, canonical);
            let handle = WordHandle::new(merged);

            let retired = |h: &WordHandle| merged_from.iter().any(|m| m.same_record(h));
            let keys: Vec<String> = vocabulary
                .words
                .iter()
                .filter(|(_, h)| retired(h))
                .map(|(k, _)| k.to_string())
                .collect();
            for key in &keys {
                vocabulary.words.insert(key, handle.clone());
            }
            for slot in vocabulary.by_id.iter_mut().filter(|h| retired(h)) {
                *slot = handle.clone();
            }

            info!(canonical, members = members.len(), words = keys.len(), "merged synonyms");
        }
        Ok(())
    }

    /// The `count` records closest to `query`, best first, as (canonical word, score).
    pub fn find_synonyms(&self, query: &WordRecord, count: usize) -> Result<Vec<(String, f64)>> {
        if query.engine() != self.id {
            return Err(Error::CrossEngineOperation);
        }
        let candidates = self.vocabulary.read().distinct_records();

        let scores: Vec<Option<(String, f64)>> = candidates
            .par_iter()
            .map(|h| -> Result<Option<(String, f64)>> {
                if query.id().is_some() && h.id == query.id() {
                    return Ok(None);
                }
                let record = h.read();
                let score = record.semantic_proximity(query)?;
                if score.is_nan() {
                    return Ok(None);
                }
                Ok(Some((record.word().unwrap_or_default().to_string(), score)))
            })
            .collect::<Result<_>>()?;

        let mut result: Vec<(String, f64)> = Vec::with_capacity(count + 1);
        for (word, score) in scores.into_iter().flatten() {
            let i = result
                .iter()
                .position(|(_, s)| *s <= score)
                .unwrap_or(result.len());
            if result.len() < count || i < result.len() {
                result.insert(i, (word, score));
                result.truncate(count);
            }
        }
        Ok(result)
    }

    /// Nearest words to a known word. Unknown words have no neighbours.
    pub fn find_synonyms_of(&self, word: &str, count: usize) -> Result<Vec<(String, f64)>> {
        let handle = self.resolve(word, false);
        if !handle.is_known() {
            return Ok(Vec::new());
        }
        self.find_synonyms(&handle.snapshot(), count)
    }

    /// Raw difference of two words' vectors.
    pub fn subtract(&self, left: &str, right: &str) -> Result<WordRecord> {
        let left = self.resolve(left, false).snapshot();
        let right = self.resolve(right, false).snapshot();
        left.subtract(&right)
    }

    /// A word's strongest collocates as words, at most `limit` of them.
    pub fn frequency_environment(&self, word: &str, limit: usize) -> Vec<(String, f64)> {
        let record = self.resolve(word, false).snapshot();
        let env = record.frequency_environment();

        let vocabulary = self.vocabulary.read();
        env.into_iter()
            .filter(|(id, _)| *id != 0)
            .filter_map(|(id, w)| {
                let handle = vocabulary.by_id.get(id as usize)?;
                let word = handle.read().word()?.to_string();
                Some((word, w))
            })
            .take(limit)
            .collect()
    }

    /// Words nearest to the sum of the unit vectors of `words`, inputs excluded.
    /// Unknown words are ignored.
    pub fn nearest_to_sum(&self, words: &[&str], count: usize) -> Result<Vec<(String, f64)>> {
        let known: Vec<WordRecord> = words
            .iter()
            .map(|w| self.resolve(w, false))
            .filter(|h| h.is_known())
            .map(|h| h.snapshot())
            .collect();
        let Some((first, rest)) = known.split_first() else {
            return Ok(Vec::new());
        };

        let mut target = first.normalized();
        for record in rest {
            target = target.add(&record.normalized())?;
        }
        self.rank_excluding(&target, &known, count)
    }

    /// Words nearest to `a - b + c` over unit vectors, inputs excluded.
    pub fn analogy(&self, a: &str, b: &str, c: &str, count: usize) -> Result<Vec<(String, f64)>> {
        let handles = [a, b, c].map(|w| self.resolve(w, false));
        if handles.iter().any(|h| !h.is_known()) {
            return Ok(Vec::new());
        }
        let [a, b, c] = handles.map(|h| h.snapshot());

        let target = a.subtract_normalized(&b)?.add(&c.normalized())?;
        self.rank_excluding(&target, &[a, b, c], count)
    }

    fn rank_excluding(
        &self,
        target: &WordRecord,
        inputs: &[WordRecord],
        count: usize,
    ) -> Result<Vec<(String, f64)>> {
        let excluded: HashSet<&str> = inputs.iter().filter_map(|r| r.word()).collect();
        let mut ranked = self.find_synonyms(target, count + excluded.len())?;
        ranked.retain(|(w, _)| !excluded.contains(w.as_str()));
        ranked.truncate(count);
        Ok(ranked)
    }
}

// Adds `weight` to both records at each other's id, one record lock at a time.
fn link(a: &WordHandle, b: &WordHandle, weight: f64) {
    let (Some(a_id), Some(b_id)) = (a.id, b.id) else {
        return;
    };
    a.record.write().add_weight(b_id, weight);
    b.record.write().add_weight(a_id, weight);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::IndexedRandom;
    use rand::SeedableRng;

    fn weight(engine: &Engine, word: &str, neighbour: &str) -> f64 {
        let n = engine.resolve(neighbour, false).id().unwrap();
        engine.resolve(word, false).read().weight(n)
    }

    // "cat" and "dog" share their contexts, so do "mat" and "rug"
    fn pets() -> Engine {
        let engine = Engine::new(2).unwrap();
        let text = vec!["the cat sat on the mat the dog sat on the rug"; 20].join(" ");
        engine.learn(&text);
        engine
    }

    fn random_text(rng: &mut StdRng, len: usize) -> String {
        let vocabulary = [
            "alpha", "beta", "gamma", "delta", "eps", "zeta", "eta", "theta", "", "iota",
        ];
        (0..len)
            .map(|_| *vocabulary.choose(rng).unwrap())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn window_below_two_is_rejected() {
        assert!(matches!(Engine::new(1), Err(Error::Configuration(_))));
        let config = EngineConfig {
            window_size: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(Engine::from_config(config), Err(Error::Configuration(_))));
        assert!(Engine::new(2).is_ok());
    }

    #[test]
    fn sentinel_has_id_zero() {
        let engine = Engine::new(2).unwrap();
        assert_eq!(engine.word_count(), 1);
        assert_eq!(engine.resolve("", false).id(), Some(0));
        assert_eq!(engine.word_by_id(0).unwrap().read().word(), Some(""));
    }

    #[test]
    fn unknown_words_are_not_registered() {
        let engine = Engine::new(2).unwrap();
        let zebra = engine.resolve("zebra", false);
        assert_eq!(zebra.id(), None);
        assert_eq!(zebra.read().norm(), 0.0);
        assert_eq!(engine.word_count(), 1);
        assert!(engine.find_synonyms_of("zebra", 5).unwrap().is_empty());
        assert_eq!(engine.vector_len("zebra"), None);

        let created = engine.resolve("zebra", true);
        assert_eq!(created.id(), Some(1));
        assert_eq!(engine.word_count(), 2);
    }

    #[test]
    fn cat_sat_on_the_mat() {
        let engine = Engine::new(2).unwrap();
        engine.learn("the cat sat on the mat");

        let ids: Vec<Option<WordId>> = ["the", "cat", "sat", "on", "mat"]
            .iter()
            .map(|w| engine.resolve(w, false).id())
            .collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);

        assert_eq!(weight(&engine, "cat", "the"), 1.0);
        assert_eq!(weight(&engine, "cat", "sat"), 1.0);
        assert_eq!(weight(&engine, "cat", "mat"), 0.0);
        assert_eq!(weight(&engine, "the", "cat"), 1.0);
        assert_eq!(weight(&engine, "the", "on"), 1.0);
        assert_eq!(weight(&engine, "the", "mat"), 1.0);
        assert_eq!(weight(&engine, "the", "sat"), 0.0);
    }

    #[test]
    fn wider_window_weights_by_distance() {
        let engine = Engine::new(3).unwrap();
        engine.learn("a b c");
        // the priming pair gets the earlier token's position plus one
        assert_eq!(weight(&engine, "a", "b"), 1.0);
        assert_eq!(weight(&engine, "b", "c"), 2.0);
        assert_eq!(weight(&engine, "a", "c"), 1.0);
        assert_eq!(weight(&engine, "c", "a"), 1.0);

        engine.learn("a b c d");
        assert_eq!(weight(&engine, "c", "d"), 2.0);
        assert_eq!(weight(&engine, "b", "d"), 1.0);
        assert_eq!(weight(&engine, "a", "d"), 0.0);
    }

    #[test]
    fn repeats_and_empty_tokens_do_not_link() {
        let engine = Engine::new(2).unwrap();
        engine.learn("a a b");
        assert_eq!(weight(&engine, "a", "b"), 1.0);
        assert_eq!(engine.resolve("a", false).read().entries().count(), 1);

        engine.learn("x. y");
        assert_eq!(weight(&engine, "x", "y"), 0.0);
        assert_eq!(engine.resolve("", false).read().entries().count(), 0);
    }

    #[test]
    fn empty_token_in_the_first_window_links_to_the_sentinel() {
        let engine = Engine::new(3).unwrap();
        engine.learn(".a b");
        let a = engine.resolve("a", false).id().unwrap();
        assert_eq!(engine.resolve("a", false).read().weight(0), 1.0);
        assert_eq!(engine.resolve("", false).read().weight(a), 1.0);
        assert_eq!(weight(&engine, "a", "b"), 2.0);
        assert_eq!(weight(&engine, "b", "a"), 2.0);
        assert_eq!(engine.resolve("b", false).read().weight(0), 0.0);

        // a later window reaching "a" past priming clears its own slot
        engine.learn("x y a");
        assert_eq!(engine.resolve("a", false).read().weight(0), 0.0);
        assert_eq!(engine.resolve("", false).read().weight(a), 1.0);
    }

    #[test]
    fn learned_weights_are_symmetric() {
        let mut rng = StdRng::seed_from_u64(17);
        let engine = Engine::new(4).unwrap();
        for _ in 0..20 {
            engine.learn(&random_text(&mut rng, 200));
        }

        let n = engine.word_count() as WordId;
        for i in 1..n {
            let a = engine.word_by_id(i).unwrap().snapshot();
            assert_eq!(a.weight(i), 0.0);
            for j in 1..n {
                let b = engine.word_by_id(j).unwrap();
                assert_eq!(a.weight(j), b.read().weight(i), "{i} {j}");
            }
        }
    }

    #[test]
    fn concurrent_learning_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(23);
        let texts: Vec<String> = (0..32).map(|_| random_text(&mut rng, 150)).collect();

        let sequential = Engine::new(3).unwrap();
        for text in &texts {
            sequential.learn(text);
        }

        let parallel = Engine::new(3).unwrap();
        std::thread::scope(|s| {
            for chunk in texts.chunks(8) {
                let parallel = &parallel;
                s.spawn(move || {
                    for text in chunk {
                        parallel.learn(text);
                    }
                });
            }
        });

        assert_eq!(sequential.word_count(), parallel.word_count());
        let n = sequential.word_count() as WordId;
        for i in 1..n {
            let word = sequential.word_by_id(i).unwrap().snapshot();
            // slot 0 is cleared on each visit, so it depends on learning order
            for (neighbour, w) in word.entries().filter(|(k, _)| *k != 0) {
                let neighbour = sequential.word_by_id(neighbour).unwrap();
                let neighbour = neighbour.read().word().unwrap().to_string();
                assert_eq!(
                    weight(&parallel, word.word().unwrap(), &neighbour),
                    w,
                    "{:?} {neighbour}",
                    word.word()
                );
            }
            let mirror = parallel.resolve(word.word().unwrap(), false);
            let own = |r: &WordRecord| r.entries().filter(|(k, _)| *k != 0).count();
            assert_eq!(own(&*mirror.read()), own(&word));
        }
    }

    #[test]
    fn find_synonyms_ranks_shared_contexts_first() {
        let engine = pets();
        let ranked = engine.find_synonyms_of("cat", 3).unwrap();
        assert_eq!(ranked.len(), 3);

        // "on" sits between the same two words as "cat", just the other way round
        let mut top: Vec<&str> = ranked[..2].iter().map(|(w, _)| w.as_str()).collect();
        top.sort();
        assert_eq!(top, vec!["dog", "on"]);
        assert!((ranked[0].1 - 1.0).abs() < 1e-9);
        assert!((ranked[1].1 - 1.0).abs() < 1e-9);
        assert!(ranked[2].1 < ranked[1].1);
        assert!(["mat", "rug"].contains(&ranked[2].0.as_str()));
        assert!(ranked.iter().all(|(w, _)| w != "cat" && !w.is_empty()));

        assert!(engine.find_synonyms_of("cat", 0).unwrap().is_empty());
    }

    #[test]
    fn equal_scores_put_later_words_first() {
        // every record is under the noise floor, so every score is zero
        let engine = Engine::new(2).unwrap();
        engine.learn("the cat sat on the mat");

        let words = |ranked: Vec<(String, f64)>| -> Vec<String> {
            ranked.into_iter().map(|(w, _)| w).collect()
        };
        assert_eq!(
            words(engine.find_synonyms_of("cat", 10).unwrap()),
            vec!["mat", "on", "sat", "the"]
        );
        assert_eq!(
            words(engine.find_synonyms_of("cat", 2).unwrap()),
            vec!["mat", "on"]
        );
    }

    #[test]
    fn synonyms_share_one_record() {
        let engine = pets();
        let cat_before = engine.resolve("cat", false).snapshot();
        let dog_before = engine.resolve("dog", false).snapshot();
        let cat_id = cat_before.id();

        engine.add_synonyms(&[["cat", "dog"]]).unwrap();
        let cat = engine.resolve("cat", false);
        let dog = engine.resolve("dog", false);
        assert_eq!(cat.id(), cat_id);
        assert_eq!(dog.id(), cat_id);
        assert_eq!(dog.read().word(), Some("cat"));

        let the = engine.resolve("the", false).id().unwrap();
        assert_eq!(
            cat.read().weight(the),
            cat_before.weight(the) + dog_before.weight(the)
        );

        let dog_id = dog_before.id().unwrap();
        assert_eq!(engine.word_by_id(dog_id).unwrap().id(), cat_id);

        // merging again changes nothing
        engine.add_synonyms(&[["dog", "cat"]]).unwrap();
        assert_eq!(
            engine.resolve("cat", false).read().weight(the),
            cat_before.weight(the) + dog_before.weight(the)
        );

        assert_eq!(
            engine.find_synonyms_of("cat", 5).unwrap(),
            engine.find_synonyms_of("dog", 5).unwrap()
        );
        let ranked = engine.find_synonyms_of("dog", 5).unwrap();
        assert!(ranked.iter().all(|(w, _)| w != "cat" && w != "dog"));
    }

    #[test]
    fn synonyms_from_config_are_applied() {
        let config = EngineConfig {
            window_size: 2,
            noise_words: vec!["The".to_string()],
            synonyms: vec![vec!["run".to_string(), "jog".to_string()]],
        };
        let engine = Engine::from_config(config).unwrap();
        assert_eq!(engine.resolve("run", false).id(), Some(1));
        assert_eq!(engine.resolve("jog", false).id(), Some(1));

        engine.learn("i jog daily");
        assert_eq!(weight(&engine, "run", "i"), 1.0);
        assert_eq!(engine.normalize("The cat, the dog"), "the cat. dog");
    }

    #[test]
    fn queries_across_engines_fail() {
        let a = pets();
        let b = pets();
        let foreign = b.resolve("cat", false).snapshot();
        assert!(matches!(a.find_synonyms(&foreign, 3), Err(Error::CrossEngineOperation)));
    }

    #[test]
    fn frequency_environment_names_collocates() {
        let engine = Engine::new(2).unwrap();
        engine.learn("the cat sat on the mat");
        let env = engine.frequency_environment("the", 2);
        let words: Vec<&str> = env.iter().map(|(w, _)| w.as_str()).collect();
        assert_eq!(words, vec!["cat", "on"]);
        assert!((env[0].1 - 1.0 / 3f64.sqrt()).abs() < 1e-9);
        assert!(engine.frequency_environment("zebra", 5).is_empty());
    }

    #[test]
    fn subtract_and_vector_len() {
        let engine = Engine::new(2).unwrap();
        engine.learn("the cat sat on the mat");
        let diff = engine.subtract("cat", "mat").unwrap();
        let the = engine.resolve("the", false).id().unwrap();
        let sat = engine.resolve("sat", false).id().unwrap();
        assert_eq!(diff.weight(the), 0.0);
        assert_eq!(diff.weight(sat), 1.0);
        assert_eq!(diff.id(), None);
        // "cat" touched the sentinel slot and ids up to "sat"
        assert_eq!(engine.vector_len("cat"), Some(4));
    }

    #[test]
    fn sums_and_analogies_exclude_inputs() {
        let engine = pets();
        let near = engine.nearest_to_sum(&["cat"], 2).unwrap();
        assert!(near.iter().all(|(w, _)| w != "cat"));
        assert!(near.iter().any(|(w, _)| w == "dog"));

        // cat and dog cancel out, leaving mat, whose twin is rug
        let analogy = engine.analogy("cat", "dog", "mat", 3).unwrap();
        assert_eq!(analogy[0].0, "rug");
        assert!(analogy.iter().all(|(w, _)| !["cat", "dog", "mat"].contains(&w.as_str())));

        assert!(engine.analogy("cat", "zebra", "mat", 3).unwrap().is_empty());
        assert!(engine.nearest_to_sum(&["zebra"], 3).unwrap().is_empty());
    }
}
