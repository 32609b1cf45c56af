pub mod engine;
pub mod error;
pub mod preprocess;
pub mod sparse_array;
pub mod string_map;
pub mod word_record;

pub use engine::{Engine, EngineConfig, WordHandle};
pub use error::{Error, Result};
pub use sparse_array::{Mode, SparseArray};
pub use string_map::StringMap;
pub use word_record::{EngineId, WordId, WordRecord};
