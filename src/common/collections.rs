pub use std::collections::VecDeque;

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
