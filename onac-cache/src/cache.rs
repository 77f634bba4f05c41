use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
pub use string_cache::DefaultAtom as Atom;

lazy_static! {
    static ref TEXT_INTERNER: RwLock<Vec<Atom>> = RwLock::new(Vec::new());
}

/// Intern a string and return its ID
pub fn intern_text(s: &str) -> usize {
    let atom = Atom::from(s);
    let mut v = TEXT_INTERNER.write().unwrap_or_else(|e| e.into_inner());
    match v.iter().position(|a| *a == atom) {
        Some(idx) => idx,
        None => {
            v.push(atom);
            v.len() - 1
        }
    }
}

/// Current count of unique texts
pub fn text_count() -> usize {
    TEXT_INTERNER.read().unwrap_or_else(|e| e.into_inner()).len()
}

pub fn get_text(id: usize) -> Option<Atom> {
    TEXT_INTERNER
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(id)
        .cloned()
}

/// Decoded assets keyed by their source path.
///
/// Each file is decoded once per session; later lookups share the `Arc`.
pub struct AssetCache<T> {
    map: HashMap<Atom, Arc<T>>,
}

impl<T> AssetCache<T> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.map.get(&Atom::from(key)).cloned()
    }

    /// Returns the cached value or runs `load` and keeps its result.
    /// Failed loads are not cached.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: &str,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        let atom = Atom::from(key);
        if let Some(v) = self.map.get(&atom) {
            return Ok(Arc::clone(v));
        }
        let value = Arc::new(load()?);
        self.map.insert(atom, Arc::clone(&value));
        Ok(value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(&Atom::from(key))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
