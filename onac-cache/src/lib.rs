pub mod cache;

pub use cache::{intern_text, get_text, text_count, AssetCache, Atom};
