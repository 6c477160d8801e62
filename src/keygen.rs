//! Deterministic cache-key derivation.
//!
//! Keys must be stable across lookups of semantically equal items: the
//! default generator derives them from the short type name plus an `FxHash`
//! of the item (and of the operation parameters when present), or from a
//! typed identifier as `"id:<id>"`.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::loader::Params;

/// Derives cache keys from item identity and operation parameters.
pub trait KeyGenerator<T, Id>: Send + Sync {
    /// Key for an item-shaped operation (save, preload).
    fn for_item(&self, item: &T, params: &Params) -> String;

    /// Key for an id-shaped operation (find_by_id, evict).
    fn by_id(&self, id: &Id) -> String;
}

/// Default policy: `"<Type>:<item hash>[:params:<params hash>]"` and
/// `"id:<id>"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyGenerator;

impl DefaultKeyGenerator {
    fn hash_of<H: Hash>(value: &H) -> u64 {
        let mut hasher = FxHasher::default();
        value.hash(&mut hasher);
        hasher.finish()
    }
}

impl<T, Id> KeyGenerator<T, Id> for DefaultKeyGenerator
where
    T: Hash,
    Id: std::fmt::Display,
{
    fn for_item(&self, item: &T, params: &Params) -> String {
        let type_name = short_type_name::<T>();
        let item_hash = Self::hash_of(item);
        if params.is_empty() {
            format!("{type_name}:{item_hash:x}")
        } else {
            format!(
                "{type_name}:{item_hash:x}:params:{:x}",
                Self::hash_of(params)
            )
        }
    }

    fn by_id(&self, id: &Id) -> String {
        format!("id:{id}")
    }
}

/// Last path segment of the type name; good enough for key prefixes.
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
