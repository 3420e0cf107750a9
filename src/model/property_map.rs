//! PropertyMap: the extra attributes carried on nodes.

use std::collections::BTreeMap;
use super::Value;

/// A map of property names to values. Ordered so dumps are stable.
pub type PropertyMap = BTreeMap<String, Value>;

/// Build a PropertyMap from (key, value) pairs.
pub fn props<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
