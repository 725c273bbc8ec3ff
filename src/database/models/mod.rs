pub mod ci_type;
pub mod configuration_item;
pub mod user;

use serde::{Deserialize, Deserializer};

/// Deserialize a field so that an explicit `null` is distinguishable from an
/// absent key: absent → `None`, `null` → `Some(None)`.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
