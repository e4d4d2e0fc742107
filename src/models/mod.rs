mod post;
mod tag;
mod topic;
mod user;

pub use post::*;
pub use tag::*;
pub use topic::*;
pub use user::*;

use serde::{Deserialize, Deserializer};

/// Accepts `true`/`false`, `0`/`1` and their string forms for boolean flags
/// such as `isAnonymous`.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Str(s) => matches!(s.trim(), "1" | "true" | "yes"),
    })
}
