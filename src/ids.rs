use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Opaque identifier assigned to every measured response.
///
/// Cheap to clone and hash; the wire form is whatever string the allocator
/// produced (decimal counter value or ULID token).
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ResponseId(std::sync::Arc<str>);

impl ResponseId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResponseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResponseId {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&str> for ResponseId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

/// How response ids are generated.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Monotonic counter; ids are the decimal strings "1", "2", ...
    #[default]
    Sequential,
    /// Fresh ULID per response; unique in practice, collisions are handled
    /// by the caller retrying against the store.
    Random,
}

#[derive(Debug, Error)]
#[error("unknown id strategy {0:?}, expected \"sequential\" or \"random\"")]
pub struct ParseIdStrategyError(String);

impl FromStr for IdStrategy {
    type Err = ParseIdStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(IdStrategy::Sequential),
            "random" => Ok(IdStrategy::Random),
            _ => Err(ParseIdStrategyError(s.to_string())),
        }
    }
}

/// Produces response ids under the configured strategy.
///
/// Safe to call from any number of server coroutines at once; the sequential
/// strategy hands out each counter value exactly once via fetch-and-add.
#[derive(Debug)]
pub struct ResponseIdAllocator {
    strategy: IdStrategy,
    counter: AtomicU64,
}

impl ResponseIdAllocator {
    pub fn new(strategy: IdStrategy) -> Self {
        Self {
            strategy,
            counter: AtomicU64::new(0),
        }
    }

    pub fn strategy(&self) -> IdStrategy {
        self.strategy
    }

    /// Next id. Sequential ids start at "1".
    pub fn next(&self) -> ResponseId {
        match self.strategy {
            IdStrategy::Sequential => {
                let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
                ResponseId::from(n.to_string())
            }
            IdStrategy::Random => ResponseId::from(ulid::Ulid::new().to_string()),
        }
    }

    /// Rewind the sequential counter so the next id is "1" again. Only
    /// meaningful together with clearing the store that holds the old ids.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }
}

impl Default for ResponseIdAllocator {
    fn default() -> Self {
        Self::new(IdStrategy::default())
    }
}
