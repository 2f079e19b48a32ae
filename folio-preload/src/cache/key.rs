//! Namespaced cache keys.
//!
//! Page slices and single entities share one store. The namespace is part of
//! the key's type, so a page key can never collide with an entity key. The
//! string form (`home:<page>:<perPage>`, `post:<id>`) is what collaborators
//! outside the crate use to name entries.

use folio_core::ValidationError;
use std::fmt;
use std::str::FromStr;

const HOME_PREFIX: &str = "home";
const POST_PREFIX: &str = "post";

/// Key of a cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// One page of the home listing.
    Home { page: usize, per_page: usize },
    /// A single entity.
    Post { id: String },
}

impl CacheKey {
    pub fn home(page: usize, per_page: usize) -> Self {
        Self::Home { page, per_page }
    }

    pub fn post(id: impl Into<String>) -> Self {
        Self::Post { id: id.into() }
    }

    /// Returns true if this key names a page slice.
    pub fn is_home(&self) -> bool {
        matches!(self, Self::Home { .. })
    }

    /// Returns true if this key names a single entity.
    pub fn is_post(&self) -> bool {
        matches!(self, Self::Post { .. })
    }

    /// The entity id for post keys.
    pub fn post_id(&self) -> Option<&str> {
        match self {
            Self::Post { id } => Some(id),
            Self::Home { .. } => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home { page, per_page } => write!(f, "{}:{}:{}", HOME_PREFIX, page, per_page),
            Self::Post { id } => write!(f, "{}:{}", POST_PREFIX, id),
        }
    }
}

impl FromStr for CacheKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidCacheKey {
            key: s.to_string(),
            reason: reason.to_string(),
        };

        let (prefix, rest) = s.split_once(':').ok_or_else(|| invalid("missing namespace"))?;

        match prefix {
            HOME_PREFIX => {
                let (page, per_page) = rest
                    .split_once(':')
                    .ok_or_else(|| invalid("expected home:<page>:<perPage>"))?;
                let page = page.parse().map_err(|_| invalid("page is not a number"))?;
                let per_page = per_page
                    .parse()
                    .map_err(|_| invalid("perPage is not a number"))?;
                Ok(Self::Home { page, per_page })
            }
            // Ids are opaque and may themselves contain ':'.
            POST_PREFIX => Ok(Self::Post {
                id: rest.to_string(),
            }),
            _ => Err(invalid("unknown namespace")),
        }
    }
}
