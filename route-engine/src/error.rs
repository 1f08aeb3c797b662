//! Search error taxonomy.

/// Why a search did not produce a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    /// The frontier emptied without reaching the goal
    #[error("no path found")]
    NoPathFound,

    /// The trial visited more cells than it may
    #[error("visited-cell ceiling of {limit} exceeded")]
    ResourceExceeded { limit: usize },

    /// The owning session asked the search to stop
    #[error("search canceled")]
    Canceled,

    /// A fault inside a search slice
    #[error("internal search error: {0}")]
    Internal(String),

    /// A cached path did not fit the current request
    #[error("cached path rejected: {0}")]
    CacheInconsistency(String),

    /// The engine no longer accepts work
    #[error("engine is shut down")]
    Shutdown,
}

impl SearchError {
    /// Returns true if the outcome may be reused for an identical request.
    ///
    /// Exhaustion and the cell ceiling are properties of the request; the
    /// other variants say nothing about whether a path exists.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, SearchError::NoPathFound | SearchError::ResourceExceeded { .. })
    }
}
