// src/exec/backend.rs

//! Pluggable process counter abstraction.
//!
//! The watch loop talks to a `ProcessCounter` instead of spawning processes
//! itself. Production code uses [`super::PgrepCounter`]; tests provide
//! counters that return canned results, block, or panic on demand.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::CountFailure;
use crate::types::{ProcessPattern, UserScope};

/// Result of one count query: one integer per result line, or why there is
/// none.
pub type CountOutcome = std::result::Result<Vec<u64>, CountFailure>;

/// Trait abstracting how matching processes are counted.
pub trait ProcessCounter: Send + Sync {
    /// Count processes matching `pattern` owned by the users in `scope`.
    ///
    /// Implementations report every problem through the returned
    /// [`CountOutcome`]; they should not panic.
    fn count<'a>(
        &'a self,
        scope: UserScope,
        pattern: &'a ProcessPattern,
    ) -> Pin<Box<dyn Future<Output = CountOutcome> + Send + 'a>>;
}

impl<C: ProcessCounter + ?Sized> ProcessCounter for Arc<C> {
    fn count<'a>(
        &'a self,
        scope: UserScope,
        pattern: &'a ProcessPattern,
    ) -> Pin<Box<dyn Future<Output = CountOutcome> + Send + 'a>> {
        (**self).count(scope, pattern)
    }
}
