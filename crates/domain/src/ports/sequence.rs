use crate::DomainResult;
use crate::ports::BoxFuture;
use crate::sequencer::ApplicationScope;

/// Atomic increment-and-read counter per application-id scope.
pub trait ApplicationSequence: Send + Sync {
    /// Returns the next value for `scope`, always greater than `floor`.
    fn next_value(&self, scope: &ApplicationScope, floor: u64) -> BoxFuture<'_, DomainResult<u64>>;
}
