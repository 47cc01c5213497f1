use crate::DomainResult;
use crate::assignments::{Assignment, AssignmentQuery, AssignmentStatus, RequestProjection};
use crate::pagination::Page;
use crate::ports::BoxFuture;

/// Assignment storage. Every write that also moves the linked sketch
/// request's status takes the projection so both land together.
pub trait AssignmentRepository: Send + Sync {
    /// Fails with `DomainError::Conflict` when the sketch request already
    /// has a non-cancelled assignment.
    fn create(
        &self,
        assignment: &Assignment,
        projection: &RequestProjection,
    ) -> BoxFuture<'_, DomainResult<Assignment>>;

    /// Compare-and-set on `expected`; fails with `DomainError::Conflict`
    /// when the stored status moved in the meantime.
    fn transition(
        &self,
        assignment: &Assignment,
        expected: AssignmentStatus,
        projection: Option<&RequestProjection>,
    ) -> BoxFuture<'_, DomainResult<Assignment>>;

    fn get(&self, assignment_id: &str) -> BoxFuture<'_, DomainResult<Option<Assignment>>>;

    fn find_active(
        &self,
        sketch_request_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<Assignment>>>;

    /// Newest first.
    fn list(&self, query: &AssignmentQuery) -> BoxFuture<'_, DomainResult<Page<Assignment>>>;

    /// Assignments of a center that are neither cancelled nor completed.
    fn count_open_for_center(&self, drafting_center_id: &str) -> BoxFuture<'_, DomainResult<u64>>;
}
