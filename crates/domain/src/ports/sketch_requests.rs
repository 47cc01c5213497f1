use crate::DomainResult;
use crate::pagination::Page;
use crate::ports::BoxFuture;
use crate::sketch_requests::{SketchRequest, SketchRequestQuery, SketchRequestStatus};

pub trait SketchRequestRepository: Send + Sync {
    /// Fails with `DomainError::Conflict` when `application_id` is taken.
    fn create(&self, request: &SketchRequest) -> BoxFuture<'_, DomainResult<SketchRequest>>;

    fn get(&self, sketch_request_id: &str)
    -> BoxFuture<'_, DomainResult<Option<SketchRequest>>>;

    fn update_status(
        &self,
        sketch_request_id: &str,
        status: SketchRequestStatus,
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<SketchRequest>>;

    /// Newest first.
    fn list(&self, query: &SketchRequestQuery) -> BoxFuture<'_, DomainResult<Page<SketchRequest>>>;

    /// Largest numeric suffix among application ids starting with `prefix`,
    /// or 0 when the scope is empty.
    fn max_application_sequence(&self, prefix: &str) -> BoxFuture<'_, DomainResult<u64>>;
}
