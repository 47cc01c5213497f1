use crate::DomainResult;
use crate::drafting_centers::{DraftingCenter, DraftingCenterQuery};
use crate::pagination::Page;
use crate::ports::BoxFuture;

pub trait DraftingCenterRepository: Send + Sync {
    fn create(&self, center: &DraftingCenter) -> BoxFuture<'_, DomainResult<DraftingCenter>>;

    /// Returns soft-deleted centers too; callers decide liveness.
    fn get(&self, center_id: &str) -> BoxFuture<'_, DomainResult<Option<DraftingCenter>>>;

    fn update(&self, center: &DraftingCenter) -> BoxFuture<'_, DomainResult<DraftingCenter>>;

    /// Never includes soft-deleted centers.
    fn list(&self, query: &DraftingCenterQuery)
    -> BoxFuture<'_, DomainResult<Page<DraftingCenter>>>;
}
