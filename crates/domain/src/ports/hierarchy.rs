use crate::DomainResult;
use crate::hierarchy::{HierarchyListQuery, HierarchyNode};
use crate::pagination::Page;
use crate::ports::BoxFuture;

/// Storage for one hierarchy level. Implementations must reject a second
/// node with the same `(parent_id, code)` with `DomainError::Conflict`.
pub trait HierarchyRepository<T: HierarchyNode>: Send + Sync {
    fn create(&self, node: &T) -> BoxFuture<'_, DomainResult<T>>;

    fn get(&self, id: &str) -> BoxFuture<'_, DomainResult<Option<T>>>;

    fn update(&self, node: &T) -> BoxFuture<'_, DomainResult<T>>;

    fn list(&self, query: &HierarchyListQuery) -> BoxFuture<'_, DomainResult<Page<T>>>;

    /// `name` arrives trimmed and lowercased.
    fn find_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> BoxFuture<'_, DomainResult<Vec<T>>>;
}
