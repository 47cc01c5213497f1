use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use sketchdesk_domain::DomainResult;
use sketchdesk_domain::error::DomainError;
use sketchdesk_domain::hierarchy::{
    HierarchyListQuery, HierarchyNode, HierarchyRepositories, Region, Settlement, SubDistrict,
    SubRegion,
};
use sketchdesk_domain::pagination::Page;
use sketchdesk_domain::ports::BoxFuture;
use sketchdesk_domain::ports::hierarchy::HierarchyRepository;
use sketchdesk_domain::util::same_id;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;
use tokio::sync::RwLock;

use super::surreal::{
    decode_count, decode_many, decode_one, map_surreal_error, page_bounds, payload, query_result,
    where_clause,
};

pub fn memory_hierarchy_repositories() -> HierarchyRepositories {
    HierarchyRepositories {
        regions: Arc::new(InMemoryHierarchyRepository::<Region>::new()),
        sub_regions: Arc::new(InMemoryHierarchyRepository::<SubRegion>::new()),
        sub_districts: Arc::new(InMemoryHierarchyRepository::<SubDistrict>::new()),
        settlements: Arc::new(InMemoryHierarchyRepository::<Settlement>::new()),
    }
}

pub fn surreal_hierarchy_repositories(client: Arc<Surreal<Client>>) -> HierarchyRepositories {
    HierarchyRepositories {
        regions: Arc::new(SurrealHierarchyRepository::<Region>::with_client(
            client.clone(),
        )),
        sub_regions: Arc::new(SurrealHierarchyRepository::<SubRegion>::with_client(
            client.clone(),
        )),
        sub_districts: Arc::new(SurrealHierarchyRepository::<SubDistrict>::with_client(
            client.clone(),
        )),
        settlements: Arc::new(SurrealHierarchyRepository::<Settlement>::with_client(client)),
    }
}

pub struct InMemoryHierarchyRepository<T> {
    store: Arc<RwLock<HashMap<String, T>>>,
}

impl<T> InMemoryHierarchyRepository<T> {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T> Default for InMemoryHierarchyRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn same_scope<T: HierarchyNode>(left: &T, right: &T) -> bool {
    match (left.parent_id(), right.parent_id()) {
        (Some(left), Some(right)) => same_id(left, right),
        (None, None) => true,
        _ => false,
    }
}

impl<T: HierarchyNode> HierarchyRepository<T> for InMemoryHierarchyRepository<T> {
    fn create(&self, node: &T) -> BoxFuture<'_, DomainResult<T>> {
        let node = node.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            if store.contains_key(node.id())
                || store
                    .values()
                    .any(|existing| same_scope(existing, &node) && existing.code() == node.code())
            {
                return Err(DomainError::Conflict(format!(
                    "{} code taken",
                    T::LEVEL.label()
                )));
            }
            store.insert(node.id().to_string(), node.clone());
            Ok(node)
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, DomainResult<Option<T>>> {
        let id = id.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            Ok(store.get(&id).cloned())
        })
    }

    fn update(&self, node: &T) -> BoxFuture<'_, DomainResult<T>> {
        let node = node.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            if !store.contains_key(node.id()) {
                return Err(DomainError::not_found(T::LEVEL.label()));
            }
            if store.values().any(|existing| {
                existing.id() != node.id()
                    && same_scope(existing, &node)
                    && existing.code() == node.code()
            }) {
                return Err(DomainError::Conflict(format!(
                    "{} code taken",
                    T::LEVEL.label()
                )));
            }
            store.insert(node.id().to_string(), node.clone());
            Ok(node)
        })
    }

    fn list(&self, query: &HierarchyListQuery) -> BoxFuture<'_, DomainResult<Page<T>>> {
        let query = query.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            let mut nodes: Vec<T> = store
                .values()
                .filter(|node| {
                    query.parent_id.as_deref().is_none_or(|parent_id| {
                        node.parent_id()
                            .is_some_and(|node_parent| same_id(node_parent, parent_id))
                    })
                })
                .filter(|node| query.status.is_none_or(|status| node.status() == status))
                .cloned()
                .collect();
            nodes.sort_by(|left, right| {
                left.name()
                    .to_lowercase()
                    .cmp(&right.name().to_lowercase())
                    .then_with(|| left.code().cmp(right.code()))
            });
            Ok(query.page.apply(nodes))
        })
    }

    fn find_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> BoxFuture<'_, DomainResult<Vec<T>>> {
        let name = name.to_string();
        let parent_id = parent_id.map(str::to_string);
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            let mut matches: Vec<T> = store
                .values()
                .filter(|node| node.name().trim().to_lowercase() == name)
                .filter(|node| {
                    parent_id.as_deref().is_none_or(|parent_id| {
                        node.parent_id()
                            .is_some_and(|node_parent| same_id(node_parent, parent_id))
                    })
                })
                .cloned()
                .collect();
            matches.sort_by_key(|node| node.created_at_ms());
            Ok(matches)
        })
    }
}

/// One SurrealDB table per hierarchy level; the table and field names come
/// from the node's `LEVEL`.
pub struct SurrealHierarchyRepository<T> {
    client: Arc<Surreal<Client>>,
    _node: PhantomData<fn() -> T>,
}

impl<T> SurrealHierarchyRepository<T> {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self {
            client,
            _node: PhantomData,
        }
    }
}

impl<T: HierarchyNode> HierarchyRepository<T> for SurrealHierarchyRepository<T> {
    fn create(&self, node: &T) -> BoxFuture<'_, DomainResult<T>> {
        let client = self.client.clone();
        let node = node.clone();
        Box::pin(async move {
            let table = T::LEVEL.table();
            let payload = payload(&node, table)?;
            let mut response = client
                .query(format!("CREATE {table} CONTENT $payload"))
                .bind(("payload", payload))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            decode_one(rows, table)?
                .ok_or_else(|| DomainError::Storage(format!("create returned no {table} row")))
        })
    }

    fn get(&self, id: &str) -> BoxFuture<'_, DomainResult<Option<T>>> {
        let client = self.client.clone();
        let id = id.to_string();
        Box::pin(async move {
            let table = T::LEVEL.table();
            let id_field = T::LEVEL.id_field();
            let mut response = client
                .query(format!(
                    "SELECT * FROM {table} WHERE {id_field} = $id LIMIT 1"
                ))
                .bind(("id", id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(query_result)?;
            decode_one(rows, table)
        })
    }

    fn update(&self, node: &T) -> BoxFuture<'_, DomainResult<T>> {
        let client = self.client.clone();
        let node = node.clone();
        Box::pin(async move {
            let table = T::LEVEL.table();
            let id_field = T::LEVEL.id_field();
            let payload = payload(&node, table)?;
            let mut response = client
                .query(format!(
                    "UPDATE {table} MERGE $payload WHERE {id_field} = $id RETURN AFTER"
                ))
                .bind(("payload", payload))
                .bind(("id", node.id().to_string()))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            decode_one(rows, table)?.ok_or_else(|| DomainError::not_found(T::LEVEL.label()))
        })
    }

    fn list(&self, query: &HierarchyListQuery) -> BoxFuture<'_, DomainResult<Page<T>>> {
        let client = self.client.clone();
        let query = query.clone();
        Box::pin(async move {
            let table = T::LEVEL.table();
            let mut conditions = Vec::new();
            let parent_condition = T::LEVEL
                .parent_field()
                .map(|field| format!("{field} = $parent_id"));
            if let (Some(condition), Some(_)) = (&parent_condition, &query.parent_id) {
                conditions.push(condition.as_str());
            }
            if query.status.is_some() {
                conditions.push("status = $status");
            }
            let filter = where_clause(&conditions);
            let mut statement = format!("SELECT * FROM {table}{filter} ORDER BY name ASC, code ASC");
            if let Some((limit, start)) = page_bounds(&query.page) {
                statement.push_str(&format!(" LIMIT {limit} START {start}"));
            }
            statement.push_str(&format!(
                "; SELECT count() AS total FROM {table}{filter} GROUP ALL;"
            ));
            let mut pending = client.query(statement);
            if let Some(parent_id) = query.parent_id.clone() {
                pending = pending.bind(("parent_id", parent_id));
            }
            if let Some(status) = query.status {
                pending = pending.bind(("status", status.as_str().to_string()));
            }
            let mut response = pending.await.map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(query_result)?;
            let totals: Vec<Value> = response.take(1).map_err(query_result)?;
            Ok(Page {
                items: decode_many(rows, table)?,
                total: decode_count(totals)?,
            })
        })
    }

    fn find_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> BoxFuture<'_, DomainResult<Vec<T>>> {
        let client = self.client.clone();
        let name = name.to_string();
        let parent_id = parent_id.map(str::to_string);
        Box::pin(async move {
            let table = T::LEVEL.table();
            let mut statement = format!(
                "SELECT * FROM {table} WHERE string::lowercase(string::trim(name)) = $name"
            );
            if let (Some(field), Some(_)) = (T::LEVEL.parent_field(), &parent_id) {
                statement.push_str(&format!(" AND {field} = $parent_id"));
            }
            statement.push_str(" ORDER BY created_at_ms ASC");
            let mut pending = client.query(statement).bind(("name", name));
            if let Some(parent_id) = parent_id {
                pending = pending.bind(("parent_id", parent_id));
            }
            let mut response = pending.await.map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(query_result)?;
            decode_many(rows, table)
        })
    }
}
