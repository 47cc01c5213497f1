use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sketchdesk_domain::DomainResult;
use sketchdesk_domain::drafting_centers::{DraftingCenter, DraftingCenterQuery};
use sketchdesk_domain::error::DomainError;
use sketchdesk_domain::pagination::Page;
use sketchdesk_domain::ports::BoxFuture;
use sketchdesk_domain::ports::drafting_centers::DraftingCenterRepository;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;
use tokio::sync::RwLock;

use super::surreal::{
    decode_count, decode_many, decode_one, map_surreal_error, page_bounds, payload, query_result,
    where_clause,
};

const TABLE: &str = "drafting_center";

#[derive(Default)]
pub struct InMemoryDraftingCenterRepository {
    store: Arc<RwLock<HashMap<String, DraftingCenter>>>,
}

impl InMemoryDraftingCenterRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn code_taken(store: &HashMap<String, DraftingCenter>, center: &DraftingCenter) -> bool {
    let Some(code) = center.code.as_deref() else {
        return false;
    };
    store.values().any(|existing| {
        existing.drafting_center_id != center.drafting_center_id
            && existing.code.as_deref() == Some(code)
    })
}

fn matches_query(center: &DraftingCenter, query: &DraftingCenterQuery) -> bool {
    !center.is_deleted()
        && query.status.is_none_or(|status| center.status == status)
        && query
            .availability
            .is_none_or(|availability| center.availability == availability)
}

impl DraftingCenterRepository for InMemoryDraftingCenterRepository {
    fn create(&self, center: &DraftingCenter) -> BoxFuture<'_, DomainResult<DraftingCenter>> {
        let center = center.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            if store.contains_key(&center.drafting_center_id) || code_taken(&store, &center) {
                return Err(DomainError::Conflict("drafting center code taken".into()));
            }
            store.insert(center.drafting_center_id.clone(), center.clone());
            Ok(center)
        })
    }

    fn get(&self, center_id: &str) -> BoxFuture<'_, DomainResult<Option<DraftingCenter>>> {
        let center_id = center_id.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            Ok(store.get(&center_id).cloned())
        })
    }

    fn update(&self, center: &DraftingCenter) -> BoxFuture<'_, DomainResult<DraftingCenter>> {
        let center = center.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            if !store.contains_key(&center.drafting_center_id) {
                return Err(DomainError::not_found("drafting center"));
            }
            if code_taken(&store, &center) {
                return Err(DomainError::Conflict("drafting center code taken".into()));
            }
            store.insert(center.drafting_center_id.clone(), center.clone());
            Ok(center)
        })
    }

    fn list(
        &self,
        query: &DraftingCenterQuery,
    ) -> BoxFuture<'_, DomainResult<Page<DraftingCenter>>> {
        let query = query.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            let mut centers: Vec<DraftingCenter> = store
                .values()
                .filter(|center| matches_query(center, &query))
                .cloned()
                .collect();
            centers.sort_by(|left, right| {
                left.name
                    .to_lowercase()
                    .cmp(&right.name.to_lowercase())
                    .then_with(|| left.drafting_center_id.cmp(&right.drafting_center_id))
            });
            Ok(query.page.apply(centers))
        })
    }
}

/// Stored form; `code_key` carries the unique index so centers without a
/// code never collide.
#[derive(Debug, Serialize, Deserialize)]
struct SurrealDraftingCenterRow {
    #[serde(flatten)]
    center: DraftingCenter,
    code_key: String,
}

impl SurrealDraftingCenterRow {
    fn from_center(center: &DraftingCenter) -> Self {
        let code_key = match center.code.as_deref() {
            Some(code) => format!("code:{code}"),
            None => format!("none:{}", center.drafting_center_id),
        };
        Self {
            center: center.clone(),
            code_key,
        }
    }
}

pub struct SurrealDraftingCenterRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealDraftingCenterRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }
}

impl DraftingCenterRepository for SurrealDraftingCenterRepository {
    fn create(&self, center: &DraftingCenter) -> BoxFuture<'_, DomainResult<DraftingCenter>> {
        let client = self.client.clone();
        let row = SurrealDraftingCenterRow::from_center(center);
        Box::pin(async move {
            let payload = payload(&row, TABLE)?;
            let mut response = client
                .query("CREATE drafting_center CONTENT $payload")
                .bind(("payload", payload))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            decode_one(rows, TABLE)?.ok_or_else(|| {
                DomainError::Storage("create returned no drafting_center row".to_string())
            })
        })
    }

    fn get(&self, center_id: &str) -> BoxFuture<'_, DomainResult<Option<DraftingCenter>>> {
        let client = self.client.clone();
        let center_id = center_id.to_string();
        Box::pin(async move {
            let mut response = client
                .query("SELECT * FROM drafting_center WHERE drafting_center_id = $id LIMIT 1")
                .bind(("id", center_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(query_result)?;
            decode_one(rows, TABLE)
        })
    }

    fn update(&self, center: &DraftingCenter) -> BoxFuture<'_, DomainResult<DraftingCenter>> {
        let client = self.client.clone();
        let row = SurrealDraftingCenterRow::from_center(center);
        Box::pin(async move {
            let center_id = row.center.drafting_center_id.clone();
            let payload = payload(&row, TABLE)?;
            let mut response = client
                .query(
                    "UPDATE drafting_center MERGE $payload \
                     WHERE drafting_center_id = $id RETURN AFTER",
                )
                .bind(("payload", payload))
                .bind(("id", center_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            decode_one(rows, TABLE)?.ok_or_else(|| DomainError::not_found("drafting center"))
        })
    }

    fn list(
        &self,
        query: &DraftingCenterQuery,
    ) -> BoxFuture<'_, DomainResult<Page<DraftingCenter>>> {
        let client = self.client.clone();
        let query = query.clone();
        Box::pin(async move {
            let mut conditions = vec!["(deleted_at_ms = NONE OR deleted_at_ms = NULL)"];
            if query.status.is_some() {
                conditions.push("status = $status");
            }
            if query.availability.is_some() {
                conditions.push("availability = $availability");
            }
            let filter = where_clause(&conditions);
            let mut statement =
                format!("SELECT * FROM drafting_center{filter} ORDER BY name ASC");
            if let Some((limit, start)) = page_bounds(&query.page) {
                statement.push_str(&format!(" LIMIT {limit} START {start}"));
            }
            statement.push_str(&format!(
                "; SELECT count() AS total FROM drafting_center{filter} GROUP ALL;"
            ));
            let mut pending = client.query(statement);
            if let Some(status) = query.status {
                pending = pending.bind(("status", status.as_str().to_string()));
            }
            if let Some(availability) = query.availability {
                pending = pending.bind(("availability", availability.as_str().to_string()));
            }
            let mut response = pending.await.map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(query_result)?;
            let totals: Vec<Value> = response.take(1).map_err(query_result)?;
            Ok(Page {
                items: decode_many(rows, TABLE)?,
                total: decode_count(totals)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchdesk_domain::drafting_centers::Availability;
    use sketchdesk_domain::hierarchy::RecordStatus;

    fn center(id: &str, code: Option<&str>) -> DraftingCenter {
        DraftingCenter {
            drafting_center_id: id.into(),
            name: format!("Center {id}"),
            code: code.map(str::to_string),
            address: None,
            contact_phone: None,
            contact_email: None,
            status: RecordStatus::Active,
            availability: Availability::Available,
            capacity: None,
            created_at_ms: 1,
            updated_at_ms: 1,
            deleted_at_ms: None,
        }
    }

    #[tokio::test]
    async fn codes_are_unique_but_optional() {
        let repo = InMemoryDraftingCenterRepository::new();
        repo.create(&center("dc-1", None)).await.unwrap();
        repo.create(&center("dc-2", None)).await.unwrap();
        repo.create(&center("dc-3", Some("DC-A"))).await.unwrap();
        let err = repo.create(&center("dc-4", Some("DC-A"))).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn list_skips_deleted_centers() {
        let repo = InMemoryDraftingCenterRepository::new();
        repo.create(&center("dc-1", None)).await.unwrap();
        let mut deleted = center("dc-2", None);
        deleted.deleted_at_ms = Some(5);
        repo.create(&deleted).await.unwrap();

        let page = repo.list(&DraftingCenterQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert!(repo.get("dc-2").await.unwrap().is_some());
    }

    #[test]
    fn stored_row_keys_missing_codes_by_id() {
        let row = SurrealDraftingCenterRow::from_center(&center("dc-9", None));
        assert_eq!(row.code_key, "none:dc-9");
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["drafting_center_id"], "dc-9");
    }
}
