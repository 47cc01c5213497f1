use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use sketchdesk_domain::DomainResult;
use sketchdesk_domain::error::DomainError;
use sketchdesk_domain::pagination::Page;
use sketchdesk_domain::ports::BoxFuture;
use sketchdesk_domain::ports::sketch_requests::SketchRequestRepository;
use sketchdesk_domain::sequencer::parse_sequence;
use sketchdesk_domain::sketch_requests::{SketchRequest, SketchRequestQuery, SketchRequestStatus};
use sketchdesk_domain::util::same_id;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;
use tokio::sync::RwLock;

use super::surreal::{
    decode_count, decode_many, decode_one, map_surreal_error, page_bounds, payload, query_result,
    where_clause,
};

const TABLE: &str = "sketch_request";

pub(crate) type RequestStore = Arc<RwLock<HashMap<String, SketchRequest>>>;

#[derive(Default)]
pub struct InMemorySketchRequestRepository {
    store: RequestStore,
}

impl InMemorySketchRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle shared with the assignment repository so projections land
    /// under the same locks as the assignment write.
    pub(crate) fn shared_store(&self) -> RequestStore {
        self.store.clone()
    }
}

fn matches_query(request: &SketchRequest, query: &SketchRequestQuery) -> bool {
    query
        .submitter_id
        .as_deref()
        .is_none_or(|submitter_id| request.submitter_id == submitter_id)
        && query.status.is_none_or(|status| request.status == status)
        && query.ids.as_ref().is_none_or(|ids| {
            ids.iter()
                .any(|id| same_id(id, &request.sketch_request_id))
        })
}

impl SketchRequestRepository for InMemorySketchRequestRepository {
    fn create(&self, request: &SketchRequest) -> BoxFuture<'_, DomainResult<SketchRequest>> {
        let request = request.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            if store.contains_key(&request.sketch_request_id) {
                return Err(DomainError::Conflict("sketch request exists".into()));
            }
            if store
                .values()
                .any(|existing| existing.application_id == request.application_id)
            {
                return Err(DomainError::Conflict(format!(
                    "application id {} taken",
                    request.application_id
                )));
            }
            store.insert(request.sketch_request_id.clone(), request.clone());
            Ok(request)
        })
    }

    fn get(
        &self,
        sketch_request_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<SketchRequest>>> {
        let sketch_request_id = sketch_request_id.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            Ok(store.get(&sketch_request_id).cloned())
        })
    }

    fn update_status(
        &self,
        sketch_request_id: &str,
        status: SketchRequestStatus,
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<SketchRequest>> {
        let sketch_request_id = sketch_request_id.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            let request = store
                .get_mut(&sketch_request_id)
                .ok_or_else(|| DomainError::not_found("sketch request"))?;
            request.status = status;
            request.updated_at_ms = updated_at_ms;
            Ok(request.clone())
        })
    }

    fn list(&self, query: &SketchRequestQuery) -> BoxFuture<'_, DomainResult<Page<SketchRequest>>> {
        let query = query.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            let mut requests: Vec<SketchRequest> = store
                .values()
                .filter(|request| matches_query(request, &query))
                .cloned()
                .collect();
            requests.sort_by(|left, right| {
                right
                    .created_at_ms
                    .cmp(&left.created_at_ms)
                    .then_with(|| right.sketch_request_id.cmp(&left.sketch_request_id))
            });
            Ok(query.page.apply(requests))
        })
    }

    fn max_application_sequence(&self, prefix: &str) -> BoxFuture<'_, DomainResult<u64>> {
        let prefix = prefix.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            Ok(store
                .values()
                .filter_map(|request| parse_sequence(&request.application_id, &prefix))
                .max()
                .unwrap_or(0))
        })
    }
}

pub struct SurrealSketchRequestRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealSketchRequestRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }
}

impl SketchRequestRepository for SurrealSketchRequestRepository {
    fn create(&self, request: &SketchRequest) -> BoxFuture<'_, DomainResult<SketchRequest>> {
        let client = self.client.clone();
        let request = request.clone();
        Box::pin(async move {
            let payload = payload(&request, TABLE)?;
            let mut response = client
                .query("CREATE sketch_request CONTENT $payload")
                .bind(("payload", payload))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            decode_one(rows, TABLE)?.ok_or_else(|| {
                DomainError::Storage("create returned no sketch_request row".to_string())
            })
        })
    }

    fn get(
        &self,
        sketch_request_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<SketchRequest>>> {
        let client = self.client.clone();
        let sketch_request_id = sketch_request_id.to_string();
        Box::pin(async move {
            let mut response = client
                .query("SELECT * FROM sketch_request WHERE sketch_request_id = $id LIMIT 1")
                .bind(("id", sketch_request_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(query_result)?;
            decode_one(rows, TABLE)
        })
    }

    fn update_status(
        &self,
        sketch_request_id: &str,
        status: SketchRequestStatus,
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<SketchRequest>> {
        let client = self.client.clone();
        let sketch_request_id = sketch_request_id.to_string();
        Box::pin(async move {
            let mut response = client
                .query(
                    "UPDATE sketch_request \
                     SET status = $status, updated_at_ms = $updated_at_ms \
                     WHERE sketch_request_id = $id RETURN AFTER",
                )
                .bind(("status", status.as_str().to_string()))
                .bind(("updated_at_ms", updated_at_ms))
                .bind(("id", sketch_request_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(map_surreal_error)?;
            decode_one(rows, TABLE)?.ok_or_else(|| DomainError::not_found("sketch request"))
        })
    }

    fn list(&self, query: &SketchRequestQuery) -> BoxFuture<'_, DomainResult<Page<SketchRequest>>> {
        let client = self.client.clone();
        let query = query.clone();
        Box::pin(async move {
            let mut conditions = Vec::new();
            if query.submitter_id.is_some() {
                conditions.push("submitter_id = $submitter_id");
            }
            if query.status.is_some() {
                conditions.push("status = $status");
            }
            if query.ids.is_some() {
                conditions.push("sketch_request_id IN $ids");
            }
            let filter = where_clause(&conditions);
            let mut statement = format!(
                "SELECT * FROM sketch_request{filter} \
                 ORDER BY created_at_ms DESC, sketch_request_id DESC"
            );
            if let Some((limit, start)) = page_bounds(&query.page) {
                statement.push_str(&format!(" LIMIT {limit} START {start}"));
            }
            statement.push_str(&format!(
                "; SELECT count() AS total FROM sketch_request{filter} GROUP ALL;"
            ));
            let mut pending = client.query(statement);
            if let Some(submitter_id) = query.submitter_id {
                pending = pending.bind(("submitter_id", submitter_id));
            }
            if let Some(status) = query.status {
                pending = pending.bind(("status", status.as_str().to_string()));
            }
            if let Some(ids) = query.ids {
                pending = pending.bind(("ids", ids));
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

    fn max_application_sequence(&self, prefix: &str) -> BoxFuture<'_, DomainResult<u64>> {
        let client = self.client.clone();
        let prefix = prefix.to_string();
        Box::pin(async move {
            let mut response = client
                .query(
                    "SELECT VALUE application_id FROM sketch_request \
                     WHERE string::starts_with(application_id, $prefix)",
                )
                .bind(("prefix", prefix.clone()))
                .await
                .map_err(map_surreal_error)?;
            let ids: Vec<String> = response.take(0).map_err(query_result)?;
            // suffixes compare numerically; "10" sorts below "9" as text
            Ok(ids
                .iter()
                .filter_map(|application_id| parse_sequence(application_id, &prefix))
                .max()
                .unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use sketchdesk_domain::sketch_requests::SurveyKind;

    fn request(id: &str, application_id: &str, created_at_ms: i64) -> SketchRequest {
        SketchRequest {
            sketch_request_id: id.into(),
            submitter_id: "surveyor-1".into(),
            survey_kind: SurveyKind::Single,
            region_id: "r".into(),
            sub_region_id: "sr".into(),
            sub_district_id: "sd".into(),
            settlement_id: "st".into(),
            survey_number: "12/3".into(),
            application_id: application_id.into(),
            documents: BTreeMap::new(),
            audio: None,
            extra_documents: Vec::new(),
            notes: None,
            status: SketchRequestStatus::Pending,
            created_at_ms,
            updated_at_ms: created_at_ms,
        }
    }

    #[tokio::test]
    async fn application_id_is_unique() {
        let repo = InMemorySketchRequestRepository::new();
        repo.create(&request("a", "KA/N/24/1", 1)).await.unwrap();
        let err = repo.create(&request("b", "KA/N/24/1", 2)).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn max_sequence_compares_numerically() {
        let repo = InMemorySketchRequestRepository::new();
        repo.create(&request("a", "KA/N/24/9", 1)).await.unwrap();
        repo.create(&request("b", "KA/N/24/10", 2)).await.unwrap();
        repo.create(&request("c", "KA/S/24/99", 3)).await.unwrap();
        assert_eq!(repo.max_application_sequence("KA/N/24/").await.unwrap(), 10);
        assert_eq!(repo.max_application_sequence("KA/N/25/").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filters_ids() {
        let repo = InMemorySketchRequestRepository::new();
        repo.create(&request("a", "X/1", 1)).await.unwrap();
        repo.create(&request("b", "X/2", 2)).await.unwrap();
        repo.create(&request("c", "X/3", 3)).await.unwrap();

        let all = repo.list(&SketchRequestQuery::default()).await.unwrap();
        let ids: Vec<_> = all.items.iter().map(|r| r.sketch_request_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let some = repo
            .list(&SketchRequestQuery {
                ids: Some(vec!["a".into(), "c".into()]),
                ..SketchRequestQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(some.total, 2);
    }
}
