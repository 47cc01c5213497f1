use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sketchdesk_domain::DomainResult;
use sketchdesk_domain::assignments::{
    Assignment, AssignmentQuery, AssignmentStatus, RequestProjection,
};
use sketchdesk_domain::error::DomainError;
use sketchdesk_domain::pagination::Page;
use sketchdesk_domain::ports::BoxFuture;
use sketchdesk_domain::ports::assignments::AssignmentRepository;
use sketchdesk_domain::sketch_requests::SketchRequest;
use sketchdesk_domain::util::same_id;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;
use tokio::sync::RwLock;

use super::sketch_request::{InMemorySketchRequestRepository, RequestStore};
use super::surreal::{
    decode_count, decode_many, decode_one, map_surreal_error, map_transaction_error, page_bounds,
    payload, query_result, where_clause,
};

const TABLE: &str = "assignment";

pub struct InMemoryAssignmentRepository {
    store: Arc<RwLock<HashMap<String, Assignment>>>,
    requests: RequestStore,
}

impl InMemoryAssignmentRepository {
    pub fn new(requests: &InMemorySketchRequestRepository) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            requests: requests.shared_store(),
        }
    }
}

fn apply_projection(
    requests: &mut HashMap<String, SketchRequest>,
    projection: &RequestProjection,
) -> DomainResult<()> {
    let request = requests
        .get_mut(&projection.sketch_request_id)
        .ok_or_else(|| DomainError::not_found("sketch request"))?;
    request.status = projection.status;
    request.updated_at_ms = projection.updated_at_ms;
    Ok(())
}

fn is_open(status: AssignmentStatus) -> bool {
    !matches!(status, AssignmentStatus::Completed | AssignmentStatus::Cancelled)
}

impl AssignmentRepository for InMemoryAssignmentRepository {
    fn create(
        &self,
        assignment: &Assignment,
        projection: &RequestProjection,
    ) -> BoxFuture<'_, DomainResult<Assignment>> {
        let assignment = assignment.clone();
        let projection = projection.clone();
        let store = self.store.clone();
        let requests = self.requests.clone();
        Box::pin(async move {
            // lock order: assignments, then requests
            let mut store = store.write().await;
            let mut requests = requests.write().await;
            if store.contains_key(&assignment.assignment_id)
                || store.values().any(|existing| {
                    existing.status.is_live()
                        && same_id(&existing.sketch_request_id, &assignment.sketch_request_id)
                })
            {
                return Err(DomainError::Conflict(
                    "sketch request already has a live assignment".into(),
                ));
            }
            apply_projection(&mut requests, &projection)?;
            store.insert(assignment.assignment_id.clone(), assignment.clone());
            Ok(assignment)
        })
    }

    fn transition(
        &self,
        assignment: &Assignment,
        expected: AssignmentStatus,
        projection: Option<&RequestProjection>,
    ) -> BoxFuture<'_, DomainResult<Assignment>> {
        let assignment = assignment.clone();
        let projection = projection.cloned();
        let store = self.store.clone();
        let requests = self.requests.clone();
        Box::pin(async move {
            let mut store = store.write().await;
            let mut requests = requests.write().await;
            let current = store
                .get(&assignment.assignment_id)
                .ok_or_else(|| DomainError::not_found("assignment"))?;
            if current.status != expected {
                return Err(DomainError::Conflict(format!(
                    "assignment status is {}, expected {}",
                    current.status.as_str(),
                    expected.as_str()
                )));
            }
            if let Some(projection) = projection.as_ref() {
                apply_projection(&mut requests, projection)?;
            }
            store.insert(assignment.assignment_id.clone(), assignment.clone());
            Ok(assignment)
        })
    }

    fn get(&self, assignment_id: &str) -> BoxFuture<'_, DomainResult<Option<Assignment>>> {
        let assignment_id = assignment_id.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            Ok(store.get(&assignment_id).cloned())
        })
    }

    fn find_active(
        &self,
        sketch_request_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<Assignment>>> {
        let sketch_request_id = sketch_request_id.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            Ok(store
                .values()
                .find(|assignment| {
                    assignment.status.is_live()
                        && same_id(&assignment.sketch_request_id, &sketch_request_id)
                })
                .cloned())
        })
    }

    fn list(&self, query: &AssignmentQuery) -> BoxFuture<'_, DomainResult<Page<Assignment>>> {
        let query = query.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            let mut assignments: Vec<Assignment> = store
                .values()
                .filter(|assignment| query.matches(assignment))
                .cloned()
                .collect();
            assignments.sort_by(|left, right| {
                right
                    .assigned_at_ms
                    .cmp(&left.assigned_at_ms)
                    .then_with(|| right.assignment_id.cmp(&left.assignment_id))
            });
            Ok(query.page.apply(assignments))
        })
    }

    fn count_open_for_center(&self, drafting_center_id: &str) -> BoxFuture<'_, DomainResult<u64>> {
        let drafting_center_id = drafting_center_id.to_string();
        let store = self.store.clone();
        Box::pin(async move {
            let store = store.read().await;
            Ok(store
                .values()
                .filter(|assignment| {
                    is_open(assignment.status)
                        && same_id(&assignment.drafting_center_id, &drafting_center_id)
                })
                .count() as u64)
        })
    }
}

/// Stored form. `active_key` is unique across the table: it holds the
/// sketch request id while the assignment is live and a per-assignment
/// tombstone once cancelled.
#[derive(Debug, Serialize, Deserialize)]
struct SurrealAssignmentRow {
    #[serde(flatten)]
    assignment: Assignment,
    active_key: String,
}

impl SurrealAssignmentRow {
    fn from_assignment(assignment: &Assignment) -> Self {
        let active_key = if assignment.status.is_live() {
            assignment.sketch_request_id.clone()
        } else {
            format!("cancelled:{}", assignment.assignment_id)
        };
        Self {
            assignment: assignment.clone(),
            active_key,
        }
    }
}

pub struct SurrealAssignmentRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealAssignmentRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    async fn fetch(
        client: &Surreal<Client>,
        assignment_id: String,
    ) -> DomainResult<Option<Assignment>> {
        let mut response = client
            .query("SELECT * FROM assignment WHERE assignment_id = $id LIMIT 1")
            .bind(("id", assignment_id))
            .await
            .map_err(map_surreal_error)?;
        let rows: Vec<Value> = response.take(0).map_err(query_result)?;
        decode_one(rows, TABLE)
    }
}

const PROJECT_REQUEST: &str = "UPDATE sketch_request \
     SET status = $request_status, updated_at_ms = $request_updated_at_ms \
     WHERE sketch_request_id = $sketch_request_id;";

impl AssignmentRepository for SurrealAssignmentRepository {
    fn create(
        &self,
        assignment: &Assignment,
        projection: &RequestProjection,
    ) -> BoxFuture<'_, DomainResult<Assignment>> {
        let client = self.client.clone();
        let row = SurrealAssignmentRow::from_assignment(assignment);
        let projection = projection.clone();
        Box::pin(async move {
            let assignment_id = row.assignment.assignment_id.clone();
            let payload = payload(&row, TABLE)?;
            let statement = format!(
                "BEGIN TRANSACTION; \
                 CREATE assignment CONTENT $payload; \
                 {PROJECT_REQUEST} \
                 COMMIT TRANSACTION;"
            );
            client
                .query(statement)
                .bind(("payload", payload))
                .bind(("request_status", projection.status.as_str().to_string()))
                .bind(("request_updated_at_ms", projection.updated_at_ms))
                .bind(("sketch_request_id", projection.sketch_request_id))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_transaction_error)?;
            Self::fetch(&client, assignment_id)
                .await?
                .ok_or_else(|| DomainError::Storage("create returned no assignment row".into()))
        })
    }

    fn transition(
        &self,
        assignment: &Assignment,
        expected: AssignmentStatus,
        projection: Option<&RequestProjection>,
    ) -> BoxFuture<'_, DomainResult<Assignment>> {
        let client = self.client.clone();
        let row = SurrealAssignmentRow::from_assignment(assignment);
        let projection = projection.cloned();
        Box::pin(async move {
            let assignment_id = row.assignment.assignment_id.clone();
            let payload = payload(&row, TABLE)?;
            let mut statement = String::from(
                "BEGIN TRANSACTION; \
                 LET $updated = (UPDATE assignment MERGE $payload \
                     WHERE assignment_id = $assignment_id AND status = $expected RETURN AFTER); \
                 IF array::len($updated) = 0 { THROW \"conflict: assignment status changed\" }; ",
            );
            if projection.is_some() {
                statement.push_str(PROJECT_REQUEST);
            }
            statement.push_str(" COMMIT TRANSACTION;");

            let mut pending = client
                .query(statement)
                .bind(("payload", payload))
                .bind(("assignment_id", assignment_id.clone()))
                .bind(("expected", expected.as_str().to_string()));
            if let Some(projection) = projection {
                pending = pending
                    .bind(("request_status", projection.status.as_str().to_string()))
                    .bind(("request_updated_at_ms", projection.updated_at_ms))
                    .bind(("sketch_request_id", projection.sketch_request_id));
            }
            pending
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_transaction_error)?;
            Self::fetch(&client, assignment_id)
                .await?
                .ok_or_else(|| DomainError::not_found("assignment"))
        })
    }

    fn get(&self, assignment_id: &str) -> BoxFuture<'_, DomainResult<Option<Assignment>>> {
        let client = self.client.clone();
        let assignment_id = assignment_id.to_string();
        Box::pin(async move { Self::fetch(&client, assignment_id).await })
    }

    fn find_active(
        &self,
        sketch_request_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<Assignment>>> {
        let client = self.client.clone();
        let sketch_request_id = sketch_request_id.to_string();
        Box::pin(async move {
            let mut response = client
                .query("SELECT * FROM assignment WHERE active_key = $id LIMIT 1")
                .bind(("id", sketch_request_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(query_result)?;
            decode_one(rows, TABLE)
        })
    }

    fn list(&self, query: &AssignmentQuery) -> BoxFuture<'_, DomainResult<Page<Assignment>>> {
        let client = self.client.clone();
        let query = query.clone();
        Box::pin(async move {
            let mut conditions = Vec::new();
            if query.drafting_center_id.is_some() {
                conditions.push("drafting_center_id = $drafting_center_id");
            }
            if query.sketch_request_id.is_some() {
                conditions.push("sketch_request_id = $sketch_request_id");
            }
            if query.status.is_some() {
                conditions.push("status = $status");
            }
            if !query.include_cancelled && query.status != Some(AssignmentStatus::Cancelled) {
                conditions.push("status != 'CANCELLED'");
            }
            let filter = where_clause(&conditions);
            let mut statement = format!(
                "SELECT * FROM assignment{filter} ORDER BY assigned_at_ms DESC, assignment_id DESC"
            );
            if let Some((limit, start)) = page_bounds(&query.page) {
                statement.push_str(&format!(" LIMIT {limit} START {start}"));
            }
            statement.push_str(&format!(
                "; SELECT count() AS total FROM assignment{filter} GROUP ALL;"
            ));
            let mut pending = client.query(statement);
            if let Some(drafting_center_id) = query.drafting_center_id {
                pending = pending.bind(("drafting_center_id", drafting_center_id));
            }
            if let Some(sketch_request_id) = query.sketch_request_id {
                pending = pending.bind(("sketch_request_id", sketch_request_id));
            }
            if let Some(status) = query.status {
                pending = pending.bind(("status", status.as_str().to_string()));
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

    fn count_open_for_center(&self, drafting_center_id: &str) -> BoxFuture<'_, DomainResult<u64>> {
        let client = self.client.clone();
        let drafting_center_id = drafting_center_id.to_string();
        Box::pin(async move {
            let mut response = client
                .query(
                    "SELECT count() AS total FROM assignment \
                     WHERE drafting_center_id = $id \
                     AND status NOT IN ['COMPLETED', 'CANCELLED'] GROUP ALL",
                )
                .bind(("id", drafting_center_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(query_result)?;
            decode_count(rows)
        })
    }
}
