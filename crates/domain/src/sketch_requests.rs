use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::assignments::{Assignment, AssignmentQuery};
use crate::auth::Role;
use crate::error::DomainError;
use crate::hierarchy::HierarchyService;
use crate::identity::ActorIdentity;
use crate::pagination::{Page, PageRequest};
use crate::ports::assignments::AssignmentRepository;
use crate::ports::sketch_requests::SketchRequestRepository;
use crate::sequencer::{ApplicationIdSequencer, ApplicationScope};
use crate::util::{now_ms, trimmed, uuid_v7_without_dashes};

pub const MAX_EXTRA_DOCUMENTS: usize = 20;
pub const MAX_NOTES_LENGTH: usize = 2_000;
const MAX_SURVEY_NUMBER_LENGTH: usize = 64;
const MAX_URL_LENGTH: usize = 2_048;
const MAX_FILE_NAME_LENGTH: usize = 255;
const APPLICATION_ID_RETRIES_TOTAL: &str = "sketchdesk_application_id_retries_total";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyKind {
    Joint,
    Single,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SketchRequestStatus {
    Pending,
    Assigned,
    UnderReview,
    Approved,
    Rejected,
}

impl SketchRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Assigned => "ASSIGNED",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "ASSIGNED" => Some(Self::Assigned),
            "UNDER_REVIEW" => Some(Self::UnderReview),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Statuses owned by the assignment workflow (the rest belong to review).
    pub fn follows_assignment(&self) -> bool {
        matches!(self, Self::Pending | Self::Assigned)
    }
}

/// The fixed set of supporting documents a surveyor can attach.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    RecordOfRights,
    MutationRegister,
    Tippan,
    VillageMap,
    HissaSketch,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRef {
    pub url: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub uploaded_at_ms: i64,
}

/// Reference to a file the caller already put into object storage.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentUpload {
    pub url: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SketchRequest {
    pub sketch_request_id: String,
    pub submitter_id: String,
    pub survey_kind: SurveyKind,
    pub region_id: String,
    pub sub_region_id: String,
    pub sub_district_id: String,
    pub settlement_id: String,
    pub survey_number: String,
    pub application_id: String,
    pub documents: BTreeMap<DocumentKind, DocumentRef>,
    pub audio: Option<DocumentRef>,
    pub extra_documents: Vec<DocumentRef>,
    pub notes: Option<String>,
    pub status: SketchRequestStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct SketchRequestCreate {
    pub survey_kind: SurveyKind,
    pub region_id: String,
    pub sub_region_id: String,
    pub sub_district_id: String,
    pub settlement_id: String,
    pub survey_number: String,
    pub documents: BTreeMap<DocumentKind, DocumentUpload>,
    pub audio: Option<DocumentUpload>,
    pub extra_documents: Vec<DocumentUpload>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SketchRequestFilter {
    pub submitter_id: Option<String>,
    pub status: Option<SketchRequestStatus>,
    pub drafting_center_id: Option<String>,
    pub page: PageRequest,
}

#[derive(Clone, Debug, Default)]
pub struct SketchRequestQuery {
    pub submitter_id: Option<String>,
    pub status: Option<SketchRequestStatus>,
    pub ids: Option<Vec<String>>,
    pub page: PageRequest,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SketchRequestWithAssignment {
    #[serde(flatten)]
    pub request: SketchRequest,
    pub assignment: Option<Assignment>,
}

#[derive(Clone)]
pub struct SketchRequestService {
    requests: Arc<dyn SketchRequestRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    hierarchy: HierarchyService,
    sequencer: ApplicationIdSequencer,
    max_attempts: u32,
}

impl SketchRequestService {
    pub fn new(
        requests: Arc<dyn SketchRequestRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        hierarchy: HierarchyService,
        sequencer: ApplicationIdSequencer,
    ) -> Self {
        Self {
            requests,
            assignments,
            hierarchy,
            sequencer,
            max_attempts: 3,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub async fn create(
        &self,
        actor: &ActorIdentity,
        input: SketchRequestCreate,
    ) -> DomainResult<SketchRequest> {
        actor.require_role(Role::Surveyor)?;
        let now = now_ms();
        let input = validate_sketch_request_create(input)?;
        let chain = self
            .hierarchy
            .validate_chain(
                &input.region_id,
                &input.sub_region_id,
                &input.sub_district_id,
                &input.settlement_id,
            )
            .await?;
        chain.require_active()?;

        let documents = input
            .documents
            .into_iter()
            .map(|(kind, upload)| (kind, into_document_ref(upload, now)))
            .collect();
        let draft = SketchRequest {
            sketch_request_id: uuid_v7_without_dashes(),
            submitter_id: actor.user_id.clone(),
            survey_kind: input.survey_kind,
            region_id: chain.region.region_id,
            sub_region_id: chain.sub_region.sub_region_id,
            sub_district_id: chain.sub_district.sub_district_id,
            settlement_id: chain.settlement.settlement_id,
            survey_number: input.survey_number,
            application_id: String::new(),
            documents,
            audio: input.audio.map(|upload| into_document_ref(upload, now)),
            extra_documents: input
                .extra_documents
                .into_iter()
                .map(|upload| into_document_ref(upload, now))
                .collect(),
            notes: input.notes,
            status: SketchRequestStatus::Pending,
            created_at_ms: now,
            updated_at_ms: now,
        };

        let scope = ApplicationScope::at(&chain.region.code, &chain.sub_region.code, now);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = draft.clone();
            request.application_id = self.sequencer.next_for_scope(&scope).await?;
            match self.requests.create(&request).await {
                Ok(created) => {
                    tracing::info!(
                        sketch_request_id = %created.sketch_request_id,
                        application_id = %created.application_id,
                        submitter_id = %created.submitter_id,
                        "sketch request created"
                    );
                    return Ok(created);
                }
                Err(DomainError::Conflict(_)) if attempt < self.max_attempts => {
                    tracing::warn!(
                        application_id = %request.application_id,
                        attempt,
                        "application id collision; reserving another"
                    );
                    counter!(APPLICATION_ID_RETRIES_TOTAL).increment(1);
                }
                Err(DomainError::Conflict(_)) => {
                    return Err(DomainError::Conflict(
                        "could not reserve a unique application id; retry the submission".into(),
                    ));
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn get(
        &self,
        actor: &ActorIdentity,
        sketch_request_id: &str,
    ) -> DomainResult<SketchRequest> {
        let request = self.load(sketch_request_id).await?;
        let owns = actor.role == Role::Surveyor && request.submitter_id == actor.user_id;
        if actor.is_admin() || owns {
            return Ok(request);
        }
        Err(DomainError::Forbidden(
            "sketch request belongs to another submitter".into(),
        ))
    }

    pub async fn list(
        &self,
        actor: &ActorIdentity,
        filter: SketchRequestFilter,
    ) -> DomainResult<Page<SketchRequest>> {
        let mut query = SketchRequestQuery {
            submitter_id: trimmed(filter.submitter_id),
            status: filter.status,
            ids: None,
            page: filter.page,
        };
        if actor.role == Role::Surveyor {
            query.submitter_id = Some(actor.user_id.clone());
        } else if actor.is_admin() {
            if let Some(center_id) = trimmed(filter.drafting_center_id) {
                query.ids = Some(self.request_ids_for_center(&center_id).await?);
            }
        } else {
            return Err(DomainError::Forbidden(
                "only surveyors and administrators can list sketch requests".into(),
            ));
        }
        self.requests.list(&query).await
    }

    pub async fn list_with_assignments(
        &self,
        actor: &ActorIdentity,
        page: PageRequest,
    ) -> DomainResult<Page<SketchRequestWithAssignment>> {
        actor.require_admin()?;
        let requests = self
            .requests
            .list(&SketchRequestQuery {
                page,
                ..SketchRequestQuery::default()
            })
            .await?;
        let mut items = Vec::with_capacity(requests.items.len());
        for request in requests.items {
            let assignment = self
                .assignments
                .find_active(&request.sketch_request_id)
                .await?;
            items.push(SketchRequestWithAssignment {
                request,
                assignment,
            });
        }
        Ok(Page {
            items,
            total: requests.total,
        })
    }

    /// Re-derives a workflow-owned status from the live assignment. Safe to
    /// call any number of times.
    pub async fn reconcile_status(
        &self,
        actor: &ActorIdentity,
        sketch_request_id: &str,
    ) -> DomainResult<SketchRequest> {
        actor.require_admin()?;
        let request = self.load(sketch_request_id).await?;
        if !request.status.follows_assignment() {
            return Ok(request);
        }
        let expected = match self
            .assignments
            .find_active(&request.sketch_request_id)
            .await?
        {
            Some(_) => SketchRequestStatus::Assigned,
            None => SketchRequestStatus::Pending,
        };
        if expected == request.status {
            return Ok(request);
        }
        tracing::warn!(
            sketch_request_id = %request.sketch_request_id,
            from = request.status.as_str(),
            to = expected.as_str(),
            "sketch request status drifted from its assignment; repairing"
        );
        self.requests
            .update_status(&request.sketch_request_id, expected, now_ms())
            .await
    }

    async fn load(&self, sketch_request_id: &str) -> DomainResult<SketchRequest> {
        self.requests
            .get(sketch_request_id.trim())
            .await?
            .ok_or_else(|| DomainError::not_found("sketch request"))
    }

    async fn request_ids_for_center(&self, center_id: &str) -> DomainResult<Vec<String>> {
        let assignments = self
            .assignments
            .list(&AssignmentQuery {
                drafting_center_id: Some(center_id.to_string()),
                include_cancelled: false,
                page: PageRequest::unbounded(),
                ..AssignmentQuery::default()
            })
            .await?;
        Ok(assignments
            .items
            .into_iter()
            .map(|assignment| assignment.sketch_request_id)
            .collect())
    }
}

fn into_document_ref(upload: DocumentUpload, uploaded_at_ms: i64) -> DocumentRef {
    DocumentRef {
        url: upload.url,
        file_name: upload.file_name,
        mime_type: upload.mime_type,
        size: upload.size,
        uploaded_at_ms,
    }
}

fn validate_sketch_request_create(input: SketchRequestCreate) -> DomainResult<SketchRequestCreate> {
    let region_id = required_id(input.region_id, "region_id")?;
    let sub_region_id = required_id(input.sub_region_id, "sub_region_id")?;
    let sub_district_id = required_id(input.sub_district_id, "sub_district_id")?;
    let settlement_id = required_id(input.settlement_id, "settlement_id")?;

    let survey_number = input.survey_number.trim().to_string();
    if survey_number.is_empty() {
        return Err(DomainError::Validation("survey_number is required".into()));
    }
    if survey_number.chars().count() > MAX_SURVEY_NUMBER_LENGTH {
        return Err(DomainError::Validation(format!(
            "survey_number exceeds max length of {MAX_SURVEY_NUMBER_LENGTH}"
        )));
    }

    let mut documents = BTreeMap::new();
    for (kind, upload) in input.documents {
        if let Some(upload) = normalize_upload(upload)? {
            documents.insert(kind, upload);
        }
    }
    if documents.is_empty() {
        return Err(DomainError::Validation(
            "at least one document reference is required".into(),
        ));
    }

    let audio = match input.audio {
        Some(upload) => normalize_upload(upload)?,
        None => None,
    };

    let mut extra_documents = Vec::with_capacity(input.extra_documents.len());
    for upload in input.extra_documents {
        if let Some(upload) = normalize_upload(upload)? {
            extra_documents.push(upload);
        }
    }
    if extra_documents.len() > MAX_EXTRA_DOCUMENTS {
        return Err(DomainError::Validation(format!(
            "extra_documents exceeds max of {MAX_EXTRA_DOCUMENTS}"
        )));
    }

    let notes = trimmed(input.notes);
    if notes
        .as_ref()
        .is_some_and(|notes| notes.chars().count() > MAX_NOTES_LENGTH)
    {
        return Err(DomainError::Validation(format!(
            "notes exceeds max length of {MAX_NOTES_LENGTH}"
        )));
    }

    Ok(SketchRequestCreate {
        survey_kind: input.survey_kind,
        region_id,
        sub_region_id,
        sub_district_id,
        settlement_id,
        survey_number,
        documents,
        audio,
        extra_documents,
        notes,
    })
}

fn required_id(value: String, field: &str) -> DomainResult<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(DomainError::Validation(format!("{field} is required")));
    }
    Ok(value)
}

/// `None` for an empty reference; the remaining fields are trimmed.
fn normalize_upload(upload: DocumentUpload) -> DomainResult<Option<DocumentUpload>> {
    let url = upload.url.trim().to_string();
    if url.is_empty() {
        return Ok(None);
    }
    if url.chars().count() > MAX_URL_LENGTH {
        return Err(DomainError::Validation(format!(
            "document url exceeds max length of {MAX_URL_LENGTH}"
        )));
    }
    let file_name = trimmed(upload.file_name);
    if file_name
        .as_ref()
        .is_some_and(|name| name.chars().count() > MAX_FILE_NAME_LENGTH)
    {
        return Err(DomainError::Validation(format!(
            "file_name exceeds max length of {MAX_FILE_NAME_LENGTH}"
        )));
    }
    Ok(Some(DocumentUpload {
        url,
        file_name,
        mime_type: trimmed(upload.mime_type),
        size: upload.size,
    }))
}
