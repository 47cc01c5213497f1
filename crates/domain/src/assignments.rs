use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::drafting_centers::{DraftingCenterService, ensure_center_access};
use crate::error::DomainError;
use crate::hierarchy::RecordStatus;
use crate::identity::ActorIdentity;
use crate::notifications::{Notification, NotificationEvent, NotificationRecipient, dispatch};
use crate::pagination::{Page, PageRequest};
use crate::ports::assignments::AssignmentRepository;
use crate::ports::notifications::NotificationSender;
use crate::ports::sketch_requests::SketchRequestRepository;
use crate::sketch_requests::SketchRequestStatus;
use crate::util::{now_ms, same_id, trimmed, uuid_v7_without_dashes};

pub const MAX_ASSIGNMENT_NOTES_LENGTH: usize = 1_000;
const ASSIGNMENT_TRANSITIONS_TOTAL: &str = "sketchdesk_assignment_transitions_total";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
    OnHold,
    Cancelled,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::OnHold => "ON_HOLD",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ASSIGNED" => Some(Self::Assigned),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "ON_HOLD" => Some(Self::OnHold),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Counts against the one-assignment-per-request rule.
    pub fn is_live(&self) -> bool {
        *self != Self::Cancelled
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RespondAction {
    Accept,
    Reject,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub assignment_id: String,
    pub sketch_request_id: String,
    pub drafting_center_id: String,
    pub assigned_to_user_id: Option<String>,
    pub status: AssignmentStatus,
    pub assigned_by_user_id: String,
    pub assigned_at_ms: i64,
    pub due_date_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    pub notes: Option<String>,
    pub updated_at_ms: i64,
}

/// Status written onto the linked sketch request together with an
/// assignment write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestProjection {
    pub sketch_request_id: String,
    pub status: SketchRequestStatus,
    pub updated_at_ms: i64,
}

impl RequestProjection {
    pub fn new(
        sketch_request_id: impl Into<String>,
        status: SketchRequestStatus,
        updated_at_ms: i64,
    ) -> Self {
        Self {
            sketch_request_id: sketch_request_id.into(),
            status,
            updated_at_ms,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AssignmentCreate {
    pub sketch_request_id: String,
    pub drafting_center_id: String,
    pub due_date_ms: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct AssignmentUpdate {
    pub status: Option<AssignmentStatus>,
    pub due_date_ms: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct AssignmentFilter {
    pub status: Option<AssignmentStatus>,
    pub include_cancelled: bool,
    pub page: PageRequest,
}

#[derive(Clone, Debug, Default)]
pub struct AssignmentQuery {
    pub drafting_center_id: Option<String>,
    pub sketch_request_id: Option<String>,
    pub status: Option<AssignmentStatus>,
    pub include_cancelled: bool,
    pub page: PageRequest,
}

impl AssignmentQuery {
    pub fn matches(&self, assignment: &Assignment) -> bool {
        if !self.include_cancelled
            && self.status != Some(AssignmentStatus::Cancelled)
            && !assignment.status.is_live()
        {
            return false;
        }
        if self
            .status
            .is_some_and(|status| status != assignment.status)
        {
            return false;
        }
        if self
            .drafting_center_id
            .as_deref()
            .is_some_and(|center_id| !same_id(center_id, &assignment.drafting_center_id))
        {
            return false;
        }
        if self
            .sketch_request_id
            .as_deref()
            .is_some_and(|request_id| !same_id(request_id, &assignment.sketch_request_id))
        {
            return false;
        }
        true
    }
}

#[derive(Clone)]
pub struct AssignmentService {
    assignments: Arc<dyn AssignmentRepository>,
    requests: Arc<dyn SketchRequestRepository>,
    centers: DraftingCenterService,
    notifier: Arc<dyn NotificationSender>,
}

impl AssignmentService {
    pub fn new(
        assignments: Arc<dyn AssignmentRepository>,
        requests: Arc<dyn SketchRequestRepository>,
        centers: DraftingCenterService,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            assignments,
            requests,
            centers,
            notifier,
        }
    }

    pub async fn create(
        &self,
        actor: &ActorIdentity,
        input: AssignmentCreate,
    ) -> DomainResult<Assignment> {
        actor.require_admin()?;
        let now = now_ms();
        let input = validate_assignment_create(input, now)?;

        let request = self
            .requests
            .get(&input.sketch_request_id)
            .await?
            .ok_or_else(|| DomainError::not_found("sketch request"))?;
        let center = self.centers.get_live(&input.drafting_center_id).await?;
        if center.status != RecordStatus::Active {
            return Err(DomainError::Validation(
                "drafting center is inactive".into(),
            ));
        }
        if let Some(capacity) = center.capacity {
            let open = self
                .assignments
                .count_open_for_center(&center.drafting_center_id)
                .await?;
            if open >= u64::from(capacity) {
                return Err(DomainError::Conflict(format!(
                    "drafting center is at capacity ({open}/{capacity})"
                )));
            }
        }

        // fast path; the repository enforces the same rule on write
        if let Some(existing) = self
            .assignments
            .find_active(&request.sketch_request_id)
            .await?
        {
            return Err(already_assigned(&existing));
        }

        let assignment = Assignment {
            assignment_id: uuid_v7_without_dashes(),
            sketch_request_id: request.sketch_request_id.clone(),
            drafting_center_id: center.drafting_center_id.clone(),
            assigned_to_user_id: None,
            status: AssignmentStatus::Assigned,
            assigned_by_user_id: actor.user_id.clone(),
            assigned_at_ms: now,
            due_date_ms: input.due_date_ms,
            completed_at_ms: None,
            notes: input.notes,
            updated_at_ms: now,
        };
        let projection = RequestProjection::new(
            &request.sketch_request_id,
            SketchRequestStatus::Assigned,
            now,
        );

        let created = match self.assignments.create(&assignment, &projection).await {
            Ok(created) => created,
            Err(DomainError::Conflict(_)) => {
                let existing = self
                    .assignments
                    .find_active(&request.sketch_request_id)
                    .await?;
                return Err(existing.as_ref().map(already_assigned).unwrap_or_else(|| {
                    DomainError::Conflict("sketch request is already assigned".into())
                }));
            }
            Err(err) => return Err(err),
        };

        record_transition(&created, None);
        self.notify(
            NotificationRecipient::DraftingCenter(created.drafting_center_id.clone()),
            NotificationEvent::AssignmentCreated,
            &created,
            format!("sketch request {} assigned", request.application_id),
        )
        .await;
        Ok(created)
    }

    pub async fn respond(
        &self,
        actor: &ActorIdentity,
        assignment_id: &str,
        action: RespondAction,
    ) -> DomainResult<Assignment> {
        let center_id = actor.linked_center()?;
        let mut assignment = self.load(assignment_id).await?;
        if !same_id(&assignment.drafting_center_id, center_id) {
            return Err(DomainError::Forbidden(
                "assignment belongs to another drafting center".into(),
            ));
        }
        self.centers.get_live(&assignment.drafting_center_id).await?;
        if assignment.status != AssignmentStatus::Assigned {
            return Err(DomainError::Validation(format!(
                "cannot respond to an assignment in status {}",
                assignment.status.as_str()
            )));
        }

        let previous = assignment.status;
        let now = now_ms();
        let (projection, event) = match action {
            RespondAction::Accept => {
                assignment.status = AssignmentStatus::InProgress;
                assignment.assigned_to_user_id = Some(actor.user_id.clone());
                (None, NotificationEvent::AssignmentAccepted)
            }
            RespondAction::Reject => {
                assignment.status = AssignmentStatus::Cancelled;
                let projection = RequestProjection::new(
                    &assignment.sketch_request_id,
                    SketchRequestStatus::Pending,
                    now,
                );
                (Some(projection), NotificationEvent::AssignmentRejected)
            }
        };
        assignment.updated_at_ms = now;

        let saved = self
            .assignments
            .transition(&assignment, previous, projection.as_ref())
            .await
            .map_err(concurrent_change)?;
        record_transition(&saved, Some(previous));
        self.notify(
            NotificationRecipient::User(saved.assigned_by_user_id.clone()),
            event,
            &saved,
            format!("assignment {}", saved.status.as_str()),
        )
        .await;
        Ok(saved)
    }

    pub async fn update(
        &self,
        actor: &ActorIdentity,
        assignment_id: &str,
        update: AssignmentUpdate,
    ) -> DomainResult<Assignment> {
        actor.require_admin()?;
        let now = now_ms();
        let mut assignment = self.load(assignment_id).await?;
        let previous = assignment.status;
        let mut projection = None;

        if let Some(status) = update.status.filter(|status| *status != previous) {
            if previous.is_terminal() {
                return Err(DomainError::Validation(format!(
                    "assignment is {} and can no longer change status",
                    previous.as_str()
                )));
            }
            assignment.status = status;
            match status {
                AssignmentStatus::Completed => assignment.completed_at_ms = Some(now),
                AssignmentStatus::Cancelled => {
                    projection = Some(RequestProjection::new(
                        &assignment.sketch_request_id,
                        SketchRequestStatus::Pending,
                        now,
                    ));
                }
                _ => {}
            }
        }
        if let Some(due_date_ms) = update.due_date_ms {
            assignment.due_date_ms = Some(validate_due_date(due_date_ms, now)?);
        }
        if let Some(notes) = update.notes {
            assignment.notes = validate_notes(Some(notes))?;
        }
        assignment.updated_at_ms = now;

        let saved = self
            .assignments
            .transition(&assignment, previous, projection.as_ref())
            .await
            .map_err(concurrent_change)?;
        if saved.status != previous {
            record_transition(&saved, Some(previous));
        }
        self.notify(
            NotificationRecipient::DraftingCenter(saved.drafting_center_id.clone()),
            NotificationEvent::AssignmentUpdated,
            &saved,
            format!("assignment {}", saved.status.as_str()),
        )
        .await;
        Ok(saved)
    }

    pub async fn get(&self, actor: &ActorIdentity, assignment_id: &str) -> DomainResult<Assignment> {
        let assignment = self.load(assignment_id).await?;
        ensure_center_access(actor, &assignment.drafting_center_id)?;
        Ok(assignment)
    }

    /// Cancelled assignments are left out unless asked for.
    pub async fn list_by_center(
        &self,
        actor: &ActorIdentity,
        center_id: &str,
        filter: AssignmentFilter,
    ) -> DomainResult<Page<Assignment>> {
        ensure_center_access(actor, center_id)?;
        self.assignments
            .list(&AssignmentQuery {
                drafting_center_id: Some(center_id.trim().to_string()),
                sketch_request_id: None,
                status: filter.status,
                include_cancelled: filter.include_cancelled,
                page: filter.page,
            })
            .await
    }

    pub async fn list_all(
        &self,
        actor: &ActorIdentity,
        filter: AssignmentFilter,
    ) -> DomainResult<Page<Assignment>> {
        actor.require_admin()?;
        self.assignments
            .list(&AssignmentQuery {
                drafting_center_id: None,
                sketch_request_id: None,
                status: filter.status,
                include_cancelled: true,
                page: filter.page,
            })
            .await
    }

    async fn load(&self, assignment_id: &str) -> DomainResult<Assignment> {
        self.assignments
            .get(assignment_id.trim())
            .await?
            .ok_or_else(|| DomainError::not_found("assignment"))
    }

    async fn notify(
        &self,
        recipient: NotificationRecipient,
        event: NotificationEvent,
        assignment: &Assignment,
        message: String,
    ) {
        let notification = Notification {
            recipient,
            event,
            assignment_id: assignment.assignment_id.clone(),
            sketch_request_id: assignment.sketch_request_id.clone(),
            message,
            created_at_ms: now_ms(),
        };
        dispatch(self.notifier.as_ref(), notification).await;
    }
}

fn record_transition(assignment: &Assignment, from: Option<AssignmentStatus>) {
    let from = from.map(|status| status.as_str()).unwrap_or("NONE");
    let to = assignment.status.as_str();
    tracing::info!(
        assignment_id = %assignment.assignment_id,
        sketch_request_id = %assignment.sketch_request_id,
        drafting_center_id = %assignment.drafting_center_id,
        from,
        to,
        "assignment transition"
    );
    counter!(ASSIGNMENT_TRANSITIONS_TOTAL, "from" => from, "to" => to).increment(1);
}

fn already_assigned(existing: &Assignment) -> DomainError {
    DomainError::Conflict(format!(
        "sketch request is already assigned (assignment {})",
        existing.assignment_id
    ))
}

fn concurrent_change(err: DomainError) -> DomainError {
    match err {
        DomainError::Conflict(_) => DomainError::Conflict(
            "assignment changed concurrently; reload and retry".into(),
        ),
        err => err,
    }
}

fn validate_assignment_create(input: AssignmentCreate, now: i64) -> DomainResult<AssignmentCreate> {
    let sketch_request_id = input.sketch_request_id.trim().to_string();
    if sketch_request_id.is_empty() {
        return Err(DomainError::Validation(
            "sketch_request_id is required".into(),
        ));
    }
    let drafting_center_id = input.drafting_center_id.trim().to_string();
    if drafting_center_id.is_empty() {
        return Err(DomainError::Validation(
            "drafting_center_id is required".into(),
        ));
    }
    let due_date_ms = input
        .due_date_ms
        .map(|due_date_ms| validate_due_date(due_date_ms, now))
        .transpose()?;
    Ok(AssignmentCreate {
        sketch_request_id,
        drafting_center_id,
        due_date_ms,
        notes: validate_notes(input.notes)?,
    })
}

fn validate_due_date(due_date_ms: i64, now: i64) -> DomainResult<i64> {
    if due_date_ms <= now {
        return Err(DomainError::Validation(
            "due_date must be in the future".into(),
        ));
    }
    Ok(due_date_ms)
}

fn validate_notes(notes: Option<String>) -> DomainResult<Option<String>> {
    let notes = trimmed(notes);
    if notes
        .as_ref()
        .is_some_and(|notes| notes.chars().count() > MAX_ASSIGNMENT_NOTES_LENGTH)
    {
        return Err(DomainError::Validation(format!(
            "notes exceeds max length of {MAX_ASSIGNMENT_NOTES_LENGTH}"
        )));
    }
    Ok(notes)
}
