use std::sync::Arc;

use sketchdesk_domain::assignments::AssignmentService;
use sketchdesk_domain::drafting_centers::DraftingCenterService;
use sketchdesk_domain::hierarchy::{HierarchyRepositories, HierarchyService};
use sketchdesk_domain::ports::assignments::AssignmentRepository;
use sketchdesk_domain::ports::drafting_centers::DraftingCenterRepository;
use sketchdesk_domain::ports::health::HealthProbe;
use sketchdesk_domain::ports::sequence::ApplicationSequence;
use sketchdesk_domain::ports::sketch_requests::SketchRequestRepository;
use sketchdesk_domain::sequencer::ApplicationIdSequencer;
use sketchdesk_domain::sketch_requests::SketchRequestService;
use sketchdesk_infra::auth::JwtIdentityDecoder;
use sketchdesk_infra::config::AppConfig;
use sketchdesk_infra::db::{self, DbConfig, SurrealAdapter};
use sketchdesk_infra::notifications::TracingNotificationSender;
use sketchdesk_infra::repositories::{
    InMemoryApplicationSequence, InMemoryAssignmentRepository, InMemoryDraftingCenterRepository,
    InMemorySketchRequestRepository, RedisApplicationSequence, SurrealApplicationSequence,
    SurrealAssignmentRepository, SurrealDraftingCenterRepository, SurrealSketchRequestRepository,
    memory_hierarchy_repositories, surreal_hierarchy_repositories,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub hierarchy: HierarchyService,
    pub centers: DraftingCenterService,
    pub sketch_requests: SketchRequestService,
    pub assignments: AssignmentService,
    pub identity: JwtIdentityDecoder,
    pub probes: Vec<Arc<dyn HealthProbe>>,
}

struct Stores {
    hierarchy: HierarchyRepositories,
    centers: Arc<dyn DraftingCenterRepository>,
    requests: Arc<dyn SketchRequestRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    sequence: Arc<dyn ApplicationSequence>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let mut probes: Vec<Arc<dyn HealthProbe>> = Vec::new();
        let mut stores = if config.uses_surreal() {
            let db_config = DbConfig::from_app_config(&config);
            let client = db::connect(&db_config).await?;
            probes.push(Arc::new(SurrealAdapter::new(db_config)));
            Stores {
                hierarchy: surreal_hierarchy_repositories(client.clone()),
                centers: Arc::new(SurrealDraftingCenterRepository::with_client(client.clone())),
                requests: Arc::new(SurrealSketchRequestRepository::with_client(client.clone())),
                assignments: Arc::new(SurrealAssignmentRepository::with_client(client.clone())),
                sequence: Arc::new(SurrealApplicationSequence::with_client(client)),
            }
        } else {
            memory_stores()
        };

        if config.uses_redis_sequence() {
            let sequence = Arc::new(RedisApplicationSequence::connect(&config.redis_url).await?);
            probes.push(sequence.clone());
            stores.sequence = sequence;
        }

        tracing::info!(
            data_backend = %config.data_backend,
            sequence_backend = %config.sequence_backend,
            probes = probes.len(),
            "application state wired"
        );
        Ok(Self::from_stores(config, stores, probes))
    }

    /// Fully in-memory wiring, regardless of the configured backends.
    #[cfg(test)]
    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_stores(config, memory_stores(), Vec::new())
    }

    fn from_stores(config: AppConfig, stores: Stores, probes: Vec<Arc<dyn HealthProbe>>) -> Self {
        let hierarchy = HierarchyService::new(stores.hierarchy);
        let centers = DraftingCenterService::new(stores.centers);
        let sequencer = ApplicationIdSequencer::new(stores.sequence, stores.requests.clone());
        let sketch_requests = SketchRequestService::new(
            stores.requests.clone(),
            stores.assignments.clone(),
            hierarchy.clone(),
            sequencer,
        )
        .with_max_attempts(config.application_id_max_attempts);
        let assignments = AssignmentService::new(
            stores.assignments,
            stores.requests,
            centers.clone(),
            Arc::new(TracingNotificationSender),
        );
        let identity = JwtIdentityDecoder::new(&config.jwt_secret);
        Self {
            config,
            hierarchy,
            centers,
            sketch_requests,
            assignments,
            identity,
            probes,
        }
    }
}

fn memory_stores() -> Stores {
    let requests = InMemorySketchRequestRepository::new();
    let assignments = InMemoryAssignmentRepository::new(&requests);
    Stores {
        hierarchy: memory_hierarchy_repositories(),
        centers: Arc::new(InMemoryDraftingCenterRepository::new()),
        requests: Arc::new(requests),
        assignments: Arc::new(assignments),
        sequence: Arc::new(InMemoryApplicationSequence::new()),
    }
}
