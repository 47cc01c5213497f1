use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;

/// Tables are schemaless; the unique indexes carry the invariants that
/// must hold under concurrent writers.
const SCHEMA: &str = "
DEFINE TABLE IF NOT EXISTS region SCHEMALESS;
DEFINE INDEX IF NOT EXISTS region_id_unique ON region FIELDS region_id UNIQUE;
DEFINE INDEX IF NOT EXISTS region_code_unique ON region FIELDS code UNIQUE;

DEFINE TABLE IF NOT EXISTS sub_region SCHEMALESS;
DEFINE INDEX IF NOT EXISTS sub_region_id_unique ON sub_region FIELDS sub_region_id UNIQUE;
DEFINE INDEX IF NOT EXISTS sub_region_code_unique ON sub_region FIELDS region_id, code UNIQUE;

DEFINE TABLE IF NOT EXISTS sub_district SCHEMALESS;
DEFINE INDEX IF NOT EXISTS sub_district_id_unique ON sub_district FIELDS sub_district_id UNIQUE;
DEFINE INDEX IF NOT EXISTS sub_district_code_unique ON sub_district FIELDS sub_region_id, code UNIQUE;

DEFINE TABLE IF NOT EXISTS settlement SCHEMALESS;
DEFINE INDEX IF NOT EXISTS settlement_id_unique ON settlement FIELDS settlement_id UNIQUE;
DEFINE INDEX IF NOT EXISTS settlement_code_unique ON settlement FIELDS sub_district_id, code UNIQUE;

DEFINE TABLE IF NOT EXISTS drafting_center SCHEMALESS;
DEFINE INDEX IF NOT EXISTS drafting_center_id_unique ON drafting_center FIELDS drafting_center_id UNIQUE;
DEFINE INDEX IF NOT EXISTS drafting_center_code_unique ON drafting_center FIELDS code_key UNIQUE;

DEFINE TABLE IF NOT EXISTS sketch_request SCHEMALESS;
DEFINE INDEX IF NOT EXISTS sketch_request_id_unique ON sketch_request FIELDS sketch_request_id UNIQUE;
DEFINE INDEX IF NOT EXISTS sketch_request_application_unique ON sketch_request FIELDS application_id UNIQUE;
DEFINE INDEX IF NOT EXISTS sketch_request_submitter ON sketch_request FIELDS submitter_id;

DEFINE TABLE IF NOT EXISTS assignment SCHEMALESS;
DEFINE INDEX IF NOT EXISTS assignment_id_unique ON assignment FIELDS assignment_id UNIQUE;
DEFINE INDEX IF NOT EXISTS assignment_active_unique ON assignment FIELDS active_key UNIQUE;
DEFINE INDEX IF NOT EXISTS assignment_center ON assignment FIELDS drafting_center_id;

DEFINE TABLE IF NOT EXISTS application_sequence SCHEMALESS;
";

pub async fn apply(db: &Surreal<Client>) -> anyhow::Result<()> {
    db.query(SCHEMA).await?.check()?;
    tracing::debug!("surreal schema applied");
    Ok(())
}
