use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sketchdesk_domain::ports::BoxFuture;
use sketchdesk_domain::ports::health::{HealthProbe, ProbeError};
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::config::AppConfig;

pub mod schema;

const SURREAL_BACKEND: &str = "surrealdb";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DbConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.surreal_endpoint.clone(),
            namespace: config.surreal_ns.clone(),
            database: config.surreal_db.clone(),
            username: config.surreal_user.clone(),
            password: config.surreal_pass.clone(),
        }
    }
}

/// Opens a root session on the configured namespace and database and
/// applies the schema.
pub async fn connect(config: &DbConfig) -> anyhow::Result<Arc<Surreal<Client>>> {
    let db = Surreal::<Client>::init();
    db.connect::<Ws>(&config.endpoint)
        .await
        .with_context(|| format!("connect surrealdb endpoint {}", config.endpoint))?;
    db.signin(Root {
        username: config.username.clone(),
        password: config.password.clone(),
    })
    .await
    .context("surreal root signin")?;
    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .context("select surreal namespace")?;
    schema::apply(&db).await?;
    tracing::info!(
        endpoint = %config.endpoint,
        namespace = %config.namespace,
        database = %config.database,
        "surrealdb connected"
    );
    Ok(Arc::new(db))
}

#[derive(Debug, Clone)]
pub struct SurrealAdapter {
    config: DbConfig,
}

impl SurrealAdapter {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }
}

impl HealthProbe for SurrealAdapter {
    fn name(&self) -> &'static str {
        SURREAL_BACKEND
    }

    fn probe(&self) -> BoxFuture<'_, Result<(), ProbeError>> {
        let endpoint = self.config.endpoint.clone();
        Box::pin(async move {
            let address = parse_socket_address(&endpoint)?;
            let connect = timeout(Duration::from_secs(2), TcpStream::connect(address))
                .await
                .map_err(|_| ProbeError::new(SURREAL_BACKEND, "endpoint connect timed out"))?;
            connect.map_err(|err| {
                ProbeError::new(SURREAL_BACKEND, format!("endpoint connect failed: {err}"))
            })?;
            tracing::debug!(endpoint, "surreal health check succeeded");
            Ok(())
        })
    }
}

fn parse_socket_address(endpoint: &str) -> Result<String, ProbeError> {
    let normalized = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("ws://{endpoint}")
    };
    let parsed = Url::parse(&normalized).map_err(|err| {
        ProbeError::new(
            SURREAL_BACKEND,
            format!("invalid endpoint '{endpoint}': {err}"),
        )
    })?;
    let host = parsed.host_str().ok_or_else(|| {
        ProbeError::new(SURREAL_BACKEND, format!("missing host in endpoint '{endpoint}'"))
    })?;
    let port = parsed.port_or_known_default().unwrap_or(match parsed.scheme() {
        "wss" | "https" => 443,
        _ => 8000,
    });
    Ok(format!("{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_address_defaults() {
        assert_eq!(
            parse_socket_address("ws://db.internal:8000").unwrap(),
            "db.internal:8000"
        );
        assert_eq!(parse_socket_address("127.0.0.1:9000").unwrap(), "127.0.0.1:9000");
        assert_eq!(parse_socket_address("wss://db.example").unwrap(), "db.example:443");
    }
}
