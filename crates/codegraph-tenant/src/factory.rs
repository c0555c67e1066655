use std::sync::Arc;

use codegraph_core::GraphConfig;
use codegraph_graph::SurrealGraphStore;
use dashmap::DashMap;
use parking_lot::Mutex;
use secrecy::ExposeSecret;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::TenantClient;
use crate::error::TenantError;
use crate::naming::generate_graph_name;

/// Tenant-isolated graph client factory (spec §4.2, C2). Each organization
/// gets a dedicated SurrealDB namespace/database pair; the factory caches
/// clients per org to avoid reconnecting on every call.
pub struct GraphClientFactory {
    config: GraphConfig,
    clients: DashMap<Uuid, TenantClient>,
    /// Reverse mapping used for collision detection (spec §4.2 "Caching").
    graph_name_to_org: DashMap<String, Uuid>,
    /// Serializes first-time client creation; the `clients` fast path above
    /// is lock-free, this lock is only taken on a cache miss
    /// (double-checked locking, spec §4.2 "The cache MUST be protected
    /// against concurrent first-time creation").
    creation_lock: Mutex<()>,
}

impl GraphClientFactory {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
            graph_name_to_org: DashMap::new(),
            creation_lock: Mutex::new(()),
        }
    }

    async fn connect(&self, graph_name: &str) -> anyhow::Result<Surreal<Any>> {
        let endpoint = if self.config.ssl {
            format!("wss://{}:{}", self.config.host, self.config.port)
        } else {
            format!("ws://{}:{}", self.config.host, self.config.port)
        };
        let db = Surreal::new::<Any>(endpoint.as_str()).await?;
        if let Some(password) = &self.config.password {
            db.signin(Root {
                username: "root",
                password: password.expose_secret(),
            })
            .await?;
        }
        db.use_ns(&self.config.namespace_root).use_db(graph_name).await?;
        Ok(db)
    }

    /// Returns the cached client for `org_id` if present; otherwise connects,
    /// records the `graphName -> orgId` mapping, and emits the audit log
    /// line (spec §4.2 "Caching").
    pub async fn get_client(
        &self,
        org_id: Uuid,
        org_slug: Option<&str>,
    ) -> anyhow::Result<TenantClient> {
        if let Some(client) = self.clients.get(&org_id) {
            return Ok(client.clone());
        }

        let _guard = self.creation_lock.lock();
        if let Some(client) = self.clients.get(&org_id) {
            return Ok(client.clone());
        }

        let graph_name = generate_graph_name(org_id, org_slug);

        if let Some(existing) = self.graph_name_to_org.get(&graph_name) {
            if *existing != org_id {
                warn!(
                    action = "graph_name_collision",
                    graph_name = %graph_name,
                    existing_org_id = %existing,
                    org_id = %org_id,
                    security_event = true,
                    "graph name collision detected"
                );
                return Err(TenantError::NameCollision {
                    graph_name,
                    existing_org_id: *existing,
                    org_id,
                }
                .into());
            }
        }

        let db = self.connect(&graph_name).await?;
        let store = SurrealGraphStore::new(Arc::new(db));
        let client = TenantClient::new(org_id, graph_name.clone(), store);

        self.clients.insert(org_id, client.clone());
        self.graph_name_to_org.insert(graph_name.clone(), org_id);

        info!(
            action = "client_created",
            tenant_id = %org_id,
            graph_name = %graph_name,
            "tenant graph access"
        );

        Ok(client)
    }

    /// Compares the client's embedded `orgId` with the expected one;
    /// mismatch is logged as a security event (spec §4.2 "Validation").
    pub fn validate_tenant_context(
        &self,
        client: &TenantClient,
        expected_org_id: Uuid,
    ) -> Result<(), TenantError> {
        if client.org_id != expected_org_id {
            warn!(
                action = "context_mismatch",
                expected_org_id = %expected_org_id,
                client_org_id = %client.org_id,
                security_event = true,
                "tenant context mismatch detected"
            );
            return Err(TenantError::ContextMismatch {
                expected: expected_org_id,
                actual: client.org_id,
            });
        }
        Ok(())
    }

    /// Metadata no-op on SurrealDB (namespace/database are created
    /// automatically by `use_ns`/`use_db`), followed by schema index
    /// creation — this is what `provisionTenant` does on a backend that
    /// auto-creates graphs (spec §4.2 "Provisioning semantics").
    pub async fn provision_tenant(
        &self,
        org_id: Uuid,
        org_slug: Option<&str>,
    ) -> anyhow::Result<String> {
        let graph_name = generate_graph_name(org_id, org_slug);
        let db = self.connect(&graph_name).await?;
        let store = SurrealGraphStore::new(Arc::new(db));
        codegraph_core::GraphStoreAdapter::create_indexes(&store).await?;
        info!(tenant_id = %org_id, graph_name = %graph_name, "tenant provisioned");
        Ok(graph_name)
    }

    /// Closes any cached client, then drops the underlying database.
    /// Idempotent (spec §4.2 "deprovisionTenant ... it is idempotent").
    pub async fn deprovision_tenant(
        &self,
        org_id: Uuid,
        org_slug: Option<&str>,
    ) -> anyhow::Result<()> {
        let graph_name = generate_graph_name(org_id, org_slug);
        self.close_client(org_id);

        let db = self.connect(&graph_name).await?;
        if let Err(err) = db
            .query(format!("REMOVE DATABASE IF EXISTS `{graph_name}`"))
            .await
        {
            warn!(graph_name = %graph_name, error = %err, "could not remove tenant database");
        } else {
            info!(graph_name = %graph_name, "tenant database removed");
        }
        Ok(())
    }

    pub fn close_client(&self, org_id: Uuid) {
        let _guard = self.creation_lock.lock();
        if let Some((_, client)) = self.clients.remove(&org_id) {
            self.graph_name_to_org.remove(&client.graph_name);
        }
    }

    pub fn close_all(&self) {
        let _guard = self.creation_lock.lock();
        self.clients.clear();
        self.graph_name_to_org.clear();
        info!("closed all tenant clients");
    }

    pub fn cached_org_ids(&self) -> Vec<Uuid> {
        self.clients.iter().map(|e| *e.key()).collect()
    }

    pub fn cached_count(&self) -> usize {
        self.clients.len()
    }
}
