use std::sync::Arc;

use codegraph_graph::SurrealGraphStore;
use uuid::Uuid;

/// A `GraphStoreAdapter` bound to one organization's graph, carrying the
/// `orgId` the factory stamped it with so `validate_tenant_context` can
/// catch cross-tenant misuse (spec §4.2 "Validation").
#[derive(Clone)]
pub struct TenantClient {
    pub org_id: Uuid,
    pub graph_name: String,
    pub store: Arc<SurrealGraphStore>,
}

impl TenantClient {
    pub fn new(org_id: Uuid, graph_name: String, store: SurrealGraphStore) -> Self {
        Self {
            org_id,
            graph_name,
            store: Arc::new(store),
        }
    }
}
