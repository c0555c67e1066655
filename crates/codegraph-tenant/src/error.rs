use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TenantError {
    /// Graph-name generation is proven injective (spec §4.2 property P7) for
    /// distinct `(orgId, slug)` pairs; a collision here is a bug, not a
    /// recoverable runtime condition.
    #[error(
        "graph name collision: '{graph_name}' already belongs to org {existing_org_id}, \
         cannot assign to org {org_id}"
    )]
    NameCollision {
        graph_name: String,
        existing_org_id: Uuid,
        org_id: Uuid,
    },

    #[error("tenant context mismatch: client belongs to org {actual}, expected {expected}")]
    ContextMismatch { expected: Uuid, actual: Uuid },

    #[error("backend error provisioning tenant {org_id}: {source}")]
    Backend {
        org_id: Uuid,
        #[source]
        source: anyhow::Error,
    },
}
