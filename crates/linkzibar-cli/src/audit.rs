use linkzibar_storage::{SchemaVersion, TenantId};

pub fn audit_schema_write(tenant_id: &TenantId, version: &SchemaVersion, definition_count: usize) {
    tracing::info!(
        target: "audit",
        event = "schema_write",
        tenant_id = %tenant_id,
        version = %version,
        definition_count = definition_count,
        "schema written"
    );
}

pub fn audit_schema_rejected(tenant_id: &TenantId, reason: &str) {
    tracing::warn!(
        target: "audit",
        event = "schema_rejected",
        tenant_id = %tenant_id,
        reason = reason,
        "schema rejected"
    );
}
