pub mod memory;
pub mod tenant;
pub mod traits;

pub use memory::InMemorySchemaStore;
pub use tenant::{SchemaVersion, TenantId};
pub use traits::{SchemaDefinitionRecord, SchemaReader, SchemaWriter, StorageError};
