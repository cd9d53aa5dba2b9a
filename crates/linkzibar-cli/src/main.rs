use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use linkzibar_cli::cli::{Cli, Command};
use linkzibar_cli::config::{AppConfig, LogFormat};
use linkzibar_cli::error::ServiceError;
use linkzibar_cli::service::{LoadedSchema, SchemaService, SchemaServiceConfig};
use linkzibar_core::graph::LinkedSchemaGraph;
use linkzibar_storage::{InMemorySchemaStore, TenantId};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type Service = SchemaService<InMemorySchemaStore>;

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr);
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr);
            registry.with(fmt_layer).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config);

    let service = SchemaService::new(
        Arc::new(InMemorySchemaStore::new()),
        SchemaServiceConfig {
            validate_references: config.schema.validate_references,
            limits: config.to_schema_limits(),
        },
    );
    let tenant_id = TenantId::new(uuid::Uuid::new_v4());

    match cli.command {
        Command::Compile { file } => {
            let loaded = load(&service, &tenant_id, &file).await?;
            println!(
                "compiled {} entities and {} rules (version {})",
                loaded.definition.entity_definitions.len(),
                loaded.definition.rule_definitions.len(),
                loaded.version
            );
        }
        Command::Entrances {
            file,
            target,
            source,
        } => {
            load(&service, &tenant_id, &file).await?;
            let entrances = service
                .linked_entrances(&tenant_id, &target, &source)
                .await?;
            for entrance in &entrances {
                println!("{entrance}");
            }
        }
        Command::PathChain { file, from, to } => {
            let loaded = load(&service, &tenant_id, &file).await?;
            let graph = LinkedSchemaGraph::new(&loaded.definition);
            let chain = graph
                .build_relation_path_chain(&from, &to)
                .map_err(ServiceError::from)?;
            for hop in &chain {
                println!("{}.{}", hop.entity_type, hop.relation);
            }
        }
        Command::SelfCycles {
            file,
            entity,
            permission,
        } => {
            let loaded = load(&service, &tenant_id, &file).await?;
            let graph = LinkedSchemaGraph::new(&loaded.definition);
            for relation in graph.self_cycle_relations_for_permission(&entity, &permission) {
                println!("{relation}");
            }
        }
    }

    Ok(())
}

async fn load(
    service: &Service,
    tenant_id: &TenantId,
    path: &Path,
) -> Result<LoadedSchema, ServiceError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ServiceError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;

    let version = service.write_schema(tenant_id, &text).await?;
    tracing::info!(path = %path.display(), version = %version, "schema loaded");

    service.read_schema(tenant_id, Some(&version)).await
}
