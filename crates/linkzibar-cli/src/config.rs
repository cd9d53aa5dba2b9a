use serde::Deserialize;
use std::path::Path;

use linkzibar_core::schema::SchemaLimits;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub schema: SchemaConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub validate_references: bool,
    pub max_entities: usize,
    pub max_relations_per_entity: usize,
    pub max_permissions_per_entity: usize,
    pub max_attributes_per_entity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        let limits = SchemaLimits::default();
        Self {
            validate_references: true,
            max_entities: limits.max_entities,
            max_relations_per_entity: limits.max_relations_per_entity,
            max_permissions_per_entity: limits.max_permissions_per_entity,
            max_attributes_per_entity: limits.max_attributes_per_entity,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LINKZIBAR_SCHEMA_VALIDATE_REFERENCES")
            && let Ok(flag) = v.parse()
        {
            self.schema.validate_references = flag;
        }
        if let Ok(v) = std::env::var("LINKZIBAR_SCHEMA_MAX_ENTITIES")
            && let Ok(n) = v.parse()
        {
            self.schema.max_entities = n;
        }
        if let Ok(v) = std::env::var("LINKZIBAR_SCHEMA_MAX_RELATIONS_PER_ENTITY")
            && let Ok(n) = v.parse()
        {
            self.schema.max_relations_per_entity = n;
        }
        if let Ok(v) = std::env::var("LINKZIBAR_SCHEMA_MAX_PERMISSIONS_PER_ENTITY")
            && let Ok(n) = v.parse()
        {
            self.schema.max_permissions_per_entity = n;
        }
        if let Ok(v) = std::env::var("LINKZIBAR_SCHEMA_MAX_ATTRIBUTES_PER_ENTITY")
            && let Ok(n) = v.parse()
        {
            self.schema.max_attributes_per_entity = n;
        }
        if let Ok(v) = std::env::var("LINKZIBAR_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = std::env::var("LINKZIBAR_LOG_FORMAT") {
            match v.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("schema.max_entities", self.schema.max_entities),
            (
                "schema.max_relations_per_entity",
                self.schema.max_relations_per_entity,
            ),
            (
                "schema.max_permissions_per_entity",
                self.schema.max_permissions_per_entity,
            ),
            (
                "schema.max_attributes_per_entity",
                self.schema.max_attributes_per_entity,
            ),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Validation(format!("{name} must be non-zero")));
        }
        Ok(())
    }

    pub fn to_schema_limits(&self) -> SchemaLimits {
        SchemaLimits {
            max_entities: self.schema.max_entities,
            max_relations_per_entity: self.schema.max_relations_per_entity,
            max_permissions_per_entity: self.schema.max_permissions_per_entity,
            max_attributes_per_entity: self.schema.max_attributes_per_entity,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}
