use std::path::PathBuf;

use clap::{Parser, Subcommand};
use linkzibar_core::graph::Entrance;

#[derive(Debug, Parser)]
#[command(name = "linkzibar", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse and compile a schema file.
    Compile { file: PathBuf },
    /// List the entrances through which a subject reaches a target.
    Entrances {
        file: PathBuf,
        /// Target as `type#name`.
        #[arg(long, value_parser = parse_target)]
        target: Entrance,
        /// Source subject as `type` or `type#relation`.
        #[arg(long, value_parser = parse_source)]
        source: Entrance,
    },
    /// Print the relation hops leading from one entity type to another.
    PathChain {
        file: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// List relations through which a permission recurses on its own type.
    SelfCycles {
        file: PathBuf,
        #[arg(long)]
        entity: String,
        #[arg(long)]
        permission: String,
    },
}

fn parse_target(value: &str) -> Result<Entrance, String> {
    match value.split_once('#') {
        Some((entity_type, name)) if !entity_type.is_empty() && !name.is_empty() => {
            Ok(Entrance::new(entity_type, name))
        }
        _ => Err(format!("expected type#name, got '{value}'")),
    }
}

fn parse_source(value: &str) -> Result<Entrance, String> {
    match value.split_once('#') {
        None if !value.is_empty() => Ok(Entrance::new(value, "")),
        Some((entity_type, relation)) if !entity_type.is_empty() && !relation.is_empty() => {
            Ok(Entrance::new(entity_type, relation))
        }
        _ => Err(format!("expected type or type#relation, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_parses_compile_subcommand() {
        let cli = Cli::parse_from(["linkzibar", "compile", "schema.perm"]);
        assert!(matches!(
            cli.command,
            Command::Compile { file } if file == PathBuf::from("schema.perm")
        ));
    }

    #[test]
    fn cli_parses_entrances_with_subject_set_source() {
        let cli = Cli::parse_from([
            "linkzibar",
            "entrances",
            "schema.perm",
            "--target",
            "document#view",
            "--source",
            "group#member",
        ]);
        let Command::Entrances { target, source, .. } = cli.command else {
            panic!("expected entrances command");
        };
        assert_eq!(target, Entrance::new("document", "view"));
        assert_eq!(source, Entrance::new("group", "member"));
    }

    #[test]
    fn cli_source_without_relation_is_plain_type() {
        let cli = Cli::parse_from([
            "linkzibar",
            "entrances",
            "schema.perm",
            "--target",
            "document#view",
            "--source",
            "user",
        ]);
        let Command::Entrances { source, .. } = cli.command else {
            panic!("expected entrances command");
        };
        assert_eq!(source, Entrance::new("user", ""));
    }

    #[test]
    fn cli_rejects_target_without_name() {
        let result = Cli::try_parse_from([
            "linkzibar",
            "entrances",
            "schema.perm",
            "--target",
            "document",
            "--source",
            "user",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_path_chain() {
        let cli = Cli::parse_from([
            "linkzibar",
            "path-chain",
            "schema.perm",
            "--from",
            "document",
            "--to",
            "organization",
        ]);
        assert!(matches!(
            cli.command,
            Command::PathChain { from, to, .. } if from == "document" && to == "organization"
        ));
    }

    #[test]
    fn cli_parses_self_cycles() {
        let cli = Cli::parse_from([
            "linkzibar",
            "self-cycles",
            "schema.perm",
            "--entity",
            "folder",
            "--permission",
            "view",
        ]);
        assert!(matches!(
            cli.command,
            Command::SelfCycles { entity, permission, .. } if entity == "folder" && permission == "view"
        ));
    }

    #[test]
    fn cli_config_flag_works_after_subcommand() {
        let cli = Cli::parse_from([
            "linkzibar",
            "compile",
            "schema.perm",
            "--config",
            "/etc/linkzibar.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/linkzibar.toml")));
    }

    #[test]
    fn cli_requires_a_subcommand() {
        let result = Cli::try_parse_from(["linkzibar"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_version_flag() {
        let result = Cli::try_parse_from(["linkzibar", "--version"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
