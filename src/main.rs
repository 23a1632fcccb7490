use std::process::ExitCode;

use clap::Parser;
use scim_directory::{
    config::DirectoryConfig,
    observability,
    scim::{EntityType, ScimError, types::SearchParams},
};

/// CLI arguments for scim-directory
#[derive(Parser, Debug)]
#[command(version, about = "SCIM filter to LDAP search translation", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Translate a SCIM filter into an LDAP filter
    Translate {
        /// SCIM filter expression
        filter: String,
        /// Entity type whose attribute mappings apply
        #[arg(short, long, default_value = "user")]
        entity: EntityType,
        /// Print the parsed filter in canonical SCIM form instead
        #[arg(long)]
        canonical: bool,
    },
    /// Print the normalized search request as JSON
    Request {
        /// Entity type to search
        #[arg(short, long, default_value = "user")]
        entity: EntityType,
        /// SCIM filter expression (match-all when omitted)
        #[arg(short, long)]
        filter: Option<String>,
        /// 1-based index of the first result
        #[arg(long, allow_negative_numbers = true)]
        start_index: Option<i64>,
        /// Page size
        #[arg(long, allow_negative_numbers = true)]
        count: Option<i64>,
        /// Logical attribute to sort by
        #[arg(long)]
        sort_by: Option<String>,
        /// "ascending" or "descending"
        #[arg(long)]
        sort_order: Option<String>,
        /// Comma-separated directory attributes to return
        #[arg(long)]
        attributes: Option<String>,
        /// Owning person inum, for FIDO device searches
        #[arg(long)]
        owner: Option<String>,
    },
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match DirectoryConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => DirectoryConfig::default(),
    };

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Warning: {e}");
    }

    match args.command {
        Command::Translate {
            filter,
            entity,
            canonical,
        } => run_translate(&config, &filter, entity, canonical),
        Command::Request {
            entity,
            filter,
            start_index,
            count,
            sort_by,
            sort_order,
            attributes,
            owner,
        } => {
            let params = SearchParams {
                filter,
                start_index,
                count,
                sort_by,
                sort_order,
                attributes,
            };
            run_request(&config, entity, &params, owner.as_deref())
        }
        Command::Schema { output } => run_schema_export(output),
    }
}

fn run_translate(
    config: &DirectoryConfig,
    filter: &str,
    entity: EntityType,
    canonical: bool,
) -> ExitCode {
    let filters = config.filter_service();

    let result = if canonical {
        filters
            .parse(filter)
            .map(|parsed| parsed.to_string())
            .map_err(ScimError::from)
    } else {
        filters
            .translate(Some(filter), entity)
            .map(|translated| translated.into_string())
    };

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}

fn run_request(
    config: &DirectoryConfig,
    entity: EntityType,
    params: &SearchParams,
    owner: Option<&str>,
) -> ExitCode {
    let base_dn = config.layout().base_dn_for(entity, owner);
    let request = match config.search_builder().build_from_params(&base_dn, entity, params) {
        Ok(request) => request,
        Err(e) => return report(&e),
    };

    match serde_json::to_string_pretty(&request) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: failed to serialize search request: {e}");
            ExitCode::FAILURE
        }
    }
}

fn report(err: &ScimError) -> ExitCode {
    eprintln!("Error: {err}");
    ExitCode::from(exit_status(err))
}

/// Client errors exit with 2, everything else with 1.
fn exit_status(err: &ScimError) -> u8 {
    if err.is_client_error() { 2 } else { 1 }
}

/// Export config JSON schema to file or stdout
#[cfg(feature = "json-schema")]
fn run_schema_export(output: Option<String>) -> ExitCode {
    let content = match DirectoryConfig::json_schema_string() {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: failed to serialize config schema: {e}");
            return ExitCode::FAILURE;
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &content) {
                eprintln!("Failed to write to {}: {}", path, e);
                return ExitCode::FAILURE;
            }
            eprintln!("Config JSON schema written to {}", path);
        }
        None => {
            println!("{}", content);
        }
    }
    ExitCode::SUCCESS
}

#[cfg(not(feature = "json-schema"))]
fn run_schema_export(output: Option<String>) -> ExitCode {
    let _ = output;
    eprintln!("Error: JSON schema export requires the 'json-schema' feature");
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_translate() {
        let args = Args::try_parse_from([
            "scim-directory",
            "translate",
            "title pr",
            "--entity",
            "fido-device",
        ])
        .unwrap();
        match args.command {
            Command::Translate {
                filter,
                entity,
                canonical,
            } => {
                assert_eq!(filter, "title pr");
                assert_eq!(entity, EntityType::FidoDevice);
                assert!(!canonical);
            }
            other => panic!("Expected translate, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_request_with_negative_numbers() {
        let args = Args::try_parse_from([
            "scim-directory",
            "--config",
            "scim.toml",
            "request",
            "--start-index",
            "-5",
            "--count",
            "0",
        ])
        .unwrap();
        assert_eq!(args.config.as_deref(), Some("scim.toml"));
        match args.command {
            Command::Request {
                start_index,
                count,
                entity,
                ..
            } => {
                assert_eq!(start_index, Some(-5));
                assert_eq!(count, Some(0));
                assert_eq!(entity, EntityType::User);
            }
            other => panic!("Expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let result = Args::try_parse_from(["scim-directory", "translate", "x pr", "-e", "device"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_exit_status() {
        let filters = DirectoryConfig::default().filter_service();
        let syntax = filters
            .translate(Some("userName eq"), EntityType::User)
            .unwrap_err();
        assert_eq!(exit_status(&syntax), 2);

        let unregistered = ScimError::UnregisteredEntity(EntityType::Group);
        assert_eq!(exit_status(&unregistered), 1);
    }
}
