use crate::cli::ValidateArgs;
use crate::commands::resolve_config;
use crate::exit_codes;
use crate::output;
use ddalab_ingest::config::read_stream_configs;
use ddalab_ingest::streaming::{SocketTransport, SourceKind};
use ddalab_ingest::StreamConfig;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Serialize)]
struct StreamVerdict {
    name: String,
    source_kind: SourceKind,
    endpoint: String,
    transport: Option<&'static str>,
    valid: bool,
    error: Option<String>,
}

fn transport_name(config: &StreamConfig) -> Option<&'static str> {
    match config.source_kind {
        SourceKind::Polling => Some("http"),
        SourceKind::Socket => match config.socket_transport().ok()? {
            SocketTransport::WebSocket => Some("websocket"),
            SocketTransport::Tcp => Some("tcp"),
        },
    }
}

fn verdicts(configs: &[StreamConfig]) -> Vec<StreamVerdict> {
    let mut seen = HashSet::new();

    configs
        .iter()
        .map(|config| {
            let error = match config.validate() {
                Err(e) => Some(e.to_string()),
                Ok(()) if !seen.insert(config.name.as_str()) => {
                    Some(format!("Duplicate stream name: {}", config.name))
                }
                Ok(()) => None,
            };

            StreamVerdict {
                name: config.name.clone(),
                source_kind: config.source_kind,
                endpoint: config.endpoint.clone(),
                transport: transport_name(config),
                valid: error.is_none(),
                error,
            }
        })
        .collect()
}

pub fn execute(args: ValidateArgs) -> i32 {
    let (_, path) = match resolve_config(args.streams) {
        Ok(resolved) => resolved,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let configs = match read_stream_configs(&path) {
        Ok(configs) => configs,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let results = verdicts(&configs);
    let all_valid = results.iter().all(|v| v.valid);

    if args.json {
        if let Err(e) = output::emit(&results, false) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        for verdict in &results {
            match &verdict.error {
                None => println!(
                    "ok    {} ({} {})",
                    verdict.name,
                    verdict.transport.unwrap_or("?"),
                    verdict.endpoint
                ),
                Some(err) => println!("FAIL  {}: {}", verdict.name, err),
            }
        }
        println!(
            "{} of {} stream(s) valid in {}",
            results.iter().filter(|v| v.valid).count(),
            results.len(),
            path.display()
        );
    }

    if all_valid {
        exit_codes::SUCCESS
    } else {
        exit_codes::INPUT_ERROR
    }
}
