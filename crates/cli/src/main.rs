//! Accord CLI: publish contracts, record verifications, ask can-i-deploy.
//!
//! Every invocation runs one command against the broker in `--data-dir`
//! and exits. `can-i-deploy` exits 0 for yes, 1 for no and 2 when the
//! answer is unknown; every other command exits 1 on error.

mod commands;
mod format;
mod parse;

use std::collections::BTreeMap;
use std::process;

use accord_core::{ContractDocument, ObservedResponse, Verdict, VerificationReport};
use accord_engine::{Broker, ContractSelector};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use format::{format_broker_error, format_error, format_output, Output, OutputMode};
use parse::{matches_to_action, read_source, CliAction, Evidence};

const DEFAULT_DATA_DIR: &str = ".accord";
const LOG_ENV: &str = "ACCORD_LOG";

const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_UNKNOWN: i32 = 2;

fn main() {
    init_logging();

    let matches = build_cli().get_matches();
    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(EXIT_FAILURE);
        }
    };
    let failure_code = match action {
        CliAction::CanIDeploy(_) => EXIT_UNKNOWN,
        _ => EXIT_FAILURE,
    };

    let data_dir = matches
        .get_one::<String>("data-dir")
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_DATA_DIR);
    let broker = match Broker::open(data_dir) {
        Ok(broker) => broker,
        Err(e) => {
            eprintln!(
                "{}",
                format_error(&format!("Failed to open broker at '{}': {}", data_dir, e), mode)
            );
            process::exit(failure_code);
        }
    };

    let code = match execute(&broker, action, mode) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            failure_code
        }
    };
    if let Err(e) = broker.shutdown() {
        eprintln!("{}", format_broker_error(&e, mode));
    }
    process::exit(code);
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run one action, print its output and return the exit code.
fn execute(broker: &Broker, action: CliAction, mode: OutputMode) -> Result<i32, String> {
    debug!(?action, "executing");
    let output = match action {
        CliAction::Publish {
            file,
            consumer_version,
            tags,
        } => {
            let document = ContractDocument::from_json(&read_source(&file)?).map_err(|e| e.to_string())?;
            let outcome = broker
                .publish_document(&consumer_version, document, &tags)
                .map_err(|e| e.to_string())?;
            Output::Published {
                contract: outcome.reference,
                created: outcome.created,
                tags,
            }
        }
        CliAction::RecordReport { file } => {
            let report: VerificationReport = serde_json::from_str(&read_source(&file)?)
                .map_err(|e| format!("Invalid verification report: {}", e))?;
            Output::Recorded(broker.record_report(report).map_err(|e| e.to_string())?)
        }
        CliAction::Verify {
            consumer,
            consumer_version,
            provider,
            provider_version,
            evidence,
        } => {
            let contract = broker
                .get(&provider, &consumer, &ContractSelector::Version(consumer_version))
                .map_err(|e| e.to_string())?;
            let recorded = match evidence {
                Evidence::Outcome(outcome) => broker.record(&contract, provider_version, outcome, Vec::new()),
                Evidence::Responses(file) => {
                    let observed: BTreeMap<String, ObservedResponse> =
                        serde_json::from_str(&read_source(&file)?)
                            .map_err(|e| format!("Invalid observed responses: {}", e))?;
                    let report = broker
                        .verify_contract(&contract, provider_version, &observed)
                        .map_err(|e| e.to_string())?;
                    broker.record_report(report)
                }
            };
            Output::Recorded(recorded.map_err(|e| e.to_string())?)
        }
        CliAction::Tag {
            participant,
            version,
            tag,
        } => {
            let change = broker.tag(&participant, &version, &tag).map_err(|e| e.to_string())?;
            Output::Tagged {
                participant,
                tag,
                change,
            }
        }
        CliAction::Untag { participant, tag } => {
            let change = broker.untag(&participant, &tag).map_err(|e| e.to_string())?;
            Output::Tagged {
                participant,
                tag,
                change,
            }
        }
        CliAction::CanIDeploy(query) => {
            let response = broker.can_i_deploy(&query);
            let code = match response.verdict {
                Verdict::Yes => EXIT_OK,
                Verdict::No => EXIT_FAILURE,
                Verdict::Unknown => EXIT_UNKNOWN,
            };
            println!("{}", format_output(&Output::Deployment { query, response }, mode));
            return Ok(code);
        }
        CliAction::Matrix { consumer, provider } => {
            Output::Matrix(broker.matrix(&consumer, &provider).map_err(|e| e.to_string())?)
        }
        CliAction::ShowContract {
            provider,
            consumer,
            selector,
        } => {
            let contract = broker.get(&provider, &consumer, &selector).map_err(|e| e.to_string())?;
            let document = broker.document(&contract).map_err(|e| e.to_string())?;
            Output::Contract {
                selector,
                contract,
                document,
            }
        }
        CliAction::ShowRevisions {
            consumer,
            version,
            provider,
        } => Output::Revisions(
            broker
                .revisions(&consumer, &version, &provider)
                .map_err(|e| e.to_string())?,
        ),
        CliAction::ShowParticipants => {
            Output::Participants(broker.participants().map_err(|e| e.to_string())?)
        }
        CliAction::ShowParticipant { name } => {
            let mut versions = Vec::new();
            for version in broker.versions(&name).map_err(|e| e.to_string())? {
                let tags = broker.tags_for(&name, &version).map_err(|e| e.to_string())?;
                versions.push((version, tags));
            }
            Output::Participant { name, versions }
        }
    };

    let formatted = format_output(&output, mode);
    if !formatted.is_empty() {
        println!("{}", formatted);
    }
    Ok(EXIT_OK)
}
