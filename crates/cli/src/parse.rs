//! ArgMatches → CliAction conversion.
//!
//! Validates names and versions up front so a typo is reported before the
//! broker is opened.

use std::io::Read;

use accord_core::{
    DeploymentQuery, EmptyPolicy, Outcome, ParticipantName, TagName, VersionId,
};
use accord_engine::ContractSelector;
use clap::ArgMatches;

/// The result of parsing user input.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    /// Publish a contract document file.
    Publish {
        file: String,
        consumer_version: VersionId,
        tags: Vec<TagName>,
    },
    /// Record a verification report file as-is.
    RecordReport { file: String },
    /// Record a verification of the current contract between two versions.
    Verify {
        consumer: ParticipantName,
        consumer_version: VersionId,
        provider: ParticipantName,
        provider_version: VersionId,
        evidence: Evidence,
    },
    /// Point a tag at a version.
    Tag {
        participant: ParticipantName,
        version: VersionId,
        tag: TagName,
    },
    /// Remove a tag.
    Untag {
        participant: ParticipantName,
        tag: TagName,
    },
    /// Deployment-safety query.
    CanIDeploy(DeploymentQuery),
    /// Compatibility matrix for a pair.
    Matrix {
        consumer: ParticipantName,
        provider: ParticipantName,
    },
    /// Current contract for a selector.
    ShowContract {
        provider: ParticipantName,
        consumer: ParticipantName,
        selector: ContractSelector,
    },
    /// Revision history for one key.
    ShowRevisions {
        consumer: ParticipantName,
        version: VersionId,
        provider: ParticipantName,
    },
    /// All participants.
    ShowParticipants,
    /// One participant's versions and tags.
    ShowParticipant { name: ParticipantName },
}

/// What a `verify` invocation bases its outcome on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// Outcome decided by the caller.
    Outcome(Outcome),
    /// Observed responses file to match against the contract.
    Responses(String),
}

/// Convert parsed clap matches into a [`CliAction`].
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    match matches.subcommand() {
        Some(("publish", m)) => Ok(CliAction::Publish {
            file: required(m, "file")?.to_string(),
            consumer_version: version(m, "consumer-version")?,
            tags: tags(m, "tag")?,
        }),
        Some(("verify", m)) => parse_verify(m),
        Some(("tag", m)) => Ok(CliAction::Tag {
            participant: participant(m, "participant")?,
            version: version(m, "version")?,
            tag: tag(m, "tag")?,
        }),
        Some(("untag", m)) => Ok(CliAction::Untag {
            participant: participant(m, "participant")?,
            tag: tag(m, "tag")?,
        }),
        Some(("can-i-deploy", m)) => parse_can_i_deploy(m),
        Some(("matrix", m)) => Ok(CliAction::Matrix {
            consumer: participant(m, "consumer")?,
            provider: participant(m, "provider")?,
        }),
        Some(("show", m)) => parse_show(m),
        Some((other, _)) => Err(format!("Unknown command: {}", other)),
        None => Err("No command given".to_string()),
    }
}

fn parse_verify(m: &ArgMatches) -> Result<CliAction, String> {
    if let Some(file) = m.get_one::<String>("report") {
        return Ok(CliAction::RecordReport { file: file.clone() });
    }
    if m.get_one::<String>("consumer").is_none() {
        return Err("verify needs a report file or --consumer/--provider flags".to_string());
    }

    let evidence = match (m.get_one::<String>("outcome"), m.get_one::<String>("responses")) {
        (Some(outcome), None) => Evidence::Outcome(match outcome.as_str() {
            "success" => Outcome::Success,
            _ => Outcome::Failure,
        }),
        (None, Some(file)) => Evidence::Responses(file.clone()),
        _ => return Err("verify needs exactly one of --outcome or --responses".to_string()),
    };
    Ok(CliAction::Verify {
        consumer: participant(m, "consumer")?,
        consumer_version: version(m, "consumer-version")?,
        provider: participant(m, "provider")?,
        provider_version: version(m, "provider-version")?,
        evidence,
    })
}

fn parse_can_i_deploy(m: &ArgMatches) -> Result<CliAction, String> {
    let mut query = DeploymentQuery::new(
        participant(m, "participant")?,
        version(m, "version")?,
        tag(m, "to")?,
    );
    for extra in tags(m, "also")? {
        query = query.also_require(extra);
    }
    match m.get_one::<String>("empty").map(|s| s.as_str()) {
        Some("allow") => query = query.with_empty_policy(EmptyPolicy::Allow),
        Some("deny") => query = query.with_empty_policy(EmptyPolicy::Deny),
        _ => {}
    }
    Ok(CliAction::CanIDeploy(query))
}

fn parse_show(matches: &ArgMatches) -> Result<CliAction, String> {
    match matches.subcommand() {
        Some(("contract", m)) => {
            let selector = if m.get_one::<String>("version").is_some() {
                ContractSelector::Version(version(m, "version")?)
            } else if m.get_one::<String>("tag").is_some() {
                ContractSelector::Tagged(tag(m, "tag")?)
            } else {
                ContractSelector::Latest
            };
            Ok(CliAction::ShowContract {
                provider: participant(m, "provider")?,
                consumer: participant(m, "consumer")?,
                selector,
            })
        }
        Some(("revisions", m)) => Ok(CliAction::ShowRevisions {
            consumer: participant(m, "consumer")?,
            version: version(m, "version")?,
            provider: participant(m, "provider")?,
        }),
        Some(("participants", _)) => Ok(CliAction::ShowParticipants),
        Some(("participant", m)) => Ok(CliAction::ShowParticipant {
            name: participant(m, "name")?,
        }),
        Some((other, _)) => Err(format!("Unknown show target: {}", other)),
        None => Err("show needs a target".to_string()),
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn required<'a>(m: &'a ArgMatches, id: &str) -> Result<&'a str, String> {
    m.get_one::<String>(id)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("Missing argument: {}", id))
}

fn participant(m: &ArgMatches, id: &str) -> Result<ParticipantName, String> {
    let raw = required(m, id)?;
    ParticipantName::new(raw).map_err(|e| format!("Invalid {} '{}': {}", id, raw, e))
}

fn version(m: &ArgMatches, id: &str) -> Result<VersionId, String> {
    let raw = required(m, id)?;
    VersionId::new(raw).map_err(|e| format!("Invalid {} '{}': {}", id, raw, e))
}

fn tag(m: &ArgMatches, id: &str) -> Result<TagName, String> {
    let raw = required(m, id)?;
    TagName::new(raw).map_err(|e| format!("Invalid {} '{}': {}", id, raw, e))
}

fn tags(m: &ArgMatches, id: &str) -> Result<Vec<TagName>, String> {
    m.get_many::<String>(id)
        .into_iter()
        .flatten()
        .map(|raw| TagName::new(raw.as_str()).map_err(|e| format!("Invalid {} '{}': {}", id, raw, e)))
        .collect()
}

/// Read text from a file, or stdin when `source` is "-".
pub fn read_source(source: &str) -> Result<String, String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).map_err(|e| format!("Failed to read file '{}': {}", source, e))
    }
}
