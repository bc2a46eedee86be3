//! Output → human/json string formatting.
//!
//! Two modes:
//! - **Human** (default): one fact per line, aligned for terminals
//! - **JSON** (`--json`): `serde_json::to_string_pretty`

use accord_core::{
    AccordError, ContractDocument, ContractRef, DeploymentQuery, DeploymentResponse,
    ParticipantName, TagName, VerificationRef, Verdict, VersionId,
};
use accord_engine::{ContractRevision, ContractSelector, MatrixRow, TagChange};
use serde_json::json;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Result of one executed command.
pub enum Output {
    Published {
        contract: ContractRef,
        created: bool,
        tags: Vec<TagName>,
    },
    Recorded(VerificationRef),
    Tagged {
        participant: ParticipantName,
        tag: TagName,
        change: TagChange,
    },
    Deployment {
        query: DeploymentQuery,
        response: DeploymentResponse,
    },
    Matrix(Vec<MatrixRow>),
    Contract {
        selector: ContractSelector,
        contract: ContractRef,
        document: ContractDocument,
    },
    Revisions(Vec<ContractRevision>),
    Participants(Vec<ParticipantName>),
    Participant {
        name: ParticipantName,
        versions: Vec<(VersionId, Vec<TagName>)>,
    },
}

/// Format a successful output.
pub fn format_output(output: &Output, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(&format_json(output)),
        OutputMode::Human => format_human(output),
    }
}

/// Format an error.
pub fn format_error(err: &str, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(&json!({ "error": err })),
        OutputMode::Human => format!("(error) {}", err),
    }
}

/// Format a broker error.
pub fn format_broker_error(err: &AccordError, mode: OutputMode) -> String {
    format_error(&err.to_string(), mode)
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// =========================================================================
// JSON
// =========================================================================

fn format_json(output: &Output) -> serde_json::Value {
    match output {
        Output::Published {
            contract,
            created,
            tags,
        } => json!({ "contract": contract, "created": created, "tags": tags }),
        Output::Recorded(verification) => json!(verification),
        Output::Tagged {
            participant,
            tag,
            change,
        } => {
            let (change, from) = describe_change(change);
            json!({ "participant": participant, "tag": tag, "change": change, "from": from })
        }
        Output::Deployment { query, response } => json!({ "query": query, "response": response }),
        Output::Matrix(rows) => json!(rows),
        Output::Contract {
            contract, document, ..
        } => json!({ "contract": contract, "document": document }),
        Output::Revisions(revisions) => serde_json::Value::Array(
            revisions
                .iter()
                .map(|r| json!({ "contract": r.reference, "publishedAt": r.published_at }))
                .collect(),
        ),
        Output::Participants(names) => json!(names),
        Output::Participant { name, versions } => json!({
            "participant": name,
            "versions": versions
                .iter()
                .map(|(version, tags)| json!({ "version": version, "tags": tags }))
                .collect::<Vec<_>>(),
        }),
    }
}

fn describe_change(change: &TagChange) -> (&'static str, Option<&VersionId>) {
    match change {
        TagChange::Unchanged => ("unchanged", None),
        TagChange::Attached => ("attached", None),
        TagChange::Moved { from } => ("moved", Some(from)),
        TagChange::Removed { from } => ("removed", Some(from)),
    }
}

// =========================================================================
// Human
// =========================================================================

fn format_human(output: &Output) -> String {
    match output {
        Output::Published {
            contract,
            created,
            tags,
        } => {
            let mut out = if *created {
                format!("published {}", contract)
            } else {
                format!("unchanged {} (identical content)", contract)
            };
            if !tags.is_empty() {
                out.push_str(&format!("\ntagged {}", join(tags)));
            }
            out
        }
        Output::Recorded(v) => {
            let mut out = format!(
                "recorded {} by {} {}: {} at {}",
                v.contract, v.contract.provider, v.provider_version, v.outcome, v.verified_at
            );
            if v.stale {
                out.push_str("\nwarning: this revision has been superseded; the result will not count");
            }
            out
        }
        Output::Tagged {
            participant,
            tag,
            change,
        } => match change {
            TagChange::Unchanged => format!("{} {} unchanged", participant, tag),
            TagChange::Attached => format!("{} {} attached", participant, tag),
            TagChange::Moved { from } => format!("{} {} moved from {}", participant, tag, from),
            TagChange::Removed { from } => format!("{} {} removed from {}", participant, tag, from),
        },
        Output::Deployment { query, response } => format_deployment(query, response),
        Output::Matrix(rows) => format_matrix(rows),
        Output::Contract {
            selector,
            contract,
            document,
        } => {
            let body = document
                .to_json_pretty()
                .unwrap_or_else(|e| format!("(unprintable document: {})", e));
            format!("{} ({})\n{}", contract, selector, body)
        }
        Output::Revisions(revisions) => {
            if revisions.is_empty() {
                return "(no revisions)".to_string();
            }
            let last = revisions.len() - 1;
            revisions
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    let state = if i == last { "current" } else { "superseded" };
                    format!(
                        "r{}  {}  {}  {}",
                        r.reference.revision,
                        r.published_at,
                        r.reference.content_hash.short(),
                        state
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        Output::Participants(names) => {
            if names.is_empty() {
                "(no participants)".to_string()
            } else {
                join_lines(names)
            }
        }
        Output::Participant { name, versions } => {
            let mut lines = vec![name.to_string()];
            for (version, tags) in versions {
                if tags.is_empty() {
                    lines.push(format!("  {}", version));
                } else {
                    lines.push(format!("  {}  [{}]", version, join(tags)));
                }
            }
            lines.join("\n")
        }
    }
}

fn format_deployment(query: &DeploymentQuery, response: &DeploymentResponse) -> String {
    let mut lines = Vec::new();
    let headline = match response.verdict {
        Verdict::Yes => "yes",
        Verdict::No => "no",
        Verdict::Unknown => "unknown",
    };
    lines.push(format!(
        "can {} {} be deployed to {}? {}",
        query.participant, query.version, query.target_tag, headline
    ));
    if let Some(error) = &response.error {
        lines.push(format!("  error: {}", error));
    }
    for s in &response.satisfied {
        lines.push(format!(
            "  ok    {} with {} {} [{}] verified {}",
            s.contract, s.contract.provider, s.provider_version, s.tag, s.verified_at
        ));
    }
    for u in &response.unsatisfied {
        lines.push(format!("  FAIL  {}", u));
    }
    if response.verdict != Verdict::Unknown && response.satisfied.is_empty() && response.unsatisfied.is_empty() {
        lines.push("  no applicable contracts".to_string());
    }
    lines.join("\n")
}

fn format_matrix(rows: &[MatrixRow]) -> String {
    if rows.is_empty() {
        return "(no verifications of current contracts)".to_string();
    }
    let mut lines = vec!["CONTRACT | CONSUMER TAGS | PROVIDER VERSION | PROVIDER TAGS | RESULT | VERIFIED".to_string()];
    for row in rows {
        lines.push(format!(
            "{} | {} | {} | {} | {} | {}",
            row.contract,
            join(&row.consumer_tags),
            row.provider_version,
            join(&row.provider_tags),
            row.outcome,
            row.verified_at
        ));
    }
    lines.join("\n")
}

fn join<T: ToString>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

fn join_lines<T: ToString>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("\n")
}
