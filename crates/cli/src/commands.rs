//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("accord")
        .about("Consumer-driven contract broker")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Broker data directory (default: .accord)")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_publish())
        .subcommand(build_verify())
        .subcommand(build_tag())
        .subcommand(build_untag())
        .subcommand(build_can_i_deploy())
        .subcommand(build_matrix())
        .subcommand(build_show())
}

// =========================================================================
// Writes
// =========================================================================

fn build_publish() -> Command {
    Command::new("publish")
        .about("Publish a contract document")
        .arg(
            Arg::new("file")
                .required(true)
                .value_name("PATH")
                .help("Contract document JSON ('-' for stdin)"),
        )
        .arg(
            Arg::new("consumer-version")
                .long("consumer-version")
                .short('v')
                .required(true)
                .value_name("VERSION")
                .help("Consumer version that produced the contract"),
        )
        .arg(
            Arg::new("tag")
                .long("tag")
                .short('t')
                .value_name("TAG")
                .action(ArgAction::Append)
                .help("Tag the consumer version (repeatable)"),
        )
}

fn build_verify() -> Command {
    Command::new("verify")
        .about("Record a provider verification result")
        .arg(
            Arg::new("report")
                .value_name("PATH")
                .help("Verification report JSON ('-' for stdin)")
                .conflicts_with_all(["consumer", "outcome", "responses"]),
        )
        .arg(
            Arg::new("consumer")
                .long("consumer")
                .value_name("NAME")
                .requires_all(["consumer-version", "provider", "provider-version"]),
        )
        .arg(
            Arg::new("consumer-version")
                .long("consumer-version")
                .value_name("VERSION"),
        )
        .arg(Arg::new("provider").long("provider").value_name("NAME"))
        .arg(
            Arg::new("provider-version")
                .long("provider-version")
                .value_name("VERSION"),
        )
        .arg(
            Arg::new("outcome")
                .long("outcome")
                .value_parser(["success", "failure"])
                .conflicts_with("responses")
                .help("Result of a verification run elsewhere"),
        )
        .arg(
            Arg::new("responses")
                .long("responses")
                .value_name("PATH")
                .help("Observed responses JSON, keyed by '<provider state>::<description>' (bare description when stateless)"),
        )
}

fn build_tag() -> Command {
    Command::new("tag")
        .about("Point a tag at a participant version")
        .arg(Arg::new("participant").required(true))
        .arg(Arg::new("version").required(true))
        .arg(Arg::new("tag").required(true))
}

fn build_untag() -> Command {
    Command::new("untag")
        .about("Remove a tag from a participant")
        .arg(Arg::new("participant").required(true))
        .arg(Arg::new("tag").required(true))
}

// =========================================================================
// Queries
// =========================================================================

fn build_can_i_deploy() -> Command {
    Command::new("can-i-deploy")
        .about("Check whether a participant version is safe to deploy (exit 0 yes, 1 no, 2 unknown)")
        .arg(Arg::new("participant").required(true))
        .arg(Arg::new("version").required(true))
        .arg(
            Arg::new("to")
                .long("to")
                .required(true)
                .value_name("TAG")
                .help("Environment or branch tag being deployed to"),
        )
        .arg(
            Arg::new("also")
                .long("also")
                .value_name("TAG")
                .action(ArgAction::Append)
                .help("Additional tag whose counterparts must be compatible (repeatable)"),
        )
        .arg(
            Arg::new("empty")
                .long("empty")
                .value_parser(["allow", "deny"])
                .help("Verdict when nothing applies (default: from accord.toml)"),
        )
}

fn build_matrix() -> Command {
    Command::new("matrix")
        .about("List verification results between a consumer and a provider")
        .arg(Arg::new("consumer").required(true))
        .arg(Arg::new("provider").required(true))
}

fn build_show() -> Command {
    Command::new("show")
        .about("Inspect stored contracts and participants")
        .subcommand_required(true)
        .subcommand(
            Command::new("contract")
                .about("Show the current contract between a provider and a consumer")
                .arg(Arg::new("provider").required(true))
                .arg(Arg::new("consumer").required(true))
                .arg(
                    Arg::new("version")
                        .long("version")
                        .value_name("VERSION")
                        .conflicts_with("tag")
                        .help("Consumer version (default: latest)"),
                )
                .arg(
                    Arg::new("tag")
                        .long("tag")
                        .value_name("TAG")
                        .help("Consumer version currently carrying this tag"),
                ),
        )
        .subcommand(
            Command::new("revisions")
                .about("Show every revision published under one consumer version")
                .arg(Arg::new("consumer").required(true))
                .arg(Arg::new("version").required(true))
                .arg(Arg::new("provider").required(true)),
        )
        .subcommand(Command::new("participants").about("List known participants"))
        .subcommand(
            Command::new("participant")
                .about("Show a participant's versions and tags")
                .arg(Arg::new("name").required(true)),
        )
}
