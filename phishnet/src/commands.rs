use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "~/.config/phishnet/";

fn data_dir_arg() -> clap::Arg {
    arg!(-d --"data-dir" <PATH>)
        .required(false)
        .help("Directory holding the registration cache and generated tables")
        .default_value(DEFAULT_DATA_DIR)
}

fn timeout_arg() -> clap::Arg {
    arg!(--"timeout" <SECONDS>)
        .required(false)
        .help("Per-request timeout in seconds")
        .value_parser(clap::value_parser!(u64).range(1..))
        .default_value("10")
}

fn lookup_delay_arg() -> clap::Arg {
    arg!(--"lookup-delay" <MILLIS>)
        .required(false)
        .help("Minimum spacing between outbound registration lookups, in milliseconds")
        .value_parser(clap::value_parser!(u64))
        .default_value("1000")
}

fn rdap_base_arg() -> clap::Arg {
    arg!(--"rdap-base" <URL>)
        .required(false)
        .help("RDAP service queried as {base}/domain/{domain}")
        .value_parser(clap::value_parser!(url::Url))
        .default_value("https://rdap.org")
}

fn threads_arg() -> clap::Arg {
    arg!(-t --"threads" <NUM_WORKERS>)
        .required(false)
        .help("The number of async workers fetching pages and resolving domains")
        .value_parser(clap::value_parser!(usize))
        .default_value("8")
}

fn source_arg(name: &'static str, help: &'static str) -> clap::Arg {
    clap::Arg::new(name)
        .long(name)
        .value_name("PATH")
        .help(help)
        .required(false)
        .action(clap::ArgAction::Append)
        .value_parser(clap::value_parser!(PathBuf))
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("phishnet")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("phishnet")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress progress bars and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Log per-item detail (debug level)").required(false))
        .subcommand_required(true)
        .subcommand(
            command!("init")
                .about("Creates the data directory and an empty registration cache")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the phishnet data directory")
                        .default_value(DEFAULT_DATA_DIR),
                )
                .arg(
                    arg!(-f - -"force")
                        .help("Deletes any existing registration cache at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("analyze")
                .about("Prints the lexical features of one or more URLs as JSON lines")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("A URL to analyze (repeatable)")
                        .action(clap::ArgAction::Append)
                        .conflicts_with("urls-file"),
                )
                .arg(
                    arg!(-H --"urls-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of URLs")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(--"keywords" <LIST>)
                        .required(false)
                        .help("Comma-separated brand keywords (default: google,paypal,apple,amazon,microsoft,facebook,bank)"),
                )
                .arg(
                    arg!(--"tlds" <LIST>)
                        .required(false)
                        .help("Comma-separated suspicious TLD suffixes (default: .tk,.ml,.ga,.cf,.gq,.xyz,.top,.work,.support,.info)"),
                ),
        )
        .subcommand(
            command!("build")
                .about(
                    "Builds the labeled feature table from phishing and benign URL sources. \
                Writes url_features.csv into the data directory.",
                )
                .arg(source_arg("phishtank", "PhishTank CSV export, labeled phishing (repeatable)"))
                .arg(source_arg("phishing-list", "Newline-delimited URL list, labeled phishing (repeatable)"))
                .arg(source_arg("tranco", "Tranco/Alexa rank,domain CSV, labeled benign (repeatable)"))
                .arg(source_arg("benign-list", "Newline-delimited URL list, labeled benign (repeatable)"))
                .group(
                    clap::ArgGroup::new("sources")
                        .args(["phishtank", "phishing-list", "tranco", "benign-list"])
                        .multiple(true)
                        .required(true),
                )
                .arg(data_dir_arg())
                .arg(threads_arg())
                .arg(timeout_arg())
                .arg(lookup_delay_arg())
                .arg(rdap_base_arg())
                .arg(
                    arg!(--"keywords" <LIST>)
                        .required(false)
                        .help("Comma-separated brand keywords"),
                )
                .arg(
                    arg!(--"tlds" <LIST>)
                        .required(false)
                        .help("Comma-separated suspicious TLD suffixes"),
                )
                .arg(
                    arg!(--"skip-content")
                        .required(false)
                        .help("Do not fetch pages; content columns stay empty")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"skip-registration")
                        .required(false)
                        .help("Do not resolve registrations; domain_age_days stays -1")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("resolve")
                .about("Resolves registration data for domains through the cache, printing JSON lines")
                .arg(
                    arg!(-n --"domain" <DOMAIN>)
                        .required(false)
                        .help("A domain or URL to resolve (repeatable)")
                        .action(clap::ArgAction::Append)
                        .conflicts_with("domains-file"),
                )
                .arg(
                    arg!(-H --"domains-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of domains or URLs")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("domain"),
                )
                .arg(data_dir_arg())
                .arg(threads_arg())
                .arg(timeout_arg())
                .arg(lookup_delay_arg())
                .arg(rdap_base_arg()),
        )
        .subcommand(
            command!("cache")
                .about("Inspect and maintain the registration cache")
                .subcommand_required(true)
                .subcommand(command!("stats").about("Shows row, domain and unknown-age counts").arg(data_dir_arg()))
                .subcommand(
                    command!("compact")
                        .about("Removes every cached row except the first one per domain")
                        .arg(data_dir_arg()),
                ),
        )
}
