use crate::CLAP_STYLING;
use clap::{arg, command};
use gxcrawler::handlers::{DEFAULT_DB_PATH, parse_date};
use std::path::PathBuf;

fn db_arg() -> clap::Arg {
    arg!(--"db" <PATH>)
        .required(false)
        .help("Location of the revision database")
        .default_value(DEFAULT_DB_PATH)
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("gxcrawler")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("gxcrawler")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates an empty revision database on your filesystem")
                .arg(db_arg())
                .arg(
                    arg!(-f --"force")
                        .help("Replace any existing database at the given location without asking")
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about(
                    "Log in to a GeneXus Server, walk its activity grid for a date range and \
                store every revision with its objects. Without both --from and --to only \
                today is crawled.",
                )
                .arg(
                    arg!(--"from" <DATE>)
                        .required(false)
                        .help("First day of the range, YYYY-MM-DD (used together with --to)")
                        .value_parser(parse_date),
                )
                .arg(
                    arg!(--"to" <DATE>)
                        .required(false)
                        .help("Last day of the range, YYYY-MM-DD (used together with --from)")
                        .value_parser(parse_date),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Read GX_USER, GX_PASSWORD, GX_URL and GX_KBNAME from this file")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("env"),
                )
                .arg(
                    arg!(--"env")
                        .required(false)
                        .help("Read connection settings from the environment only")
                        .action(clap::ArgAction::SetTrue)
                        .conflicts_with("config"),
                )
                .arg(db_arg())
                .arg(
                    arg!(-t --"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("30"),
                ),
        )
        .subcommand(
            command!("show")
                .about("Print stored revisions, newest build first")
                .arg(db_arg())
                .arg(
                    arg!(-b --"build" <BUILD>)
                        .required(false)
                        .help("Show a single build")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(-n --"limit" <COUNT>)
                        .required(false)
                        .help("Maximum number of revisions to show")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("20"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
}
