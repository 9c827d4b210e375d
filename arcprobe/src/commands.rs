use crate::CLAP_STYLING;
use arcprobe_core::settings::DEFAULT_SETTINGS_PATH;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("arcprobe")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("arcprobe")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, spinner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log queue transitions and requests to stderr")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Writes a default settings file")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the settings file")
                        .default_value(DEFAULT_SETTINGS_PATH),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing settings file")
                        .required(false),
                ),
        )
        .subcommand(
            command!("probe")
                .about(
                    "Probe a services directory page: service metadata, feature counts, field \
                and domain value counts.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The services directory page to probe")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("pages-file"),
                )
                .arg(
                    arg!(-H --"pages-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of pages to probe")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"expand")
                        .required(false)
                        .help("Show collapsed panels in full")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-metadata")
                        .required(false)
                        .help("Skip the metadata request for each service link")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-feature-counts")
                        .required(false)
                        .help("Skip feature and shape counts")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-field-counts")
                        .required(false)
                        .help("Skip null and empty value counts on layer pages")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-domain-counts")
                        .required(false)
                        .help("Skip coded domain value counts on layer pages")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(timeout_arg())
                .arg(settings_arg()),
        )
        .subcommand(
            command!("fields")
                .about("List the layers of a service and the fields usable in a where clause")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("A map service or single layer URL")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the layer list as JSON")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(timeout_arg()),
        )
        .subcommand(
            command!("values")
                .about("Show the distinct values of a field and compose a where clause from them")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("A map service or single layer URL")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-l --"layer" <ID>)
                        .required(false)
                        .help("Layer id (default: taken from a single layer URL)")
                        .value_parser(clap::value_parser!(i64)),
                )
                .arg(
                    arg!(-F --"field" <NAME>)
                        .required(true)
                        .help("The field whose values are listed"),
                )
                .arg(
                    arg!(-w --"where" <CLAUSE>)
                        .required(false)
                        .help("Where clause to edit (default: defaultWhereClause from settings)"),
                )
                .arg(
                    arg!(--"caret" <POS>)
                        .required(false)
                        .help("Caret position in the where clause (default: end)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-i --"insert" <TOKEN>)
                        .required(false)
                        .help("Insert at the caret, in order. @N inserts value N of the list")
                        .num_args(1..)
                        .action(clap::ArgAction::Append)
                        .allow_hyphen_values(true),
                )
                .arg(timeout_arg())
                .arg(settings_arg()),
        )
        .subcommand(
            command!("search")
                .about(
                    "Search a services directory and everything below it. Digits match numbers \
                exactly, anything else is a case-insensitive regular expression.",
                )
                .arg(arg!(<TERM>).required(true).help("What to look for"))
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("Where to start, usually .../arcgis/rest/services")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the hits as JSON")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(timeout_arg()),
        )
        .subcommand(
            command!("query")
                .about("Build a layer query from a preset, a where clause and output statistics")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("A single layer URL")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-p --"preset" <PRESET>)
                        .required(false)
                        .help("select-all, no-geometry and count also send the query")
                        .value_parser(["select-all", "no-geometry", "count", "distinct"]),
                )
                .arg(
                    arg!(-w --"where" <CLAUSE>)
                        .required(false)
                        .help("Where clause (default: defaultWhereClause from settings)"),
                )
                .arg(
                    arg!(--"out-fields" <FIELDS>)
                        .required(false)
                        .help("Comma separated output fields"),
                )
                .arg(
                    arg!(--"stat" <STAT>)
                        .required(false)
                        .help("Add an output statistic: TYPE[:FIELD[:OUT_NAME]], TYPE one of count, sum, min, max, avg, stddev, var")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"send")
                        .required(false)
                        .help("Send the query and print the response")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(timeout_arg())
                .arg(settings_arg()),
        )
        .subcommand(
            command!("gp")
                .about("List a geoprocessing task's parameters, choices and defaults, and build its execute URL")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The task URL, or its execute/submitJob page")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"set" <ASSIGNMENT>)
                        .required(false)
                        .help("NAME=VALUE for an input parameter; must be one of its choices if it lists any")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the task parameters as JSON")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(timeout_arg())
                .arg(settings_arg()),
        )
}

fn timeout_arg() -> clap::Arg {
    arg!(--"timeout" <SECONDS>)
        .required(false)
        .help("Request timeout in seconds")
        .value_parser(clap::value_parser!(u64))
        .default_value("30")
}

fn settings_arg() -> clap::Arg {
    arg!(-s --"settings" <PATH>)
        .required(false)
        .help("Settings file to read")
        .default_value(DEFAULT_SETTINGS_PATH)
}
