use arcprobe::handlers::{
    handle_fields, handle_gp, handle_init, handle_probe, handle_query, handle_search,
    handle_values, init_logging, print_banner,
};
use commands::command_argument_builder;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_logging(chosen_command.get_flag("verbose"));

    // Banner goes to stderr; skipped with --quiet
    if !quiet {
        print_banner();
    }

    match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("probe", primary_command)) => handle_probe(primary_command).await,
        Some(("fields", primary_command)) => handle_fields(primary_command).await,
        Some(("values", primary_command)) => handle_values(primary_command).await,
        Some(("search", primary_command)) => handle_search(primary_command).await,
        Some(("query", primary_command)) => handle_query(primary_command).await,
        Some(("gp", primary_command)) => handle_gp(primary_command).await,
        None => {}
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
