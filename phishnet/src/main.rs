use phishnet::commands::command_argument_builder;
use phishnet::handlers::{
    handle_analyze, handle_build, handle_cache_compact, handle_cache_stats, handle_init,
    handle_resolve,
};

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("analyze", primary_command)) => handle_analyze(primary_command),
        Some(("build", primary_command)) => handle_build(primary_command, quiet, verbose).await,
        Some(("resolve", primary_command)) => {
            handle_resolve(primary_command, quiet, verbose).await
        }
        Some(("cache", primary_command)) => match primary_command.subcommand() {
            Some(("stats", secondary_command)) => handle_cache_stats(secondary_command, verbose),
            Some(("compact", secondary_command)) => {
                handle_cache_compact(secondary_command, verbose)
            }
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
