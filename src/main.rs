use anyhow::{anyhow, Context};
use rosrelay::{
    arguments::{is_help_requested, print_help},
    logger::{self, LogTag},
    run::run_relay,
};

/// rosrelay entry point
///
/// Relays rosbridge topics to downstream websocket observers until
/// SIGINT/SIGTERM.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if is_help_requested() {
        print_help();
        return Ok(());
    }

    logger::init();

    let result = run_relay()
        .await
        .map_err(|e| anyhow!(e))
        .context("rosrelay terminated with an error");

    if let Err(e) = &result {
        logger::error(LogTag::System, &format!("{:#}", e));
    }

    logger::flush();
    result
}
