use branchbox_core::errors::BranchboxError;
use clap::Parser;

mod cli;
mod commands;
mod ui;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let parsed = cli::Cli::parse();

    let Err(err) = parsed.dispatch().await else {
        return;
    };

    let exit_code = err
        .downcast_ref::<BranchboxError>()
        .map(BranchboxError::exit_code)
        .unwrap_or(1);

    // A prompt may still be blocked on terminal input; returning would wait for it
    if exit_code == 0 {
        tracing::info!("{}", err);
        std::process::exit(0);
    }

    if branchbox_core::logging::is_initialized() {
        tracing::error!("{:#}", err);
    } else {
        eprintln!("Error: {:#}", err);
    }
    std::process::exit(exit_code);
}
