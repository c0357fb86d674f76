use clap::Parser;
use hookguard::Output;
use hookguard::cli::Cli;
use hookguard::cli::commands::EXIT_ERROR;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(cli.verbose > 0, cli.quiet);

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            output.error(&format!("{e:#}"));
            ExitCode::from(EXIT_ERROR)
        }
    }
}
