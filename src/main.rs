use clap::Parser;
use slack_backfill::Cli;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    slack_backfill::init_logging(cli.debug);

    // reqwest and slack-morphism both sit on rustls
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    if let Err(e) = slack_backfill::run(cli).await {
        error!(error = %e, "run failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
