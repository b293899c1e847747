use std::{process::ExitCode, sync::Arc};

use dotenv::dotenv;
use reqwest::Client;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::FmtSubscriber;

use crate::{
    client::{api_base::resolve_api_base, quiz_client::QuizClient},
    config::config::AppConfig,
    session::controller::{SessionController, SessionTimings},
};

mod client;
mod config;
mod session;
mod terminal;

#[cfg(test)]
mod tests;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize .env
    dotenv().ok();

    let config = AppConfig::load();

    // Initialize logging
    let level = config
        .as_ref()
        .ok()
        .and_then(|config| config.log.level_filter().ok())
        .unwrap_or(LevelFilter::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global tracing");

    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Resolve the api origin before any session call is made
    let client = Client::new();
    let api_base = resolve_api_base(&config.api, &client).await;
    let api = Arc::new(QuizClient::new(client, api_base));

    let timings = SessionTimings::with_poll_interval(config.session.poll_interval());
    let (mut controller, handle) = SessionController::new(api, timings);
    controller.apply_launch(&mut config.launch);

    info!("Participant client ready");
    tokio::join!(controller.run(), terminal::presenter::run(handle));

    ExitCode::SUCCESS
}
