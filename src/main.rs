use crate::{
    announcer::{run_announcer, Announcer, DiscordAnnouncer, LogAnnouncer},
    configuration::Configuration,
    configuration_handler::ConfigurationHandler,
    http::{create_app, AppState},
    persistence::JsonFileStore,
    scanner::CompletionScanner,
    slot_store::SlotStore,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod announcer;
mod configuration;
mod configuration_handler;
mod error;
mod http;
mod persistence;
mod scanner;
mod schedule;
mod slot_store;
#[cfg(test)]
mod testutils;
mod types;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("##################");
    println!("# Training Slots #");
    println!("##################");

    let configuration = ConfigurationHandler::parse_arguments();

    let store = SlotStore::open(JsonFileStore::new(configuration.state_path()));
    let (completion_tx, completion_rx) = mpsc::channel(16);
    let (ready_tx, ready_rx) = watch::channel(false);

    if let Some(discord) = configuration.discord() {
        let announcer = DiscordAnnouncer::new(discord);
        loop {
            match announcer.ready().await {
                Ok(()) => {
                    info!("Successfully connected to Discord");
                    break;
                }
                Err(err) => {
                    error!(?err, "Failed to reach Discord. Retry in 5 sec. You may want to restart without a bot token (log-only announcements).");
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
        tokio::spawn(run_announcer(
            announcer,
            store.schedule_stream(),
            completion_rx,
        ));
    } else {
        info!("No bot configured, announcements go to the log");
        tokio::spawn(run_announcer(
            LogAnnouncer,
            store.schedule_stream(),
            completion_rx,
        ));
    }

    CompletionScanner::new(store.clone(), completion_tx, configuration.scan_interval())
        .spawn(ready_rx);

    let address = format!("0.0.0.0:{}", configuration.port());
    println!("Accessable at:\n{}", address.clone());
    let listener = tokio::net::TcpListener::bind(address).await.unwrap();

    let app = create_app(AppState { slots: store }, configuration);
    ready_tx.send(true).ok();
    axum::serve(listener, app).await.unwrap();
}
