use clap::{command, Parser};
use frame_messenger::{
    host::{ImageGenerator, GENERATE_IMAGE},
    FrameChannel, FrameHost, Messenger, MessengerConfig, MessengerError,
};
use serde_json::json;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Color of the image to request
    #[arg(long, default_value = "#ff6b6b")]
    color: String,

    /// Response timeout in milliseconds
    #[arg(short, long, default_value_t = 10000)]
    timeout: u64,

    /// Start no host, so the request times out
    #[arg(long)]
    silent_host: bool,

    /// Enable debug mode
    #[arg(short, long)]
    verbose: bool,
}

async fn run(cli: &Cli) -> Result<(), MessengerError> {
    let config = if cli.config.exists() {
        MessengerConfig::from_file(&cli.config)?
    } else {
        MessengerConfig::default()
    };

    info!("config loaded.");
    debug!("config: {:?}", config);

    let channel = Arc::new(FrameChannel::new(config.channel_capacity));
    debug!(capacity = channel.capacity(), "Frame channel ready");

    let host = if cli.silent_host {
        info!("Running without a host, the request will time out");
        None
    } else {
        let generator = ImageGenerator::new(config.demo.clone());
        Some(
            FrameHost::new(channel.clone())
                .handler(GENERATE_IMAGE, generator)
                .spawn(),
        )
    };

    let messenger = Messenger::new(channel.clone(), &config);

    let mut loading = messenger.loading();
    let watcher = tokio::spawn(async move {
        while loading.changed().await.is_ok() {
            debug!(loading = *loading.borrow_and_update(), "Loading state changed");
        }
    });

    let payload = json!({ "color": cli.color }).as_object().cloned();
    let pending = messenger.send(
        GENERATE_IMAGE,
        payload,
        Some(Duration::from_millis(cli.timeout)),
    );
    println!("Requested {} ({})", GENERATE_IMAGE, pending.request_id());

    let result = pending.await;

    messenger.shutdown();
    watcher.abort();
    if let Some(host) = host {
        host.abort();
    }

    let response = result?;
    if response.success {
        let data = response.data.unwrap_or_default();
        println!(
            "Image generated: {}",
            serde_json::to_string_pretty(&data)?
        );
    } else {
        println!(
            "Request failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
