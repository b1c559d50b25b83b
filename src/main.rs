//! Command-line driver for the TES spawner.
//!
//! Runs one notebook task end-to-end against a live service, the way a host
//! orchestrator would: `start` submits and waits for the endpoint, `status`
//! and `stop` act on a persisted handle.

use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use tes_spawner::{Config, Spawner, SpawnerState, TaskHandle, UserOptions, metrics};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "tes-spawn")]
#[command(about = "Run notebook servers on a GA4GH Task Execution Service")]
struct Cli {
    /// Print Prometheus metrics to stderr before exiting
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a notebook task and wait until it is reachable
    Start {
        #[arg(long)]
        image: Option<String>,
        #[arg(long, default_value_t = 1)]
        cpu: u32,
        #[arg(long, default_value_t = 8.0)]
        mem: f64,
        #[arg(long, default_value_t = 10.0)]
        disk: f64,
    },
    /// Print the state of a task
    Status { handle: String },
    /// Cancel a task
    Stop { handle: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let config = Config::from_env()?;
    log::info!(
        "Using task service at {} (protocol {})",
        config.endpoint,
        config.protocol
    );
    let mut spawner = Spawner::from_config(&config)?;

    let result = match cli.command {
        Commands::Start {
            image,
            cpu,
            mem,
            disk,
        } => {
            let options = UserOptions {
                image,
                cpu,
                mem_gb: mem,
                disk_gb: disk,
            };
            start(&mut spawner, &options).await
        }
        Commands::Status { handle } => {
            attach(&mut spawner, handle);
            spawner.poll().await.map(|exit| {
                println!("{}", spawner.status());
                if exit.is_some() {
                    log::info!("Task {} has finished", spawner.handle());
                }
            })
        }
        Commands::Stop { handle } => {
            attach(&mut spawner, handle);
            spawner.stop().await
        }
    };

    if cli.metrics {
        eprintln!("{}", metrics::gather());
    }
    result.map_err(Into::into)
}

async fn start(spawner: &mut Spawner, options: &UserOptions) -> tes_spawner::Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, giving up on the endpoint");
            on_signal.cancel();
        }
    });

    let env: BTreeMap<String, String> = std::env::vars().collect();
    let outcome = spawner.start(options, &env, &cancel).await;

    // print the state even on failure so the task can still be stopped
    match serde_json::to_string(&spawner.get_state()) {
        Ok(state) => println!("state: {}", state),
        Err(e) => log::error!("Failed to encode spawner state: {}", e),
    }

    let endpoint = outcome?;
    println!("endpoint: {}", endpoint);
    Ok(())
}

fn attach(spawner: &mut Spawner, handle: String) {
    spawner.load_state(SpawnerState {
        task_id: Some(TaskHandle::new(handle)),
        status: None,
    });
}
