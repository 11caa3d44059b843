use ballot_engine::{
    gateway::RpcLedger,
    service::{BallotService, ServiceConfig},
};
use clap::Parser;
use core::time::Duration;
use solana_sdk::commitment_config::CommitmentConfig;
use std::{env, path::PathBuf};
use tracing::{debug, error, info};

use crate::{config::BallotConfig, server::Server};

mod config;
mod server;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(long, short, help = "Common config path")]
    config: PathBuf,
}

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse_from(env::args());
    let config = BallotConfig::from_path(cli.config);
    debug!("Program id {}", config.solana.program_id);

    let fallback = config
        .fallback_table()
        .expect("Invalid fallback poll configuration");
    info!("{} fallback polls loaded", fallback.len());

    let timeout = Duration::from_millis(config.solana.timeout_ms);
    let gateway = RpcLedger::new(
        config.solana.rpc_url.clone(),
        config.solana.program_id,
        CommitmentConfig {
            commitment: config.solana.commitment,
        },
        timeout,
    );
    let service = BallotService::new(
        gateway,
        fallback,
        ServiceConfig {
            checkpoint_timeout: timeout,
            preflight: config.preflight,
        },
    );
    let server = Server::new(service);

    info!("Listening on {}", config.addrs);
    let res = server
        .execute(
            &config.addrs,
            config.ssl,
            std::thread::available_parallelism()
                .map_or(1, |n| n.get().saturating_sub(1).max(1)),
        )
        .await;
    if let Err(err) = res {
        error!("Server finished with {err}");
    }
}
