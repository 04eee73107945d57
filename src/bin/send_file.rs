//! Sends one file to a chunk relay receiver.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use chunk_relay::client::{Sender, UploadClient};
use chunk_relay::config::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "send-file", version, about = "Send a file to a chunk relay receiver")]
struct Args {
    /// File to send
    file_path: PathBuf,

    /// Receiver host
    server_ip: String,

    /// Receiver port
    server_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    dotenvy::dotenv().ok();

    let config = ClientConfig::from_env().context("invalid sender configuration")?;

    let client = UploadClient::new(&args.server_ip, args.server_port, config.timeout())?;
    let sender = Sender::new(client).with_chunk_retries(config.chunk_retries);

    let report = sender
        .send_file(&args.file_path)
        .await
        .with_context(|| format!("failed to send {}", args.file_path.display()))?;

    tracing::info!(
        upload_id = %report.upload_id,
        file_name = %report.file_name,
        file_size = report.file_size,
        total_chunks = report.total_chunks,
        "Transfer finished"
    );
    Ok(())
}
