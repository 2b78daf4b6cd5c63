//! `castup`: upload a file to a chunked upload backend.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use castup_protocol::UploadProgress;
use castup_uploader::{
    ChunkedUploader, HttpTransport, TransportError, UploadObserver, UploaderConfig, check_status,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "castup", version, about = "Upload files in chunks to a media backend")]
struct Cli {
    /// Config file [default: ~/.config/castup/config.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the config file
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a file and print the completion response
    Upload(UploadArgs),
    /// Print the server status of an upload
    Status {
        upload_id: String,
    },
}

#[derive(Debug, Args)]
struct UploadArgs {
    file: PathBuf,

    /// Bytes per chunk
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<u64>,

    /// Maximum chunk uploads in flight
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Retries per chunk after the first attempt
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Reuse an existing upload id instead of generating one
    #[arg(long, value_name = "ID")]
    upload_id: Option<String>,
}

impl UploadArgs {
    fn apply(&self, config: &mut UploaderConfig) {
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
    }
}

/// Logs progress and chunk failures.
struct LogObserver;

impl UploadObserver for LogObserver {
    fn on_progress(&self, progress: &UploadProgress) {
        tracing::info!(
            upload_id = %progress.upload_id,
            completed = progress.completed_chunks,
            total = progress.total_chunks,
            "{}%",
            progress.percent
        );
    }

    fn on_chunk_error(&self, index: usize, error: &TransportError) {
        tracing::warn!(chunk = index, "chunk failed: {error}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }

    let transport = Arc::new(
        HttpTransport::with_headers(&config.base_url, &config.header_pairs())
            .context("failed to set up HTTP transport")?,
    );

    match cli.command {
        Command::Upload(args) => upload(config, transport, args).await,
        Command::Status { upload_id } => status(config, transport, &upload_id).await,
    }
}

async fn upload(mut config: Config, transport: Arc<HttpTransport>, args: UploadArgs) -> anyhow::Result<()> {
    args.apply(&mut config.uploader);

    let mut uploader = ChunkedUploader::new(config.uploader, transport).with_observer(Arc::new(LogObserver));
    if let Some(upload_id) = args.upload_id {
        uploader = uploader.with_upload_id(upload_id);
    }
    tracing::info!(upload_id = %uploader.upload_id(), file = %args.file.display(), "uploading");

    let response = tokio::select! {
        result = uploader.upload_path(&args.file) => result?,
        Ok(()) = tokio::signal::ctrl_c() => {
            uploader.abort();
            anyhow::bail!("interrupted, upload {} aborted", uploader.upload_id());
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn status(config: Config, transport: Arc<HttpTransport>, upload_id: &str) -> anyhow::Result<()> {
    let status = check_status(transport.as_ref(), upload_id, &config.uploader.endpoints.status).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn upload_flags_override_config() {
        let cli = Cli::try_parse_from([
            "castup",
            "upload",
            "episode.mp3",
            "--chunk-size",
            "1048576",
            "--concurrency",
            "5",
            "--upload-id",
            "upload_abc",
            "--base-url",
            "http://10.0.0.2:9000",
        ])
        .unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://10.0.0.2:9000"));

        let Command::Upload(args) = cli.command else {
            panic!("expected upload");
        };
        assert_eq!(args.file, PathBuf::from("episode.mp3"));
        assert_eq!(args.upload_id.as_deref(), Some("upload_abc"));

        let mut config = UploaderConfig::default();
        args.apply(&mut config);
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn status_takes_upload_id() {
        let cli = Cli::try_parse_from(["castup", "status", "upload_xyz", "--config", "/etc/castup.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/castup.toml")));
        assert!(matches!(cli.command, Command::Status { upload_id } if upload_id == "upload_xyz"));
    }

    #[test]
    fn upload_requires_file() {
        assert!(Cli::try_parse_from(["castup", "upload"]).is_err());
    }
}
