use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use upload_client::{ClientConfig, TransportKind, Uploader};

#[derive(Parser)]
#[command(name = "upload-cli")]
#[command(about = "Resumable chunked-file-upload client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the upload receiver.
    #[arg(long, env = "UPLOAD_CLIENT_BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// Use the raw-binary transport instead of multipart.
    #[arg(long)]
    binary: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file, waiting for it to complete.
    Put {
        path: PathBuf,
        /// Name reported to the server; defaults to the file's own name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Reattach to sessions remembered by the refresh bridge and resume them.
    Reattach { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    config.base_url = cli.base_url;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid client configuration: {e}"))?;

    let transport = if cli.binary {
        TransportKind::Binary
    } else {
        TransportKind::Multipart
    };
    let (uploader, mut events) = Uploader::new(config, transport)?;

    tokio::spawn(async move {
        while let Some((session_id, event)) = events.recv().await {
            tracing::info!(session_id = %session_id, event = ?event, "upload event");
        }
    });

    match cli.command {
        Commands::Put { path, name } => {
            let file_name = name.or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            });
            let session_id = uploader.upload_file(path, file_name).await?;
            println!("session id: {session_id}");
        }
        Commands::Reattach { path } => {
            let reattached = uploader.reattach(path).await?;
            for id in reattached {
                println!("reattached: {id}");
            }
        }
    }

    Ok(())
}
