use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{config, DetectionController, SubmissionState};
use shared::domain::{ResourceHandle, Submission};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "greenwash-cli",
    about = "Submit a sustainability claim to the greenwash detector service"
)]
struct Args {
    /// Override the configured backend URL.
    #[arg(long)]
    backend_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a typed claim.
    Text { claim: String },
    /// Classify a PDF document.
    File { path: PathBuf },
    /// Classify an image of a claim.
    Image { path: PathBuf },
    /// Check that the detector service is up.
    Health,
}

fn handle_for(path: &PathBuf) -> Result<ResourceHandle> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("'{}' has no usable file name", path.display()))?
        .to_string();
    Ok(ResourceHandle {
        uri: path.display().to_string(),
        name,
        mime_type: None,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(url) = args.backend_url {
        settings.backend_url = url;
    }
    let controller = DetectionController::new(settings)?;

    let submission = match args.command {
        Command::Health => {
            let health = controller.health().await?;
            println!("{}: {}", health.service, health.status);
            return Ok(());
        }
        Command::Text { claim } => Submission::Text(claim),
        Command::File { path } => Submission::Document(handle_for(&path)?),
        Command::Image { path } => Submission::Image(handle_for(&path)?),
    };

    let modality = submission.modality();
    info!(?modality, "submitting claim");
    match controller.submit(submission).await {
        SubmissionState::Succeeded(result) => {
            print!("{}", result.render_summary());
            Ok(())
        }
        SubmissionState::Failed { message } => bail!(message),
        state => bail!("submission did not settle: {state:?}"),
    }
}
