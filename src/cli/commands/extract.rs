//! Single-file extraction command.

use std::path::Path;

use console::style;

use crate::config::Settings;
use crate::outcome::Outcome;
use crate::pipeline::Pipeline;
use crate::upload::UploadRequest;

/// Run the full pipeline on a local file and print the outcome.
///
/// Exits with status 1 when the outcome is a failure.
pub async fn cmd_extract(settings: &Settings, file: &Path, json: bool) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file).await?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string);

    let pipeline = Pipeline::new(settings)?;
    pipeline.store().ensure_dir().await?;

    tracing::info!(
        "Extracting {} with {}",
        file.display(),
        pipeline.backend().backend_type()
    );
    let outcome = pipeline.process(UploadRequest::new(bytes, filename)).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        match &outcome {
            Outcome::Success { .. } => println!("{}", outcome.display_text()),
            Outcome::Failure { kind, message } => {
                eprintln!("{} {}: {}", style("✗").red(), kind, message);
            }
        }
    }

    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
