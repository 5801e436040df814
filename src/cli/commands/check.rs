//! Backend availability check.

use console::style;

use crate::config::{BackendConfig, Settings};
use crate::ocr::create_backend;
use crate::utils::format_size;

/// Report whether the configured backend can run.
pub async fn cmd_check(settings: &Settings) -> anyhow::Result<()> {
    println!("\n{}", style("OCR Backend Status").bold());
    println!("{}", "-".repeat(50));

    let backend = match create_backend(&settings.backend) {
        Ok(backend) => backend,
        Err(e) => {
            println!(
                "  {:<15} {}",
                settings.backend.backend_type(),
                style(format!("✗ {}", e)).red()
            );
            std::process::exit(1);
        }
    };

    let available = backend.is_available();
    let status = if available {
        style("✓ available").green()
    } else {
        style("✗ not available").red()
    };
    println!("  {:<15} {}", backend.backend_type(), status);
    if !available {
        println!("                  {}", style(backend.availability_hint()).dim());
    }

    match &settings.backend {
        BackendConfig::Tesseract(config) => {
            println!("  {:<15} {}", "Binary", config.binary.display());
            println!("  {:<15} {}", "DPI", config.dpi);
            if let Some(lang) = &config.language {
                println!("  {:<15} {}", "Language", lang);
            }
            if let Some(psm) = config.psm {
                println!("  {:<15} {}", "PSM", psm);
            }
        }
        BackendConfig::Vision(config) => {
            println!("  {:<15} {}", "Endpoint", config.endpoint);
            println!("  {:<15} {:?}", "Credential", config.credential);
        }
    }

    println!("\n{}", style("Uploads:").cyan());
    println!(
        "  {:<15} {}",
        "Max size",
        format_size(settings.upload.max_bytes)
    );
    let types: Vec<_> = settings.upload.allowed.iter().map(|t| t.mime()).collect();
    println!("  {:<15} {}", "Types", types.join(", "));
    println!(
        "  {:<15} {}",
        "Scratch dir",
        settings.scratch_dir.display()
    );
    println!();

    if !available {
        std::process::exit(1);
    }
    Ok(())
}
