//! Enroll command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use qrcert_core::{FileReferenceStore, ReferenceStore};
use tracing::info;

/// Execute the enroll command.
pub async fn execute(image: PathBuf, reference: PathBuf, quiet: bool) -> Result<()> {
    let content = tokio::fs::read(&image)
        .await
        .with_context(|| format!("Failed to read file: {}", image.display()))?;

    let store = FileReferenceStore::new(&reference);
    let previous = store.load().await.ok().flatten();
    let digest = qrcert_core::enroll(&store, &content)
        .await
        .with_context(|| format!("Failed to write reference: {}", reference.display()))?;

    info!(
        image = %image.display(),
        reference = %reference.display(),
        digest = %digest,
        "Reference enrolled"
    );

    if !quiet {
        println!("{} {}", "Enrolled".green().bold(), image.display());
        println!("   {} {}", "Digest:".dimmed(), digest);
        println!("   {} {}", "Reference:".dimmed(), reference.display());
        if previous.is_some_and(|p| p != digest) {
            println!("   {}", "Replaced previously enrolled reference".yellow());
        }
    }
    Ok(())
}
