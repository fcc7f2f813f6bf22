//! Verify command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use qrcert_core::{
    AllowList, FeatureSchema, FileReferenceStore, HttpResolver, HttpResolverConfig, ModelBundle,
    ShortenerList, Verdict, VerdictKind, VerificationPipeline,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A verdict other than `real`, surfaced as an error so the process exits non-zero.
#[derive(Debug, thiserror::Error)]
#[error("Verification failed: {}", .0.description())]
pub struct VerdictFailure(pub VerdictKind);

/// Options for the verify command.
pub struct VerifyOptions {
    pub reference: PathBuf,
    pub model: PathBuf,
    pub schema: String,
    pub allow: Vec<String>,
    pub shorteners: Vec<String>,
    pub timeout_secs: u64,
    pub json: bool,
    pub quiet: bool,
}

/// Execute the verify command.
pub async fn execute(image: PathBuf, options: VerifyOptions) -> Result<()> {
    let pipeline = build_pipeline(&options)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling verification");
            on_interrupt.cancel();
        }
    });

    let verdict = pipeline
        .verify_path(&image, &cancel)
        .await
        .with_context(|| format!("Failed to verify {}", image.display()))?;

    info!(image = %image.display(), verdict = %verdict.kind, "Verification complete");

    if options.json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else if !options.quiet {
        print_verdict(&verdict);
    }

    match verdict.kind {
        VerdictKind::Real => Ok(()),
        kind => Err(VerdictFailure(kind).into()),
    }
}

fn build_pipeline(options: &VerifyOptions) -> Result<VerificationPipeline> {
    let schema = FeatureSchema::from_name_or_path(&options.schema)
        .with_context(|| format!("Invalid feature schema: {}", options.schema))?;
    let model = ModelBundle::load(&options.model, &schema)
        .with_context(|| format!("Failed to load model: {}", options.model.display()))?;
    debug!(model = %options.model.display(), schema = %schema.version, "Model loaded");

    let resolver = HttpResolver::with_config(HttpResolverConfig {
        timeout: Duration::from_secs(options.timeout_secs),
        ..Default::default()
    })?;
    let shorteners = if options.shorteners.is_empty() {
        ShortenerList::default()
    } else {
        ShortenerList::new(&options.shorteners)
    };

    let pipeline = VerificationPipeline::builder(
        Arc::new(FileReferenceStore::new(&options.reference)),
        model.classifier(),
    )
    .resolver(Arc::new(resolver))
    .shorteners(shorteners)
    .allow_list(AllowList::new(options.allow.iter().cloned()))
    .build()?;
    Ok(pipeline)
}

fn print_verdict(verdict: &Verdict) {
    let title = match verdict.kind {
        VerdictKind::Real => "REAL",
        VerdictKind::Fake => "FAKE",
        VerdictKind::Tampered => "TAMPERED",
        VerdictKind::Unverifiable => "UNVERIFIABLE",
        VerdictKind::NoQrFound => "NO QR FOUND",
        VerdictKind::ResolutionFailed => "RESOLUTION FAILED",
    };
    let paint = |s: &str| -> ColoredString {
        match verdict.kind {
            VerdictKind::Real => s.green(),
            VerdictKind::Fake | VerdictKind::Tampered => s.red(),
            _ => s.yellow(),
        }
    };

    println!();
    println!("{}", paint("╔════════════════════════════════════════╗"));
    println!("{}", paint(&format!("║{:^40}║", title)).bold());
    println!("{}", paint("╚════════════════════════════════════════╝"));
    println!();
    println!("   {} {}", "Result:".dimmed(), verdict.kind.description());
    if let Some(url) = &verdict.url {
        println!("   {} {}", "QR URL:".dimmed(), url);
    }
    if let Some(resolved) = &verdict.resolved_url {
        if verdict.url.as_ref() != Some(resolved) {
            println!("   {} {}", "Resolved:".dimmed(), resolved);
        }
    }
}
