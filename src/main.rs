use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, error, info};

use mail_triage::classify::{ClassifierConfig, HttpClassifier, IntentClassifier};
use mail_triage::config::{self, ImapConfig, RunMode};
use mail_triage::extract::TextExtractor;
use mail_triage::message::MessageSource;
use mail_triage::normalize::ContentNormalizer;
use mail_triage::pipeline::IntakePipeline;
use mail_triage::sink::JsonStdoutSink;
use mail_triage::source::ImapSource;
use mail_triage::taxonomy::{self, RequestTaxonomy, TaxonomyRouter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let classifier_config = ClassifierConfig::from_env()?;

    let imap_config = ImapConfig::from_env().context(
        "TRIAGE_IMAP_HOST not set\n  export TRIAGE_IMAP_HOST=imap.example.com",
    )?;

    // Taxonomy + team routing: JSON file when configured, built-ins otherwise
    let (taxonomy, router) = match config::taxonomy_path_from_env() {
        Some(path) => {
            let pair = taxonomy::load_from_file(&path)
                .with_context(|| format!("Failed to load taxonomy from {}", path.display()))?;
            eprintln!("   Taxonomy: {}", path.display());
            pair
        }
        None => (RequestTaxonomy::default(), TaxonomyRouter::default()),
    };
    router.check_consistency(&taxonomy);

    let run_mode = RunMode::from_env();

    eprintln!("📬 Mail Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Classifier: {} via {}", classifier_config.model, classifier_config.endpoint);
    eprintln!(
        "   IMAP: {}:{} folder {}",
        imap_config.host, imap_config.port, imap_config.folder
    );
    eprintln!("   Request types: {}", taxonomy.len());
    eprintln!(
        "   Mode: {}\n",
        match run_mode {
            RunMode::Once => "one-shot".to_string(),
            RunMode::Poll => format!("poll every {}s", imap_config.poll_interval_secs),
        }
    );

    let transport = Arc::new(HttpClassifier::new(&classifier_config)?);
    let pipeline = IntakePipeline::new(
        ContentNormalizer::new(Arc::new(TextExtractor::new())),
        IntentClassifier::new(transport),
        taxonomy,
        router,
        Arc::new(JsonStdoutSink),
        classifier_config.max_inflight,
    );
    let source = ImapSource::new(imap_config.clone());

    match run_mode {
        RunMode::Once => run_cycle(&source, &pipeline).await,
        RunMode::Poll => {
            let mut tick =
                tokio::time::interval(Duration::from_secs(imap_config.poll_interval_secs));
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutting down");
                        break;
                    }
                    _ = tick.tick() => {
                        run_cycle(&source, &pipeline).await;
                    }
                }
            }
        }
    }

    Ok(())
}

/// One fetch-and-process cycle. Fetch failures are logged and the next
/// tick retries; per-message failures are contained inside the batch.
async fn run_cycle(source: &ImapSource, pipeline: &IntakePipeline) {
    match source.list_unprocessed().await {
        Ok(messages) if messages.is_empty() => {
            debug!("No new messages");
        }
        Ok(messages) => {
            let fetched = messages.len();
            let routed = pipeline.process_batch(messages).await;
            info!(fetched, routed = routed.len(), "Cycle complete");
        }
        Err(e) => {
            error!(error = %e, "Failed to fetch messages");
        }
    }
}
