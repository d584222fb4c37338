//! Classification and full-pipeline commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use dlproc::config::Config;
use dlproc::ingestion::TriageClassifier;
use dlproc::model::{build_model, ModelRole};
use dlproc::pipeline::{
    BatchRunner, MemorySink, Orchestrator, PipelineEvent, RecordSink, RetryPolicy,
};
use dlproc::storage::FsStore;

use crate::cli::helpers::{load_document, load_taxonomy, print_unavailable, truncate};

/// Triage a single document and print the classification as JSON.
pub async fn cmd_classify(config: &Config, file: &Path) -> anyhow::Result<()> {
    let taxonomy = load_taxonomy(config).await?;
    let model = build_model(&config.model, ModelRole::Triage);
    if !model.is_available() {
        print_unavailable(&model.availability_hint());
        std::process::exit(1);
    }

    let input = load_document(file).await?;
    let classifier = TriageClassifier::new(taxonomy.clone(), model);
    let retry = RetryPolicy::new(
        config.pipeline.max_attempts,
        config.pipeline.retry_backoff_ms,
    );

    println!(
        "{} Classifying {} with {}",
        style("→").cyan(),
        input.file_name,
        classifier.model_name()
    );

    let triage = retry
        .run("triage", || classifier.classify(&input.image))
        .await?;

    match taxonomy.resolve(&triage.lane_id, &triage.path_id) {
        Some((lane, path)) => println!(
            "{} {} / {}",
            style("✓").green(),
            style(&lane.name).bold(),
            path.name
        ),
        None => println!(
            "{} LANE {} / PATH '{}' is not in the taxonomy",
            style("!").yellow(),
            triage.lane_id,
            triage.path_id
        ),
    }
    println!("{}", serde_json::to_string_pretty(&triage)?);
    Ok(())
}

/// Run triage, transcription and persistence over a set of documents.
pub async fn cmd_process(
    config: &Config,
    data_dir: Option<&Path>,
    files: &[PathBuf],
    workers: Option<usize>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let taxonomy = load_taxonomy(config).await?;

    for role in [ModelRole::Triage, ModelRole::Analyst] {
        let model = build_model(&config.model, role);
        if !model.is_available() {
            print_unavailable(&model.availability_hint());
            std::process::exit(1);
        }
    }

    let mut inputs = Vec::with_capacity(files.len());
    for file in files {
        match load_document(file).await {
            Ok(input) => inputs.push(input),
            Err(e) => eprintln!("{} {:#}", style("✗").red(), e),
        }
    }
    if inputs.is_empty() {
        println!("{} No readable documents", style("!").yellow());
        return Ok(());
    }

    let sink: Arc<dyn RecordSink> = if dry_run {
        Arc::new(MemorySink::new())
    } else {
        let store = FsStore::new(config.data_dir_path(data_dir));
        println!(
            "{} Writing records to {}",
            style("→").dim(),
            store.root().display()
        );
        Arc::new(store)
    };

    let workers = workers.unwrap_or(config.pipeline.workers);
    let orchestrator = Arc::new(Orchestrator::from_config(taxonomy, config, sink));
    let runner = BatchRunner::new(orchestrator, workers);

    println!(
        "{} Processing {} documents with {} workers{}",
        style("→").cyan(),
        inputs.len(),
        runner.workers(),
        if dry_run { " (dry run)" } else { "" }
    );

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );

    let (event_tx, mut event_rx) = mpsc::channel::<PipelineEvent>(100);

    let progress = pb.clone();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                PipelineEvent::DocumentStarted { file_name, .. } => {
                    progress.set_message(truncate(&file_name, 40));
                }
                PipelineEvent::DocumentCompleted {
                    file_name,
                    lane_id,
                    path_id,
                    fields_found,
                    ..
                } => {
                    progress.println(format!(
                        "{} {} → {}/{} ({} fields)",
                        style("✓").green(),
                        file_name,
                        lane_id,
                        path_id,
                        fields_found
                    ));
                    progress.inc(1);
                }
                PipelineEvent::DocumentFailed {
                    file_name, error, ..
                } => {
                    progress.println(format!("{} {}: {}", style("✗").red(), file_name, error));
                    progress.inc(1);
                }
                PipelineEvent::BatchStarted { .. } | PipelineEvent::BatchCompleted { .. } => {}
            }
        }
    });

    let summary = runner.run(inputs, event_tx).await;

    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }
    pb.finish_and_clear();

    println!(
        "{} Processed {} documents: {} succeeded, {} failed",
        style("✓").green(),
        summary.total(),
        summary.succeeded,
        summary.failed
    );
    for (kind, count) in &summary.failures_by_kind {
        println!("  {} {} {}", style("!").yellow(), count, kind);
    }

    Ok(())
}
