//! Configuration and provider readiness report.

use console::style;

use dlproc::config::Config;
use dlproc::model::{build_model, ModelRole};

use crate::cli::helpers::load_taxonomy;

/// Show the effective configuration and whether each model role is usable.
pub async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    println!("\n{}", style("Configuration").bold());
    println!("{}", "-".repeat(60));

    match config.source_path {
        Some(ref path) => println!("  {:<18} {}", "Config file:", path.display()),
        None => println!("  {:<18} {}", "Config file:", style("(defaults)").dim()),
    }
    println!("  {:<18} {}", "Provider:", config.model.provider.as_str());
    println!("  {:<18} {}", "Endpoint:", config.model.effective_endpoint());
    println!(
        "  {:<18} {}",
        "API key:",
        if config.model.api_key.is_some() {
            style("set").green()
        } else {
            style("not set").yellow()
        }
    );
    println!("  {:<18} {}", "Data dir:", config.data_dir_path(None).display());
    println!(
        "  {:<18} {} workers, {} attempt(s)",
        "Pipeline:", config.pipeline.workers, config.pipeline.max_attempts
    );

    let taxonomy = load_taxonomy(config).await?;
    println!(
        "  {:<18} {} lanes, {} paths{}",
        "Taxonomy:",
        taxonomy.lanes().len(),
        taxonomy.path_count(),
        if config.taxonomy.is_some() {
            ""
        } else {
            " (built-in)"
        }
    );

    println!("\n{}", style("Models").bold());
    println!("{}", "-".repeat(60));

    let mut all_ready = true;
    for role in [ModelRole::Triage, ModelRole::Analyst] {
        let model = build_model(&config.model, role);
        if model.is_available() {
            println!(
                "  {} {:<8} {}",
                style("✓").green(),
                role.as_str(),
                model.name()
            );
        } else {
            all_ready = false;
            println!(
                "  {} {:<8} {}",
                style("✗").red(),
                role.as_str(),
                model.name()
            );
            for line in model.availability_hint().lines() {
                println!("      {}", style(line).dim());
            }
        }
    }

    if !all_ready {
        std::process::exit(1);
    }
    Ok(())
}
