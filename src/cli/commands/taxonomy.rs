//! Taxonomy listing commands.

use console::style;

use dlproc::config::Config;

use crate::cli::helpers::{load_taxonomy, truncate};

/// List lanes and their paths, grouped for display.
pub async fn cmd_lanes(config: &Config) -> anyhow::Result<()> {
    let taxonomy = load_taxonomy(config).await?;

    for group in taxonomy.groups() {
        println!("\n{}", style(group).bold());
        println!("{}", "-".repeat(72));

        for lane in taxonomy.lanes().iter().filter(|l| l.group == group) {
            println!("{} {}", style(format!("LANE {}", lane.id)).cyan(), lane.name);
            for path in &lane.paths {
                println!(
                    "  {:<22} {:<28} {} fields",
                    path.id,
                    truncate(&path.name, 27),
                    path.extraction_schema.len()
                );
            }
        }
    }

    println!(
        "\n{} {} lanes, {} paths",
        style("→").dim(),
        taxonomy.lanes().len(),
        taxonomy.path_count()
    );
    Ok(())
}

/// Print the extraction schema for one path as JSON.
pub async fn cmd_schema(config: &Config, lane_id: &str, path_id: &str) -> anyhow::Result<()> {
    let taxonomy = load_taxonomy(config).await?;

    let Some((lane, path)) = taxonomy.resolve(lane_id, path_id) else {
        eprintln!(
            "{} No path '{}' in lane {}. Run 'dlp lanes' to list categories.",
            style("✗").red(),
            path_id,
            lane_id
        );
        std::process::exit(1);
    };

    println!(
        "{} {} / {}",
        style("→").cyan(),
        style(&lane.name).bold(),
        path.name
    );
    println!("  {}", style(&path.description).dim());
    println!("{}", path.extraction_schema.to_prompt_json());
    Ok(())
}
