//! The `analyze` command: load layers, add areas, run, report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aoi_map_analysis::{AnalysisConfig, CancelFlag};
use aoi_map_area_models::{AreaEntry, AreaType, area_name_from_path};
use aoi_map_cli_utils::{IndicatifProgress, MultiProgress};
use aoi_map_coordinator::{AreaCoordinator, DEFAULT_CAPACITY};
use aoi_map_layers::{catalog, load};
use aoi_map_report::{
    csv, project_layer_counts, project_layer_detail, project_overlaps, project_summary,
};
use clap::Args;
use futures::StreamExt as _;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Directory holding one `<layer key>.geojson` file per reference layer
    #[arg(long)]
    layers_dir: PathBuf,
    /// `GeoJSON` file with the area polygon. Repeat for several areas.
    #[arg(long = "area", required = true)]
    areas: Vec<PathBuf>,
    /// Analysis config TOML. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// How the clip area is derived (exact, core, `direct_influence`,
    /// `indirect_influence`)
    #[arg(long)]
    area_type: Option<AreaType>,
    /// Buffer radius in km for the core area type
    #[arg(long)]
    buffer_km: Option<f64>,
    /// Comma-separated list of layer keys to analyze (default: all loaded)
    #[arg(long)]
    layers: Option<String>,
    /// Re-analyze areas that already have results
    #[arg(long)]
    force: bool,
    /// Directory to write summary and per-layer CSV files into
    #[arg(long)]
    output: Option<PathBuf>,
}

pub async fn run(
    args: AnalyzeArgs,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&args).await?;

    let registry = load::load_directory(&args.layers_dir, catalog::all_definitions()).await?;
    if registry.is_empty() {
        log::warn!(
            "No reference layers found in {}; every area will report zero matches",
            args.layers_dir.display()
        );
    }

    let capacity = args.areas.len().max(DEFAULT_CAPACITY);
    let mut coordinator = AreaCoordinator::with_capacity(Arc::new(registry), capacity);

    for path in &args.areas {
        let json = tokio::fs::read_to_string(path).await?;
        let upload = load::parse_feature_collection(&json)?;
        coordinator.add_area(&upload, area_name_from_path(path))?;
    }

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, cancelling analysis...");
                cancel.cancel();
            }
        });
    }

    let progress = IndicatifProgress::percent_bar(multi, "Analyzing areas");
    let mut failures = 0_usize;
    {
        let outcomes = coordinator.analyze_all(&config, args.force, &progress, &cancel);
        let mut outcomes = std::pin::pin!(outcomes);
        while let Some(outcome) = outcomes.next().await {
            match &outcome.result {
                Ok(result) => log::info!(
                    "{}: {:.3} km², {} elements, population {}",
                    outcome.name,
                    result.metrics.area_km2,
                    result.metrics.total_elements,
                    result.metrics.total_population
                ),
                Err(e) => {
                    failures += 1;
                    log::error!("{}: {e}", outcome.name);
                }
            }
        }
    }
    progress.finish(&format!(
        "Analyzed {} areas ({failures} failed)",
        coordinator.len()
    ));

    print_summary(coordinator.list_areas());

    if let Some(output) = &args.output {
        write_reports(output, &coordinator).await?;
        println!("Reports written to {}", output.display());
    }

    Ok(())
}

async fn build_config(args: &AnalyzeArgs) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_toml_str(&tokio::fs::read_to_string(path).await?)?,
        None => AnalysisConfig::default(),
    };

    if let Some(area_type) = args.area_type {
        config.area_type = area_type;
    }
    if let Some(buffer_km) = args.buffer_km {
        config.buffer_km = Some(buffer_km);
    }
    if let Some(layers) = &args.layers {
        config = config.with_layers(
            layers
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty()),
        );
    }

    config.validate()?;
    Ok(config)
}

fn print_summary(entries: &[AreaEntry]) {
    let summary = project_summary(entries);

    println!();
    println!(
        "{:<24} {:>12} {:>12} {:>10} {:>12}",
        "AREA", "KM²", "POPULATION", "ELEMENTS", "DENSITY"
    );
    println!("{}", "-".repeat(74));
    for row in summary.rows.iter().chain(std::iter::once(&summary.total)) {
        println!(
            "{:<24} {:>12.3} {:>12} {:>10} {:>12.2}",
            row.name, row.area_km2, row.population, row.total_elements, row.population_density
        );
    }

    for entry in entries {
        if let Some(reason) = entry.failure() {
            println!("{}: failed ({reason})", entry.name());
        }
    }
}

async fn write_reports(
    output: &Path,
    coordinator: &AreaCoordinator,
) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(output).await?;
    let entries = coordinator.list_areas();
    let registry = coordinator.engine().registry();

    let mut buffer = Vec::new();
    csv::write_summary(&mut buffer, &project_summary(entries))?;
    tokio::fs::write(output.join("summary.csv"), &buffer).await?;

    let keys = registry.list_keys();
    let mut buffer = Vec::new();
    csv::write_matrix(&mut buffer, &project_layer_counts(entries, &keys))?;
    tokio::fs::write(output.join("layer_counts.csv"), &buffer).await?;

    let mut buffer = Vec::new();
    csv::write_matrix(&mut buffer, &project_overlaps(entries))?;
    tokio::fs::write(output.join("overlaps.csv"), &buffer).await?;

    for entry in entries {
        let Some(results) = entry.results() else {
            continue;
        };
        for result in results.iter().filter(|result| !result.features.is_empty()) {
            let table = project_layer_detail(entry, registry, &result.key)?;
            let mut buffer = Vec::new();
            csv::write_layer_detail(&mut buffer, &table)?;

            let file_name = format!("{}__{}.csv", file_stem(entry.name()), result.key);
            tokio::fs::write(output.join(file_name), &buffer).await?;
        }
    }

    Ok(())
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
