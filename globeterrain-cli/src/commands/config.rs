//! Configuration inspection commands.
//!
//! Provides `config validate`, `config show` and `config path`. The
//! configuration file is an INI file with an `[engine]` section for
//! engine-wide settings and one section per elevation dataset.

use std::path::PathBuf;

use clap::Subcommand;
use globeterrain::app::ContextConfig;
use globeterrain::elevation::ElevationModelConfig;
use globeterrain::level::LevelSet;
use serde::Serialize;

use super::common::{emit, GlobalOptions};
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Check every dataset section and its level hierarchy
    Validate,

    /// Show the effective engine settings and datasets
    Show,

    /// Show the configuration file path
    Path,
}

#[derive(Debug, Serialize)]
struct EngineSummary {
    cache_root: PathBuf,
    memory_cache_bytes: u64,
    max_concurrent_fetches: usize,
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct DatasetSummary {
    section: String,
    provider: String,
    dataset_name: String,
    service_url: String,
    num_levels: usize,
    tile_size: (u32, u32),
    level_zero_tile_delta: (f64, f64),
    sector: [f64; 4],
    data_format: String,
    missing_data_signal: Option<f64>,
    missing_data_replacement: f64,
    network_retrieval: bool,
}

#[derive(Debug, Serialize)]
struct ConfigSummary {
    path: PathBuf,
    engine: EngineSummary,
    datasets: Vec<DatasetSummary>,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, options: &GlobalOptions) -> Result<(), CliError> {
    match command {
        ConfigCommands::Validate => run_validate(options),
        ConfigCommands::Show => run_show(options),
        ConfigCommands::Path => {
            println!("{}", options.config_path().display());
            Ok(())
        }
    }
}

fn run_validate(options: &GlobalOptions) -> Result<(), CliError> {
    let (_, datasets) = options.load_config()?;
    if datasets.is_empty() {
        return Err(CliError::Config(format!(
            "no elevation datasets configured in {}",
            options.config_path().display()
        )));
    }

    for dataset in &datasets {
        check_dataset(dataset)?;
        println!("[{}] ok ({} levels)", dataset.section, dataset.num_levels);
    }
    Ok(())
}

/// Loading already validated the section; this also builds its level set.
fn check_dataset(dataset: &ElevationModelConfig) -> Result<(), CliError> {
    LevelSet::new(&dataset.level_set_config())
        .map(|_| ())
        .map_err(|e| CliError::Config(format!("[{}] {}", dataset.section, e)))
}

fn run_show(options: &GlobalOptions) -> Result<(), CliError> {
    let (engine, datasets) = options.load_config()?;
    let summary = summarize(options.config_path(), &engine, &datasets);

    emit(options.json, &summary, |s| {
        println!("Configuration: {}", s.path.display());
        println!();
        println!("[engine]");
        println!("  cache_root             = {}", s.engine.cache_root.display());
        println!("  memory_cache_bytes     = {}", s.engine.memory_cache_bytes);
        println!("  max_concurrent_fetches = {}", s.engine.max_concurrent_fetches);
        if let Some(dir) = &s.engine.log_dir {
            println!("  log_dir                = {}", dir.display());
        }
        for d in &s.datasets {
            println!();
            println!("[{}] {} ({})", d.section, d.dataset_name, d.provider);
            if !d.service_url.is_empty() {
                println!("  service_url = {}", d.service_url);
            }
            println!(
                "  levels = {}, tile = {}x{}, level zero delta = {}x{}",
                d.num_levels,
                d.tile_size.0,
                d.tile_size.1,
                d.level_zero_tile_delta.0,
                d.level_zero_tile_delta.1
            );
            println!(
                "  sector = {}, {}, {}, {}",
                d.sector[0], d.sector[1], d.sector[2], d.sector[3]
            );
            let signal = d
                .missing_data_signal
                .map(|v| v.to_string())
                .unwrap_or_else(|| "none".to_string());
            println!(
                "  format = {}, missing data {} -> {}",
                d.data_format, signal, d.missing_data_replacement
            );
            if !d.network_retrieval {
                println!("  network retrieval disabled");
            }
        }
    })
}

fn summarize(
    path: PathBuf,
    engine: &ContextConfig,
    datasets: &[ElevationModelConfig],
) -> ConfigSummary {
    ConfigSummary {
        path,
        engine: EngineSummary {
            cache_root: engine.cache_root.clone(),
            memory_cache_bytes: engine.memory_cache_bytes,
            max_concurrent_fetches: engine.max_concurrent_fetches,
            log_dir: engine.log_dir.clone(),
        },
        datasets: datasets
            .iter()
            .map(|d| DatasetSummary {
                section: d.section.clone(),
                provider: d.provider.to_string(),
                dataset_name: d.dataset_name.clone(),
                service_url: d.service_url.clone(),
                num_levels: d.num_levels,
                tile_size: (d.tile_width, d.tile_height),
                level_zero_tile_delta: d.level_zero_tile_delta,
                sector: [
                    d.sector.min_lat(),
                    d.sector.max_lat(),
                    d.sector.min_lon(),
                    d.sector.max_lon(),
                ],
                data_format: d.data_format.clone(),
                missing_data_signal: d.missing_data_signal,
                missing_data_replacement: d.missing_data_replacement,
                network_retrieval: d.network_retrieval,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use globeterrain::app::load_ini_str;

    const CONFIG: &str = "\
[engine]
cache_root = /tmp/globeterrain-test

[srtm]
provider = tiled
service_url = https://example.com/elev
dataset_name = SRTM30
cache_name = Earth/SRTM30
coordinate_system = EPSG:4326
num_levels = 4
level_zero_tile_delta = 20,20
tile_width = 150
tile_height = 150
";

    #[test]
    fn test_summary_lists_datasets() {
        let (engine, datasets) = load_ini_str(CONFIG).unwrap();
        let summary = summarize(PathBuf::from("test.ini"), &engine, &datasets);
        assert_eq!(summary.datasets.len(), 1);
        assert_eq!(summary.datasets[0].section, "srtm");
        assert_eq!(summary.datasets[0].num_levels, 4);
        assert_eq!(summary.datasets[0].tile_size, (150, 150));
        assert_eq!(
            summary.engine.cache_root,
            PathBuf::from("/tmp/globeterrain-test")
        );
    }

    #[test]
    fn test_check_dataset_accepts_valid_levels() {
        let (_, datasets) = load_ini_str(CONFIG).unwrap();
        assert!(check_dataset(&datasets[0]).is_ok());
    }
}
