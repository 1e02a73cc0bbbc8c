//! hvc - Main Entry Point

use anyhow::Context;
use clap::Parser;
use pipeline::cli::{Cli, Command};
use pipeline::{init_logging, Config, Pipeline};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.level()?, cli.log_json)?;

    info!("=== HVC v{} ===", env!("CARGO_PKG_VERSION"));

    let path = cli.command.config_path();
    let config = Config::load(path)
        .with_context(|| format!("loading config {}", path.display()))?;
    let pipeline = Pipeline::new();
    let section = |name: &str| format!("{} has no '{}' section", path.display(), name);

    match &cli.command {
        Command::Extract { .. } => {
            let extract = config.extract.as_ref().with_context(|| section("extract"))?;
            let out = pipeline.extract(extract).await?;
            info!("Feature file: {}", out.feature_file_path.display());
        }
        Command::Select { .. } => {
            let select = config.select.as_ref().with_context(|| section("select"))?;
            let out = pipeline.select(select).await?;
            for model in &out.summary.models {
                info!(
                    "Config {} ({}): test accuracy {:.3}, saved to {}",
                    model.config_index,
                    model.kind,
                    model.test_accuracy,
                    model.path.display()
                );
            }
            info!("Summary: {}", out.summary_path.display());
        }
        Command::Predict { .. } => {
            let predict = config.predict.as_ref().with_context(|| section("predict"))?;
            let out = pipeline.predict(predict).await?;
            info!("Predictions: {}", out.csv_path.display());
        }
        Command::Run { .. } => pipeline.run(&config).await?,
    }

    info!("Done");
    Ok(())
}
