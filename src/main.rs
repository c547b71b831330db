use std::env;

use anyhow::Context;
use convnets::config::RunConfig;
use log::info;

const CONFIG_ENV: &str = "CONVNETS_CONFIG";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_ENV).ok())
        .with_context(|| format!("usage: convnets <config.json>, or set {CONFIG_ENV}"))?;

    info!("loading run config from {path}");
    let config = RunConfig::from_file(&path)?;
    let report = convnets::run(&config)?;

    match report.accuracy {
        Some(accuracy) => println!(
            "{} samples - loss: {:.4} - accuracy: {accuracy:.4}",
            report.samples, report.loss
        ),
        None => println!("{} samples - loss: {:.4}", report.samples, report.loss),
    }

    Ok(())
}
