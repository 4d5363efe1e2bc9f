// twostream-cli/src/config.rs
//
// Resolves the effective core configuration for a command: defaults, then an
// optional JSON file, then explicit command-line flags.

use anyhow::{Context, Result};
use log::debug;
use twostream_core::{CoreConfig, CoreConfigBuilder, Modality};

use crate::cli::ConfigOverrides;

pub fn resolve_core_config(overrides: &ConfigOverrides) -> Result<CoreConfig> {
    let base = match &overrides.config {
        Some(path) => CoreConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?,
        None => CoreConfig::default(),
    };

    let mut builder = CoreConfigBuilder::from_config(base);
    if let Some(window) = overrides.window {
        builder = builder.window(window);
    }
    if let Some(num_samples) = overrides.num_samples {
        builder = builder.num_samples(num_samples);
    }
    if let Some(modality) = &overrides.modality {
        let modality: Modality = modality.parse()?;
        builder = builder.modality(modality);
    }
    if let Some(batch_size) = overrides.batch_size {
        builder = builder.batch_size(batch_size);
    }
    if let Some(workers) = overrides.workers {
        builder = builder.workers(workers);
    }
    if let Some(top_k) = overrides.top_k {
        builder = builder.top_k(top_k);
    }
    if let Some(num_classes) = overrides.num_classes {
        builder = builder.num_classes(num_classes);
    }

    let config = builder.build();
    config.validate()?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}
