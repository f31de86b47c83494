use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use dstage_classifiers::config::{ClassLabels, RenderOptions};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DashboardConfig {
    pub version: String,
    pub model_path: String,
    pub host: String,
    pub port: u16,
    pub force_plot_height: u32,
    pub class_labels: ClassLabels,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            version: clap::crate_version!().to_string(),
            model_path: String::from("xgb_model.json"),
            host: String::from("127.0.0.1"),
            port: 8501,
            force_plot_height: 300,
            class_labels: ClassLabels::default(),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config, keeping the default for every missing or invalid field.
    pub fn from_file(config_path: &Path) -> Result<Self> {
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let partial: serde_json::Value = serde_json::from_str(&config_json)
            .with_context(|| format!("Config file is not valid JSON: {:?}", config_path))?;
        let mut config = DashboardConfig::default();

        macro_rules! load_or_default {
            ($field:ident) => {
                if let Some(val) = partial.get(stringify!($field)) {
                    if let Ok(parsed) = serde_json::from_value(val.clone()) {
                        config.$field = parsed;
                    } else {
                        log::warn!(
                            "Config Invalid value for '{}', using default: {:?}",
                            stringify!($field), config.$field
                        );
                    }
                } else {
                    log::warn!(
                        "Config Missing field '{}', using default: {:?}",
                        stringify!($field), config.$field
                    );
                }
            };
        }

        load_or_default!(model_path);
        load_or_default!(host);
        load_or_default!(port);
        load_or_default!(force_plot_height);
        load_or_default!(class_labels);

        Ok(config)
    }

    /// Load the optional config file, then apply command line overrides.
    pub fn from_arguments(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => DashboardConfig::default(),
        };

        // Apply CLI overrides
        if let Some(model_path) = matches.try_get_one::<PathBuf>("model_path").ok().flatten() {
            config.model_path = model_path.to_string_lossy().into_owned();
        }
        if let Some(host) = matches.try_get_one::<String>("host").ok().flatten() {
            config.host = host.clone();
        }
        if let Some(port) = matches.try_get_one::<u16>("port").ok().flatten() {
            config.port = *port;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_path.trim().is_empty() {
            anyhow::bail!("model_path must not be empty");
        }
        if self.force_plot_height == 0 {
            anyhow::bail!("force_plot_height must be greater than zero");
        }
        if self.class_labels.len() < 2 {
            anyhow::bail!(
                "class_labels needs a label for both classes, got {:?}",
                self.class_labels
            );
        }
        Ok(())
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            force_plot_height: self.force_plot_height,
            class_labels: self.class_labels.clone(),
            ..RenderOptions::default()
        }
    }
}
