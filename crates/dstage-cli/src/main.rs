use anyhow::Result;
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use dstage_classifiers::features::{FeatureVector, FEATURE_SPECS};
use dstage_cli::config::DashboardConfig;
use dstage_cli::dashboard;
use dstage_cli::predict::{run_predict, PredictOutputs};

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("DSTAGE_LOG", "error,dstage=info"))
        .init();

    let config_arg = Arg::new("config")
        .help("Path to dashboard JSON configuration file")
        .required(false)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath);
    let model_arg = Arg::new("model_path")
        .short('m')
        .long("model")
        .help("Path to the XGBoost model (*.json). Overrides model_path in the configuration file.")
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath);

    let matches = Command::new("dstage")
        .version(clap::crate_version!())
        .author("Justin Sing <justincsing@gmail.com>")
        .about("\u{1F9E0} dstage - Dementia stage prediction with SHAP explanations")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Serve the interactive prediction dashboard")
                .arg(config_arg.clone())
                .arg(model_arg.clone())
                .arg(
                    Arg::new("host")
                        .long("host")
                        .help("Address to bind. Overrides host in the configuration file.")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::Hostname),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .help("Port to listen on. Overrides port in the configuration file.")
                        .value_parser(clap::value_parser!(u16)),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Predict the dementia stage for one set of feature values")
                .arg(config_arg)
                .arg(model_arg)
                .arg(
                    Arg::new("education")
                        .long("education")
                        .help("Years of education (0-30, default 12)")
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(i32)),
                )
                .arg(
                    Arg::new("mmse")
                        .long("mmse")
                        .help("MMSE score (0-30, default 25)")
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(i32)),
                )
                .arg(
                    Arg::new("fdg")
                        .long("fdg")
                        .help("FDG SUVR score (-2.00 to 2.00, default 0.00)")
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("amyloid")
                        .long("amyloid")
                        .help("Amyloid SUVR score (-2.00 to 2.00, default 0.00)")
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help("Path to write the HTML report page")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("attributions")
                        .long("attributions")
                        .help("Path to write the SHAP values (*.csv or *.tsv)")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Written by {author-with-newline}Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("serve", serve_matches)) => handle_serve(serve_matches),
        Some(("predict", predict_matches)) => handle_predict(predict_matches),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn load_config(matches: &ArgMatches) -> Result<DashboardConfig> {
    let config_path = matches.get_one::<PathBuf>("config");
    match config_path {
        Some(path) => eprintln!("[dstage] Using config: {:?}", path),
        None => eprintln!("[dstage] No config provided; using defaults."),
    }
    let config = DashboardConfig::from_arguments(config_path, matches)?;
    if config_path.is_none() {
        let default_json = serde_json::to_string_pretty(&config).unwrap_or_default();
        eprintln!("[dstage] Default config:\n{}", default_json);
    }
    Ok(config)
}

fn handle_serve(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let runtime = tokio::runtime::Runtime::new()?;
    match runtime.block_on(dashboard::serve(config)) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Dashboard failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;

    let defaults = FeatureVector::default();
    let features = FeatureVector::new(
        matches.get_one::<i32>("education").copied().unwrap_or(defaults.education),
        matches.get_one::<i32>("mmse").copied().unwrap_or(defaults.mmse),
        matches.get_one::<f64>("fdg").copied().unwrap_or(defaults.fdg_suvr),
        matches.get_one::<f64>("amyloid").copied().unwrap_or(defaults.amyloid_suvr),
    );
    let features = match features {
        Ok(features) => features,
        Err(e) => {
            log::error!("Invalid input: {}", e);
            std::process::exit(1)
        }
    };
    log::info!(
        "[dstage] Predicting for {}",
        FEATURE_SPECS
            .iter()
            .zip(features.as_row())
            .map(|(spec, v)| format!("{}={}", spec.column, spec.format_value(v)))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let outputs = PredictOutputs {
        report: matches.get_one::<PathBuf>("output_file").cloned(),
        attributions: matches.get_one::<PathBuf>("attributions").cloned(),
    };
    let summary = match run_predict(&config, &features, &outputs) {
        Ok(summary) => summary,
        Err(e) => {
            log::error!("Prediction failed: {:#}", e);
            std::process::exit(1)
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if let Some(error) = summary.outcome.error() {
        log::error!("Prediction failed: {}", error.message);
        std::process::exit(1)
    }
    Ok(())
}
