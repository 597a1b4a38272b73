use std::{fs, path::Path, process};

use serde::Serialize;
use thiserror::Error;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use wpp_widget::{
    application::{
        defaults::DefaultsProvider,
        normalize::{Normalizer, PayloadOrigin, RawInstance},
    },
    cache::{Fingerprint, derive_key},
    config::{self, Command, FingerprintArgs, NormalizeArgs, ServePlan, Settings},
    infra::{error::InfraError, telemetry},
};
use wpp_widget_types::WidgetConfig;

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct NormalizedOutput<'a> {
    fingerprint: &'a Fingerprint,
    serve: ServePlan,
    config: &'a WidgetConfig,
}

fn main() {
    if let Err(error) = run() {
        report_error(&error);
        process::exit(1);
    }
}

fn report_error(error: &CliError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "wpp failed");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "wpp failed");
    });
}

fn run() -> Result<(), CliError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let normalizer = Normalizer::default();
    let defaults = load_defaults(&settings, &normalizer)?;

    match cli_args.command {
        Command::Normalize(args) => {
            run_normalize(&normalizer, &defaults, settings.serve_plan(), &args)
        }
        Command::Fingerprint(args) => run_fingerprint(&normalizer, &defaults, &args),
        Command::Defaults => print_json(&defaults),
    }
}

fn run_normalize(
    normalizer: &Normalizer,
    defaults: &WidgetConfig,
    serve: ServePlan,
    args: &NormalizeArgs,
) -> Result<(), CliError> {
    let origin = if args.form {
        PayloadOrigin::Form
    } else {
        PayloadOrigin::Stored
    };
    let raw = read_instance(&args.input, origin)?;

    let previous = match args.previous.as_deref() {
        Some(path) => {
            normalizer.resolve(&read_instance(path, PayloadOrigin::Stored)?, defaults)
        }
        None => defaults.clone(),
    };

    let config = normalizer.normalize(&raw, defaults, &previous);
    let fingerprint = derive_key(&config);
    info!(
        op = "normalize",
        fingerprint = fingerprint.short(),
        form = args.form,
        cache_active = serve.cache_active,
        "Normalized widget instance"
    );

    print_json(&NormalizedOutput {
        fingerprint: &fingerprint,
        serve,
        config: &config,
    })
}

fn run_fingerprint(
    normalizer: &Normalizer,
    defaults: &WidgetConfig,
    args: &FingerprintArgs,
) -> Result<(), CliError> {
    let raw = read_instance(&args.file, PayloadOrigin::Stored)?;
    let config = normalizer.resolve(&raw, defaults);
    println!("{}", derive_key(&config));
    Ok(())
}

fn load_defaults(settings: &Settings, normalizer: &Normalizer) -> Result<WidgetConfig, CliError> {
    let Some(path) = settings.defaults.file.as_deref() else {
        return Ok(WidgetConfig::default());
    };

    let raw = read_instance(path, PayloadOrigin::Stored)?;
    let provider = DefaultsProvider::from_instance(&raw, normalizer);
    info!(op = "defaults", path = %path.display(), "Loaded widget defaults");
    Ok(provider.snapshot().as_ref().clone())
}

fn read_instance(path: &Path, origin: PayloadOrigin) -> Result<RawInstance, InfraError> {
    let data = fs::read(path).map_err(|source| InfraError::read(path, source))?;
    let value = serde_json::from_slice(&data).map_err(|source| InfraError::decode(path, source))?;
    Ok(RawInstance::from_value(origin, value))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
