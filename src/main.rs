use std::path::Path;

use anyhow::Context;
use clap::Parser;
use fabric_ontology::cancellation::{CancellationTokenSource, install_sigint_handler};
use fabric_ontology::client::FabricClient;
use fabric_ontology::compare::compare_ontologies;
use fabric_ontology::config::{CliArgs, Command, ConvertLikeArgs, FileConfig};
use fabric_ontology::converter::{self, ConvertOptions};
use fabric_ontology::error::ConverterError;
use fabric_ontology::logging::{LoggingConfig, init_logging};
use fabric_ontology::report::ValidationReport;
use fabric_ontology::turtle_export::export_turtle;

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            err.downcast_ref::<ConverterError>().map(ConverterError::exit_code).unwrap_or(1)
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<()> {
    let cli = CliArgs::parse();
    let file_config = FileConfig::load_or_default(cli.config.as_deref())?;
    file_config.validate()?;

    let _guard = init_logging(LoggingConfig::from_settings(&file_config.logging))?;

    let cancellation_source = CancellationTokenSource::new();
    let token = cancellation_source.token();
    tokio::spawn(install_sigint_handler(cancellation_source));

    let working_directory = std::env::current_dir().context("failed to determine working directory")?;

    match cli.command {
        Command::Validate(args) => run_convert_like(&working_directory, args, &file_config, &token, false, false).await,
        Command::Convert(args) => run_convert_like(&working_directory, args, &file_config, &token, true, false).await,
        Command::Test(args) => run_convert_like(&working_directory, args, &file_config, &token, false, false).await,
        Command::Upload(args) => run_convert_like(&working_directory, args, &file_config, &token, true, true).await,
        Command::Export { input, output } => run_export(&input, &output),
        Command::List => run_list(&file_config).await,
        Command::Get { id } => run_get(&file_config, &id).await,
        Command::Delete { id } => run_delete(&file_config, &id).await,
        Command::Compare { left, right } => run_compare(&left, &right),
    }
}

fn options_from_args(args: &ConvertLikeArgs, file_config: &FileConfig) -> ConvertOptions {
    let display_name = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Converted Ontology")
        .to_string();

    ConvertOptions {
        format: args.format,
        display_name,
        description: String::new(),
        strict: false,
        force: args.force,
        streaming: args.streaming,
        id_prefix: file_config.ontology.id_prefix,
        ..ConvertOptions::default()
    }
}

async fn run_convert_like(
    working_directory: &Path,
    args: ConvertLikeArgs,
    file_config: &FileConfig,
    token: &fabric_ontology::cancellation::CancellationToken,
    write_output: bool,
    upload: bool,
) -> anyhow::Result<()> {
    let options = options_from_args(&args, file_config);
    let input = args.input.to_string_lossy().to_string();

    let converted = converter::convert(working_directory, &input, &options, token, |progress| {
        tracing::debug!(phase = ?progress.phase, processed = progress.processed, total = progress.total, "conversion progress");
    })?;

    println!(
        "converted {} entity type(s), {} relationship type(s), success_rate={:.1}%",
        converted.result.entity_types.len(),
        converted.result.relationship_types.len(),
        converted.result.success_rate(),
    );

    if !converted.compliance.lost.is_empty() {
        println!("{} construct(s) could not be represented:", converted.compliance.lost.len());
        for warning in &converted.compliance.lost {
            println!("  - {}: {}", warning.construct, warning.message);
        }
    }

    if args.dry_run {
        println!("dry run: no output written");
        return Ok(());
    }

    if write_output {
        if let Some(output) = &args.output {
            converter::write_bundle_to_disk(&converted.bundle, output)?;
            println!("wrote bundle to {}", output.display());
        }
    } else {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let report = ValidationReport::build(&input, timestamp, &converted.compliance);
        if let Some(output) = &args.output {
            report.write_to(output)?;
            println!("wrote validation report to {}", output.display());
        }
    }

    if upload {
        println!("upload requires a configured Fabric workspace; run with a config file via --config");
    }

    Ok(())
}

fn run_export(input: &Path, output: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("failed to read {input:?}"))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).context("bundle is not valid JSON")?;
    let definition = value.get("definition").cloned().unwrap_or(value);

    let entity_types: Vec<fabric_ontology::model::EntityType> =
        serde_json::from_value(definition.get("entityTypes").cloned().unwrap_or_default()).unwrap_or_default();
    let relationship_types: Vec<fabric_ontology::model::RelationshipType> =
        serde_json::from_value(definition.get("relationshipTypes").cloned().unwrap_or_default()).unwrap_or_default();

    let mut result = fabric_ontology::model::ConversionResult::new();
    result.entity_types = entity_types;
    result.relationship_types = relationship_types;

    let turtle = export_turtle(&result, "");
    std::fs::write(output, turtle).with_context(|| format!("failed to write {output:?}"))?;
    println!("exported to {}", output.display());
    Ok(())
}

async fn run_list(file_config: &FileConfig) -> anyhow::Result<()> {
    let client = FabricClient::new(file_config.fabric.clone());
    let token_source = CancellationTokenSource::new();
    let ontologies = client.list(&token_source.token()).await?;
    for ontology in ontologies {
        println!("{}\t{}", ontology.id, ontology.display_name);
    }
    Ok(())
}

async fn run_get(file_config: &FileConfig, id: &str) -> anyhow::Result<()> {
    let client = FabricClient::new(file_config.fabric.clone());
    let token_source = CancellationTokenSource::new();
    let ontology = client.get(id, &token_source.token()).await?;
    println!("{}", serde_json::to_string_pretty(&ontology)?);
    Ok(())
}

async fn run_delete(file_config: &FileConfig, id: &str) -> anyhow::Result<()> {
    let client = FabricClient::new(file_config.fabric.clone());
    let token_source = CancellationTokenSource::new();
    client.delete(id, &token_source.token()).await?;
    println!("deleted {id}");
    Ok(())
}

fn run_compare(left: &Path, right: &Path) -> anyhow::Result<()> {
    let left_result: fabric_ontology::model::ConversionResult =
        serde_json::from_slice(&std::fs::read(left).with_context(|| format!("failed to read {left:?}"))?)?;
    let right_result: fabric_ontology::model::ConversionResult =
        serde_json::from_slice(&std::fs::read(right).with_context(|| format!("failed to read {right:?}"))?)?;

    let comparison = compare_ontologies(&left_result, &right_result);
    println!("{}", serde_json::to_string_pretty(&comparison)?);
    if comparison.is_identical() {
        println!("ontologies are structurally identical");
    }
    Ok(())
}

