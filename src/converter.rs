//! Format detection and the single `convert()` entry point (§3, §4).
//!
//! Dispatches an input path to the RDF, DTDL, or CDM extractor, then runs
//! the shared post-processing pipeline (compliance checking, quota/limit
//! validation, bundle serialization) that every format funnels through.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::cancellation::CancellationToken;
use crate::cdm::{self, CdmExtractOptions};
use crate::compliance::{self, ComplianceReport};
use crate::config::SourceFormat;
use crate::dtdl::{self, DtdlExtractOptions};
use crate::error::{ConverterError, LimitError};
use crate::idgen;
use crate::model::{Bundle, ConversionResult};
use crate::rdf;
use crate::serializer::serialize_bundle;
use crate::streaming::{StreamingOptions, StreamingPhase, StreamingProgress};
use crate::validation::{self, MemoryCheckOutcome, PathValidationOptions};

/// A fully-converted ontology: the raw extraction result, the compliance
/// report built from it, and the serialized bundle ready to upload or write
/// to disk.
#[derive(Debug, Clone)]
pub struct ConvertedOntology {
    pub result: ConversionResult,
    pub compliance: ComplianceReport,
    pub bundle: Bundle,
}

/// Options threaded through a single `convert()` call.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub format: SourceFormat,
    pub display_name: String,
    pub description: String,
    pub strict: bool,
    pub force: bool,
    pub streaming: bool,
    pub streaming_threshold_bytes: u64,
    pub chunk_size: usize,
    /// Seed for the opaque numeric entity/relationship IDs assigned after
    /// extraction (§3, §4.D); mirrors `ontology.id_prefix` in the config file.
    pub id_prefix: u64,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            format: SourceFormat::Auto,
            display_name: "Converted Ontology".to_string(),
            description: String::new(),
            strict: false,
            force: false,
            streaming: false,
            streaming_threshold_bytes: 100 * 1024 * 1024,
            chunk_size: 10_000,
            id_prefix: crate::config::OntologySettings::default().id_prefix,
        }
    }
}

fn detect_format(format: SourceFormat, path: &Path) -> SourceFormat {
    if !matches!(format, SourceFormat::Auto) {
        return format;
    }
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_lowercase();
    if name.ends_with(".cdm.json") || name.ends_with(".manifest.cdm.json") || name == "model.json" {
        SourceFormat::Cdm
    } else if name.ends_with(".json") || name.ends_with(".jsonld") {
        SourceFormat::Dtdl
    } else {
        SourceFormat::Rdf
    }
}

fn extract_rdf(bytes: &[u8], path: Option<&Path>) -> Result<ConversionResult, ConverterError> {
    let format = rdf::sniff_format(None, path);
    let store = rdf::load_store(bytes, format)?;
    Ok(rdf::extract(&store))
}

fn extract_dtdl(path: &Path, recursive: bool, options: &DtdlExtractOptions) -> Result<ConversionResult, ConverterError> {
    let documents = dtdl::load_documents(path, recursive)?;
    Ok(dtdl::extract(&documents, options))
}

fn extract_cdm(path: &Path, options: &CdmExtractOptions) -> Result<ConversionResult, ConverterError> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {path:?}"))?;
    let schema = cdm::load_entity_schema(&bytes)?;
    Ok(cdm::extract(&schema, options))
}

/// Run compliance checking and quota/limit validation on `result`, failing
/// hard in strict mode if anything was lost or a quota was exceeded.
fn check_and_report(result: &ConversionResult, strict: bool, force: bool) -> Result<ComplianceReport, ConverterError> {
    let report = ComplianceReport::build(result, &[], &compliance::owl_construct_support);
    compliance::enforce_strict_mode(&report, strict)?;

    let approx_size = serde_json::to_vec(result).map(|b| b.len()).unwrap_or(0);
    let quota_warnings = validation::check_quotas(result, approx_size, force)?;
    if strict && !quota_warnings.is_empty() {
        return Err(LimitError::CountExceeded {
            what: "quota warning",
            actual: quota_warnings.len(),
            limit: 0,
        }
        .into());
    }
    validation::validate_definition(result)?;

    Ok(report)
}

/// Convert a single validated input path into a `ConvertedOntology`.
///
/// Picks the in-memory or chunked streaming extraction strategy based on
/// file size versus `options.streaming_threshold_bytes`, unless the caller
/// forces streaming via `options.streaming`.
pub fn convert(
    working_directory: &Path,
    raw_input: &str,
    options: &ConvertOptions,
    token: &CancellationToken,
    mut on_progress: impl FnMut(StreamingProgress),
) -> Result<ConvertedOntology, ConverterError> {
    let path_options = PathValidationOptions::new(working_directory.to_path_buf());
    let resolved = validation::validate_input_path(raw_input, &path_options)?;

    token.throw_if_cancelled("input validation")?;

    let metadata = fs::metadata(&resolved).with_context(|| format!("failed to stat {resolved:?}"))?;
    let file_size = metadata.len();

    let memory_outcome: MemoryCheckOutcome = validation::check_memory_budget(file_size, options.force)?;
    if let Some(warning) = memory_outcome.warning {
        tracing::warn!(path = %resolved.display(), %warning, "memory pre-flight check raised a warning");
    }

    let format = detect_format(options.format, &resolved);
    let use_streaming = options.streaming || file_size > options.streaming_threshold_bytes;

    let mut result = match format {
        SourceFormat::Rdf if use_streaming => {
            let bytes = fs::read(&resolved).with_context(|| format!("failed to read {resolved:?}"))?;
            let rdf_format = rdf::sniff_format(None, Some(&resolved));
            let store = rdf::load_store(&bytes, rdf_format)?;
            let streaming_options = StreamingOptions { chunk_size: options.chunk_size };
            crate::streaming::convert_streaming(&store, &streaming_options, token, &mut on_progress)
                .map_err(ConverterError::from)?
        }
        SourceFormat::Rdf => {
            let bytes = fs::read(&resolved).with_context(|| format!("failed to read {resolved:?}"))?;
            on_progress(StreamingProgress { phase: StreamingPhase::ClassDiscovery, processed: 0, total: 0 });
            extract_rdf(&bytes, Some(&resolved))?
        }
        SourceFormat::Dtdl => extract_dtdl(&resolved, false, &DtdlExtractOptions::default())?,
        SourceFormat::Cdm => extract_cdm(&resolved, &CdmExtractOptions::default())?,
        SourceFormat::Auto => unreachable!("detect_format never returns Auto"),
    };

    token.throw_if_cancelled("post-processing")?;

    // Assign opaque numeric IDs (§3, §4.D). DTDL has a stable natural key
    // (the DTMI), so its IDs derive deterministically from it; RDF and CDM
    // have none, so a monotonic counter assigns them in extraction order.
    match format {
        SourceFormat::Dtdl => idgen::assign_dtmi_derived_ids(&mut result, options.id_prefix),
        _ => idgen::assign_sequential_ids(&mut result, options.id_prefix),
    }

    let compliance_report = check_and_report(&result, options.strict, options.force)?;
    let bundle = serialize_bundle(&result, &options.display_name, &options.description);

    Ok(ConvertedOntology { result, compliance: compliance_report, bundle })
}

/// Write a converted bundle's parts to `output_dir`, one file per part path.
pub fn write_bundle_to_disk(bundle: &Bundle, output_dir: &Path) -> Result<(), ConverterError> {
    for part in &bundle.parts {
        let target: PathBuf = output_dir.join(&part.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_context(|| format!("failed to create {parent:?}"))?;
        }
        let decoded = part.decode_json()?;
        let pretty = serde_json::to_vec_pretty(&decoded).context("failed to re-serialize bundle part")?;
        fs::write(&target, pretty).with_context(|| format!("failed to write {target:?}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationTokenSource;

    fn write_fixture(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn detects_rdf_from_turtle_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "model.ttl", "");
        assert_eq!(detect_format(SourceFormat::Auto, &path), SourceFormat::Rdf);
    }

    #[test]
    fn detects_cdm_from_filename_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "Person.cdm.json", "{}");
        assert_eq!(detect_format(SourceFormat::Auto, &path), SourceFormat::Cdm);
    }

    #[test]
    fn converts_a_minimal_turtle_ontology() {
        let dir = tempfile::tempdir().unwrap();
        let turtle = r#"
            @prefix owl: <http://www.w3.org/2002/07/owl#> .
            @prefix ex: <http://example.org/> .
            ex:Person a owl:Class .
        "#;
        write_fixture(dir.path(), "model.ttl", turtle);

        let token = CancellationTokenSource::new().token();
        let options = ConvertOptions::default();
        let converted = convert(dir.path(), "model.ttl", &options, &token, |_| {}).unwrap();

        assert_eq!(converted.result.entity_types.len(), 1);
        assert_eq!(converted.bundle.parts[0].path, ".platform");
    }

    #[test]
    fn rejects_input_outside_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationTokenSource::new().token();
        let options = ConvertOptions::default();
        let err = convert(dir.path(), "/etc/passwd", &options, &token, |_| {});
        assert!(err.is_err());
    }
}
