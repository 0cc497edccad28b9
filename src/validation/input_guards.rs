//! Path safety guards (§4.A): traversal scanning, symlink rejection,
//! working-directory containment, and extension matching.

use std::path::{Path, PathBuf};

use crate::error::InputError;

#[derive(Debug, Clone)]
pub struct PathValidationOptions {
    pub working_directory: PathBuf,
    /// Permit `..` components as long as the resolved path still lies inside
    /// `working_directory` (§4.A `allow_relative_up`).
    pub allow_relative_up: bool,
    /// Reject paths outside `working_directory` even without `..` components,
    /// e.g. via an absolute path or a symlink escape.
    pub confine_to_working_directory: bool,
    pub must_exist: bool,
    pub allowed_extensions: Option<Vec<String>>,
}

impl PathValidationOptions {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            allow_relative_up: false,
            confine_to_working_directory: true,
            must_exist: true,
            allowed_extensions: None,
        }
    }
}

fn has_traversal_component(raw: &str) -> bool {
    raw.contains("..") || raw.contains("..\\") || raw.contains("\0")
}

fn matches_extension(path: &Path, allowed: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    allowed.iter().any(|a| a.eq_ignore_ascii_case(ext))
}

/// Validate an input path per §4.A's ordered rule list: non-empty, scanned
/// for traversal, resolved to absolute, checked for symlinks, optionally
/// confined to the working directory, checked for existence/permissions,
/// and matched against an extension allowlist.
pub fn validate_input_path(
    raw: &str,
    options: &PathValidationOptions,
) -> Result<PathBuf, InputError> {
    if raw.trim().is_empty() {
        return Err(InputError::InvalidInput("path".to_string()));
    }

    if has_traversal_component(raw) && !options.allow_relative_up {
        return Err(InputError::PathTraversal(raw.to_string()));
    }

    let candidate = options.working_directory.join(raw);

    let resolved = candidate
        .canonicalize()
        .map_err(|_| InputError::NotFound(raw.to_string()))?;

    if resolved.is_symlink() {
        return Err(InputError::SymlinkRejected(raw.to_string()));
    }

    if options.confine_to_working_directory {
        let workdir = options
            .working_directory
            .canonicalize()
            .unwrap_or_else(|_| options.working_directory.clone());
        if !resolved.starts_with(&workdir) {
            return Err(InputError::OutsideWorkingDirectory(raw.to_string()));
        }
    }

    if options.must_exist && !resolved.exists() {
        return Err(InputError::NotFound(raw.to_string()));
    }

    std::fs::metadata(&resolved).map_err(|_| InputError::PermissionDenied(raw.to_string()))?;

    if let Some(allowed) = &options.allowed_extensions {
        if !matches_extension(&resolved, allowed) {
            return Err(InputError::InvalidInput(format!(
                "'{raw}' does not match allowed extensions {allowed:?}"
            )));
        }
    }

    Ok(resolved)
}

/// Validate an output path: same traversal/symlink/containment rules as
/// `validate_input_path`, but the target need not already exist — only its
/// parent directory must.
pub fn validate_output_path(
    raw: &str,
    options: &PathValidationOptions,
) -> Result<PathBuf, InputError> {
    if raw.trim().is_empty() {
        return Err(InputError::InvalidInput("path".to_string()));
    }

    if has_traversal_component(raw) && !options.allow_relative_up {
        return Err(InputError::PathTraversal(raw.to_string()));
    }

    let candidate = options.working_directory.join(raw);
    let parent = candidate
        .parent()
        .ok_or_else(|| InputError::InvalidInput(raw.to_string()))?;

    let resolved_parent = parent
        .canonicalize()
        .map_err(|_| InputError::NotFound(raw.to_string()))?;

    if resolved_parent.is_symlink() {
        return Err(InputError::SymlinkRejected(raw.to_string()));
    }

    if options.confine_to_working_directory {
        let workdir = options
            .working_directory
            .canonicalize()
            .unwrap_or_else(|_| options.working_directory.clone());
        if !resolved_parent.starts_with(&workdir) {
            return Err(InputError::OutsideWorkingDirectory(raw.to_string()));
        }
    }

    if let Some(file_name) = candidate.file_name() {
        Ok(resolved_parent.join(file_name))
    } else {
        Err(InputError::InvalidInput(raw.to_string()))
    }
}
