//! Pre-flight memory feasibility check (§4.B).

use sysinfo::System;

use crate::error::MemoryError;

const ESTIMATE_MULTIPLIER: f64 = 3.5;
const SAFE_FRACTION: f64 = 0.7;
const HARD_FILE_SIZE_LIMIT_BYTES: u64 = 500 * 1024 * 1024;
const MINIMUM_FREE_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryCheckOutcome {
    pub estimated_bytes: u64,
    pub available_bytes: Option<u64>,
    pub warning: Option<&'static str>,
}

/// Query available system memory. Returns `None` when the platform cannot
/// report it, which the guard treats as a pass-with-warning (§4.B).
fn available_system_memory() -> Option<u64> {
    let mut system = System::new();
    system.refresh_memory();
    let available = system.available_memory();
    if available == 0 { None } else { Some(available) }
}

/// Run the pre-flight check for `file_size` bytes. `force` downgrades a
/// would-be rejection to a warning.
pub fn check_memory_budget(file_size: u64, force: bool) -> Result<MemoryCheckOutcome, MemoryError> {
    let estimated_bytes = (file_size as f64 * ESTIMATE_MULTIPLIER) as u64;

    if file_size > HARD_FILE_SIZE_LIMIT_BYTES && !force {
        return Err(MemoryError::FileTooLarge(file_size));
    }

    let Some(available_bytes) = available_system_memory() else {
        return Ok(MemoryCheckOutcome {
            estimated_bytes,
            available_bytes: None,
            warning: Some("system memory metrics unavailable; proceeding without a budget check"),
        });
    };

    let safe_budget = (available_bytes as f64 * SAFE_FRACTION) as u64;
    let remaining_after = available_bytes.saturating_sub(estimated_bytes);

    if (estimated_bytes > safe_budget || remaining_after < MINIMUM_FREE_BYTES) && !force {
        return Err(MemoryError::Exceeded {
            estimated_bytes,
            available_bytes,
        });
    }

    let warning = if estimated_bytes > safe_budget || remaining_after < MINIMUM_FREE_BYTES {
        Some("memory budget exceeded but proceeding because force=true")
    } else if file_size > HARD_FILE_SIZE_LIMIT_BYTES {
        Some("file exceeds the 500 MB hard limit but proceeding because force=true")
    } else {
        None
    };

    Ok(MemoryCheckOutcome {
        estimated_bytes,
        available_bytes: Some(available_bytes),
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_file_passes_cleanly() {
        let outcome = check_memory_budget(1024, false).unwrap();
        assert_eq!(outcome.estimated_bytes, (1024.0 * ESTIMATE_MULTIPLIER) as u64);
    }

    #[test]
    fn oversized_file_rejected_without_force() {
        let err = check_memory_budget(HARD_FILE_SIZE_LIMIT_BYTES + 1, false).unwrap_err();
        assert!(matches!(err, MemoryError::FileTooLarge(_)));
    }

    #[test]
    fn oversized_file_allowed_with_force() {
        let outcome = check_memory_budget(HARD_FILE_SIZE_LIMIT_BYTES + 1, true).unwrap();
        assert!(outcome.warning.is_some());
    }

    #[test]
    fn estimate_uses_documented_multiplier() {
        let outcome = check_memory_budget(10_000, false).unwrap();
        assert_eq!(outcome.estimated_bytes, 35_000);
    }
}
