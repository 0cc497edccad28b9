//! Persisted validation report (§6): the JSON artifact a `validate`/`test`
//! run writes to disk summarizing everything the compliance checker and
//! the limits validator found.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::compliance::ComplianceReport;
use crate::error::ConverterError;
use crate::model::{ConversionWarning, WarningSeverity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    Lost,
    ConvertedWithLimitations,
}

impl From<WarningSeverity> for IssueSeverity {
    fn from(severity: WarningSeverity) -> Self {
        match severity {
            WarningSeverity::Lost => IssueSeverity::Lost,
            WarningSeverity::ConvertedWithLimitations => IssueSeverity::ConvertedWithLimitations,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub category: String,
    pub message: String,
    pub workaround: Option<String>,
}

impl From<&ConversionWarning> for Issue {
    fn from(warning: &ConversionWarning) -> Self {
        Self {
            severity: warning.severity.into(),
            category: warning.construct.clone(),
            message: warning.message.clone(),
            workaround: warning.workaround.clone(),
        }
    }
}

/// A validation run's persisted JSON report (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub file_path: String,
    pub timestamp: String,
    pub can_import_seamlessly: bool,
    pub total_issues: usize,
    pub issues_by_severity: BTreeMap<IssueSeverity, usize>,
    pub issues_by_category: BTreeMap<String, usize>,
    pub issues: Vec<Issue>,
    pub summary: String,
}

impl ValidationReport {
    /// Build a report from a compliance check, stamping `timestamp` as an
    /// RFC 3339 string supplied by the caller (this module never reads the
    /// clock itself, so it stays trivially testable).
    pub fn build(file_path: &str, timestamp: String, compliance: &ComplianceReport) -> Self {
        let issues: Vec<Issue> = compliance
            .lost
            .iter()
            .chain(compliance.converted_with_limitations.iter())
            .map(Issue::from)
            .collect();

        let mut issues_by_severity: BTreeMap<IssueSeverity, usize> = BTreeMap::new();
        let mut issues_by_category: BTreeMap<String, usize> = BTreeMap::new();
        for issue in &issues {
            *issues_by_severity.entry(issue.severity).or_insert(0) += 1;
            *issues_by_category.entry(issue.category.clone()).or_insert(0) += 1;
        }

        let can_import_seamlessly = compliance.lost.is_empty();
        let summary = if can_import_seamlessly {
            format!(
                "{} construct(s) preserved with no losses; {} converted with limitations",
                compliance.preserved_features.len(),
                compliance.converted_with_limitations.len()
            )
        } else {
            format!(
                "{} construct(s) lost during conversion; see issues for detail",
                compliance.lost.len()
            )
        };

        Self {
            file_path: file_path.to_string(),
            timestamp,
            can_import_seamlessly,
            total_issues: issues.len(),
            issues_by_severity,
            issues_by_category,
            issues,
            summary,
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ConverterError> {
        let json = serde_json::to_vec_pretty(self).context("failed to serialize validation report")?;
        fs::write(path, json).with_context(|| format!("failed to write report to {path:?}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConversionResult;

    #[test]
    fn seamless_import_has_no_losses() {
        let result = ConversionResult::new();
        let compliance = ComplianceReport::build(&result, &["owl:Class"], &crate::compliance::owl_construct_support);
        let report = ValidationReport::build("model.ttl", "2026-07-26T00:00:00Z".to_string(), &compliance);
        assert!(report.can_import_seamlessly);
        assert_eq!(report.total_issues, 0);
    }

    #[test]
    fn losses_mark_import_as_not_seamless() {
        let result = ConversionResult::new();
        let compliance = ComplianceReport::build(&result, &["owl:Restriction"], &crate::compliance::owl_construct_support);
        let report = ValidationReport::build("model.ttl", "2026-07-26T00:00:00Z".to_string(), &compliance);
        assert!(!report.can_import_seamlessly);
        assert_eq!(report.total_issues, 1);
        assert_eq!(*report.issues_by_severity.get(&IssueSeverity::Lost).unwrap(), 1);
    }

    #[test]
    fn writes_report_to_disk_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let result = ConversionResult::new();
        let compliance = ComplianceReport::build(&result, &[], &crate::compliance::owl_construct_support);
        let report = ValidationReport::build("model.ttl", "2026-07-26T00:00:00Z".to_string(), &compliance);
        report.write_to(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("can_import_seamlessly"));
    }
}
