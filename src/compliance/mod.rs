//! Compliance checking against static source-construct support tables (§4.I).

mod tables;

pub use tables::{DtdlLimits, SupportLevel, dtdl_feature_support, owl_construct_support, DTDL_LIMITS};

use serde::{Deserialize, Serialize};

use crate::model::{ConversionResult, ConversionWarning, WarningSeverity};

/// Summary of how much of a source document survived conversion (§4.I).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub preserved_features: Vec<String>,
    pub converted_with_limitations: Vec<ConversionWarning>,
    pub lost: Vec<ConversionWarning>,
}

impl ComplianceReport {
    /// Build a report from constructs actually encountered in a source
    /// document (`constructs_seen`, looked up in `table`) plus whatever
    /// warnings the extractor already recorded on `result`.
    pub fn build(result: &ConversionResult, constructs_seen: &[&str], table: &dyn Fn(&str) -> Option<SupportLevel>) -> Self {
        let mut report = ComplianceReport::default();

        for construct in constructs_seen {
            match table(construct) {
                Some(SupportLevel::Full) => report.preserved_features.push((*construct).to_string()),
                Some(SupportLevel::Partial) | Some(SupportLevel::Metadata) => {
                    report.converted_with_limitations.push(ConversionWarning {
                        severity: WarningSeverity::ConvertedWithLimitations,
                        construct: (*construct).to_string(),
                        message: format!("'{construct}' is only partially representable in a Fabric ontology"),
                        workaround: None,
                    });
                }
                Some(SupportLevel::None) => {
                    report.lost.push(ConversionWarning {
                        severity: WarningSeverity::Lost,
                        construct: (*construct).to_string(),
                        message: format!("'{construct}' has no Fabric ontology equivalent and was dropped"),
                        workaround: None,
                    });
                }
                None => {}
            }
        }

        for warning in &result.warnings {
            match warning.severity {
                WarningSeverity::ConvertedWithLimitations => report.converted_with_limitations.push(warning.clone()),
                WarningSeverity::Lost => report.lost.push(warning.clone()),
            }
        }

        report
    }

    pub fn has_losses(&self) -> bool {
        !self.lost.is_empty()
    }
}

/// In strict mode, any `Lost` warning (or `ConvertedWithLimitations`, at the
/// caller's discretion) is promoted to a hard failure rather than a warning.
pub fn enforce_strict_mode(report: &ComplianceReport, strict: bool) -> anyhow::Result<()> {
    if !strict {
        return Ok(());
    }
    if let Some(first) = report.lost.first() {
        anyhow::bail!(
            "strict mode: construct '{}' could not be represented ({})",
            first.construct,
            first.message
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SkippedKind;

    #[test]
    fn full_support_constructs_are_preserved() {
        let result = ConversionResult::new();
        let report = ComplianceReport::build(&result, &["owl:Class", "owl:DatatypeProperty"], &owl_construct_support);
        assert_eq!(report.preserved_features.len(), 2);
        assert!(!report.has_losses());
    }

    #[test]
    fn none_support_constructs_are_recorded_as_lost() {
        let result = ConversionResult::new();
        let report = ComplianceReport::build(&result, &["owl:Restriction"], &owl_construct_support);
        assert!(report.has_losses());
        assert_eq!(report.lost[0].construct, "owl:Restriction");
    }

    #[test]
    fn strict_mode_fails_on_any_loss() {
        let mut result = ConversionResult::new();
        result.skipped_items.push(crate::model::SkippedItem::new(
            SkippedKind::Command,
            "reboot",
            "commands have no Fabric equivalent",
            None,
        ));
        result.warnings.push(ConversionWarning {
            severity: WarningSeverity::Lost,
            construct: "Command".to_string(),
            message: "commands are dropped".to_string(),
            workaround: None,
        });

        let report = ComplianceReport::build(&result, &[], &dtdl_feature_support);
        assert!(enforce_strict_mode(&report, true).is_err());
        assert!(enforce_strict_mode(&report, false).is_ok());
    }
}
