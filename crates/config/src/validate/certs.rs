//! Certificate entry validation
//!
//! Every certificate needs a unique name, at least one domain and a save path.

use std::collections::HashSet;

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::ClientConfig;

/// Validate configured certificates
pub fn validate_certifications(config: &ClientConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.certifications.is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Certificate,
            "No certification configured",
        ));
        return result;
    }

    let mut names = HashSet::new();
    for (index, cert) in config.certifications.iter().enumerate() {
        let label = if cert.name.is_empty() {
            format!("#{}", index)
        } else {
            format!("'{}'", cert.name)
        };

        if cert.name.is_empty() {
            result.add_error(ValidationError::new(
                ErrorCategory::Certificate,
                format!("Certification {} has no name", label),
            ));
        } else if !names.insert(cert.name.as_str()) {
            result.add_error(ValidationError::new(
                ErrorCategory::Certificate,
                format!("Certification name {} is used more than once", label),
            ));
        }

        if cert.domains.is_empty() {
            result.add_error(ValidationError::new(
                ErrorCategory::Certificate,
                format!("Certification {} has no domains", label),
            ));
        } else if cert.domains.iter().any(|d| d.trim().is_empty()) {
            result.add_error(ValidationError::new(
                ErrorCategory::Certificate,
                format!("Certification {} has an empty domain", label),
            ));
        }

        if cert.save_path.as_os_str().is_empty() {
            result.add_error(ValidationError::new(
                ErrorCategory::Certificate,
                format!("Certification {} has no savePath", label),
            ));
        } else if !cert.save_path.exists() {
            result.add_warning(ValidationWarning::new(format!(
                "savePath {:?} of certification {} does not exist yet, it will be created",
                cert.save_path, label
            )));
        }
    }

    result
}
