//! Attachment / Malware Scanner
//!
//! Classifies attachments by filename and extension only; content is never
//! inspected, so archive members are out of reach by design. A file is
//! flagged when it is executable, a script, macro-enabled, or hides a
//! dangerous extension behind a benign one (invoice.pdf.exe).

use crate::config::AttachmentConfig;
use crate::email::AttachmentDescriptor;
use serde::{Deserialize, Serialize};

/// Per-file classification outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentFinding {
    pub filename: String,
    pub extension: String,
    /// Matched risk reasons in evaluation order; empty for clean files.
    pub risks: Vec<String>,
    pub is_executable: bool,
    pub has_double_extension: bool,
    pub is_macro_enabled: bool,
    pub is_script: bool,
}

/// Aggregate scan outcome. `has_risk` holds iff `flagged_files` is
/// non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MalwareResult {
    pub has_risk: bool,
    pub flagged_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<AttachmentFinding>,
}

impl MalwareResult {
    pub fn clean() -> Self {
        Self {
            has_risk: false,
            flagged_files: Vec::new(),
            findings: Vec::new(),
        }
    }
}

pub struct AttachmentScanner {
    config: AttachmentConfig,
}

impl Default for AttachmentScanner {
    fn default() -> Self {
        Self::new(AttachmentConfig::default())
    }
}

impl AttachmentScanner {
    pub fn new(config: AttachmentConfig) -> Self {
        Self { config }
    }

    /// Classify every attachment independently. A file that cannot be
    /// classified (no extension, unknown extension) is simply not flagged.
    pub fn scan(&self, attachments: &[AttachmentDescriptor]) -> MalwareResult {
        let mut flagged_files = Vec::new();
        let mut findings = Vec::new();

        for attachment in attachments {
            let finding = self.classify(attachment);
            if !finding.risks.is_empty() {
                log::debug!(
                    "attachment {} flagged: {}",
                    finding.filename,
                    finding.risks.join("; ")
                );
                flagged_files.push(attachment.filename.clone());
            }
            findings.push(finding);
        }

        MalwareResult {
            has_risk: !flagged_files.is_empty(),
            flagged_files,
            findings,
        }
    }

    fn classify(&self, attachment: &AttachmentDescriptor) -> AttachmentFinding {
        let extension = if attachment.extension.is_empty() {
            AttachmentDescriptor::extension_of(&attachment.filename)
        } else {
            attachment.extension.to_lowercase()
        };

        let is_executable = contains(&self.config.executable_extensions, &extension);
        let is_script = contains(&self.config.script_extensions, &extension);
        let is_macro_enabled = contains(&self.config.macro_extensions, &extension);
        let has_double_extension = self.has_double_extension(&attachment.filename);

        let mut risks = Vec::new();
        if is_executable {
            risks.push(format!("Executable file type (.{extension})"));
        }
        if is_script {
            risks.push(format!("Script file type (.{extension})"));
        }
        if is_macro_enabled {
            risks.push(format!("Macro-enabled document (.{extension})"));
        }
        if has_double_extension {
            risks.push("Double extension hiding dangerous file type".to_string());
        }

        AttachmentFinding {
            filename: attachment.filename.clone(),
            extension,
            risks,
            is_executable,
            has_double_extension,
            is_macro_enabled,
            is_script,
        }
    }

    /// Detect `<name>.<benign-ext>.<dangerous-ext>` by walking every
    /// dot-delimited segment, not just the final one.
    fn has_double_extension(&self, filename: &str) -> bool {
        let segments: Vec<&str> = filename.split('.').collect();
        if segments.len() < 3 {
            return false;
        }

        let last = segments[segments.len() - 1].to_lowercase();
        let last_is_dangerous = contains(&self.config.executable_extensions, &last)
            || contains(&self.config.script_extensions, &last);
        if !last_is_dangerous {
            return false;
        }

        segments[1..segments.len() - 1]
            .iter()
            .any(|segment| contains(&self.config.decoy_extensions, &segment.to_lowercase()))
    }
}

fn contains(set: &[String], extension: &str) -> bool {
    !extension.is_empty() && set.iter().any(|e| e.eq_ignore_ascii_case(extension))
}
