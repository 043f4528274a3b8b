use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized email record handed over by the upstream parsing layer.
///
/// `sender_domain` is always the lower-cased portion of `sender` after the
/// `@`; `urls` and `attachments` are present even when empty. The pipeline
/// never mutates this value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEmail {
    pub id: String,
    pub sender: String,
    pub sender_domain: String,
    pub recipient: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentDescriptor>,
    #[serde(default)]
    pub html_body: String,
    #[serde(default)]
    pub text_body: String,
    #[serde(default)]
    pub auth: AuthenticationMetadata,
    pub received_at: DateTime<Utc>,
}

/// Authentication headers carried over verbatim from the normalizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationMetadata {
    #[serde(default)]
    pub spf: Option<String>,
    #[serde(default)]
    pub dkim: Option<String>,
    #[serde(default)]
    pub dmarc: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub reply_to_domain: Option<String>,
    #[serde(default)]
    pub return_path: Option<String>,
}

/// One attachment as described by the normalizer. No content is carried,
/// only metadata; classification works from the filename alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    pub filename: String,
    /// Lower-cased last dot-segment of the filename; empty when the
    /// filename has no extension.
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_id: Option<String>,
}

impl AttachmentDescriptor {
    pub fn new(filename: impl Into<String>, size_bytes: u64) -> Self {
        let filename = filename.into();
        let extension = Self::extension_of(&filename);
        Self {
            filename,
            extension,
            size_bytes,
            content_type: None,
            content_id: None,
        }
    }

    /// Derive the extension from a filename's last dot-segment.
    pub fn extension_of(filename: &str) -> String {
        match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_lowercase(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_derivation() {
        assert_eq!(AttachmentDescriptor::extension_of("report.PDF"), "pdf");
        assert_eq!(AttachmentDescriptor::extension_of("archive.tar.gz"), "gz");
        assert_eq!(AttachmentDescriptor::extension_of("README"), "");
        assert_eq!(AttachmentDescriptor::extension_of(".bashrc"), "");
    }

    #[test]
    fn test_constructor_fills_extension() {
        let att = AttachmentDescriptor::new("invoice.pdf.exe", 1024);
        assert_eq!(att.extension, "exe");
        assert_eq!(att.size_bytes, 1024);
    }
}
