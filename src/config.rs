use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Complete configuration snapshot for one analysis pipeline.
///
/// All thresholds, weights and pattern tables live here rather than in the
/// engines themselves; a pipeline is built from one immutable snapshot and
/// replacing the snapshot is the only way to change behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub phishing: PhishingConfig,
    pub url_scanner: UrlScannerConfig,
    pub attachments: AttachmentConfig,
    pub decision: DecisionConfig,
}

impl AnalysisConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {path}"))?;
        let config: AnalysisConfig =
            serde_yaml::from_str(&content).context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write configuration file {path}"))?;
        Ok(())
    }

    /// Reject invalid configuration before any email is analyzed. Weight
    /// and threshold problems surface here, never mid-analysis.
    pub fn validate(&self) -> Result<()> {
        self.phishing.validate()?;
        self.url_scanner.validate()?;
        self.attachments.validate()?;
        self.decision.validate()?;
        Ok(())
    }
}

/// Detector weights for the phishing signal catalog, keyed by detector id.
/// Each weight must sit in (0, 1]; the summed probability is capped at 1.0
/// by the engine, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub urgency_language: f64,
    pub credential_request: f64,
    pub financial_pressure: f64,
    pub suspicious_sender_tld: f64,
    pub header_domain_mismatch: f64,
    pub unrelated_link_domain: f64,
    pub suspicious_link_tld: f64,
    pub excessive_links: f64,
    pub generic_greeting: f64,
    pub brand_impersonation: f64,
    pub authentication_failure: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            urgency_language: 0.25,
            credential_request: 0.30,
            financial_pressure: 0.20,
            suspicious_sender_tld: 0.20,
            header_domain_mismatch: 0.25,
            unrelated_link_domain: 0.15,
            suspicious_link_tld: 0.20,
            excessive_links: 0.10,
            generic_greeting: 0.10,
            brand_impersonation: 0.30,
            authentication_failure: 0.20,
        }
    }
}

impl SignalWeights {
    fn as_pairs(&self) -> [(&'static str, f64); 11] {
        [
            ("urgency_language", self.urgency_language),
            ("credential_request", self.credential_request),
            ("financial_pressure", self.financial_pressure),
            ("suspicious_sender_tld", self.suspicious_sender_tld),
            ("header_domain_mismatch", self.header_domain_mismatch),
            ("unrelated_link_domain", self.unrelated_link_domain),
            ("suspicious_link_tld", self.suspicious_link_tld),
            ("excessive_links", self.excessive_links),
            ("generic_greeting", self.generic_greeting),
            ("brand_impersonation", self.brand_impersonation),
            ("authentication_failure", self.authentication_failure),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhishingConfig {
    pub weights: SignalWeights,
    pub urgency_phrases: Vec<String>,
    pub credential_phrases: Vec<String>,
    pub financial_phrases: Vec<String>,
    pub greeting_phrases: Vec<String>,
    pub brand_tokens: Vec<String>,
    pub suspicious_tlds: Vec<String>,
    pub max_url_count: usize,
    pub auth_failure_values: Vec<String>,
}

impl Default for PhishingConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            urgency_phrases: string_vec(&[
                "urgent",
                "immediate action",
                "act now",
                "expires today",
                "within 24 hours",
                "final notice",
                "last warning",
                "account suspended",
                "account will be closed",
            ]),
            credential_phrases: string_vec(&[
                "verify your account",
                "confirm your identity",
                "confirm your password",
                "update your credentials",
                "validate your account",
                "login to continue",
                "re-enter your password",
                "security verification required",
            ]),
            financial_phrases: string_vec(&[
                "wire transfer",
                "payment overdue",
                "invoice attached",
                "outstanding balance",
                "refund pending",
                "billing problem",
                "update your payment",
                "unusual transaction",
            ]),
            greeting_phrases: string_vec(&[
                "dear customer",
                "dear user",
                "dear member",
                "dear account holder",
                "dear valued customer",
                "dear sir/madam",
            ]),
            brand_tokens: string_vec(&[
                "paypal",
                "microsoft",
                "apple",
                "amazon",
                "google",
                "netflix",
                "docusign",
                "dropbox",
                "wells fargo",
                "bank of america",
                "chase",
            ]),
            suspicious_tlds: default_suspicious_tlds(),
            max_url_count: 10,
            auth_failure_values: string_vec(&[
                "fail",
                "softfail",
                "none",
                "temperror",
                "permerror",
            ]),
        }
    }
}

impl PhishingConfig {
    fn validate(&self) -> Result<()> {
        for (id, weight) in self.weights.as_pairs() {
            if !(weight > 0.0 && weight <= 1.0) {
                bail!("phishing signal weight '{id}' must be in (0, 1], got {weight}");
            }
        }
        if self.max_url_count == 0 {
            bail!("phishing max_url_count must be at least 1");
        }
        if self.auth_failure_values.is_empty() {
            bail!("phishing auth_failure_values must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlScannerConfig {
    pub ip_host_weight: f64,
    pub plain_scheme_weight: f64,
    pub suspicious_tld_weight: f64,
    pub redirect_weight: f64,
    pub deep_path_weight: f64,
    pub malicious_pattern_weight: f64,
    pub trusted_discount: f64,
    pub max_path_depth: usize,
    /// Scores at or above this value and below `high_threshold` map to
    /// medium risk.
    pub medium_threshold: f64,
    /// Scores at or above this value map to high risk. This is the
    /// externally tunable high-risk cut-point.
    pub high_threshold: f64,
    pub suspicious_tlds: Vec<String>,
    pub trusted_domains: Vec<String>,
    pub shortener_domains: Vec<String>,
    pub redirect_params: Vec<String>,
    pub malicious_patterns: Vec<String>,
}

impl Default for UrlScannerConfig {
    fn default() -> Self {
        Self {
            ip_host_weight: 0.6,
            plain_scheme_weight: 0.2,
            suspicious_tld_weight: 0.3,
            redirect_weight: 0.25,
            deep_path_weight: 0.15,
            malicious_pattern_weight: 0.3,
            trusted_discount: 0.5,
            max_path_depth: 5,
            medium_threshold: 0.3,
            high_threshold: 0.6,
            suspicious_tlds: default_suspicious_tlds(),
            trusted_domains: string_vec(&[
                "microsoft.com",
                "google.com",
                "apple.com",
                "amazon.com",
                "github.com",
                "mozilla.org",
                "wikipedia.org",
                "linkedin.com",
                "adobe.com",
                "dropbox.com",
                "zoom.us",
                "slack.com",
            ]),
            shortener_domains: string_vec(&[
                "bit.ly",
                "tinyurl.com",
                "goo.gl",
                "t.co",
                "ow.ly",
                "is.gd",
                "buff.ly",
                "rebrand.ly",
                "cutt.ly",
                "rb.gy",
            ]),
            redirect_params: string_vec(&["redirect", "redirect_url", "url", "goto", "next", "dest"]),
            malicious_patterns: string_vec(&[
                r"(?i)(login|sign-?in|verify|confirm|credential|webscr)",
                r"\.php\?",
                r"@[^/]*@",
                r"(\d{1,3}\.){3}\d{1,3}",
            ]),
        }
    }
}

impl UrlScannerConfig {
    fn validate(&self) -> Result<()> {
        let weights = [
            ("ip_host_weight", self.ip_host_weight),
            ("plain_scheme_weight", self.plain_scheme_weight),
            ("suspicious_tld_weight", self.suspicious_tld_weight),
            ("redirect_weight", self.redirect_weight),
            ("deep_path_weight", self.deep_path_weight),
            ("malicious_pattern_weight", self.malicious_pattern_weight),
            ("trusted_discount", self.trusted_discount),
        ];
        for (name, weight) in weights {
            if weight < 0.0 {
                bail!("url scanner weight '{name}' must not be negative, got {weight}");
            }
        }
        if self.medium_threshold < 0.0 || self.high_threshold <= self.medium_threshold {
            bail!(
                "url scanner thresholds must satisfy 0 <= medium < high, got medium {} / high {}",
                self.medium_threshold,
                self.high_threshold
            );
        }
        for pattern in &self.malicious_patterns {
            regex::Regex::new(pattern)
                .with_context(|| format!("invalid malicious URL pattern '{pattern}'"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    pub executable_extensions: Vec<String>,
    pub script_extensions: Vec<String>,
    pub macro_extensions: Vec<String>,
    pub archive_extensions: Vec<String>,
    /// Benign-looking extensions that make an inner dot-segment count as a
    /// double-extension decoy (invoice.pdf.exe).
    pub decoy_extensions: Vec<String>,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            executable_extensions: string_vec(&[
                "exe", "scr", "com", "bat", "cmd", "pif", "msi", "jar", "app", "cpl",
            ]),
            script_extensions: string_vec(&[
                "js", "jse", "vbs", "vbe", "ps1", "wsf", "hta", "sh",
            ]),
            macro_extensions: string_vec(&["docm", "xlsm", "pptm", "dotm", "xltm", "potm"]),
            archive_extensions: string_vec(&["zip", "rar", "7z", "tar", "gz", "iso"]),
            decoy_extensions: string_vec(&[
                "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "csv", "jpg", "jpeg",
                "png", "gif", "html",
            ]),
        }
    }
}

impl AttachmentConfig {
    fn validate(&self) -> Result<()> {
        let sets = [
            ("executable_extensions", &self.executable_extensions),
            ("script_extensions", &self.script_extensions),
            ("macro_extensions", &self.macro_extensions),
        ];
        for (name, set) in sets {
            if set.is_empty() {
                bail!("attachment extension set '{name}' must not be empty");
            }
            if set.iter().any(|e| e.is_empty() || e.contains('.')) {
                bail!("attachment extension set '{name}' entries must be bare lowercase extensions");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Phishing probability strictly above this marks the email suspicious.
    pub phishing_threshold: f64,
    pub high_url_penalty: f64,
    pub medium_url_penalty: f64,
    pub flagged_attachment_penalty: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            phishing_threshold: 0.7,
            high_url_penalty: 15.0,
            medium_url_penalty: 5.0,
            flagged_attachment_penalty: 20.0,
        }
    }
}

impl DecisionConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.phishing_threshold) {
            bail!(
                "decision phishing_threshold must be in [0, 1], got {}",
                self.phishing_threshold
            );
        }
        let penalties = [
            ("high_url_penalty", self.high_url_penalty),
            ("medium_url_penalty", self.medium_url_penalty),
            ("flagged_attachment_penalty", self.flagged_attachment_penalty),
        ];
        for (name, penalty) in penalties {
            if penalty < 0.0 {
                bail!("decision penalty '{name}' must not be negative, got {penalty}");
            }
        }
        Ok(())
    }
}

fn default_suspicious_tlds() -> Vec<String> {
    string_vec(&[
        "xyz", "top", "club", "click", "link", "work", "loan", "win", "gq", "tk", "ml", "ga",
        "cf", "icu", "buzz", "rest",
    ])
}

fn string_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        AnalysisConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_out_of_range_weight() {
        let mut config = AnalysisConfig::default();
        config.phishing.weights.urgency_language = 1.5;
        assert!(config.validate().is_err());

        config.phishing.weights.urgency_language = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_url_thresholds() {
        let mut config = AnalysisConfig::default();
        config.url_scanner.high_threshold = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let mut config = AnalysisConfig::default();
        config.url_scanner.malicious_patterns.push("([".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_phishing_threshold() {
        let mut config = AnalysisConfig::default();
        config.decision.phishing_threshold = 1.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = AnalysisConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AnalysisConfig = serde_yaml::from_str(&yaml).unwrap();
        parsed.validate().unwrap();
        assert_eq!(
            parsed.decision.phishing_threshold,
            config.decision.phishing_threshold
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed: AnalysisConfig =
            serde_yaml::from_str("decision:\n  phishing_threshold: 0.5\n").unwrap();
        assert_eq!(parsed.decision.phishing_threshold, 0.5);
        assert_eq!(parsed.phishing.max_url_count, 10);
    }
}
