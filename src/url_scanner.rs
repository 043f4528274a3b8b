//! URL Risk Scanner
//!
//! Scores each URL independently by summing weighted structural heuristics,
//! applies the trusted-domain discount, and maps the final score onto a
//! three-level risk scale. Unparsable input never aborts a batch: it maps
//! to the conservative high-risk fallback.

use crate::config::UrlScannerConfig;
use crate::domain_utils::DomainUtils;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::{Host, Url};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Structured findings for one successfully parsed URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlFindings {
    pub is_https: bool,
    pub is_ip_based: bool,
    pub domain: String,
    pub tld: String,
    pub is_suspicious_tld: bool,
    pub has_redirect_pattern: bool,
    pub path_depth: usize,
}

/// Scan outcome for one input URL. The url is echoed verbatim; malformed
/// input yields `High` with no findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlScanResult {
    pub url: String,
    pub risk: RiskLevel,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub findings: Option<UrlFindings>,
}

pub struct UrlRiskScanner {
    config: UrlScannerConfig,
    malicious_patterns: Vec<Regex>,
}

impl UrlRiskScanner {
    pub fn new(config: UrlScannerConfig) -> Result<Self> {
        let malicious_patterns = config
            .malicious_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("invalid malicious URL pattern '{pattern}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            config,
            malicious_patterns,
        })
    }

    /// Scan a batch, preserving input order and length exactly (1:1).
    pub fn scan_urls(&self, urls: &[String]) -> Vec<UrlScanResult> {
        urls.iter().map(|url| self.scan_url(url)).collect()
    }

    pub fn scan_url(&self, raw: &str) -> UrlScanResult {
        let parsed = match Url::parse(raw) {
            Ok(parsed) if parsed.host_str().is_some() => parsed,
            _ => {
                log::debug!("unparsable URL treated as high risk: {raw}");
                return UrlScanResult {
                    url: raw.to_string(),
                    risk: RiskLevel::High,
                    reason: "Invalid or malformed URL".to_string(),
                    findings: None,
                };
            }
        };

        let host = parsed.host_str().unwrap_or_default().to_string();
        let is_https = parsed.scheme() == "https";
        let is_ip_based = matches!(parsed.host(), Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)));
        let tld = DomainUtils::extract_tld(&host).unwrap_or_default();
        let is_suspicious_tld =
            !is_ip_based && DomainUtils::has_tld_in(&host, &self.config.suspicious_tlds);
        let has_redirect_pattern = self.has_redirect_pattern(&parsed, &host);
        let path_depth = parsed.path().split('/').filter(|s| !s.is_empty()).count();

        let mut score = 0.0;
        let mut clauses = Vec::new();

        if is_ip_based {
            score += self.config.ip_host_weight;
            clauses.push("IP-based host".to_string());
        }
        if !is_https {
            score += self.config.plain_scheme_weight;
            clauses.push("No HTTPS encryption".to_string());
        }
        if is_suspicious_tld {
            score += self.config.suspicious_tld_weight;
            clauses.push(format!("Suspicious TLD .{tld}"));
        }
        if has_redirect_pattern {
            score += self.config.redirect_weight;
            clauses.push("Redirect or shortener pattern".to_string());
        }
        if path_depth > self.config.max_path_depth {
            score += self.config.deep_path_weight;
            clauses.push("Unusually deep URL path".to_string());
        }
        for pattern in &self.malicious_patterns {
            if pattern.is_match(raw) {
                score += self.config.malicious_pattern_weight;
                clauses.push("Suspicious URL pattern".to_string());
            }
        }

        let trusted = self.is_trusted(&host, &tld);
        if trusted {
            score = (score - self.config.trusted_discount).max(0.0);
        }

        let risk = if score >= self.config.high_threshold {
            RiskLevel::High
        } else if score >= self.config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let reason = if clauses.is_empty() {
            "No issues detected".to_string()
        } else if trusted {
            format!("{} (Trusted domain)", clauses.join(", "))
        } else {
            clauses.join(", ")
        };

        log::debug!("url {raw} scored {score:.2} -> {risk:?}");

        UrlScanResult {
            url: raw.to_string(),
            risk,
            reason,
            findings: Some(UrlFindings {
                is_https,
                is_ip_based,
                domain: host,
                tld,
                is_suspicious_tld,
                has_redirect_pattern,
                path_depth,
            }),
        }
    }

    fn has_redirect_pattern(&self, parsed: &Url, host: &str) -> bool {
        if DomainUtils::matches_domain_list(host, &self.config.shortener_domains) {
            return true;
        }
        parsed.query_pairs().any(|(key, _)| {
            let key = key.to_lowercase();
            self.config.redirect_params.iter().any(|p| p.to_lowercase() == key)
        })
    }

    fn is_trusted(&self, host: &str, tld: &str) -> bool {
        DomainUtils::matches_domain_list(host, &self.config.trusted_domains)
            || tld == "edu"
            || tld == "gov"
    }
}
