//! Phishing Signal Engine
//!
//! Evaluates an ordered catalog of independent boolean detectors against a
//! normalized email. Each triggered detector contributes its configured
//! weight; the summed probability is capped at 1.0 and rounded to three
//! decimals. Weights are additive and never normalized, so more
//! simultaneous signals always mean a higher probability, up to the cap.

use crate::config::PhishingConfig;
use crate::domain_utils::DomainUtils;
use crate::email::NormalizedEmail;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Outcome of one phishing analysis. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhishingResult {
    /// Capped sum of triggered weights, in [0, 1], rounded to 3 decimals.
    pub probability: f64,
    /// Display names of triggered detectors, in catalog evaluation order.
    pub signals: Vec<String>,
    /// Contributed weight per triggered detector id.
    pub weights: HashMap<String, f64>,
    /// Detector faults folded into "did not trigger". Never part of
    /// `signals`; empty for well-formed input.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

/// Fault raised by a single detector while inspecting message content.
#[derive(Debug, Clone)]
pub struct DetectorError {
    pub detector: &'static str,
    pub message: String,
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.detector, self.message)
    }
}

impl std::error::Error for DetectorError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalKind {
    UrgencyLanguage,
    CredentialRequest,
    FinancialPressure,
    SuspiciousSenderTld,
    HeaderDomainMismatch,
    UnrelatedLinkDomain,
    SuspiciousLinkTld,
    ExcessiveLinks,
    GenericGreeting,
    BrandImpersonation,
    AuthenticationFailure,
}

struct SignalDetector {
    id: &'static str,
    name: &'static str,
    weight: f64,
    kind: SignalKind,
}

pub struct PhishingSignalEngine {
    config: PhishingConfig,
    catalog: Vec<SignalDetector>,
}

impl Default for PhishingSignalEngine {
    fn default() -> Self {
        Self::new(PhishingConfig::default())
    }
}

impl PhishingSignalEngine {
    pub fn new(config: PhishingConfig) -> Self {
        let w = &config.weights;
        let catalog = vec![
            SignalDetector {
                id: "urgency_language",
                name: "Urgency language in subject or body",
                weight: w.urgency_language,
                kind: SignalKind::UrgencyLanguage,
            },
            SignalDetector {
                id: "credential_request",
                name: "Credential harvesting phrasing",
                weight: w.credential_request,
                kind: SignalKind::CredentialRequest,
            },
            SignalDetector {
                id: "financial_pressure",
                name: "Financial pressure phrasing",
                weight: w.financial_pressure,
                kind: SignalKind::FinancialPressure,
            },
            SignalDetector {
                id: "suspicious_sender_tld",
                name: "Sender domain uses suspicious TLD",
                weight: w.suspicious_sender_tld,
                kind: SignalKind::SuspiciousSenderTld,
            },
            SignalDetector {
                id: "header_domain_mismatch",
                name: "Reply-To or Return-Path domain mismatch",
                weight: w.header_domain_mismatch,
                kind: SignalKind::HeaderDomainMismatch,
            },
            SignalDetector {
                id: "unrelated_link_domain",
                name: "Link domain unrelated to sender",
                weight: w.unrelated_link_domain,
                kind: SignalKind::UnrelatedLinkDomain,
            },
            SignalDetector {
                id: "suspicious_link_tld",
                name: "Link uses suspicious TLD",
                weight: w.suspicious_link_tld,
                kind: SignalKind::SuspiciousLinkTld,
            },
            SignalDetector {
                id: "excessive_links",
                name: "Excessive number of links",
                weight: w.excessive_links,
                kind: SignalKind::ExcessiveLinks,
            },
            SignalDetector {
                id: "generic_greeting",
                name: "Generic greeting",
                weight: w.generic_greeting,
                kind: SignalKind::GenericGreeting,
            },
            SignalDetector {
                id: "brand_impersonation",
                name: "Brand mention without matching sender domain",
                weight: w.brand_impersonation,
                kind: SignalKind::BrandImpersonation,
            },
            SignalDetector {
                id: "authentication_failure",
                name: "SPF/DKIM/DMARC failure",
                weight: w.authentication_failure,
                kind: SignalKind::AuthenticationFailure,
            },
        ];
        Self { config, catalog }
    }

    /// Evaluate every detector in catalog order and fold the outcomes into
    /// a capped probability. A detector fault is logged, recorded in the
    /// diagnostics channel and treated as "did not trigger"; evaluation
    /// always continues with the remaining detectors.
    pub fn analyze(&self, email: &NormalizedEmail) -> PhishingResult {
        let haystack = searchable_text(email);

        let mut total = 0.0;
        let mut signals = Vec::new();
        let mut weights = HashMap::new();
        let mut diagnostics = Vec::new();

        for detector in &self.catalog {
            match self.detect(detector, email, &haystack) {
                Ok(true) => {
                    total += detector.weight;
                    signals.push(detector.name.to_string());
                    weights.insert(detector.id.to_string(), detector.weight);
                }
                Ok(false) => {}
                Err(err) => {
                    log::warn!("phishing detector fault ({err})");
                    diagnostics.push(err.to_string());
                }
            }
        }

        let probability = round3(total.min(1.0));
        log::debug!(
            "phishing probability {:.3} from {} signal(s) for email {}",
            probability,
            signals.len(),
            email.id
        );

        PhishingResult {
            probability,
            signals,
            weights,
            diagnostics,
        }
    }

    fn detect(
        &self,
        detector: &SignalDetector,
        email: &NormalizedEmail,
        haystack: &str,
    ) -> Result<bool, DetectorError> {
        match detector.kind {
            SignalKind::UrgencyLanguage => {
                Ok(contains_any(haystack, &self.config.urgency_phrases))
            }
            SignalKind::CredentialRequest => {
                Ok(contains_any(haystack, &self.config.credential_phrases))
            }
            SignalKind::FinancialPressure => {
                Ok(contains_any(haystack, &self.config.financial_phrases))
            }
            SignalKind::SuspiciousSenderTld => Ok(DomainUtils::has_tld_in(
                &email.sender_domain,
                &self.config.suspicious_tlds,
            )),
            SignalKind::HeaderDomainMismatch => Ok(self.header_domain_mismatch(email)),
            SignalKind::UnrelatedLinkDomain => self.unrelated_link_domain(detector.id, email),
            SignalKind::SuspiciousLinkTld => self.suspicious_link_tld(detector.id, email),
            SignalKind::ExcessiveLinks => Ok(email.urls.len() > self.config.max_url_count),
            SignalKind::GenericGreeting => {
                Ok(contains_any(haystack, &self.config.greeting_phrases))
            }
            SignalKind::BrandImpersonation => Ok(self.brand_impersonation(email, haystack)),
            SignalKind::AuthenticationFailure => Ok(self.authentication_failure(email)),
        }
    }

    fn header_domain_mismatch(&self, email: &NormalizedEmail) -> bool {
        let sender = &email.sender_domain;

        let reply_to_domain = email.auth.reply_to_domain.clone().or_else(|| {
            email
                .auth
                .reply_to
                .as_deref()
                .and_then(DomainUtils::extract_domain)
        });
        if let Some(domain) = reply_to_domain {
            if domain.to_lowercase() != *sender {
                return true;
            }
        }

        if let Some(return_path) = &email.auth.return_path {
            if let Some(domain) = DomainUtils::extract_domain(return_path) {
                if domain != *sender {
                    return true;
                }
            }
        }

        false
    }

    fn unrelated_link_domain(
        &self,
        id: &'static str,
        email: &NormalizedEmail,
    ) -> Result<bool, DetectorError> {
        for raw in &email.urls {
            let parsed = Url::parse(raw).map_err(|e| DetectorError {
                detector: id,
                message: format!("failed to parse URL '{raw}': {e}"),
            })?;
            if let Some(host) = parsed.host_str() {
                if !DomainUtils::domains_related(host, &email.sender_domain) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn suspicious_link_tld(
        &self,
        id: &'static str,
        email: &NormalizedEmail,
    ) -> Result<bool, DetectorError> {
        for raw in &email.urls {
            let parsed = Url::parse(raw).map_err(|e| DetectorError {
                detector: id,
                message: format!("failed to parse URL '{raw}': {e}"),
            })?;
            if let Some(host) = parsed.host_str() {
                if DomainUtils::has_tld_in(host, &self.config.suspicious_tlds) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn brand_impersonation(&self, email: &NormalizedEmail, haystack: &str) -> bool {
        for brand in &self.config.brand_tokens {
            let brand_lower = brand.to_lowercase();
            if !haystack.contains(&brand_lower) {
                continue;
            }
            // Domains never carry spaces; compare against the collapsed token.
            let domain_token: String = brand_lower.split_whitespace().collect();
            if !email.sender_domain.contains(&domain_token) {
                return true;
            }
        }
        false
    }

    fn authentication_failure(&self, email: &NormalizedEmail) -> bool {
        [&email.auth.spf, &email.auth.dkim, &email.auth.dmarc]
            .into_iter()
            .flatten()
            .any(|result| {
                let result = result.to_lowercase();
                self.config
                    .auth_failure_values
                    .iter()
                    .any(|v| v.to_lowercase() == result)
            })
    }
}

fn searchable_text(email: &NormalizedEmail) -> String {
    format!("{} {} {}", email.subject, email.text_body, email.html_body).to_lowercase()
}

fn contains_any(haystack: &str, phrases: &[String]) -> bool {
    phrases
        .iter()
        .any(|phrase| haystack.contains(&phrase.to_lowercase()))
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::AuthenticationMetadata;
    use chrono::Utc;

    fn email() -> NormalizedEmail {
        NormalizedEmail {
            id: "msg-1".to_string(),
            sender: "alice@example.com".to_string(),
            sender_domain: "example.com".to_string(),
            recipient: "bob@corp.test".to_string(),
            subject: "Meeting notes".to_string(),
            urls: vec![],
            attachments: vec![],
            html_body: String::new(),
            text_body: "See you at three.".to_string(),
            auth: AuthenticationMetadata {
                spf: Some("pass".to_string()),
                dkim: Some("pass".to_string()),
                dmarc: Some("pass".to_string()),
                ..Default::default()
            },
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_clean_email_has_zero_probability() {
        let result = PhishingSignalEngine::default().analyze(&email());
        assert_eq!(result.probability, 0.0);
        assert!(result.signals.is_empty());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_urgency_and_greeting_sum_weights() {
        let mut mail = email();
        mail.subject = "URGENT: read this".to_string();
        mail.text_body = "Dear Customer, please respond.".to_string();

        let engine = PhishingSignalEngine::default();
        let result = engine.analyze(&mail);

        assert_eq!(result.probability, 0.35);
        assert_eq!(result.signals.len(), 2);
        assert!(result.weights.contains_key("urgency_language"));
        assert!(result.weights.contains_key("generic_greeting"));
    }

    #[test]
    fn test_probability_is_capped_at_one() {
        let mut mail = email();
        mail.sender = "support@secure-login.xyz".to_string();
        mail.sender_domain = "secure-login.xyz".to_string();
        mail.subject = "URGENT: verify your account".to_string();
        mail.text_body =
            "Dear customer, confirm your identity or face a wire transfer hold.".to_string();
        mail.urls = vec!["http://badsite.top/login".to_string()];
        mail.auth.spf = Some("fail".to_string());

        let result = PhishingSignalEngine::default().analyze(&mail);
        assert_eq!(result.probability, 1.0);
        assert!(result.signals.len() >= 6);
    }

    #[test]
    fn test_header_mismatch_detector() {
        let mut mail = email();
        mail.auth.reply_to = Some("other@elsewhere.net".to_string());

        let result = PhishingSignalEngine::default().analyze(&mail);
        assert!(result
            .weights
            .contains_key("header_domain_mismatch"));
    }

    #[test]
    fn test_brand_mention_with_matching_domain_does_not_trigger() {
        let mut mail = email();
        mail.sender = "news@paypal.com".to_string();
        mail.sender_domain = "paypal.com".to_string();
        mail.text_body = "Your PayPal receipt is attached below.".to_string();

        let result = PhishingSignalEngine::default().analyze(&mail);
        assert!(!result.weights.contains_key("brand_impersonation"));
    }

    #[test]
    fn test_brand_mention_with_foreign_domain_triggers() {
        let mut mail = email();
        mail.text_body = "Your PayPal account needs attention.".to_string();

        let result = PhishingSignalEngine::default().analyze(&mail);
        assert!(result.weights.contains_key("brand_impersonation"));
    }

    #[test]
    fn test_detector_fault_is_isolated() {
        let mut mail = email();
        mail.urls = vec!["not a url at all".to_string()];
        // The greeting detector must still run after the URL detectors fault.
        mail.text_body = "Dear customer, hello.".to_string();

        let result = PhishingSignalEngine::default().analyze(&mail);
        assert!(!result.diagnostics.is_empty());
        assert!(result.diagnostics.iter().all(|d| d.contains("parse")));
        assert!(result.weights.contains_key("generic_greeting"));
        assert!(!result.weights.contains_key("unrelated_link_domain"));
    }

    #[test]
    fn test_excessive_links_threshold() {
        let mut mail = email();
        mail.urls = (0..11)
            .map(|i| format!("https://example.com/page/{i}"))
            .collect();

        let result = PhishingSignalEngine::default().analyze(&mail);
        assert!(result.weights.contains_key("excessive_links"));
    }

    #[test]
    fn test_auth_failure_values() {
        for value in ["fail", "softfail", "none", "temperror", "permerror"] {
            let mut mail = email();
            mail.auth.dmarc = Some(value.to_string());
            let result = PhishingSignalEngine::default().analyze(&mail);
            assert!(
                result.weights.contains_key("authentication_failure"),
                "expected trigger for dmarc={value}"
            );
        }
    }

    #[test]
    fn test_adding_a_trigger_never_decreases_probability() {
        let mut mail = email();
        mail.subject = "URGENT: action required".to_string();
        let engine = PhishingSignalEngine::default();
        let base = engine.analyze(&mail).probability;

        mail.text_body = "Dear customer, please verify your account.".to_string();
        let more = engine.analyze(&mail).probability;
        assert!(more >= base);
    }
}
