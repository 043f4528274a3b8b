//! Decision Engine
//!
//! Fuses the three independent stage results into one verdict, a bounded
//! trust score, the set of blocked URLs, a sanitized HTML body and the list
//! of actions taken. Status is a strict OR over the three channels; a
//! single strong signal in any one of them is sufficient. The trust score
//! is computed from the same inputs but independently of the verdict.

use crate::attachment::MalwareResult;
use crate::config::DecisionConfig;
use crate::email::NormalizedEmail;
use crate::phishing::PhishingResult;
use crate::url_scanner::{RiskLevel, UrlScanResult};
use chrono::{DateTime, Utc};
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailStatus {
    Safe,
    Suspicious,
}

/// Final analysis artifact handed to downstream collaborators. Immutable
/// once produced; every field is always populated and serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAnalysisResult {
    pub email_id: String,
    pub status: EmailStatus,
    pub trust_score: i32,
    pub phishing_signals: Vec<String>,
    pub phishing_probability: f64,
    pub url_findings: Vec<UrlScanResult>,
    pub malware_findings: MalwareResult,
    pub sanitized_body: String,
    pub original_body: String,
    pub security_flag: bool,
    pub analyzed_at: DateTime<Utc>,
    pub actions_taken: Vec<String>,
}

pub struct DecisionEngine {
    config: DecisionConfig,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(DecisionConfig::default())
    }
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    pub fn decide(
        &self,
        email: &NormalizedEmail,
        phishing: &PhishingResult,
        url_results: &[UrlScanResult],
        malware: &MalwareResult,
    ) -> SecurityAnalysisResult {
        let high_urls = count_risk(url_results, RiskLevel::High);
        let medium_urls = count_risk(url_results, RiskLevel::Medium);

        let suspicious = phishing.probability > self.config.phishing_threshold
            || high_urls > 0
            || malware.has_risk;
        let status = if suspicious {
            EmailStatus::Suspicious
        } else {
            EmailStatus::Safe
        };

        let trust_score = self.trust_score(
            phishing.probability,
            high_urls,
            medium_urls,
            malware.flagged_files.len(),
        );

        let blocked = if suspicious {
            blocked_urls(url_results)
        } else {
            Vec::new()
        };

        let sanitized_body = if blocked.is_empty() {
            email.html_body.clone()
        } else {
            sanitize_body(&email.html_body, &blocked)
        };

        let mut actions_taken = Vec::new();
        if suspicious {
            actions_taken.push("Email flagged as suspicious".to_string());
            if !blocked.is_empty() {
                actions_taken.push(format!("{} URL(s) blocked", blocked.len()));
            }
            if malware.has_risk {
                actions_taken.push(format!(
                    "{} attachment(s) flagged",
                    malware.flagged_files.len()
                ));
            }
            // Handoff to the external explanation collaborator, always last.
            actions_taken.push("Forwarded to AI explanation service".to_string());
        }

        log::debug!(
            "email {} decided {:?} with trust score {}",
            email.id,
            status,
            trust_score
        );

        SecurityAnalysisResult {
            email_id: email.id.clone(),
            status,
            trust_score,
            phishing_signals: phishing.signals.clone(),
            phishing_probability: phishing.probability,
            url_findings: url_results.to_vec(),
            malware_findings: malware.clone(),
            sanitized_body,
            original_body: email.html_body.clone(),
            security_flag: suspicious,
            analyzed_at: Utc::now(),
            actions_taken,
        }
    }

    fn trust_score(
        &self,
        probability: f64,
        high_urls: usize,
        medium_urls: usize,
        flagged_attachments: usize,
    ) -> i32 {
        let mut score = (1.0 - probability) * 100.0;
        score -= self.config.high_url_penalty * high_urls as f64;
        score -= self.config.medium_url_penalty * medium_urls as f64;
        score -= self.config.flagged_attachment_penalty * flagged_attachments as f64;
        score.clamp(0.0, 100.0).round() as i32
    }
}

fn count_risk(url_results: &[UrlScanResult], level: RiskLevel) -> usize {
    url_results.iter().filter(|r| r.risk == level).count()
}

/// All high- and medium-risk URLs, deduplicated, input order preserved.
fn blocked_urls(url_results: &[UrlScanResult]) -> Vec<String> {
    let mut blocked: Vec<String> = Vec::new();
    for result in url_results {
        if result.risk >= RiskLevel::Medium && !blocked.contains(&result.url) {
            blocked.push(result.url.clone());
        }
    }
    blocked
}

/// Rewrite every blocked URL out of the HTML body. Per URL: neutralize
/// `href`/`src` attributes first (attribute name matched case-insensitively,
/// the URL itself literally), then replace every remaining occurrence with
/// the blocked marker. The literal pass also scrubs the URL text the
/// attribute rewrites re-embed, so the sanitized body never contains a
/// blocked URL verbatim.
fn sanitize_body(body: &str, blocked: &[String]) -> String {
    let mut sanitized = body.to_string();

    for url in blocked {
        let escaped = regex::escape(url);

        let href_replacement =
            format!("href=\"#\" data-blocked-url=\"{url}\" title=\"Blocked for security\"");
        sanitized = replace_attribute(&sanitized, "href", &escaped, &href_replacement);

        let src_replacement =
            format!("src=\"\" data-blocked-url=\"{url}\" alt=\"Blocked content\"");
        sanitized = replace_attribute(&sanitized, "src", &escaped, &src_replacement);

        sanitized = sanitized.replace(url, "[URL BLOCKED FOR SECURITY]");
    }

    sanitized
}

fn replace_attribute(body: &str, attribute: &str, escaped_url: &str, replacement: &str) -> String {
    match Regex::new(&format!(
        r#"(?i:{attribute})\s*=\s*["']{escaped_url}["']"#
    )) {
        Ok(pattern) => pattern.replace_all(body, NoExpand(replacement)).into_owned(),
        Err(e) => {
            // Escaped input always compiles; keep the body untouched if not.
            log::warn!("failed to build sanitizer pattern for {attribute}: {e}");
            body.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::AttachmentScanner;
    use crate::email::{AttachmentDescriptor, AuthenticationMetadata};
    use crate::url_scanner::UrlRiskScanner;
    use chrono::Utc;
    use std::collections::HashMap;

    fn email(html_body: &str, urls: Vec<String>) -> NormalizedEmail {
        NormalizedEmail {
            id: "msg-7".to_string(),
            sender: "alice@example.com".to_string(),
            sender_domain: "example.com".to_string(),
            recipient: "bob@corp.test".to_string(),
            subject: "Hello".to_string(),
            urls,
            attachments: vec![],
            html_body: html_body.to_string(),
            text_body: String::new(),
            auth: AuthenticationMetadata::default(),
            received_at: Utc::now(),
        }
    }

    fn phishing(probability: f64) -> PhishingResult {
        PhishingResult {
            probability,
            signals: vec![],
            weights: HashMap::new(),
            diagnostics: vec![],
        }
    }

    fn scan(urls: &[String]) -> Vec<UrlScanResult> {
        UrlRiskScanner::new(Default::default()).unwrap().scan_urls(urls)
    }

    #[test]
    fn test_safe_email_keeps_body_and_empty_actions() {
        let mail = email("<p>hi</p>", vec![]);
        let result = DecisionEngine::default().decide(
            &mail,
            &phishing(0.1),
            &[],
            &MalwareResult::clean(),
        );

        assert_eq!(result.status, EmailStatus::Safe);
        assert!(!result.security_flag);
        assert_eq!(result.sanitized_body, result.original_body);
        assert!(result.actions_taken.is_empty());
        assert_eq!(result.trust_score, 90);
    }

    #[test]
    fn test_phishing_probability_alone_flips_status() {
        let mail = email("", vec![]);
        let result = DecisionEngine::default().decide(
            &mail,
            &phishing(0.71),
            &[],
            &MalwareResult::clean(),
        );
        assert_eq!(result.status, EmailStatus::Suspicious);
        assert!(result.security_flag);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mail = email("", vec![]);
        let result = DecisionEngine::default().decide(
            &mail,
            &phishing(0.7),
            &[],
            &MalwareResult::clean(),
        );
        assert_eq!(result.status, EmailStatus::Safe);
    }

    #[test]
    fn test_malware_alone_flips_status() {
        let mail = email("", vec![]);
        let malware = AttachmentScanner::default()
            .scan(&[AttachmentDescriptor::new("invoice.pdf.exe", 100)]);
        let result =
            DecisionEngine::default().decide(&mail, &phishing(0.0), &[], &malware);

        assert_eq!(result.status, EmailStatus::Suspicious);
        assert_eq!(
            result.actions_taken,
            vec![
                "Email flagged as suspicious".to_string(),
                "1 attachment(s) flagged".to_string(),
                "Forwarded to AI explanation service".to_string(),
            ]
        );
        assert_eq!(result.trust_score, 80);
    }

    #[test]
    fn test_sanitization_rewrites_and_scrubs_blocked_urls() {
        let url = "http://203.0.113.5/login".to_string();
        let body = format!(
            "<p>Click <a href=\"{url}\">here</a> or visit {url} now.</p><img src='{url}'>"
        );
        let mail = email(&body, vec![url.clone()]);
        let url_results = scan(&mail.urls);

        let result = DecisionEngine::default().decide(
            &mail,
            &phishing(0.0),
            &url_results,
            &MalwareResult::clean(),
        );

        assert_eq!(result.status, EmailStatus::Suspicious);
        assert!(!result.sanitized_body.contains(&url));
        assert!(result.sanitized_body.contains("href=\"#\""));
        assert!(result.sanitized_body.contains("title=\"Blocked for security\""));
        assert!(result.sanitized_body.contains("alt=\"Blocked content\""));
        assert!(result.sanitized_body.contains("[URL BLOCKED FOR SECURITY]"));
        assert_eq!(result.original_body, body);
        assert!(result
            .actions_taken
            .contains(&"1 URL(s) blocked".to_string()));
    }

    #[test]
    fn test_attribute_name_matched_case_insensitively() {
        let url = "http://203.0.113.5/login".to_string();
        let body = format!("<a HREF=\"{url}\">x</a>");
        let mail = email(&body, vec![url.clone()]);
        let url_results = scan(&mail.urls);

        let result = DecisionEngine::default().decide(
            &mail,
            &phishing(0.0),
            &url_results,
            &MalwareResult::clean(),
        );
        assert!(!result.sanitized_body.contains(&url));
        assert!(result.sanitized_body.contains("href=\"#\""));
    }

    #[test]
    fn test_safe_status_leaves_medium_urls_unblocked() {
        // A medium-risk URL lowers the score but on its own never flips the
        // verdict, and a safe email is never rewritten.
        let url = "https://win-a-prize.xyz/".to_string();
        let body = format!("<a href=\"{url}\">offer</a>");
        let mail = email(&body, vec![url.clone()]);
        let url_results = scan(&mail.urls);
        assert_eq!(url_results[0].risk, RiskLevel::Medium);

        let result = DecisionEngine::default().decide(
            &mail,
            &phishing(0.0),
            &url_results,
            &MalwareResult::clean(),
        );
        assert_eq!(result.status, EmailStatus::Safe);
        assert_eq!(result.sanitized_body, body);
        assert_eq!(result.trust_score, 95);
    }

    #[test]
    fn test_trust_score_clamps_at_zero() {
        let urls: Vec<String> = (0..10)
            .map(|i| format!("http://203.0.113.{i}/login"))
            .collect();
        let mail = email("", urls.clone());
        let url_results = scan(&urls);

        let result = DecisionEngine::default().decide(
            &mail,
            &phishing(0.9),
            &url_results,
            &MalwareResult::clean(),
        );
        assert_eq!(result.trust_score, 0);
    }

    #[test]
    fn test_more_high_risk_urls_never_raise_trust() {
        let one: Vec<String> = vec!["http://203.0.113.5/login".to_string()];
        let two: Vec<String> = vec![
            "http://203.0.113.5/login".to_string(),
            "http://203.0.113.6/login".to_string(),
        ];
        let engine = DecisionEngine::default();

        let score_one = engine
            .decide(
                &email("", one.clone()),
                &phishing(0.2),
                &scan(&one),
                &MalwareResult::clean(),
            )
            .trust_score;
        let score_two = engine
            .decide(
                &email("", two.clone()),
                &phishing(0.2),
                &scan(&two),
                &MalwareResult::clean(),
            )
            .trust_score;

        assert!(score_two <= score_one);
    }

    #[test]
    fn test_duplicate_blocked_urls_counted_once() {
        let url = "http://203.0.113.5/login".to_string();
        let urls = vec![url.clone(), url.clone()];
        let mail = email("", urls.clone());
        let url_results = scan(&urls);

        let result = DecisionEngine::default().decide(
            &mail,
            &phishing(0.0),
            &url_results,
            &MalwareResult::clean(),
        );
        assert!(result
            .actions_taken
            .contains(&"1 URL(s) blocked".to_string()));
    }
}
