//! Security analysis pipeline
//!
//! Runs the four stages in sequence per email: phishing signals, URL risk,
//! attachment classification, then decision fusion. The first three stages
//! read only the immutable email and are mutually independent; the decision
//! stage joins their results. The pipeline holds one immutable
//! configuration snapshot and no per-email state, so concurrent `analyze`
//! calls need no synchronization.

use crate::attachment::AttachmentScanner;
use crate::config::AnalysisConfig;
use crate::decision::{DecisionEngine, SecurityAnalysisResult};
use crate::email::NormalizedEmail;
use crate::phishing::PhishingSignalEngine;
use crate::url_scanner::UrlRiskScanner;
use anyhow::Result;

pub struct SecurityPipeline {
    config: AnalysisConfig,
    phishing: PhishingSignalEngine,
    url_scanner: UrlRiskScanner,
    attachments: AttachmentScanner,
    decision: DecisionEngine,
}

impl SecurityPipeline {
    /// Build a pipeline from a validated configuration snapshot. Invalid
    /// configuration is rejected here, before any email is analyzed.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            phishing: PhishingSignalEngine::new(config.phishing.clone()),
            url_scanner: UrlRiskScanner::new(config.url_scanner.clone())?,
            attachments: AttachmentScanner::new(config.attachments.clone()),
            decision: DecisionEngine::new(config.decision.clone()),
            config,
        })
    }

    pub fn with_defaults() -> Self {
        Self::new(AnalysisConfig::default()).expect("default configuration is valid")
    }

    /// Analyze one email. Synchronous, no I/O, deterministic apart from the
    /// `analyzed_at` stamp on the result.
    pub fn analyze(&self, email: &NormalizedEmail) -> SecurityAnalysisResult {
        let phishing = self.phishing.analyze(email);
        let url_results = self.url_scanner.scan_urls(&email.urls);
        let malware = self.attachments.scan(&email.attachments);
        self.decision.decide(email, &phishing, &url_results, &malware)
    }

    /// Replace the configuration snapshot. The new snapshot is validated
    /// and every engine rebuilt before anything is swapped in, so a
    /// concurrent reader through a shared handle never observes a partial
    /// update and a bad config leaves the pipeline unchanged.
    pub fn update_config(&mut self, config: AnalysisConfig) -> Result<()> {
        *self = Self::new(config)?;
        Ok(())
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }
}
