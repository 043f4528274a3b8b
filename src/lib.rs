pub mod attachment;
pub mod config;
pub mod decision;
pub mod domain_utils;
pub mod email;
pub mod phishing;
pub mod pipeline;
pub mod url_scanner;

pub use attachment::{AttachmentFinding, AttachmentScanner, MalwareResult};
pub use config::AnalysisConfig;
pub use decision::{DecisionEngine, EmailStatus, SecurityAnalysisResult};
pub use email::{AttachmentDescriptor, AuthenticationMetadata, NormalizedEmail};
pub use phishing::{DetectorError, PhishingResult, PhishingSignalEngine};
pub use pipeline::SecurityPipeline;
pub use url_scanner::{RiskLevel, UrlRiskScanner, UrlScanResult};
