//! Engine configuration synthesis.
//!
//! Builds the smallest routing document that exercises one artifact: a loopback
//! listener, one direct egress, one file-backed rule provider and a catch-all.
//! The document is serialized as JSON (a YAML subset the engine parses) and
//! base64-encoded, which is the form its `-config` flag accepts.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;

use crate::discovery::BehaviorKind;

/// Name of the single egress proxy declared in every synthesized config.
pub const DIRECT_PROXY: &str = "probe-direct";

/// Name of the rule provider that loads the artifact under test.
pub const PROVIDER_NAME: &str = "under-test";

/// Refresh interval written into the provider; never reached in a single-shot run.
const PROVIDER_INTERVAL_SECS: u64 = 86_400;

/// Complete engine configuration document for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineDocument {
    pub mixed_port: u16,
    pub allow_lan: bool,
    pub bind_address: String,
    pub mode: String,
    pub log_level: String,
    pub proxies: Vec<ProxyEntry>,
    pub rule_providers: BTreeMap<String, RuleProvider>,
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleProvider {
    #[serde(rename = "type")]
    pub kind: String,
    pub behavior: BehaviorKind,
    pub format: String,
    pub path: String,
    pub interval: u64,
}

impl EngineDocument {
    pub fn new(port: u16, behavior: BehaviorKind, artifact_path: &Path) -> Self {
        let provider = RuleProvider {
            kind: "file".to_string(),
            behavior,
            format: provider_format(artifact_path).to_string(),
            path: artifact_path.to_string_lossy().into_owned(),
            interval: PROVIDER_INTERVAL_SECS,
        };

        Self {
            mixed_port: port,
            allow_lan: false,
            bind_address: "127.0.0.1".to_string(),
            mode: "rule".to_string(),
            log_level: "info".to_string(),
            proxies: vec![ProxyEntry {
                name: DIRECT_PROXY.to_string(),
                kind: "direct".to_string(),
            }],
            rule_providers: BTreeMap::from([(PROVIDER_NAME.to_string(), provider)]),
            rules: vec![
                format!("RULE-SET,{PROVIDER_NAME},{DIRECT_PROXY}"),
                "MATCH,DIRECT".to_string(),
            ],
        }
    }

    /// Render the document as text.
    pub fn to_document(&self) -> String {
        // Only strings, integers, booleans and maps: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn encode(&self) -> ConfigToken {
        ConfigToken(STANDARD.encode(self.to_document()))
    }
}

/// Provider `format` for an artifact, chosen from its extension.
fn provider_format(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("mrs") => "mrs",
        Some("yaml") | Some("yml") => "yaml",
        _ => "text",
    }
}

/// Opaque encoded configuration passed to the engine's `-config` flag.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigToken(String);

impl ConfigToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ConfigToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigToken({} bytes)", self.0.len())
    }
}

/// Synthesize the encoded configuration for one attempt.
pub fn synthesize(port: u16, behavior: BehaviorKind, artifact_path: &Path) -> ConfigToken {
    EngineDocument::new(port, behavior, artifact_path).encode()
}
