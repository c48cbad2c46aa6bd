//! Transport selection
//!
//! Decides which address is handed to the media engine for a given
//! connection mode. Direct keeps the source as-is; proxy routes it through
//! a configurable relay endpoint.

use crate::models::ConnectionMode;

/// Placeholder replaced by the percent-encoded source address
pub const URL_PLACEHOLDER: &str = "{url}";

/// Default relay: a self-hosted endpoint on the local machine
pub const DEFAULT_PROXY_TEMPLATE: &str = "http://127.0.0.1:8888/proxy?url={url}";

/// Proxy rewrite rule
///
/// The template either contains `{url}`, which is replaced by the encoded
/// source, or is used as a plain prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRule {
    template: String,
}

impl ProxyRule {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Rewrite a source address through the relay
    pub fn rewrite(&self, source: &str) -> String {
        let encoded = urlencoding::encode(source);
        if self.template.contains(URL_PLACEHOLDER) {
            self.template.replace(URL_PLACEHOLDER, &encoded)
        } else {
            format!("{}{}", self.template, encoded)
        }
    }
}

impl Default for ProxyRule {
    fn default() -> Self {
        Self::new(DEFAULT_PROXY_TEMPLATE)
    }
}

/// Address to hand to the engine for `source` under `mode`
pub fn resolve_source(source: &str, mode: ConnectionMode, rule: &ProxyRule) -> String {
    match mode {
        ConnectionMode::Direct => source.to_string(),
        ConnectionMode::Proxy => rule.rewrite(source),
    }
}
