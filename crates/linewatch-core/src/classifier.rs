//! Log message classification
//!
//! Maps a single router log message to a `(scope, action)` pair using
//! case-insensitive substring matching over five keyword sets.
//!
//! ## Precedence
//!
//! Rules are evaluated top to bottom and the first match wins:
//!
//! 1. planned keywords → `(Both, PlannedHint)`
//! 2. IPv6 disconnect → `(Ipv6, Disconnect)`
//! 3. IPv6 connect → `(Ipv6, Connect)`
//! 4. IPv4 disconnect → `(Ipv4, Disconnect)`
//! 5. IPv4 connect → `(Ipv4, Connect)`
//!
//! Anything else is `(Unknown, Ignore)`. IPv6 phrases contain the IPv4
//! phrases' common stem ("internetverbindung ... wurde getrennt"), so the
//! IPv6 rules must run first.

use crate::model::Protocol;
use serde::{Deserialize, Serialize};

/// Which protocol(s) a classified message refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolScope {
    Ipv4,
    Ipv6,
    Both,
    Unknown,
}

impl ProtocolScope {
    /// The protocols this scope applies to
    pub fn protocols(self) -> &'static [Protocol] {
        match self {
            ProtocolScope::Ipv4 => &[Protocol::Ipv4],
            ProtocolScope::Ipv6 => &[Protocol::Ipv6],
            ProtocolScope::Both => &Protocol::ALL,
            ProtocolScope::Unknown => &[],
        }
    }
}

/// What a classified message means for the outage state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogAction {
    PlannedHint,
    Disconnect,
    Connect,
    Ignore,
}

/// Result of classifying one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Classification {
    pub scope: ProtocolScope,
    pub action: LogAction,
}

impl Classification {
    pub const IGNORED: Classification = Classification {
        scope: ProtocolScope::Unknown,
        action: LogAction::Ignore,
    };
}

/// Configurable keyword sets
///
/// Defaults match the German event log of AVM FRITZ!Box routers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSets {
    #[serde(default = "default_planned")]
    pub planned: Vec<String>,
    #[serde(default = "default_ipv4_disconnect")]
    pub ipv4_disconnect: Vec<String>,
    #[serde(default = "default_ipv4_connect")]
    pub ipv4_connect: Vec<String>,
    #[serde(default = "default_ipv6_disconnect")]
    pub ipv6_disconnect: Vec<String>,
    #[serde(default = "default_ipv6_connect")]
    pub ipv6_connect: Vec<String>,
}

impl KeywordSets {
    /// Validate that every set has at least one non-blank keyword
    pub fn validate(&self) -> Result<(), crate::Error> {
        let sets = [
            ("planned", &self.planned),
            ("ipv4_disconnect", &self.ipv4_disconnect),
            ("ipv4_connect", &self.ipv4_connect),
            ("ipv6_disconnect", &self.ipv6_disconnect),
            ("ipv6_connect", &self.ipv6_connect),
        ];

        for (name, keywords) in sets {
            if keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(crate::Error::config(format!(
                    "Keyword set '{}' must contain at least one keyword",
                    name
                )));
            }
        }

        Ok(())
    }
}

impl Default for KeywordSets {
    fn default() -> Self {
        Self {
            planned: default_planned(),
            ipv4_disconnect: default_ipv4_disconnect(),
            ipv4_connect: default_ipv4_connect(),
            ipv6_disconnect: default_ipv6_disconnect(),
            ipv6_connect: default_ipv6_connect(),
        }
    }
}

fn owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| k.to_string()).collect()
}

fn default_planned() -> Vec<String> {
    owned(&[
        "zwangstrennung",
        "wird kurz unterbrochen",
        "trennung durch den anbieter",
    ])
}

fn default_ipv4_disconnect() -> Vec<String> {
    owned(&["internetverbindung wurde getrennt"])
}

fn default_ipv4_connect() -> Vec<String> {
    owned(&["internetverbindung wurde erfolgreich hergestellt"])
}

fn default_ipv6_disconnect() -> Vec<String> {
    owned(&[
        "internetverbindung ipv6 wurde getrennt",
        "ipv6-präfix ist nicht mehr gültig",
        "ipv6-präfix nicht mehr gültig",
    ])
}

fn default_ipv6_connect() -> Vec<String> {
    owned(&[
        "internetverbindung ipv6 wurde erfolgreich hergestellt",
        "internetverbindung ipv6 wurde erfolgreich bezogen",
        "ipv6-präfix wurde erfolgreich bezogen",
    ])
}

/// One precedence rule: a keyword set and the classification it yields
#[derive(Debug, Clone)]
struct Rule {
    keywords: Vec<String>,
    outcome: Classification,
}

impl Rule {
    fn new(keywords: &[String], scope: ProtocolScope, action: LogAction) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            outcome: Classification { scope, action },
        }
    }

    fn matches(&self, message: &str) -> bool {
        self.keywords.iter().any(|k| message.contains(k.as_str()))
    }
}

/// Keyword-driven log message classifier
///
/// Keywords are normalised (trimmed, lowercased) once at construction.
#[derive(Debug, Clone)]
pub struct LogClassifier {
    rules: Vec<Rule>,
}

impl LogClassifier {
    pub fn new(keywords: &KeywordSets) -> Self {
        let rules = vec![
            Rule::new(&keywords.planned, ProtocolScope::Both, LogAction::PlannedHint),
            Rule::new(&keywords.ipv6_disconnect, ProtocolScope::Ipv6, LogAction::Disconnect),
            Rule::new(&keywords.ipv6_connect, ProtocolScope::Ipv6, LogAction::Connect),
            Rule::new(&keywords.ipv4_disconnect, ProtocolScope::Ipv4, LogAction::Disconnect),
            Rule::new(&keywords.ipv4_connect, ProtocolScope::Ipv4, LogAction::Connect),
        ];

        Self { rules }
    }

    /// Classify one message; the first matching rule wins
    pub fn classify(&self, message: &str) -> Classification {
        let message = message.to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.matches(&message))
            .map(|rule| rule.outcome)
            .unwrap_or(Classification::IGNORED)
    }
}

impl Default for LogClassifier {
    fn default() -> Self {
        Self::new(&KeywordSets::default())
    }
}
