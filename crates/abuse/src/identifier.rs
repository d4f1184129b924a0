//! Identifiers that abuse controls attach to.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// The subject of counting, throttling, and blocking.
///
/// Deliberately broader than a user id: most abusive traffic arrives before
/// any credential has been verified, so the controls key on what the request
/// itself carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Identifier {
    Email { address: String },
    Mobile { number: String },
    /// Pre-auth network identity: source address plus agent string.
    Network { ip: IpAddr, user_agent: String },
}

impl Identifier {
    /// Email identifier, normalized so case and stray whitespace cannot
    /// split one mailbox into several counters.
    pub fn email(address: impl Into<String>) -> Self {
        Identifier::Email {
            address: address.into().trim().to_lowercase(),
        }
    }

    /// Mobile identifier, normalized by stripping separators.
    pub fn mobile(number: impl Into<String>) -> Self {
        Identifier::Mobile {
            number: number
                .into()
                .chars()
                .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
                .collect(),
        }
    }

    pub fn network(ip: IpAddr, user_agent: impl Into<String>) -> Self {
        Identifier::Network {
            ip,
            user_agent: user_agent.into(),
        }
    }

    /// Stable storage key. Equal identifiers always map to the same key,
    /// which is what makes counters shared across nodes meaningful.
    pub fn key(&self) -> String {
        match self {
            Identifier::Email { address } => format!("email:{address}"),
            Identifier::Mobile { number } => format!("mobile:{number}"),
            Identifier::Network { ip, user_agent } => format!("net:{ip}:{user_agent}"),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
