//! Operation kinds and their fixed-window quotas.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Operations subject to abuse controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Credential sign-in attempt.
    Login,
    /// Password reset request.
    PasswordReset,
    /// One-time-code delivery (SMS or email).
    OtpRequest,
    /// Bulk report generation.
    ReportExport,
    /// Outbound message to guardians or students.
    MessageSend,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Login,
        OperationKind::PasswordReset,
        OperationKind::OtpRequest,
        OperationKind::ReportExport,
        OperationKind::MessageSend,
    ];

    /// Per-kind quota. These numbers are policy and get reviewed like code.
    pub const fn quota(self) -> Quota {
        match self {
            OperationKind::Login => Quota::new(5, 300),
            OperationKind::PasswordReset => Quota::new(3, 900),
            OperationKind::OtpRequest => Quota::new(3, 300),
            OperationKind::ReportExport => Quota::new(10, 3_600),
            OperationKind::MessageSend => Quota::new(20, 3_600),
        }
    }

    /// Kinds where consecutive credential failures impose a growing delay
    /// on the next attempt.
    pub const fn backoff_applies(self) -> bool {
        matches!(self, OperationKind::Login)
    }

    /// Kinds whose mere usage feeds the suspicion score. Each of these
    /// costs the platform money or reaches someone's phone.
    pub const fn is_abuse_prone(self) -> bool {
        matches!(
            self,
            OperationKind::OtpRequest | OperationKind::ReportExport | OperationKind::MessageSend
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Login => "login",
            OperationKind::PasswordReset => "password_reset",
            OperationKind::OtpRequest => "otp_request",
            OperationKind::ReportExport => "report_export",
            OperationKind::MessageSend => "message_send",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-window quota: at most `limit` acquisitions per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub limit: u32,
    pub window_secs: i64,
}

impl Quota {
    pub const fn new(limit: u32, window_secs: i64) -> Self {
        Self { limit, window_secs }
    }

    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_secs)
    }

    /// Start of the window containing `now`.
    ///
    /// Windows are aligned to the epoch, so every node computes the same
    /// boundary for the same instant without coordinating.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs = now.timestamp().div_euclid(self.window_secs) * self.window_secs;
        DateTime::from_timestamp(secs, 0).unwrap_or(now)
    }

    /// When the window containing `now` rolls over.
    pub fn resets_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.window_start(now) + self.window()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
