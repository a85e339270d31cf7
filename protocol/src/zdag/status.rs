//! The externally visible classification result.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-confirmation risk status of a transaction id.
///
/// Variants are listed in precedence order: when several conditions hold,
/// the first one listed wins. The numeric codes are stable and shared with
/// wallets and explorers that already speak them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZdagStatus {
    /// Unknown, or no longer pending (confirmed or evicted).
    NotFound,
    /// The transaction or one of its in-pool ancestors is double-spent.
    MajorConflict,
    /// The transaction performs an operation outside the fast-path rules.
    WarningNotZdagTx,
    /// The transaction or an ancestor is over the size/depth policy.
    WarningSizeOverPolicy,
    /// The transaction or an ancestor opted into fee-based replacement.
    WarningRbf,
    /// Safe to accept at zero confirmations.
    Ok,
}

impl ZdagStatus {
    /// Wire code.
    pub fn code(&self) -> i8 {
        match self {
            Self::NotFound => -1,
            Self::Ok => 0,
            Self::WarningRbf => 1,
            Self::WarningNotZdagTx => 2,
            Self::WarningSizeOverPolicy => 3,
            Self::MajorConflict => 4,
        }
    }

    /// Inverse of [`ZdagStatus::code`].
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(Self::NotFound),
            0 => Some(Self::Ok),
            1 => Some(Self::WarningRbf),
            2 => Some(Self::WarningNotZdagTx),
            3 => Some(Self::WarningSizeOverPolicy),
            4 => Some(Self::MajorConflict),
            _ => None,
        }
    }

    /// Canonical upper-case name, as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::MajorConflict => "MAJOR_CONFLICT",
            Self::WarningNotZdagTx => "WARNING_NOT_ZDAG_TX",
            Self::WarningSizeOverPolicy => "WARNING_SIZE_OVER_POLICY",
            Self::WarningRbf => "WARNING_RBF",
            Self::Ok => "OK",
        }
    }

    /// Returns `true` for the three `WARNING_*` statuses.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::WarningNotZdagTx | Self::WarningSizeOverPolicy | Self::WarningRbf
        )
    }
}

impl fmt::Display for ZdagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ZdagStatus; 6] = [
        ZdagStatus::NotFound,
        ZdagStatus::MajorConflict,
        ZdagStatus::WarningNotZdagTx,
        ZdagStatus::WarningSizeOverPolicy,
        ZdagStatus::WarningRbf,
        ZdagStatus::Ok,
    ];

    #[test]
    fn codes_match_wire_values() {
        assert_eq!(ZdagStatus::NotFound.code(), -1);
        assert_eq!(ZdagStatus::Ok.code(), 0);
        assert_eq!(ZdagStatus::WarningRbf.code(), 1);
        assert_eq!(ZdagStatus::WarningNotZdagTx.code(), 2);
        assert_eq!(ZdagStatus::WarningSizeOverPolicy.code(), 3);
        assert_eq!(ZdagStatus::MajorConflict.code(), 4);
    }

    #[test]
    fn from_code_inverts_code() {
        for status in ALL {
            assert_eq!(ZdagStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(ZdagStatus::from_code(5), None);
    }

    #[test]
    fn serde_uses_wire_names() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: ZdagStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn only_warnings_are_warnings() {
        assert!(ZdagStatus::WarningRbf.is_warning());
        assert!(!ZdagStatus::Ok.is_warning());
        assert!(!ZdagStatus::MajorConflict.is_warning());
        assert!(!ZdagStatus::NotFound.is_warning());
    }
}
