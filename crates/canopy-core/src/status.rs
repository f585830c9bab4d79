#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result of ticking a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BtStatus {
    Success,
    Failure,
    Running,
    Error,
}

impl BtStatus {
    /// `true` for every status except `Running`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, BtStatus::Running)
    }

    pub fn from_bool(ok: bool) -> Self {
        if ok {
            BtStatus::Success
        } else {
            BtStatus::Failure
        }
    }

    /// Swaps `Success` and `Failure`; `Running` and `Error` pass through.
    pub fn invert(self) -> Self {
        match self {
            BtStatus::Success => BtStatus::Failure,
            BtStatus::Failure => BtStatus::Success,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BtStatus::Success => "success",
            BtStatus::Failure => "failure",
            BtStatus::Running => "running",
            BtStatus::Error => "error",
        }
    }
}

impl core::fmt::Display for BtStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
