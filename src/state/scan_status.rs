/// Scan status definitions for the audit state machine
///
/// A scan moves strictly forward through
/// `Ready -> Preparing -> Crawling -> Auditing -> Cleanup -> Done`.
/// `Auditing` may be skipped when no modules are loaded. `Paused` is never
/// entered through a transition; it is an overlay reported by the framework
/// while any pause request is held.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Resources constructed, nothing started
    Ready,

    /// Clock started, plugins launched
    Preparing,

    /// Spider running or restrict-paths being queued
    Crawling,

    /// Queue pipeline draining through the module scheduler
    Auditing,

    /// Overlay: some caller holds a pause request
    Paused,

    /// Clock frozen, waiting for plugins
    Cleanup,

    /// Reports generated; terminal
    Done,
}

impl ScanStatus {
    /// Returns true if a scan is in progress in this status
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Preparing | Self::Crawling | Self::Auditing | Self::Paused | Self::Cleanup
        )
    }

    /// Returns true for the terminal status
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if the pause overlay may be shown over this status
    pub fn can_show_paused(&self) -> bool {
        !matches!(self, Self::Ready | Self::Done)
    }

    /// Checks whether the state machine may move from `self` to `next`
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        use ScanStatus::*;
        matches!(
            (self, next),
            (Ready, Preparing)
                | (Preparing, Crawling)
                | (Preparing, Cleanup)
                | (Crawling, Auditing)
                | (Crawling, Cleanup)
                | (Auditing, Cleanup)
                | (Cleanup, Done)
        )
    }

    /// String form exposed to controllers and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Preparing => "preparing",
            Self::Crawling => "crawling",
            Self::Auditing => "auditing",
            Self::Paused => "paused",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
        }
    }

    /// Parses a status from its string form
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "ready" => Some(Self::Ready),
            "preparing" => Some(Self::Preparing),
            "crawling" => Some(Self::Crawling),
            "auditing" => Some(Self::Auditing),
            "paused" => Some(Self::Paused),
            "cleanup" => Some(Self::Cleanup),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Ready,
            Self::Preparing,
            Self::Crawling,
            Self::Auditing,
            Self::Paused,
            Self::Cleanup,
            Self::Done,
        ]
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
