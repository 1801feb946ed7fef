//! Kanban lanes a work package moves through.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KittyError;

/// Workflow stage of a work package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Planned,
    Doing,
    ForReview,
    Done,
}

impl Lane {
    /// All lanes in board order.
    pub const ALL: [Self; 4] = [Self::Planned, Self::Doing, Self::ForReview, Self::Done];

    /// The on-disk spelling, also used for legacy lane directory names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Doing => "doing",
            Self::ForReview => "for_review",
            Self::Done => "done",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Planned => "Planned",
            Self::Doing => "Doing",
            Self::ForReview => "For Review",
            Self::Done => "Done",
        }
    }

    /// Match a legacy lane directory name.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lane| lane.as_str() == name)
    }
}

impl Default for Lane {
    fn default() -> Self {
        Self::Planned
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = KittyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_dir_name(s.trim())
            .ok_or_else(|| KittyError::InvalidLane { value: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_parse_round_trip() {
        for lane in Lane::ALL {
            assert_eq!(lane.as_str().parse::<Lane>().unwrap(), lane);
        }
    }

    #[test]
    fn test_lane_parse_rejects_unknown() {
        let err = "in_progress".parse::<Lane>().unwrap_err();
        assert!(matches!(err, KittyError::InvalidLane { ref value } if value == "in_progress"));
    }

    #[test]
    fn test_lane_serde_spelling() {
        let yaml = serde_yaml::to_string(&Lane::ForReview).unwrap();
        assert_eq!(yaml.trim(), "for_review");
    }
}
