use crate::error::HelpdeskError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a ticket
///
/// Ordered by lifecycle position. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Status {
    /// 접수: filed by the customer, not yet picked up
    #[default]
    #[serde(rename = "접수", alias = "received")]
    Received,
    /// 진행중: an admin is working on it
    #[serde(rename = "진행중", alias = "in_progress")]
    InProgress,
    /// 답변 완료: an admin has answered and is waiting on the customer
    #[serde(rename = "답변 완료", alias = "answered")]
    Answered,
    /// 종결
    #[serde(rename = "종결", alias = "closed")]
    Closed,
}

impl Status {
    pub const ALL: [Self; 4] = [Self::Received, Self::InProgress, Self::Answered, Self::Closed];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Received => "접수",
            Self::InProgress => "진행중",
            Self::Answered => "답변 완료",
            Self::Closed => "종결",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether moving from `self` to `next` goes forward in the lifecycle
    ///
    /// Backward moves are only reachable as explicit admin overrides.
    #[must_use]
    pub fn is_forward_to(self, next: Self) -> bool {
        next >= self
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "접수" | "received" => Ok(Self::Received),
            "진행중" | "in_progress" => Ok(Self::InProgress),
            "답변 완료" | "answered" => Ok(Self::Answered),
            "종결" | "closed" => Ok(Self::Closed),
            other => Err(HelpdeskError::InvalidStatus(other.to_string())),
        }
    }
}

/// Customer-declared urgency of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Urgency {
    #[serde(rename = "낮음", alias = "low")]
    Low,
    #[default]
    #[serde(rename = "보통", alias = "normal")]
    Normal,
    #[serde(rename = "높음", alias = "high")]
    High,
}

impl Urgency {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "낮음",
            Self::Normal => "보통",
            Self::High => "높음",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Urgency {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "낮음" | "low" => Ok(Self::Low),
            "보통" | "normal" => Ok(Self::Normal),
            "높음" | "high" => Ok(Self::High),
            other => Err(HelpdeskError::InvalidUrgency(other.to_string())),
        }
    }
}
