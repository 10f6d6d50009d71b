//! Client portal rewards.

use serde::{Deserialize, Serialize};

/// Why points were awarded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewardReason {
    Booking,
    Referral,
    Review,
    TouchUp,
}

impl RewardReason {
    /// Fixed point value of each action.
    pub fn points(&self) -> u32 {
        match self {
            RewardReason::Booking => 50,
            RewardReason::Referral => 150,
            RewardReason::Review => 25,
            RewardReason::TouchUp => 30,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "booking" => Some(RewardReason::Booking),
            "referral" => Some(RewardReason::Referral),
            "review" => Some(RewardReason::Review),
            "touch_up" | "touchup" => Some(RewardReason::TouchUp),
            _ => None,
        }
    }
}

/// Portal tier derived from the point balance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RewardTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// Lower bound of each tier, ascending.
const TIER_THRESHOLDS: [(RewardTier, u32); 4] = [
    (RewardTier::Bronze, 0),
    (RewardTier::Silver, 200),
    (RewardTier::Gold, 500),
    (RewardTier::Platinum, 1000),
];

impl RewardTier {
    pub fn for_points(points: u32) -> Self {
        TIER_THRESHOLDS
            .iter()
            .rev()
            .find(|(_, min)| points >= *min)
            .map(|(tier, _)| *tier)
            .unwrap_or(RewardTier::Bronze)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RewardTier::Bronze => "bronze",
            RewardTier::Silver => "silver",
            RewardTier::Gold => "gold",
            RewardTier::Platinum => "platinum",
        }
    }
}

/// Points still needed to reach the next tier, None at the top tier.
pub fn points_to_next_tier(points: u32) -> Option<u32> {
    TIER_THRESHOLDS
        .iter()
        .find(|(_, min)| *min > points)
        .map(|(_, min)| min - points)
}
