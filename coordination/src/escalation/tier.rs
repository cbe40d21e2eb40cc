//! Tier model: the three escalation levels, ordered by authority.

use serde::{Deserialize, Serialize};

/// Escalation level of a specialist.
///
/// Ordering follows authority: `Tier1 < Tier2 < Tier3`. A consultation chain
/// only ever moves up this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// Generalist: first point of contact for a domain.
    #[serde(rename = "TIER_1")]
    Tier1,
    /// Specialist: deeper expertise inside the domain.
    #[serde(rename = "TIER_2")]
    Tier2,
    /// Architect: highest authority, terminal tier.
    #[serde(rename = "TIER_3")]
    Tier3,
}

impl Tier {
    /// Every tier in ascending order.
    pub const ALL: [Tier; 3] = [Tier::Tier1, Tier::Tier2, Tier::Tier3];

    /// Number of tiers in the model (upper bound on chain length).
    pub const COUNT: usize = Self::ALL.len();

    /// 1-based ordinal.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Tier1 => 1,
            Self::Tier2 => 2,
            Self::Tier3 => 3,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            1 => Some(Self::Tier1),
            2 => Some(Self::Tier2),
            3 => Some(Self::Tier3),
            _ => None,
        }
    }

    /// The next tier up, or `None` at the top.
    pub fn next(self) -> Option<Self> {
        Self::from_ordinal(self.ordinal() + 1)
    }

    pub fn is_entry(self) -> bool {
        self == Self::Tier1
    }

    pub fn is_top(self) -> bool {
        self == Self::Tier3
    }

    /// Human-facing role title for this tier.
    pub fn title(self) -> &'static str {
        match self {
            Self::Tier1 => "generalist",
            Self::Tier2 => "specialist",
            Self::Tier3 => "architect",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tier1 => write!(f, "TIER_1"),
            Self::Tier2 => write!(f, "TIER_2"),
            Self::Tier3 => write!(f, "TIER_3"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "TIER_1" | "TIER1" | "1" => Ok(Self::Tier1),
            "TIER_2" | "TIER2" | "2" => Ok(Self::Tier2),
            "TIER_3" | "TIER3" | "3" => Ok(Self::Tier3),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Tier1 < Tier::Tier2);
        assert!(Tier::Tier2 < Tier::Tier3);
        assert_eq!(Tier::Tier1.next(), Some(Tier::Tier2));
        assert_eq!(Tier::Tier3.next(), None);
        assert!(Tier::Tier3.is_top());
        assert_eq!(Tier::COUNT, 3);
    }

    #[test]
    fn test_tier_parse_and_display() {
        assert_eq!("tier-2".parse::<Tier>().unwrap(), Tier::Tier2);
        assert_eq!("3".parse::<Tier>().unwrap(), Tier::Tier3);
        assert!("tier_9".parse::<Tier>().is_err());
        assert_eq!(Tier::Tier1.to_string(), "TIER_1");
    }

    #[test]
    fn test_tier_serde_names() {
        let json = serde_json::to_string(&Tier::Tier2).unwrap();
        assert_eq!(json, "\"TIER_2\"");
        let back: Tier = serde_json::from_str("\"TIER_3\"").unwrap();
        assert_eq!(back, Tier::Tier3);
    }
}
