//! Push message types
//!
//! Request headers and VAPID claims for web push delivery.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::Error;

// =============================================================================
// Push Message Types
// =============================================================================

#[derive(Debug, Clone)]
pub struct PushHeader {
    pub ttl: i64,
    pub urgency: Urgency,
}

// =============================================================================
// Urgency Enum
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    VeryLow,
    Low,
    Normal,
    High,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Urgency::VeryLow => write!(f, "very-low"),
            Urgency::Low => write!(f, "low"),
            Urgency::Normal => write!(f, "normal"),
            Urgency::High => write!(f, "high"),
        }
    }
}

impl FromStr for Urgency {
    type Err = Error;

    fn from_str(value: &str) -> Result<Urgency, Self::Err> {
        match value {
            "very-low" => Ok(Urgency::VeryLow),
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            _ => Err(Error::InvalidOption {
                option: format!("urgency {}", value),
            }),
        }
    }
}

// =============================================================================
// JWT Claims
// =============================================================================

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub aud: String,
    pub sub: String,
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_header_values() {
        for value in ["very-low", "low", "normal", "high"] {
            let urgency = Urgency::from_str(value).unwrap();
            assert_eq!(urgency.to_string(), value);
        }

        assert!(Urgency::from_str("urgent").is_err());
    }
}
