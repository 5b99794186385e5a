//! Scalar converters between attribute values and REST values.
//!
//! Ids travel as strings in the attribute bag but as 32-bit integers or
//! UUIDs on the wire; enums travel as human tokens in the bag and as flags
//! or PascalCase tokens on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ProviderError;
use crate::validation::Validator;

/// AWS region codes accepted by the platform.
pub const AWS_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ca-central-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-central-2",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "me-central-1",
    "me-south-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "us-west-1",
    "us-west-2",
];

/// Parse a decimal string into a 32-bit signed integer.
pub fn atoi32(s: &str) -> Result<i32, ProviderError> {
    s.trim()
        .parse::<i32>()
        .map_err(|_| ProviderError::Conversion(format!("{:?} is not a 32-bit integer", s)))
}

/// Shape of a family's ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Stringified 32-bit signed integer.
    Numeric,
    /// UUID string.
    Uuid,
}

impl IdKind {
    /// Parse an id string of this kind.
    pub fn parse(self, s: &str) -> Result<ResourceId, ProviderError> {
        match self {
            Self::Numeric => atoi32(s).map(ResourceId::Numeric),
            Self::Uuid => Uuid::parse_str(s.trim())
                .map(ResourceId::Uuid)
                .map_err(|_| ProviderError::Conversion(format!("{:?} is not a UUID", s))),
        }
    }

    /// The string validator matching this kind.
    pub fn validator(self) -> Validator {
        match self {
            Self::Numeric => Validator::IntegerString,
            Self::Uuid => Validator::UuidString,
        }
    }
}

/// A parsed resource id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    /// Numeric id.
    Numeric(i32),
    /// UUID id.
    Uuid(Uuid),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{}", n),
            Self::Uuid(u) => write!(f, "{}", u),
        }
    }
}

/// Mode sent to a lock manager endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockMode {
    /// Refuse mutation.
    Locked,
    /// Allow mutation.
    Unlocked,
}

impl LockMode {
    /// `Locked` for `true`, `Unlocked` for `false`.
    pub fn from_bool(locked: bool) -> Self {
        if locked {
            Self::Locked
        } else {
            Self::Unlocked
        }
    }
}

/// Role of a platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    /// Regular user.
    User,
    /// Organization manager.
    Manager,
}

impl UserRole {
    /// Attribute tokens accepted for `role`.
    pub const TOKENS: &'static [&'static str] = &["User", "Manager"];

    /// Parse an attribute token.
    pub fn parse(s: &str) -> Result<Self, ProviderError> {
        match s {
            "User" => Ok(Self::User),
            "Manager" => Ok(Self::Manager),
            other => Err(ProviderError::Conversion(format!(
                "{:?} is not a user role",
                other
            ))),
        }
    }

    /// The attribute token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Manager => "Manager",
        }
    }
}

/// Load balancer choice of a Kubernetes profile.
///
/// On the wire this is a pair of flags; `(true, true)` is not a valid state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalancingSolution {
    /// No load balancer.
    None,
    /// OpenStack Octavia.
    Octavia,
    /// Platform-managed load balancer.
    Taikun,
}

impl LoadBalancingSolution {
    /// Attribute tokens accepted for `load_balancing_solution`.
    pub const TOKENS: &'static [&'static str] = &["None", "Octavia", "Taikun"];

    /// Parse an attribute token.
    pub fn parse(s: &str) -> Result<Self, ProviderError> {
        match s {
            "None" => Ok(Self::None),
            "Octavia" => Ok(Self::Octavia),
            "Taikun" => Ok(Self::Taikun),
            other => Err(ProviderError::Conversion(format!(
                "{:?} is not a load balancing solution",
                other
            ))),
        }
    }

    /// The attribute token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Octavia => "Octavia",
            Self::Taikun => "Taikun",
        }
    }

    /// Wire flags `(octavia_enabled, taikun_lb_enabled)`.
    pub fn flags(self) -> (bool, bool) {
        match self {
            Self::None => (false, false),
            Self::Octavia => (true, false),
            Self::Taikun => (false, true),
        }
    }

    /// Recover the choice from wire flags.
    pub fn from_flags(octavia_enabled: bool, taikun_lb_enabled: bool) -> Self {
        match (octavia_enabled, taikun_lb_enabled) {
            (true, _) => Self::Octavia,
            (false, true) => Self::Taikun,
            (false, false) => Self::None,
        }
    }
}
