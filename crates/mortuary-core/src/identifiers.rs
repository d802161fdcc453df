//! Identifier types for cases, trays, actors and ledger records
//!
//! Entity identifiers are UUID newtypes with a short display prefix so that
//! log lines read `case-…`, `tray-…` rather than bare UUIDs. Human-readable
//! codes (`CaseCode`, `TrayCode`) are validated non-empty strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{MortuaryError, Result};

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from a UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            pub fn uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of a deceased patient's case
    CaseId,
    "case"
);

uuid_identifier!(
    /// Identifier of one storage tray slot
    TrayId,
    "tray"
);

uuid_identifier!(
    /// Identifier of a human actor (staff member, relative, legal authority)
    ActorId,
    "actor"
);

uuid_identifier!(
    /// Identifier of a custody ledger entry
    TransferId,
    "transfer"
);

uuid_identifier!(
    /// Identifier of an audit record
    AuditRecordId,
    "audit"
);

uuid_identifier!(
    /// Identifier of a release obligation (debt, document, legal record)
    ObligationId,
    "obligation"
);

/// Human-readable case code printed on wristbands and forms
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CaseCode(String);

impl CaseCode {
    /// Create a case code, rejecting blank input
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(MortuaryError::invalid("case code must not be blank"));
        }
        Ok(Self(value))
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CaseCode {
    type Error = MortuaryError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CaseCode> for String {
    fn from(code: CaseCode) -> Self {
        code.0
    }
}

impl fmt::Display for CaseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable tray code stencilled on the storage unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrayCode(String);

impl TrayCode {
    /// Create a tray code, rejecting blank input
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(MortuaryError::invalid("tray code must not be blank"));
        }
        Ok(Self(value))
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TrayCode {
    type Error = MortuaryError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TrayCode> for String {
    fn from(code: TrayCode) -> Self {
        code.0
    }
}

impl fmt::Display for TrayCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
