/// User roles
///
/// A closed set. Strings from requests, tokens and the database are parsed
/// once, case-insensitively, and everything downstream compares variants.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    Administrator,
    Instructor,
    #[default]
    Student,
    Registrar,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Administrator,
        Role::Instructor,
        Role::Student,
        Role::Registrar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Instructor => "instructor",
            Role::Student => "student",
            Role::Registrar => "registrar",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts the canonical names plus the legacy Portuguese ones
    /// (`admin`, `professor`, `aluno`, `secretaria`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "administrator" | "admin" => Ok(Role::Administrator),
            "instructor" | "professor" => Ok(Role::Instructor),
            "student" | "aluno" => Ok(Role::Student),
            "registrar" | "secretaria" => Ok(Role::Registrar),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
