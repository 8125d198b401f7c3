//! Mapping data model: every symbol carries an original (obfuscated) name, a
//! stable intermediate name, and an optional human name plus description.
//! Classes own their members as plain `Vec`s; there are no parent back
//! references, queries hand back `(leaf, owner)` pairs instead.

use serde::Serialize;

/// Physical environment a symbol exists in. The discriminants are the
/// historical wire values; override tables store the discriminant minus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Side {
    Client = 1,
    Server = 2,
    Both = 3,
}

impl Side {
    /// Raw override-table code: `0`/`1`/`2` shifted down by one from the
    /// discriminant. Kept exactly for compatibility with historical tables.
    pub fn from_code(code: i64) -> anyhow::Result<Self> {
        match code {
            0 => Ok(Side::Client),
            1 => Ok(Side::Server),
            2 => Ok(Side::Both),
            _ => anyhow::bail!("invalid side code: {code}"),
        }
    }

    /// Persisted wire value (the discriminant itself).
    pub fn from_wire(value: u8) -> anyhow::Result<Self> {
        match value {
            1 => Ok(Side::Client),
            2 => Ok(Side::Server),
            3 => Ok(Side::Both),
            _ => anyhow::bail!("invalid side value: {value}"),
        }
    }

    pub fn wire(self) -> u8 {
        self as u8
    }
}

/// Closed set of symbol kinds. Fields and methods are owned by classes,
/// parameters by methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MappingKind {
    Class,
    Field,
    Method,
    Parameter,
}

/// Empty descriptions carry no information; normalize them away.
pub fn normalize_description(description: Option<String>) -> Option<String> {
    description.filter(|d| !d.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub original_name: Option<String>,
    pub intermediate_name: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub side: Side,
}

impl Field {
    /// A field as the export declares it, before any override is applied.
    pub fn unresolved(original_name: Option<String>, intermediate_name: String) -> Self {
        Self {
            original_name,
            intermediate_name,
            name: None,
            description: None,
            side: Side::Both,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub original_name: Option<String>,
    pub intermediate_name: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub original_name: Option<String>,
    pub intermediate_name: String,
    pub signature: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub side: Side,
    pub is_static: bool,
    /// Declaration order; positions are semantically meaningful.
    pub parameters: Vec<Parameter>,
}

impl Method {
    pub fn unresolved(
        original_name: Option<String>,
        intermediate_name: String,
        signature: String,
        is_static: bool,
    ) -> Self {
        Self {
            original_name,
            intermediate_name,
            signature,
            name: None,
            description: None,
            side: Side::Both,
            is_static,
            parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub original_name: Option<String>,
    pub intermediate_name: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub child_classes: Vec<Class>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    /// Constructors are methods with no intermediate identity requirement;
    /// their intermediate name is the numeric constructor id.
    pub constructors: Vec<Method>,
}

impl Class {
    pub fn unresolved(original_name: Option<String>, intermediate_name: String) -> Self {
        Self {
            original_name,
            intermediate_name,
            name: None,
            description: None,
            child_classes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
        }
    }
}

/// One resolved forest per release version. Built wholesale by parse + merge,
/// immutable while it serves queries, replaced whole on rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingDatabase {
    pub mc_version: String,
    pub snapshot: String,
    pub classes: Vec<Class>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_codes_are_shifted_by_one() {
        assert_eq!(Side::from_code(0).unwrap(), Side::Client);
        assert_eq!(Side::from_code(1).unwrap(), Side::Server);
        assert_eq!(Side::from_code(2).unwrap(), Side::Both);
        assert!(Side::from_code(3).is_err());
        assert_eq!(Side::Client.wire(), 1);
        assert_eq!(Side::Both.wire(), 3);
    }

    #[test]
    fn empty_descriptions_normalize_to_none() {
        assert_eq!(normalize_description(Some(String::new())), None);
        assert_eq!(
            normalize_description(Some("has text".to_string())).as_deref(),
            Some("has text")
        );
        assert_eq!(normalize_description(None), None);
    }
}
