use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Dotted release version ordered component-wise, so `1.9 < 1.12.2 < 1.13`.
/// Host versions are not semver (`1.16` has no patch component), hence a
/// dedicated key type instead of a semver parser. Equality follows ordering:
/// `1.16` and `1.16.0` are the same key.
#[derive(Debug, Clone)]
pub struct VersionKey {
    parts: Vec<u64>,
    raw: String,
}

impl PartialEq for VersionKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionKey {}

impl VersionKey {
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for VersionKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("empty version string");
        }
        let mut parts = Vec::new();
        for component in s.split('.') {
            let n: u64 = component
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid version component {component:?} in {s:?}"))?;
            parts.push(n);
        }
        Ok(Self {
            parts,
            raw: s.to_string(),
        })
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders raw version strings, treating unparsable ones as the lowest.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (a.parse::<VersionKey>(), b.parse::<VersionKey>()) {
        (Ok(ka), Ok(kb)) => ka.cmp(&kb),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> VersionKey {
        s.parse().unwrap()
    }

    #[test]
    fn orders_numerically_not_lexically() {
        assert!(key("1.9") < key("1.12.2"));
        assert!(key("1.12.2") < key("1.13"));
        assert!(key("1.16.1") < key("1.16.4"));
    }

    #[test]
    fn missing_components_compare_as_zero() {
        assert!(key("1.16") < key("1.16.1"));
        assert_eq!(key("1.16").cmp(&key("1.16.0")), Ordering::Equal);
    }

    #[test]
    fn rejects_non_numeric_components() {
        assert!("1.16-pre1".parse::<VersionKey>().is_err());
        assert!("".parse::<VersionKey>().is_err());
    }
}
