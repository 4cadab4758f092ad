use core::fmt;
use std::str::FromStr;

/// Profile schema version (`major.minor.patch`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Untagged documents predate versioning.
    pub const UNVERSIONED: SchemaVersion = SchemaVersion::new(0, 0, 0);
}

/// Latest schema this engine writes.
pub const CURRENT_VERSION: SchemaVersion = SchemaVersion::new(2, 1, 1);

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    /// Accepts `2`, `2.1`, `2.1.1`, with an optional leading `v`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let t = t.strip_prefix(['v', 'V']).unwrap_or(t);
        let parts: Vec<&str> = t.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(format!("bad schema version '{s}'"));
        }
        let mut nums = [0u32; 3];
        for (ix, p) in parts.iter().enumerate() {
            nums[ix] = p
                .parse::<u32>()
                .map_err(|_| format!("bad schema version '{s}'"))?;
        }
        Ok(SchemaVersion::new(nums[0], nums[1], nums[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_orders() {
        assert_eq!("2.1.1".parse(), Ok(CURRENT_VERSION));
        assert_eq!("v2.1".parse(), Ok(SchemaVersion::new(2, 1, 0)));
        assert_eq!(" 2 ".parse(), Ok(SchemaVersion::new(2, 0, 0)));
        assert!("two".parse::<SchemaVersion>().is_err());
        assert!("1.2.3.4".parse::<SchemaVersion>().is_err());
        assert!("".parse::<SchemaVersion>().is_err());
        assert!(SchemaVersion::new(2, 0, 0) < SchemaVersion::new(2, 1, 0));
        assert!(SchemaVersion::new(2, 1, 0) < CURRENT_VERSION);
        assert_eq!(CURRENT_VERSION.to_string(), "2.1.1");
    }
}
