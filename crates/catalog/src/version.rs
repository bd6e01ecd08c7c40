use std::cmp::Ordering;
use std::fmt;

/// A RetroArch release version: a dotted triple plus its original string.
///
/// Parsing is total. Strings that are not exactly three dot-separated
/// non-negative integers keep their raw form but carry the zero triple,
/// which sorts below every well-formed version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseVersion {
    major: u32,
    minor: u32,
    patch: u32,
    raw: String,
}

impl ReleaseVersion {
    /// Parses a version string. Never fails; see the type docs.
    pub fn parse(raw: &str) -> Self {
        let (major, minor, patch) = parse_triple(raw).unwrap_or((0, 0, 0));
        Self {
            major,
            minor,
            patch,
            raw: raw.to_string(),
        }
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }

    /// The original string form, round-tripped verbatim by `Display`.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True if the raw string parsed as a full `a.b.c` triple.
    pub fn is_well_formed(&self) -> bool {
        parse_triple(&self.raw).is_some()
    }

    fn triple(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }
}

fn parse_triple(raw: &str) -> Option<(u32, u32, u32)> {
    let mut parts = raw.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Numeric on the triple; raw string only as a tie-breaker so that
        // ordering stays consistent with equality.
        self.triple()
            .cmp(&other.triple())
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_well_formed() {
        let v = ReleaseVersion::parse("1.21.0");
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 21);
        assert_eq!(v.patch(), 0);
        assert!(v.is_well_formed());
    }

    #[test]
    fn display_round_trips_raw() {
        for raw in ["1.9.0", "1.10.0", "0.0.0", "not-a-version"] {
            assert_eq!(ReleaseVersion::parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn numeric_ordering_beats_lexicographic() {
        // "1.10.0" < "1.9.0" as strings, but 10 > 9 numerically.
        let newer = ReleaseVersion::parse("1.10.0");
        let older = ReleaseVersion::parse("1.9.0");
        assert!(newer > older);

        let mut versions = vec![newer.clone(), older.clone()];
        versions.sort_by(|a, b| b.cmp(a));
        assert_eq!(versions, vec![newer, older]);
    }

    #[test]
    fn unparseable_sorts_last() {
        let garbage = ReleaseVersion::parse("nightly");
        assert!(!garbage.is_well_formed());
        assert_eq!(
            (garbage.major(), garbage.minor(), garbage.patch()),
            (0, 0, 0)
        );
        assert!(garbage < ReleaseVersion::parse("0.0.1"));
    }

    #[test]
    fn extra_components_are_unparseable() {
        assert!(!ReleaseVersion::parse("1.2.3.4").is_well_formed());
        assert!(!ReleaseVersion::parse("1.2").is_well_formed());
        assert!(!ReleaseVersion::parse("1.2.x").is_well_formed());
    }

    #[test]
    fn ordering_consistent_with_equality() {
        let a = ReleaseVersion::parse("abc");
        let b = ReleaseVersion::parse("def");
        // Both carry the zero triple but are distinct versions.
        assert_ne!(a, b);
        assert_ne!(a.cmp(&b), Ordering::Equal);
    }
}
