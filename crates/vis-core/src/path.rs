//! Signal path pattern parsing and matching.
//!
//! Signal paths are dot-separated strings like
//! "Signal.Drivetrain.InternalCombustionEngine.RPM". This module compiles
//! patterns that may contain `*` wildcard segments and matches paths against
//! them.
//!
//! Patterns are compiled once into segments; matching walks the segments
//! directly instead of going through a regex engine.

/// A segment in a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    /// Exact literal match for this segment
    Literal(String),
    /// Wildcard (*) - matches one or more whole segments
    Wildcard,
}

/// A compiled path pattern.
///
/// Supported patterns:
/// - Exact: "Signal.Drivetrain.InternalCombustionEngine.RPM"
/// - Suffix wildcard: "Signal.Drivetrain.*" (any depth below the prefix)
/// - Mid-path wildcard: "Signal.*.RPM" (one or more segments in between)
/// - Full wildcard: "*"
///
/// A pattern without wildcards matches exactly one path; it never matches a
/// longer path that merely shares its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<PatternSegment>,
}

impl PathPattern {
    /// Compile a pattern string.
    ///
    /// Pattern syntax:
    /// - segments are separated by `.` and must not be empty
    /// - a segment is either a literal or exactly `*`
    /// - `*` matches one or more whole path segments
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let segments = pattern
            .split('.')
            .enumerate()
            .map(|(position, s)| match s {
                "" => Err(PatternError::EmptySegment {
                    pattern: pattern.to_string(),
                    position,
                }),
                "*" => Ok(PatternSegment::Wildcard),
                s if s.contains('*') => Err(PatternError::PartialWildcard {
                    segment: s.to_string(),
                }),
                s => Ok(PatternSegment::Literal(s.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Check if a path matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let path_parts: Vec<&str> = path.split('.').collect();
        if path_parts.iter().any(|p| p.is_empty()) {
            return false;
        }
        Self::match_segments(&self.segments, &path_parts)
    }

    /// Glob-style walk, linear in `segments.len() * parts.len()`.
    ///
    /// Only the most recent wildcard is a backtrack point: extending an
    /// earlier one can never produce a match the later one cannot.
    fn match_segments(segments: &[PatternSegment], parts: &[&str]) -> bool {
        let mut seg = 0;
        let mut part = 0;
        // (segment after the wildcard, first part not taken by the wildcard)
        let mut resume: Option<(usize, usize)> = None;

        while part < parts.len() {
            match segments.get(seg) {
                Some(PatternSegment::Wildcard) => {
                    // A wildcard takes at least one segment
                    part += 1;
                    seg += 1;
                    resume = Some((seg, part));
                }
                Some(PatternSegment::Literal(lit)) if lit == parts[part] => {
                    seg += 1;
                    part += 1;
                }
                _ => match resume {
                    Some((after_wildcard, taken_until)) => {
                        seg = after_wildcard;
                        part = taken_until + 1;
                        resume = Some((after_wildcard, part));
                    }
                    None => return false,
                },
            }
        }

        seg == segments.len()
    }

    /// Check whether every path matched by `other` is also matched by this pattern.
    ///
    /// Conservative: a wildcard in `other` is only covered by a wildcard here.
    pub fn covers(&self, other: &PathPattern) -> bool {
        let other_parts: Vec<&str> = other.raw.split('.').collect();
        Self::match_segments(&self.segments, &other_parts)
    }

    /// True if the pattern contains at least one wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.segments.contains(&PatternSegment::Wildcard)
    }

    /// Get the raw pattern string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl std::str::FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathPattern::new(s)
    }
}

/// Errors that can occur when compiling a path pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Empty pattern")]
    EmptyPattern,

    #[error("Empty segment at position {position} in pattern '{pattern}'")]
    EmptySegment { pattern: String, position: usize },

    #[error("Wildcard must be a whole segment, got '{segment}'")]
    PartialWildcard { segment: String },
}
