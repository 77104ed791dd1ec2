//! Path access policies.

use vis_core::{PathPattern, PatternError};

/// Decides whether a client may read or subscribe to a pattern.
pub trait PathAccess: Send + Sync {
    fn is_permitted(&self, pattern: &PathPattern) -> bool;
}

/// Permits every pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PathAccess for AllowAll {
    fn is_permitted(&self, _pattern: &PathPattern) -> bool {
        true
    }
}

/// Permits requests fully covered by one of a fixed set of public patterns.
///
/// A request for `Signal.*` is refused when only `Signal.Speed` is public,
/// since the wildcard would also reach private paths.
#[derive(Debug, Clone, Default)]
pub struct PublicPaths {
    patterns: Vec<PathPattern>,
}

impl PublicPaths {
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| PathPattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Build from the `publicPaths` section of a loaded configuration.
    pub fn from_config(config: &vis_core::config::VisConfig) -> Result<Self, PatternError> {
        Self::new(&config.public_paths)
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }
}

impl PathAccess for PublicPaths {
    fn is_permitted(&self, pattern: &PathPattern) -> bool {
        self.patterns.iter().any(|public| public.covers(pattern))
    }
}
