//! Allocator configuration.
//!
//! ```toml
//! mode = "best-fit"
//! backend = "system"
//! reserve = 16777216
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{AllocError, Result},
    kernel::DEFAULT_RESERVE,
    strategy::SearchMode,
};

/// Where the heap bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Address space reserved from the operating system, see
    /// [`crate::SystemHeap`].
    #[default]
    System,
    /// A vector owned by the process, see [`crate::ArenaHeap`].
    Arena,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocatorConfig {
    /// Placement strategy, fixed for the lifetime of the heap.
    pub mode: SearchMode,
    pub backend: Backend,
    /// Upper bound of the heap in bytes.
    pub reserve: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            backend: Backend::default(),
            reserve: DEFAULT_RESERVE,
        }
    }
}

impl AllocatorConfig {
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    /// Reads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reserve == 0 {
            return Err(AllocError::Config("reserve must be greater than zero".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(AllocatorConfig::default(), AllocatorConfig::from_toml("").unwrap());
    }

    #[test]
    fn parses_every_field() {
        let config = AllocatorConfig::from_toml(
            r#"
            mode = "segregated-fit"
            backend = "arena"
            reserve = 4096
            "#,
        )
        .unwrap();

        assert_eq!(SearchMode::SegregatedFit, config.mode);
        assert_eq!(Backend::Arena, config.backend);
        assert_eq!(4096, config.reserve);
    }

    #[test]
    fn rejects_unknown_modes_and_fields() {
        assert!(matches!(
            AllocatorConfig::from_toml(r#"mode = "worst-fit""#),
            Err(AllocError::Toml(_))
        ));
        assert!(matches!(
            AllocatorConfig::from_toml("pages = 3"),
            Err(AllocError::Toml(_))
        ));
    }

    #[test]
    fn rejects_empty_reservation() {
        assert!(matches!(
            AllocatorConfig::from_toml("reserve = 0"),
            Err(AllocError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            AllocatorConfig::load("/definitely/not/here.toml"),
            Err(AllocError::Io(_))
        ));
    }
}
