use std::fmt;

/// Error returned by the mapping entry points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("no conversion registered from '{from}' to '{to}'")]
    NotRegistered {
        from: &'static str,
        to: &'static str,
    },
}

/// One failed element of a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("element {index}: {error}")]
pub struct ElementError {
    /// Position of the element in the input sequence.
    pub index: usize,
    pub error: MapError,
}

/// All failures of a batch, combined.
///
/// A batch keeps going past failing elements; this error names every one of
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchError {
    failures: Vec<ElementError>,
    total: usize,
}

impl BatchError {
    pub(crate) fn new(failures: Vec<ElementError>, total: usize) -> Self {
        Self { failures, total }
    }

    pub fn failures(&self) -> &[ElementError] {
        &self.failures
    }

    /// Number of elements in the batch, successful ones included.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn failed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.failures.iter().map(|failure| failure.index)
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} elements failed to map",
            self.failures.len(),
            self.total
        )?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

/// Error loading a [`MapperConfig`](crate::MapperConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parse: {0}")]
    Parse(#[from] toml::de::Error),
}
