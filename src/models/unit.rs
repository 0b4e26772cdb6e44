use std::path::Path;

/// One study/exam directory, the granularity at which success is tracked.
///
/// Identity is the path string exactly as it was enumerated or read from a
/// plan file; no normalisation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferUnit(String);

impl TransferUnit {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `None` for paths that are not valid UTF-8, which the registries cannot hold
    pub fn from_path(path: &Path) -> Option<Self> {
        path.to_str().map(Self::new)
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl std::fmt::Display for TransferUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransferUnit {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TransferUnit {
    fn from(id: String) -> Self {
        Self(id)
    }
}
