use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::debug;

/// Supplies raw bytes for one external item. Only read when the caller actually
/// needs the data, so a refused import never touches the source.
pub trait ByteSource {
    fn read_bytes(&self) -> io::Result<Vec<u8>>;

    /// Short description for logs (a path, a URL, "inline").
    fn describe(&self) -> String {
        "inline".to_string()
    }
}

impl<F> ByteSource for F
where
    F: Fn() -> io::Result<Vec<u8>>,
{
    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        self()
    }
}

/// Lazy reference to a file on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSource {
    path: PathBuf,
}

impl PathSource {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for PathSource {
    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        let bytes = fs::read(&self.path)?;
        debug!(path = %self.path.display(), len = bytes.len(), "loaded external file");
        Ok(bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Turns external paths into byte sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImporter;

impl FileImporter {
    pub fn new() -> Self {
        Self
    }

    pub fn load_file(&self, path: impl Into<PathBuf>) -> PathSource {
        PathSource { path: path.into() }
    }
}
