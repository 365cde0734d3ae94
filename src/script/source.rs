//! Named, re-readable producers of script bytes.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default display name of in-memory sources.
pub const STRING_SOURCE_NAME: &str = "<string>";

/// `read` yields a fresh stream on every call.
pub trait Source: Send + Sync {
    fn name(&self) -> &str;

    fn read(&self) -> io::Result<Box<dyn Read + '_>>;

    /// Writable sources return themselves here.
    fn as_writable(&self) -> Option<&dyn WritableSource> {
        None
    }

    /// Read the whole source as UTF-8.
    fn read_to_string(&self) -> io::Result<String> {
        let mut text = String::new();
        self.read()?.read_to_string(&mut text)?;
        Ok(text)
    }
}

pub trait WritableSource: Source {
    /// A fresh sink that replaces the source contents.
    fn write(&self) -> io::Result<Box<dyn Write + '_>>;
}

/// In-memory source holding UTF-8 text.
#[derive(Clone)]
pub struct StringSource {
    name: String,
    text: Arc<str>,
}

impl StringSource {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self::named(STRING_SOURCE_NAME, text)
    }

    pub fn named(name: impl Into<String>, text: impl AsRef<str>) -> Self {
        StringSource {
            name: name.into(),
            text: Arc::from(text.as_ref()),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Source for StringSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.text.as_bytes())))
    }
}

impl fmt::Debug for StringSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringSource({})", self.name)
    }
}

/// File backed source. The path is only touched by `read` and `write`.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    path: PathBuf,
}

impl FileSource {
    /// Name the file relative to `script_root`. Paths outside the root keep
    /// their full form.
    pub fn new(script_root: &Path, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let absolute = if path.is_absolute() {
            path
        } else {
            script_root.join(path)
        };
        let name = match absolute.strip_prefix(script_root) {
            Ok(relative) => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => absolute.display().to_string(),
        };
        FileSource {
            name,
            path: absolute,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn as_writable(&self) -> Option<&dyn WritableSource> {
        Some(self)
    }
}

impl WritableSource for FileSource {
    fn write(&self) -> io::Result<Box<dyn Write + '_>> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Box::new(File::create(&self.path)?))
    }
}
