use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::str::FromStr;

/// Represents an address in the resource tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FsPath {
    /// Path segments (e.g., ["folder", "sub", "file.txt"])
    segments: Vec<String>,
}

impl FsPath {
    /// Parse a path string into an FsPath
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(String::from)
            .collect();

        FsPath { segments }
    }

    /// Parse the path component of a request URI, percent-decoding each segment.
    ///
    /// A segment that would decode to something containing `/` is kept encoded.
    pub fn from_uri_path(path: &str) -> Self {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(decode_segment)
            .collect();

        FsPath { segments }
    }

    /// Create a path from segments, dropping empty ones
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FsPath {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// Get the path segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check if this path addresses the root
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// First segment of the path
    pub fn root_name(&self) -> Option<&str> {
        self.segments.first().map(|s| s.as_str())
    }

    /// Drop the first segment, returning it
    pub fn remove_root(&mut self) -> Option<String> {
        if self.segments.is_empty() {
            None
        } else {
            Some(self.segments.remove(0))
        }
    }

    /// Get the parent path. The parent of the root is the root.
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        FsPath { segments }
    }

    /// Get the last segment (file name)
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// Append a segment
    pub fn child_path(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        if !name.is_empty() {
            segments.push(name.to_string());
        }
        FsPath { segments }
    }

    /// Whether `self` equals `other` or lies below it
    pub fn starts_with(&self, other: &FsPath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }
}

fn decode_segment(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    if decoded.contains('/') {
        raw.to_string()
    } else {
        decoded.into_owned()
    }
}

impl std::fmt::Display for FsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

impl FromStr for FsPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FsPath::parse(s))
    }
}

impl From<&str> for FsPath {
    fn from(s: &str) -> Self {
        FsPath::parse(s)
    }
}
