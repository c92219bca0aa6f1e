//! Validation gate for remote package names.
//!
//! A package name arrives over the wire and ends up as an argument to a
//! privileged program, so it must be proven safe before any capability
//! sees it. [`PackageName`] can only be built through [`PackageName::parse`].

use std::fmt;

use thiserror::Error;

/// Longest package name accepted.
pub const MAX_PACKAGE_NAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageNameError {
    #[error("package name is empty")]
    Empty,

    #[error("package name is {len} bytes (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("package name contains invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("package name contains a path traversal sequence")]
    Traversal,
}

/// A package name matching `^[A-Za-z0-9._]+$`, at most 255 bytes, without
/// `..` or `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageName(String);

impl PackageName {
    pub fn parse(raw: &str) -> Result<Self, PackageNameError> {
        if raw.is_empty() {
            return Err(PackageNameError::Empty);
        }
        if raw.len() > MAX_PACKAGE_NAME_LEN {
            return Err(PackageNameError::TooLong {
                len: raw.len(),
                max: MAX_PACKAGE_NAME_LEN,
            });
        }
        if raw.contains("..") || raw.contains('/') {
            return Err(PackageNameError::Traversal);
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '_'))
        {
            return Err(PackageNameError::InvalidCharacter(bad));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
