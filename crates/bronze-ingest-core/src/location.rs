//! Storage location parsing
//!
//! Accepted forms:
//! - `s3://bucket/optional/prefix/`
//! - `file:///absolute/path` or a bare filesystem path
//! - `memory://optional/prefix` (in-process store, used by tests)

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("location must not be empty")]
    Empty,
    #[error("unsupported location scheme '{scheme}' in '{location}'. Supported: s3://, file://, memory://")]
    UnsupportedScheme { scheme: String, location: String },
    #[error("s3 location '{0}' is missing a bucket name")]
    MissingBucket(String),
}

/// Root of an input feed or of the bronze output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreLocation {
    S3 { bucket: String, prefix: String },
    Fs { path: String },
    Memory { prefix: String },
}

impl StoreLocation {
    pub fn parse(location: &str) -> Result<Self, LocationError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(LocationError::Empty);
        }

        let Some((scheme, rest)) = location.split_once("://") else {
            return Ok(StoreLocation::Fs {
                path: location.to_string(),
            });
        };

        match scheme.to_lowercase().as_str() {
            "s3" | "s3a" => {
                let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(LocationError::MissingBucket(location.to_string()));
                }
                Ok(StoreLocation::S3 {
                    bucket: bucket.to_string(),
                    prefix: normalize_prefix(prefix),
                })
            }
            "file" => {
                if rest.is_empty() {
                    return Err(LocationError::Empty);
                }
                Ok(StoreLocation::Fs {
                    path: rest.to_string(),
                })
            }
            "memory" => Ok(StoreLocation::Memory {
                prefix: normalize_prefix(rest),
            }),
            other => Err(LocationError::UnsupportedScheme {
                scheme: other.to_string(),
                location: location.to_string(),
            }),
        }
    }

    /// Key prefix inside the backing store that this location points at.
    ///
    /// Empty, or ending with `/`. Filesystem locations are addressed by the
    /// operator root instead, so their prefix is always empty.
    pub fn prefix(&self) -> &str {
        match self {
            StoreLocation::S3 { prefix, .. } | StoreLocation::Memory { prefix } => prefix,
            StoreLocation::Fs { .. } => "",
        }
    }

    /// Human-readable path of `relative` under this location.
    pub fn display_path(&self, relative: &str) -> String {
        let base = self.to_string();
        let base = base.trim_end_matches('/');
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() {
            format!("{}/", base)
        } else {
            format!("{}/{}", base, relative)
        }
    }
}

impl FromStr for StoreLocation {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::S3 { bucket, prefix } => write!(f, "s3://{}/{}", bucket, prefix),
            StoreLocation::Fs { path } => f.write_str(path),
            StoreLocation::Memory { prefix } => write!(f, "memory://{}", prefix),
        }
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3() {
        let loc = StoreLocation::parse("s3://landing-zone/wms/").unwrap();
        assert_eq!(
            loc,
            StoreLocation::S3 {
                bucket: "landing-zone".to_string(),
                prefix: "wms/".to_string()
            }
        );
        assert_eq!(loc.prefix(), "wms/");

        let bare = StoreLocation::parse("s3://global-inventory").unwrap();
        assert_eq!(bare.prefix(), "");
        assert_eq!(bare.to_string(), "s3://global-inventory/");
    }

    #[test]
    fn test_parse_fs() {
        assert_eq!(
            StoreLocation::parse("/data/landing").unwrap(),
            StoreLocation::Fs {
                path: "/data/landing".to_string()
            }
        );
        assert_eq!(
            StoreLocation::parse("file:///data/landing").unwrap(),
            StoreLocation::Fs {
                path: "/data/landing".to_string()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(StoreLocation::parse("  "), Err(LocationError::Empty));
        assert!(matches!(
            StoreLocation::parse("s3:///prefix"),
            Err(LocationError::MissingBucket(_))
        ));
        assert!(matches!(
            StoreLocation::parse("gs://bucket"),
            Err(LocationError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_display_path() {
        let loc = StoreLocation::parse("s3://global-inventory").unwrap();
        assert_eq!(
            loc.display_path("bronze/wms/year=2024/month=03/day=02/"),
            "s3://global-inventory/bronze/wms/year=2024/month=03/day=02/"
        );

        let fs = StoreLocation::parse("/tmp/out/").unwrap();
        assert_eq!(fs.display_path("bronze/"), "/tmp/out/bronze/");
    }
}
