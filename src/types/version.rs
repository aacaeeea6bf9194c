use crate::ffi;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the native library.
///
/// Equality and hashing cover `(major, minor, revision)`, which is the same
/// as comparing [`Version::number`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub revision: i32,
}

impl Version {
    pub const fn new(major: i32, minor: i32, revision: i32) -> Self {
        Self {
            major,
            minor,
            revision,
        }
    }

    /// Version of the headers these bindings were written against.
    pub const fn compiled_with() -> Self {
        Self::new(
            ffi::LIBMOSQUITTO_MAJOR,
            ffi::LIBMOSQUITTO_MINOR,
            ffi::LIBMOSQUITTO_REVISION,
        )
    }

    /// Unique version number, as `LIBMOSQUITTO_VERSION_NUMBER` computes it.
    pub const fn number(&self) -> i32 {
        self.major * 1_000_000 + self.minor * 1_000 + self.revision
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}
