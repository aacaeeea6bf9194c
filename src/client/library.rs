use crate::engine::NativeEngine;
use crate::error::{check_result_code, MosquittoResult};
use crate::logging::log_ffi_operation;
use crate::types::Version;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Process-wide native library state.
///
/// `init` runs the library-wide initialisation; cleanup runs once the
/// `Library` and every [`Client`](crate::Client) created from it are gone,
/// so no handle can outlive it.
#[derive(Clone)]
pub struct Library {
    pub(crate) inner: Arc<LibraryInner>,
}

pub(crate) struct LibraryInner {
    pub(crate) engine: Box<dyn NativeEngine>,
}

impl Library {
    pub fn init(engine: impl NativeEngine) -> MosquittoResult<Self> {
        check_result_code(engine.lib_init())?;
        log_ffi_operation("lib_init", None, "success", Some(engine.name()));
        Ok(Self {
            inner: Arc::new(LibraryInner {
                engine: Box::new(engine),
            }),
        })
    }

    /// Initialise the system `libmosquitto`.
    #[cfg(feature = "libmosquitto")]
    pub fn native() -> MosquittoResult<Self> {
        Self::init(crate::engine::LibMosquitto::acquire()?)
    }

    /// Version of the library actually loaded at runtime.
    pub fn version(&self) -> Version {
        self.inner.engine.lib_version()
    }

    pub fn engine_name(&self) -> &'static str {
        self.inner.engine.name()
    }

    pub(crate) fn engine(&self) -> &dyn NativeEngine {
        self.inner.engine.as_ref()
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("engine", &self.engine_name())
            .finish()
    }
}

impl Drop for LibraryInner {
    fn drop(&mut self) {
        match check_result_code(self.engine.lib_cleanup()) {
            Ok(()) => log_ffi_operation("lib_cleanup", None, "success", Some(self.engine.name())),
            Err(error) => warn!(error = %error, "Native library cleanup failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LoopbackEngine;

    #[test]
    fn test_init_and_cleanup_pair() {
        let engine = LoopbackEngine::new();
        let library = Library::init(engine.clone()).unwrap();
        assert!(engine.is_initialized());
        assert_eq!(library.version(), Version::compiled_with());
        assert_eq!(library.engine_name(), "loopback");

        let copy = library.clone();
        drop(library);
        assert!(engine.is_initialized());
        drop(copy);
        assert!(!engine.is_initialized());
    }
}
