use std::ffi::c_void;
use std::fmt;

/// Owned message payload.
///
/// Payloads built from foreign memory are copied on construction; the
/// foreign buffer is only valid until the callback that carried it returns.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload {
    data: Vec<u8>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `len` bytes out of a foreign buffer.
    ///
    /// A null pointer or a zero length yields an empty payload.
    ///
    /// # Safety
    ///
    /// If `ptr` is non-null it must be valid for reads of `len` bytes for the
    /// duration of this call.
    pub unsafe fn from_raw(ptr: *const c_void, len: usize) -> Self {
        if ptr.is_null() || len == 0 {
            return Self::new();
        }
        // SAFETY: caller guarantees `ptr` is readable for `len` bytes
        let bytes = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len) };
        Self {
            data: bytes.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The payload as UTF-8 text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self {
            data: text.as_bytes().to_vec(),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self {
            data: text.into_bytes(),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => write!(f, "Payload({text:?})"),
            None => write!(f, "Payload({} bytes)", self.data.len()),
        }
    }
}
