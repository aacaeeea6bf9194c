#![allow(clippy::doc_markdown)] // Allow technical terms like libmosquitto, OpenSSL in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear
#![allow(clippy::missing_safety_doc)] // Trampoline safety is documented at module level

//! # smosquitto
//!
//! Rust binding over the callback-driven native mosquitto MQTT client
//! library.
//!
//! ## Overview
//!
//! The native library drives all networking and invokes plain C function
//! pointers for every event. It knows nothing about Rust objects, so this
//! crate routes each invocation back to the right [`Client`]:
//!
//! - [`registry`] - process-wide Instance Registry from native handle to client
//! - [`bridge`] - one trampoline per event kind plus the handler slots they call
//! - [`conversions`] - value marshaling between raw foreign values and [`types`]
//! - [`error`] - typed translation of native result codes
//! - [`client`] - [`Library`] and the [`Client`] facade
//! - [`engine`] - the foreign-call seam: system `libmosquitto` or an in-process loopback
//! - [`config`] - TOML/environment configuration of a client
//! - [`logging`] - structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smosquitto::{Client, Library, LoopbackEngine, QoS, Timeout};
//!
//! # fn example() -> Result<(), smosquitto::MosquittoError> {
//! let library = Library::init(LoopbackEngine::new())?;
//! let client = Client::new(&library, Some("sensor-1"), true)?;
//! client.on_message(|message| {
//!     println!("{} -> {:?}", message.topic, message.payload);
//! });
//!
//! client.connect("localhost", 1883, 60, None)?;
//! client.subscribe("sensors/#", QoS::AtLeastOnce)?;
//! client.publish("sensors/t1", "21.5", QoS::AtLeastOnce, false)?;
//! client.run_loop(Timeout::Instant, 1)?;
//! # Ok(())
//! # }
//! ```
//!
//! With the `libmosquitto` feature, `Library::native()` links the system
//! library instead.

pub mod bridge;
pub mod client;
pub mod config;
pub mod conversions;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod registry;
pub mod types;

pub use bridge::{Event, EventHandlers};
pub use client::{Client, LifecycleState, Library};
pub use config::{ClientConfig, ConfigManager, ConfigurationError};
pub use engine::{LoopbackEngine, NativeEngine};
pub use error::{check_result_code, MosquittoError, MosquittoResult};
pub use ffi::RawHandle;
pub use registry::{InstanceRegistry, RegistryError, RegistryStats};
pub use types::{
    CertificateRequirements, ConnectionResponseCode, DisconnectReason, LogLevel, Message,
    MessageId, Payload, ProtocolVersion, QoS, Timeout, TlsCertificates, TlsOptions, TlsVersion,
    Version,
};

#[cfg(feature = "libmosquitto")]
pub use engine::LibMosquitto;
