//! # Callback Bridge
//!
//! The Callback Trampoline Set and the per-client handler slots it
//! dispatches to.
//!
//! ```text
//! native loop ──▶ trampolines::on_message(handle, raw…)
//!                   │ instances().lookup(handle)      (miss: drop)
//!                   │ state == Active                  (else: drop)
//!                   │ conversions::message_from_raw    (malformed: warn, drop)
//!                   ▼
//!                 EventHandlers::on_message(&Message)  (empty slot: drop)
//! ```

pub mod handlers;
pub mod trampolines;

pub use handlers::{
    ConnectHandler, DisconnectHandler, Event, EventHandlers, LogHandler, MessageHandler,
    PublishHandler, SubscribeHandler, UnsubscribeHandler,
};
pub(crate) use trampolines::register_trampolines;
