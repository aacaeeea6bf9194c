//! # Client Facade
//!
//! [`Client`] owns one native handle for its whole life: it creates the
//! handle, registers it in the instance registry and points the native
//! callbacks at the trampolines. On drop it leaves the registry before the
//! handle is destroyed, so no callback can reach a destroyed handle's client.
//!
//! Every operation follows the same pattern: marshal the arguments, make one
//! foreign call, and translate its result code with
//! [`check_result_code`]. Nothing is retried here; reconnect policy is
//! configured once through [`Client::set_reconnect_delay`] and left to the
//! native library.

mod configure;
pub mod library;

pub use library::Library;

use crate::bridge::{register_trampolines, trampolines, Event, EventHandlers};
use crate::conversions::{path_to_cstring, payload_len, to_cstring, to_optional_cstring};
use crate::engine::{NativeEngine, TlsFiles};
use crate::error::{check_result_code, MosquittoError, MosquittoResult};
use crate::ffi::RawHandle;
use crate::logging::log_ffi_operation;
use crate::registry::instances;
use crate::types::{
    ConnectionResponseCode, DisconnectReason, LogLevel, Message, MessageId, ProtocolVersion, QoS,
    Timeout, TlsCertificates, TlsOptions,
};
use crossbeam::channel::{unbounded, Receiver};
use library::LibraryInner;
use parking_lot::RwLock;
use std::ffi::{c_int, c_uint};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Where a client is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    /// Handle created; trampolines not (yet) registered.
    Uninitialized = 0,
    /// Registered and usable. The only state that receives events.
    Active = 1,
    /// Teardown has begun; the handle is gone or about to be.
    TornDown = 2,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Uninitialized,
            1 => Self::Active,
            _ => Self::TornDown,
        }
    }
}

/// State of one Managed Client shared with the trampolines.
pub(crate) struct ClientInner {
    library: Arc<LibraryInner>,
    handle: RawHandle,
    state: AtomicU8,
    client_id: RwLock<Option<String>>,
    pub(crate) handlers: RwLock<EventHandlers>,
    /// Key password handed to the native library on request.
    pub(crate) key_password: RwLock<Option<Vec<u8>>>,
}

impl ClientInner {
    pub(crate) fn handle(&self) -> RawHandle {
        self.handle
    }

    pub(crate) fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn engine(&self) -> &dyn NativeEngine {
        self.library.engine.as_ref()
    }
}

/// One connection to a broker through the native library.
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a native client.
    ///
    /// `id` of `None` lets the library generate one, which requires
    /// `clean_session`.
    pub fn new(library: &Library, id: Option<&str>, clean_session: bool) -> MosquittoResult<Self> {
        let c_id = to_optional_cstring(id)?;
        let engine = library.engine();
        let handle = engine.create(c_id.as_deref(), clean_session)?;

        let inner = Arc::new(ClientInner {
            library: Arc::clone(&library.inner),
            handle,
            state: AtomicU8::new(LifecycleState::Uninitialized as u8),
            client_id: RwLock::new(id.map(str::to_owned)),
            handlers: RwLock::new(EventHandlers::default()),
            key_password: RwLock::new(None),
        });

        let registered = instances().register(handle, &inner);
        debug_assert!(registered.is_ok(), "native handle {handle} reused while still registered");
        if let Err(registry_error) = registered {
            error!(handle = %handle, error = %registry_error, "Native handle reused while still registered");
            engine.destroy(handle);
            return Err(MosquittoError::Inval);
        }

        register_trampolines(engine, handle);
        inner.set_state(LifecycleState::Active);
        log_ffi_operation("create", Some(handle), "success", id);
        Ok(Self { inner })
    }

    pub fn handle(&self) -> RawHandle {
        self.inner.handle
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state()
    }

    /// Client id given at construction or reinitialisation.
    pub fn client_id(&self) -> Option<String> {
        self.inner.client_id.read().clone()
    }

    fn engine(&self) -> &dyn NativeEngine {
        self.inner.engine()
    }

    fn handlers_mut(&self, update: impl FnOnce(&mut EventHandlers)) {
        update(&mut self.inner.handlers.write());
    }

    // Event handlers

    pub fn on_connect(&self, handler: impl Fn(ConnectionResponseCode) + Send + Sync + 'static) {
        self.handlers_mut(|handlers| handlers.on_connect = Some(Arc::new(handler)));
    }

    pub fn on_message(&self, handler: impl Fn(&Message) + Send + Sync + 'static) {
        self.handlers_mut(|handlers| handlers.on_message = Some(Arc::new(handler)));
    }

    pub fn on_disconnect(&self, handler: impl Fn(DisconnectReason) + Send + Sync + 'static) {
        self.handlers_mut(|handlers| handlers.on_disconnect = Some(Arc::new(handler)));
    }

    pub fn on_publish(&self, handler: impl Fn(MessageId) + Send + Sync + 'static) {
        self.handlers_mut(|handlers| handlers.on_publish = Some(Arc::new(handler)));
    }

    pub fn on_subscribe(&self, handler: impl Fn(MessageId, &[QoS]) + Send + Sync + 'static) {
        self.handlers_mut(|handlers| handlers.on_subscribe = Some(Arc::new(handler)));
    }

    pub fn on_unsubscribe(&self, handler: impl Fn(MessageId) + Send + Sync + 'static) {
        self.handlers_mut(|handlers| handlers.on_unsubscribe = Some(Arc::new(handler)));
    }

    pub fn on_log(&self, handler: impl Fn(LogLevel, &str) + Send + Sync + 'static) {
        self.handlers_mut(|handlers| handlers.on_log = Some(Arc::new(handler)));
    }

    /// Replace every handler slot at once.
    pub fn set_handlers(&self, handlers: EventHandlers) {
        *self.inner.handlers.write() = handlers;
    }

    pub fn clear_handlers(&self) {
        self.set_handlers(EventHandlers::default());
    }

    /// Receive every event of this client as an owned [`Event`].
    ///
    /// Replaces all installed handlers.
    pub fn events(&self) -> Receiver<Event> {
        let (sender, receiver) = unbounded();
        self.set_handlers(EventHandlers::forwarding(sender));
        receiver
    }

    // Lifecycle

    /// Return the client to a fresh connection state, keeping its handle and
    /// registry entry. Handlers are kept; the TLS key password is cleared.
    pub fn reinitialise(&self, id: Option<&str>, clean_session: bool) -> MosquittoResult<()> {
        let c_id = to_optional_cstring(id)?;
        let handle = self.handle();
        self.inner.set_state(LifecycleState::Uninitialized);
        let result = check_result_code(self.engine().reinitialise(handle, c_id.as_deref(), clean_session));
        if result.is_ok() {
            *self.inner.client_id.write() = id.map(str::to_owned);
            *self.inner.key_password.write() = None;
        }
        // The native side drops its callback table on reinitialise.
        register_trampolines(self.engine(), handle);
        self.inner.set_state(LifecycleState::Active);
        log_ffi_operation(
            "reinitialise",
            Some(handle),
            if result.is_ok() { "success" } else { "failure" },
            id,
        );
        result
    }

    // Connection

    pub fn connect(
        &self,
        host: &str,
        port: u16,
        keepalive_seconds: u16,
        bind_address: Option<&str>,
    ) -> MosquittoResult<()> {
        let c_host = to_cstring(host)?;
        let c_bind = to_optional_cstring(bind_address)?;
        let result = check_result_code(self.engine().connect(
            self.handle(),
            &c_host,
            c_int::from(port),
            c_int::from(keepalive_seconds),
            c_bind.as_deref(),
        ));
        let details = format!("{host}:{port}");
        log_ffi_operation(
            "connect",
            Some(self.handle()),
            if result.is_ok() { "success" } else { "failure" },
            Some(&details),
        );
        result
    }

    pub fn disconnect(&self) -> MosquittoResult<()> {
        let result = check_result_code(self.engine().disconnect(self.handle()));
        log_ffi_operation(
            "disconnect",
            Some(self.handle()),
            if result.is_ok() { "success" } else { "failure" },
            None,
        );
        result
    }

    pub fn reconnect(&self) -> MosquittoResult<()> {
        check_result_code(self.engine().reconnect(self.handle()))
    }

    pub fn set_login_information(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> MosquittoResult<()> {
        let username = to_optional_cstring(username)?;
        let password = to_optional_cstring(password)?;
        check_result_code(self.engine().username_pw_set(
            self.handle(),
            username.as_deref(),
            password.as_deref(),
        ))
    }

    /// Delay between automatic reconnect attempts of the managed loop,
    /// truncated to whole seconds.
    pub fn set_reconnect_delay(
        &self,
        delay: Duration,
        max_delay: Duration,
        exponential_backoff: bool,
    ) -> MosquittoResult<()> {
        let seconds = |duration: Duration| c_uint::try_from(duration.as_secs()).unwrap_or(c_uint::MAX);
        check_result_code(self.engine().reconnect_delay_set(
            self.handle(),
            seconds(delay),
            seconds(max_delay),
            exponential_backoff,
        ))
    }

    pub fn set_socks5(
        &self,
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
    ) -> MosquittoResult<()> {
        let host = to_cstring(host)?;
        let username = to_optional_cstring(username)?;
        let password = to_optional_cstring(password)?;
        check_result_code(self.engine().socks5_set(
            self.handle(),
            &host,
            c_int::from(port),
            username.as_deref(),
            password.as_deref(),
        ))
    }

    pub fn set_max_inflight_messages(&self, max_inflight: u32) -> MosquittoResult<()> {
        check_result_code(
            self.engine()
                .max_inflight_messages_set(self.handle(), max_inflight),
        )
    }

    pub fn set_protocol_version(&self, version: ProtocolVersion) -> MosquittoResult<()> {
        check_result_code(
            self.engine()
                .protocol_version_set(self.handle(), version.as_raw()),
        )
    }

    /// Tell the library the application runs its own threads around the
    /// network loop.
    pub fn set_threaded(&self, threaded: bool) -> MosquittoResult<()> {
        check_result_code(self.engine().threaded_set(self.handle(), threaded))
    }

    // Messaging

    pub fn publish(
        &self,
        topic: &str,
        payload: impl AsRef<[u8]>,
        qos: QoS,
        retain: bool,
    ) -> MosquittoResult<MessageId> {
        let topic = to_cstring(topic)?;
        let payload = payload.as_ref();
        payload_len(payload)?;
        let mut mid: c_int = 0;
        check_result_code(self.engine().publish(
            self.handle(),
            &mut mid,
            &topic,
            payload,
            qos.as_raw(),
            retain,
        ))?;
        Ok(MessageId(mid))
    }

    pub fn subscribe(&self, pattern: &str, qos: QoS) -> MosquittoResult<MessageId> {
        let pattern = to_cstring(pattern)?;
        let mut mid: c_int = 0;
        check_result_code(
            self.engine()
                .subscribe(self.handle(), &mut mid, &pattern, qos.as_raw()),
        )?;
        Ok(MessageId(mid))
    }

    pub fn unsubscribe(&self, pattern: &str) -> MosquittoResult<MessageId> {
        let pattern = to_cstring(pattern)?;
        let mut mid: c_int = 0;
        check_result_code(self.engine().unsubscribe(self.handle(), &mut mid, &pattern))?;
        Ok(MessageId(mid))
    }

    /// Message the broker publishes on our behalf if the connection is lost.
    /// Must be set before connecting.
    pub fn set_will(
        &self,
        topic: &str,
        payload: impl AsRef<[u8]>,
        qos: QoS,
        retain: bool,
    ) -> MosquittoResult<()> {
        let topic = to_cstring(topic)?;
        let payload = payload.as_ref();
        payload_len(payload)?;
        check_result_code(self.engine().will_set(
            self.handle(),
            &topic,
            payload,
            qos.as_raw(),
            retain,
        ))
    }

    pub fn clear_will(&self) -> MosquittoResult<()> {
        check_result_code(self.engine().will_clear(self.handle()))
    }

    // Network loop

    /// Run one iteration of the network loop on the calling thread.
    pub fn run_loop(&self, timeout: Timeout, max_packets: u32) -> MosquittoResult<()> {
        check_result_code(self.engine().loop_once(
            self.handle(),
            timeout.as_millis(),
            packets(max_packets),
        ))
    }

    /// Run the network loop on the calling thread until the client
    /// disconnects.
    pub fn loop_forever(&self, timeout: Timeout, max_packets: u32) -> MosquittoResult<()> {
        check_result_code(self.engine().loop_forever(
            self.handle(),
            timeout.as_millis(),
            packets(max_packets),
        ))
    }

    /// Start the library-managed network thread. Events are then delivered
    /// on that thread.
    pub fn loop_start(&self) -> MosquittoResult<()> {
        let result = check_result_code(self.engine().loop_start(self.handle()));
        log_ffi_operation(
            "loop_start",
            Some(self.handle()),
            if result.is_ok() { "success" } else { "failure" },
            None,
        );
        result
    }

    /// Stop the managed network thread, blocking until it has exited.
    ///
    /// Without `force` the client must have been disconnected first.
    pub fn loop_stop(&self, force: bool) -> MosquittoResult<()> {
        let result = check_result_code(self.engine().loop_stop(self.handle(), force));
        log_ffi_operation(
            "loop_stop",
            Some(self.handle()),
            if result.is_ok() { "success" } else { "failure" },
            force.then_some("force"),
        );
        result
    }

    pub fn loop_read(&self, max_packets: u32) -> MosquittoResult<()> {
        check_result_code(self.engine().loop_read(self.handle(), packets(max_packets)))
    }

    pub fn loop_write(&self, max_packets: u32) -> MosquittoResult<()> {
        check_result_code(self.engine().loop_write(self.handle(), packets(max_packets)))
    }

    pub fn loop_misc(&self) -> MosquittoResult<()> {
        check_result_code(self.engine().loop_misc(self.handle()))
    }

    /// Whether outgoing data is waiting to be written.
    pub fn want_write(&self) -> bool {
        self.engine().want_write(self.handle())
    }

    // TLS

    /// Configure certificate-based TLS.
    ///
    /// A `key_password` is kept on the client and handed to the native
    /// library when it loads an encrypted key file.
    pub fn set_tls(
        &self,
        certificates: &TlsCertificates,
        key_password: Option<&str>,
    ) -> MosquittoResult<()> {
        let cafile = path_to_cstring(certificates.cafile.as_deref())?;
        let capath = path_to_cstring(certificates.capath.as_deref())?;
        let certfile = path_to_cstring(certificates.certfile.as_deref())?;
        let keyfile = path_to_cstring(certificates.keyfile.as_deref())?;
        let files = TlsFiles {
            cafile: cafile.as_deref(),
            capath: capath.as_deref(),
            certfile: certfile.as_deref(),
            keyfile: keyfile.as_deref(),
        };

        *self.inner.key_password.write() = key_password.map(|password| password.as_bytes().to_vec());
        let callback = key_password.map(|_| trampolines::on_password as crate::ffi::PasswordCallback);
        let result = check_result_code(self.engine().tls_set(self.handle(), files, callback));
        if result.is_err() {
            *self.inner.key_password.write() = None;
        }
        result
    }

    pub fn set_tls_options(&self, options: &TlsOptions) -> MosquittoResult<()> {
        let version = to_cstring(options.tls_version.as_native())?;
        let ciphers = to_optional_cstring(options.ciphers.as_deref())?;
        check_result_code(self.engine().tls_opts_set(
            self.handle(),
            options.certificate_requirements as c_int,
            Some(&version),
            ciphers.as_deref(),
        ))
    }

    /// Skip verification of the server hostname in its certificate.
    pub fn set_tls_insecure(&self, insecure: bool) -> MosquittoResult<()> {
        check_result_code(self.engine().tls_insecure_set(self.handle(), insecure))
    }
}

fn packets(max_packets: u32) -> c_int {
    c_int::try_from(max_packets).unwrap_or(c_int::MAX)
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("handle", &self.inner.handle)
            .field("client_id", &self.client_id())
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let handle = self.inner.handle;
        self.inner.set_state(LifecycleState::TornDown);
        instances().unregister(handle);
        self.inner.engine().destroy(handle);
        debug!(handle = %handle, "Client torn down");
        log_ffi_operation("destroy", Some(handle), "success", None);
    }
}
