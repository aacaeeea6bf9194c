//! # Loopback Engine
//!
//! An in-process [`NativeEngine`] that behaves like the native library with
//! a broker attached: every session created on the same engine shares one
//! topic space. Publishing routes a copy to every connected session whose
//! subscriptions match, including the publisher.
//!
//! Events are queued per session and delivered through the registered
//! trampolines only while the session's network loop runs (`loop_once`,
//! `loop_forever`, `loop_read` or the background thread of `loop_start`),
//! exactly the way the native library invokes callbacks from inside its loop.
//! The engine lock is never held while a trampoline runs, so callbacks may
//! call back into the engine.
//!
//! The simulation hooks (`deliver_message`, `drop_connection`,
//! `request_key_password`, ...) stand in for a broker and for OpenSSL.

use super::{NativeCallback, NativeEngine, TlsFiles};
use crate::error::{MosquittoError, MosquittoResult};
use crate::ffi::{self, mosquitto, RawHandle};
use crate::types::{Message, MessageId, Payload, QoS, Version};
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::ffi::{c_char, c_int, c_uint, c_void, CStr, CString};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

const PUMP_INTERVAL: Duration = Duration::from_millis(2);
const MAX_CLIENT_ID_LEN: usize = 65_535;

/// In-process stand-in for the native library and a broker.
///
/// Cloning yields another handle onto the same broker, so a test can keep a
/// clone for the simulation hooks after handing the engine to a
/// [`Library`](crate::Library).
#[derive(Clone, Default)]
pub struct LoopbackEngine {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    sessions: Mutex<HashMap<usize, Session>>,
    init_count: AtomicUsize,
    connack_code: AtomicI32,
}

#[derive(Clone, Copy, Default)]
struct Callbacks {
    connect: Option<ffi::ConnectCallback>,
    message: Option<ffi::MessageCallback>,
    disconnect: Option<ffi::DisconnectCallback>,
    publish: Option<ffi::PublishCallback>,
    subscribe: Option<ffi::SubscribeCallback>,
    unsubscribe: Option<ffi::UnsubscribeCallback>,
    log: Option<ffi::LogCallback>,
}

enum Delivery {
    Connect(c_int),
    Disconnect(c_int),
    Publish(c_int),
    Subscribe { mid: c_int, granted: Vec<c_int> },
    Unsubscribe(c_int),
    Message(Message),
    Log { level: c_int, text: CString },
}

enum LoopSignal {
    /// Something was queued on the session.
    Wake,
    /// Exit once every earlier signal has been handled.
    Stop,
}

struct LoopThread {
    signals: Sender<LoopSignal>,
    /// Set by a forced stop: exit without delivering what is still queued.
    abandon: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Broker address given to the last successful `connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: i32,
    pub keepalive: i32,
    pub bind_address: Option<String>,
}

/// TLS material as configured through `tls_set`/`tls_opts_set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsState {
    pub cafile: Option<PathBuf>,
    pub capath: Option<PathBuf>,
    pub certfile: Option<PathBuf>,
    pub keyfile: Option<PathBuf>,
    pub has_password_callback: bool,
    pub cert_reqs: i32,
    pub tls_version: Option<String>,
    pub ciphers: Option<String>,
    pub insecure: bool,
}

/// Snapshot of one session's configuration, for assertions in tests.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub client_id: String,
    pub clean_session: bool,
    pub connected: bool,
    pub endpoint: Option<Endpoint>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub will: Option<Message>,
    pub subscriptions: Vec<(String, QoS)>,
    pub protocol_version: i32,
    pub max_inflight: u32,
    pub threaded: bool,
    pub loop_running: bool,
    pub reconnect_delay: (u32, u32, bool),
    pub socks5: Option<(String, i32, Option<String>)>,
    pub tls: Option<TlsState>,
}

struct Session {
    // Owns the allocation whose address is the handle
    token: Box<u64>,
    client_id: String,
    clean_session: bool,
    userdata: usize,
    callbacks: Callbacks,
    connected: bool,
    endpoint: Option<Endpoint>,
    next_mid: c_int,
    subscriptions: Vec<(String, QoS)>,
    outbox: VecDeque<Delivery>,
    published: Vec<Message>,
    will: Option<Message>,
    username: Option<String>,
    password: Option<String>,
    protocol_version: c_int,
    max_inflight: c_uint,
    threaded: bool,
    reconnect_delay: (c_uint, c_uint, bool),
    socks5: Option<(String, c_int, Option<String>)>,
    tls: Option<TlsState>,
    password_callback: Option<ffi::PasswordCallback>,
    loop_thread: Option<LoopThread>,
}

impl Session {
    fn new(token: Box<u64>, client_id: String, clean_session: bool) -> Self {
        Self {
            token,
            client_id,
            clean_session,
            userdata: 0,
            callbacks: Callbacks::default(),
            connected: false,
            endpoint: None,
            next_mid: 0,
            subscriptions: Vec::new(),
            outbox: VecDeque::new(),
            published: Vec::new(),
            will: None,
            username: None,
            password: None,
            protocol_version: ffi::MQTT_PROTOCOL_V31,
            max_inflight: 20,
            threaded: false,
            reconnect_delay: (1, 1, false),
            socks5: None,
            tls: None,
            password_callback: None,
            loop_thread: None,
        }
    }

    fn mid(&mut self) -> c_int {
        self.next_mid = if self.next_mid >= 0xFFFF { 1 } else { self.next_mid + 1 };
        self.next_mid
    }

    fn enqueue(&mut self, delivery: Delivery) {
        self.outbox.push_back(delivery);
        if let Some(loop_thread) = &self.loop_thread {
            let _ = loop_thread.signals.send(LoopSignal::Wake);
        }
    }

    fn log(&mut self, level: c_int, text: String) {
        if let Ok(text) = CString::new(text) {
            self.enqueue(Delivery::Log { level, text });
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            client_id: self.client_id.clone(),
            clean_session: self.clean_session,
            connected: self.connected,
            endpoint: self.endpoint.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            will: self.will.clone(),
            subscriptions: self.subscriptions.clone(),
            protocol_version: self.protocol_version,
            max_inflight: self.max_inflight,
            threaded: self.threaded,
            loop_running: self.loop_thread.is_some(),
            reconnect_delay: self.reconnect_delay,
            socks5: self.socks5.clone(),
            tls: self.tls.clone(),
        }
    }
}

fn client_id_for(id: Option<&CStr>, token: &u64) -> MosquittoResult<String> {
    match id {
        Some(id) => {
            let id = id.to_str().map_err(|_| MosquittoError::MalformedUtf8)?;
            if id.len() > MAX_CLIENT_ID_LEN {
                return Err(MosquittoError::Inval);
            }
            Ok(id.to_owned())
        }
        None => Ok(format!("mosq-{:016x}", token as *const u64 as usize)),
    }
}

/// Topic a message may be published to: non-empty, wildcard and NUL free.
fn valid_topic(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(['+', '#', '\0'])
}

/// Subscription filter: `+` and `#` only as whole levels, `#` only last.
fn valid_filter(filter: &str) -> bool {
    if filter.is_empty() || filter.contains('\0') {
        return false;
    }
    let levels: Vec<&str> = filter.split('/').collect();
    levels.iter().enumerate().all(|(index, level)| match *level {
        "#" => index == levels.len() - 1,
        "+" => true,
        other => !other.contains(['+', '#']),
    })
}

/// Whether `topic` matches the subscription `filter`.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    // Wildcards never match the first level of `$`-prefixed topics
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }
    let mut topic_levels = topic.split('/');
    for level in filter.split('/') {
        match level {
            "#" => return true,
            "+" => {
                if topic_levels.next().is_none() {
                    return false;
                }
            }
            literal => {
                if topic_levels.next() != Some(literal) {
                    return false;
                }
            }
        }
    }
    topic_levels.next().is_none()
}

fn code_of(result: MosquittoResult<()>) -> c_int {
    match result {
        Ok(()) => ffi::MOSQ_ERR_SUCCESS,
        Err(error) => error.code(),
    }
}

fn to_owned_str(value: &CStr) -> MosquittoResult<String> {
    value
        .to_str()
        .map(str::to_owned)
        .map_err(|_| MosquittoError::MalformedUtf8)
}

fn checked_path(path: Option<&CStr>) -> MosquittoResult<Option<PathBuf>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let path = PathBuf::from(to_owned_str(path)?);
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(MosquittoError::Inval)
    }
}

/// Invoke the trampoline registered for one queued delivery.
fn dispatch(handle: RawHandle, callbacks: &Callbacks, userdata: *mut c_void, delivery: Delivery) {
    let mosq: *mut mosquitto = handle.as_ptr();
    // SAFETY: the callbacks are the trampolines registered through
    // `callback_set`; every pointer argument lives until the call returns.
    unsafe {
        match delivery {
            Delivery::Connect(rc) => {
                if let Some(callback) = callbacks.connect {
                    callback(mosq, userdata, rc);
                }
            }
            Delivery::Disconnect(rc) => {
                if let Some(callback) = callbacks.disconnect {
                    callback(mosq, userdata, rc);
                }
            }
            Delivery::Publish(mid) => {
                if let Some(callback) = callbacks.publish {
                    callback(mosq, userdata, mid);
                }
            }
            Delivery::Subscribe { mid, granted } => {
                if let Some(callback) = callbacks.subscribe {
                    let count = c_int::try_from(granted.len()).unwrap_or(c_int::MAX);
                    callback(mosq, userdata, mid, count, granted.as_ptr());
                }
            }
            Delivery::Unsubscribe(mid) => {
                if let Some(callback) = callbacks.unsubscribe {
                    callback(mosq, userdata, mid);
                }
            }
            Delivery::Message(message) => {
                let Some(callback) = callbacks.message else {
                    return;
                };
                let Ok(topic) = CString::new(message.topic) else {
                    return;
                };
                let payload = message.payload.as_bytes();
                let raw = ffi::mosquitto_message {
                    mid: message.id.raw(),
                    topic: topic.as_ptr().cast_mut(),
                    payload: payload.as_ptr().cast_mut().cast(),
                    payloadlen: c_int::try_from(payload.len()).unwrap_or(c_int::MAX),
                    qos: message.qos.as_raw(),
                    retain: message.retain,
                };
                callback(mosq, userdata, &raw);
            }
            Delivery::Log { level, text } => {
                if let Some(callback) = callbacks.log {
                    callback(mosq, userdata, level, text.as_ptr());
                }
            }
        }
    }
}

impl Shared {
    fn with_session<R>(
        &self,
        handle: RawHandle,
        op: impl FnOnce(&mut Session) -> MosquittoResult<R>,
    ) -> MosquittoResult<R> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&handle.addr())
            .ok_or(MosquittoError::Inval)?;
        op(session)
    }

    /// Deliver up to `limit` queued events. `None` when the session is gone.
    fn pump(&self, handle: RawHandle, limit: usize) -> Option<usize> {
        let (batch, callbacks, userdata) = {
            let mut sessions = self.sessions.lock();
            let session = sessions.get_mut(&handle.addr())?;
            let take = limit.min(session.outbox.len());
            let batch: Vec<Delivery> = session.outbox.drain(..take).collect();
            (batch, session.callbacks, session.userdata)
        };
        let delivered = batch.len();
        for delivery in batch {
            dispatch(handle, &callbacks, userdata as *mut c_void, delivery);
        }
        Some(delivered)
    }

    /// Route `message` to every connected session with a matching filter.
    fn route(sessions: &mut HashMap<usize, Session>, message: &Message) {
        for session in sessions.values_mut().filter(|session| session.connected) {
            let granted = session
                .subscriptions
                .iter()
                .filter(|(filter, _)| topic_matches(filter, &message.topic))
                .map(|(_, qos)| *qos)
                .max();
            if let Some(granted) = granted {
                let mid = session.mid();
                session.enqueue(Delivery::Message(Message {
                    id: MessageId(mid),
                    qos: granted.min(message.qos),
                    ..message.clone()
                }));
            }
        }
    }

    fn take_loop_thread(&self, handle: RawHandle) -> Option<LoopThread> {
        self.sessions
            .lock()
            .get_mut(&handle.addr())
            .and_then(|session| session.loop_thread.take())
    }
}

fn stop_loop_thread(loop_thread: LoopThread, force: bool) {
    if force {
        loop_thread.abandon.store(true, Ordering::Release);
    }
    let _ = loop_thread.signals.send(LoopSignal::Stop);
    if loop_thread.thread.thread().id() == thread::current().id() {
        // Stopped from inside one of its own callbacks; it exits on its own.
        return;
    }
    if loop_thread.thread.join().is_err() {
        debug!("Loopback network thread panicked");
    }
}

/// Body of the `loop_start` thread: pump on every wake-up until stopped.
fn run_loop_thread(
    shared: &Shared,
    handle: RawHandle,
    signals: &Receiver<LoopSignal>,
    abandon: &AtomicBool,
) {
    while let Ok(signal) = signals.recv() {
        if abandon.load(Ordering::Acquire) {
            return;
        }
        if shared.pump(handle, usize::MAX).is_none() {
            return;
        }
        if matches!(signal, LoopSignal::Stop) {
            return;
        }
    }
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result code the broker answers the next `connect`/`reconnect` with.
    pub fn set_connack_code(&self, code: c_int) {
        self.shared.connack_code.store(code, Ordering::Release);
    }

    /// Queue an incoming message for `handle` as if the broker sent it.
    pub fn deliver_message(
        &self,
        handle: RawHandle,
        topic: &str,
        payload: impl Into<Payload>,
        qos: QoS,
        retain: bool,
    ) -> MosquittoResult<MessageId> {
        let payload = payload.into();
        self.shared.with_session(handle, |session| {
            let id = MessageId(session.mid());
            session.enqueue(Delivery::Message(Message {
                id,
                topic: topic.to_owned(),
                payload,
                qos,
                retain,
            }));
            Ok(id)
        })
    }

    /// Queue a library log line for `handle`.
    pub fn deliver_log(&self, handle: RawHandle, level: c_int, text: &str) -> MosquittoResult<()> {
        let text = CString::new(text).map_err(|_| MosquittoError::Inval)?;
        self.shared.with_session(handle, |session| {
            session.enqueue(Delivery::Log { level, text });
            Ok(())
        })
    }

    /// Lose the connection of `handle` with result code `rc`, publishing its
    /// will to the other sessions.
    pub fn drop_connection(&self, handle: RawHandle, rc: c_int) -> MosquittoResult<()> {
        let mut sessions = self.shared.sessions.lock();
        let session = sessions
            .get_mut(&handle.addr())
            .ok_or(MosquittoError::Inval)?;
        if !session.connected {
            return Err(MosquittoError::NoConnection);
        }
        session.connected = false;
        session.enqueue(Delivery::Disconnect(rc));
        let will = session.will.clone();
        if let Some(will) = will {
            Shared::route(&mut sessions, &will);
        }
        Ok(())
    }

    /// Ask the configured TLS key-password callback for the key password, the
    /// way OpenSSL does when loading an encrypted key file.
    pub fn request_key_password(&self, handle: RawHandle, size: usize) -> Option<Vec<u8>> {
        let (callback, userdata) = self
            .shared
            .with_session(handle, |session| Ok((session.password_callback, session.userdata)))
            .ok()?;
        let callback = callback?;
        let mut buffer = vec![0 as c_char; size];
        let size = c_int::try_from(size).ok()?;
        // SAFETY: `buffer` holds `size` writable bytes
        let written = unsafe { callback(buffer.as_mut_ptr(), size, 0, userdata as *mut c_void) };
        let written = usize::try_from(written).ok().filter(|&len| len > 0)?;
        Some(buffer[..written].iter().map(|&byte| byte as u8).collect())
    }

    /// Messages `handle` published, oldest first.
    pub fn published(&self, handle: RawHandle) -> Vec<Message> {
        self.shared
            .with_session(handle, |session| Ok(session.published.clone()))
            .unwrap_or_default()
    }

    pub fn session(&self, handle: RawHandle) -> Option<SessionInfo> {
        self.shared
            .with_session(handle, |session| Ok(session.info()))
            .ok()
    }

    /// Events queued for `handle` and not yet delivered.
    pub fn pending(&self, handle: RawHandle) -> usize {
        self.shared
            .with_session(handle, |session| Ok(session.outbox.len()))
            .unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.shared.sessions.lock().len()
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.init_count.load(Ordering::Acquire) > 0
    }
}

impl std::fmt::Debug for LoopbackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackEngine")
            .field("sessions", &self.session_count())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl NativeEngine for LoopbackEngine {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn lib_init(&self) -> c_int {
        self.shared.init_count.fetch_add(1, Ordering::AcqRel);
        ffi::MOSQ_ERR_SUCCESS
    }

    fn lib_cleanup(&self) -> c_int {
        let _ = self
            .shared
            .init_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1));
        ffi::MOSQ_ERR_SUCCESS
    }

    fn lib_version(&self) -> Version {
        Version::compiled_with()
    }

    fn create(&self, id: Option<&CStr>, clean_session: bool) -> MosquittoResult<RawHandle> {
        if id.is_none() && !clean_session {
            return Err(MosquittoError::Inval);
        }
        let token = Box::new(0u64);
        let client_id = client_id_for(id, &token)?;
        let handle = RawHandle::from_ptr((&*token as *const u64).cast_mut().cast())
            .ok_or(MosquittoError::NoMemory)?;
        trace!(handle = %handle, client_id = %client_id, "Loopback session created");
        self.shared
            .sessions
            .lock()
            .insert(handle.addr(), Session::new(token, client_id, clean_session));
        Ok(handle)
    }

    fn destroy(&self, handle: RawHandle) {
        let session = self.shared.sessions.lock().remove(&handle.addr());
        if let Some(mut session) = session {
            if let Some(loop_thread) = session.loop_thread.take() {
                stop_loop_thread(loop_thread, true);
            }
            trace!(handle = %handle, "Loopback session destroyed");
        }
    }

    fn reinitialise(&self, handle: RawHandle, id: Option<&CStr>, clean_session: bool) -> c_int {
        if id.is_none() && !clean_session {
            return ffi::MOSQ_ERR_INVAL;
        }
        if let Some(loop_thread) = self.shared.take_loop_thread(handle) {
            stop_loop_thread(loop_thread, true);
        }
        code_of(self.shared.with_session(handle, |session| {
            let client_id = client_id_for(id, &session.token)?;
            let token = std::mem::replace(&mut session.token, Box::new(0));
            *session = Session::new(token, client_id, clean_session);
            Ok(())
        }))
    }

    fn user_data_set(&self, handle: RawHandle, userdata: *mut c_void) {
        let _ = self.shared.with_session(handle, |session| {
            session.userdata = userdata as usize;
            Ok(())
        });
    }

    fn callback_set(&self, handle: RawHandle, callback: NativeCallback) {
        let _ = self.shared.with_session(handle, |session| {
            let slots = &mut session.callbacks;
            match callback {
                NativeCallback::Connect(cb) => slots.connect = Some(cb),
                NativeCallback::Message(cb) => slots.message = Some(cb),
                NativeCallback::Disconnect(cb) => slots.disconnect = Some(cb),
                NativeCallback::Publish(cb) => slots.publish = Some(cb),
                NativeCallback::Subscribe(cb) => slots.subscribe = Some(cb),
                NativeCallback::Unsubscribe(cb) => slots.unsubscribe = Some(cb),
                NativeCallback::Log(cb) => slots.log = Some(cb),
            }
            Ok(())
        });
    }

    fn connect(
        &self,
        handle: RawHandle,
        host: &CStr,
        port: c_int,
        keepalive: c_int,
        bind_address: Option<&CStr>,
    ) -> c_int {
        let connack = self.shared.connack_code.load(Ordering::Acquire);
        code_of(self.shared.with_session(handle, |session| {
            let host = to_owned_str(host)?;
            if host.is_empty() || !(1..=65_535).contains(&port) || keepalive < 5 {
                return Err(MosquittoError::Inval);
            }
            let bind_address = bind_address.map(to_owned_str).transpose()?;
            session.endpoint = Some(Endpoint {
                host,
                port,
                keepalive,
                bind_address,
            });
            session.connected = connack == 0;
            let line = format!("Client {} sending CONNECT", session.client_id);
            session.log(ffi::MOSQ_LOG_DEBUG, line);
            session.enqueue(Delivery::Connect(connack));
            Ok(())
        }))
    }

    fn disconnect(&self, handle: RawHandle) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            if !session.connected {
                return Err(MosquittoError::NoConnection);
            }
            session.connected = false;
            let line = format!("Client {} sending DISCONNECT", session.client_id);
            session.log(ffi::MOSQ_LOG_DEBUG, line);
            session.enqueue(Delivery::Disconnect(ffi::MOSQ_ERR_SUCCESS));
            Ok(())
        }))
    }

    fn reconnect(&self, handle: RawHandle) -> c_int {
        let connack = self.shared.connack_code.load(Ordering::Acquire);
        code_of(self.shared.with_session(handle, |session| {
            if session.endpoint.is_none() {
                return Err(MosquittoError::Inval);
            }
            session.connected = connack == 0;
            session.enqueue(Delivery::Connect(connack));
            Ok(())
        }))
    }

    fn username_pw_set(
        &self,
        handle: RawHandle,
        username: Option<&CStr>,
        password: Option<&CStr>,
    ) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            session.username = username.map(to_owned_str).transpose()?;
            session.password = match session.username {
                Some(_) => password.map(to_owned_str).transpose()?,
                None => None,
            };
            Ok(())
        }))
    }

    fn reconnect_delay_set(
        &self,
        handle: RawHandle,
        delay: c_uint,
        delay_max: c_uint,
        exponential_backoff: bool,
    ) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            session.reconnect_delay = (delay, delay_max.max(delay), exponential_backoff);
            Ok(())
        }))
    }

    fn socks5_set(
        &self,
        handle: RawHandle,
        host: &CStr,
        port: c_int,
        username: Option<&CStr>,
        _password: Option<&CStr>,
    ) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            if !(1..=65_535).contains(&port) {
                return Err(MosquittoError::Inval);
            }
            let username = username.map(to_owned_str).transpose()?;
            session.socks5 = Some((to_owned_str(host)?, port, username));
            Ok(())
        }))
    }

    fn max_inflight_messages_set(&self, handle: RawHandle, max_inflight: c_uint) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            session.max_inflight = max_inflight;
            Ok(())
        }))
    }

    fn protocol_version_set(&self, handle: RawHandle, version: c_int) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            if version != ffi::MQTT_PROTOCOL_V31 && version != ffi::MQTT_PROTOCOL_V311 {
                return Err(MosquittoError::Inval);
            }
            session.protocol_version = version;
            Ok(())
        }))
    }

    fn publish(
        &self,
        handle: RawHandle,
        mid: &mut c_int,
        topic: &CStr,
        payload: &[u8],
        qos: c_int,
        retain: bool,
    ) -> c_int {
        let mut sessions = self.shared.sessions.lock();
        let Some(session) = sessions.get_mut(&handle.addr()) else {
            return ffi::MOSQ_ERR_INVAL;
        };
        let Ok(topic) = topic.to_str() else {
            return ffi::MOSQ_ERR_MALFORMED_UTF8;
        };
        let Ok(qos) = QoS::try_from(qos) else {
            return ffi::MOSQ_ERR_INVAL;
        };
        if !valid_topic(topic) {
            return ffi::MOSQ_ERR_INVAL;
        }
        if !session.connected {
            return ffi::MOSQ_ERR_NO_CONN;
        }
        let id = session.mid();
        *mid = id;
        let message = Message {
            id: MessageId(id),
            topic: topic.to_owned(),
            payload: Payload::from(payload),
            qos,
            retain,
        };
        let line = format!(
            "Client {} sending PUBLISH (q{}, r{}, m{}, '{}', ... ({} bytes))",
            session.client_id,
            qos,
            u8::from(retain),
            id,
            topic,
            payload.len()
        );
        session.log(ffi::MOSQ_LOG_DEBUG, line);
        session.enqueue(Delivery::Publish(id));
        session.published.push(message.clone());
        Shared::route(&mut sessions, &message);
        ffi::MOSQ_ERR_SUCCESS
    }

    fn subscribe(&self, handle: RawHandle, mid: &mut c_int, pattern: &CStr, qos: c_int) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            let pattern = to_owned_str(pattern)?;
            let qos = QoS::try_from(qos).map_err(|_| MosquittoError::Inval)?;
            if !valid_filter(&pattern) {
                return Err(MosquittoError::Inval);
            }
            if !session.connected {
                return Err(MosquittoError::NoConnection);
            }
            let id = session.mid();
            *mid = id;
            let line = format!(
                "Client {} sending SUBSCRIBE (Mid: {}, Topic: {}, QoS: {})",
                session.client_id, id, pattern, qos
            );
            session.log(ffi::MOSQ_LOG_DEBUG, line);
            session.subscriptions.retain(|(filter, _)| *filter != pattern);
            session.subscriptions.push((pattern, qos));
            session.enqueue(Delivery::Subscribe {
                mid: id,
                granted: vec![qos.as_raw()],
            });
            Ok(())
        }))
    }

    fn unsubscribe(&self, handle: RawHandle, mid: &mut c_int, pattern: &CStr) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            let pattern = to_owned_str(pattern)?;
            if !valid_filter(&pattern) {
                return Err(MosquittoError::Inval);
            }
            if !session.connected {
                return Err(MosquittoError::NoConnection);
            }
            let id = session.mid();
            *mid = id;
            session.subscriptions.retain(|(filter, _)| *filter != pattern);
            session.enqueue(Delivery::Unsubscribe(id));
            Ok(())
        }))
    }

    fn will_set(
        &self,
        handle: RawHandle,
        topic: &CStr,
        payload: &[u8],
        qos: c_int,
        retain: bool,
    ) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            let topic = to_owned_str(topic)?;
            let qos = QoS::try_from(qos).map_err(|_| MosquittoError::Inval)?;
            if !valid_topic(&topic) {
                return Err(MosquittoError::Inval);
            }
            session.will = Some(Message {
                id: MessageId(0),
                topic,
                payload: Payload::from(payload),
                qos,
                retain,
            });
            Ok(())
        }))
    }

    fn will_clear(&self, handle: RawHandle) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            session.will = None;
            Ok(())
        }))
    }

    fn loop_once(&self, handle: RawHandle, _timeout_ms: c_int, _max_packets: c_int) -> c_int {
        match self.shared.pump(handle, usize::MAX) {
            None => ffi::MOSQ_ERR_INVAL,
            Some(delivered) => {
                let connected = self
                    .shared
                    .with_session(handle, |session| Ok(session.connected))
                    .unwrap_or(false);
                if connected || delivered > 0 {
                    ffi::MOSQ_ERR_SUCCESS
                } else {
                    ffi::MOSQ_ERR_NO_CONN
                }
            }
        }
    }

    fn loop_forever(&self, handle: RawHandle, timeout_ms: c_int, _max_packets: c_int) -> c_int {
        let idle = u64::try_from(timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(PUMP_INTERVAL)
            .min(PUMP_INTERVAL);
        loop {
            if self.shared.pump(handle, usize::MAX).is_none() {
                return ffi::MOSQ_ERR_INVAL;
            }
            let (connected, pending) = match self
                .shared
                .with_session(handle, |session| Ok((session.connected, session.outbox.len())))
            {
                Ok(state) => state,
                Err(error) => return error.code(),
            };
            if !connected && pending == 0 {
                return ffi::MOSQ_ERR_SUCCESS;
            }
            thread::sleep(idle);
        }
    }

    fn loop_start(&self, handle: RawHandle) -> c_int {
        let mut sessions = self.shared.sessions.lock();
        let Some(session) = sessions.get_mut(&handle.addr()) else {
            return ffi::MOSQ_ERR_INVAL;
        };
        if session.loop_thread.is_some() {
            return ffi::MOSQ_ERR_INVAL;
        }
        let (signals, receiver) = unbounded();
        let abandon = Arc::new(AtomicBool::new(false));
        let shared = Arc::clone(&self.shared);
        let abandon_flag = Arc::clone(&abandon);
        let spawned = thread::Builder::new()
            .name(format!("loopback-{}", session.client_id))
            .spawn(move || run_loop_thread(&shared, handle, &receiver, &abandon_flag));
        match spawned {
            Ok(thread) => {
                // Deliver whatever was queued before the thread existed.
                let _ = signals.send(LoopSignal::Wake);
                session.threaded = true;
                session.loop_thread = Some(LoopThread {
                    signals,
                    abandon,
                    thread,
                });
                ffi::MOSQ_ERR_SUCCESS
            }
            Err(_) => ffi::MOSQ_ERR_ERRNO,
        }
    }

    /// Without `force` the thread first delivers everything queued before the
    /// call; with `force` queued events stay undelivered.
    fn loop_stop(&self, handle: RawHandle, force: bool) -> c_int {
        let Some(loop_thread) = self.shared.take_loop_thread(handle) else {
            return ffi::MOSQ_ERR_INVAL;
        };
        stop_loop_thread(loop_thread, force);
        ffi::MOSQ_ERR_SUCCESS
    }

    fn loop_read(&self, handle: RawHandle, max_packets: c_int) -> c_int {
        let limit = usize::try_from(max_packets)
            .ok()
            .filter(|&limit| limit > 0)
            .unwrap_or(1);
        match self.shared.pump(handle, limit) {
            Some(_) => ffi::MOSQ_ERR_SUCCESS,
            None => ffi::MOSQ_ERR_INVAL,
        }
    }

    fn loop_write(&self, handle: RawHandle, _max_packets: c_int) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            if session.connected {
                Ok(())
            } else {
                Err(MosquittoError::NoConnection)
            }
        }))
    }

    fn loop_misc(&self, handle: RawHandle) -> c_int {
        self.loop_write(handle, 1)
    }

    fn want_write(&self, handle: RawHandle) -> bool {
        self.pending(handle) > 0
    }

    fn threaded_set(&self, handle: RawHandle, threaded: bool) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            session.threaded = threaded;
            Ok(())
        }))
    }

    fn tls_set(
        &self,
        handle: RawHandle,
        files: TlsFiles<'_>,
        password_callback: Option<ffi::PasswordCallback>,
    ) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            if files.cafile.is_none() && files.capath.is_none() {
                return Err(MosquittoError::Inval);
            }
            if files.certfile.is_some() != files.keyfile.is_some() {
                return Err(MosquittoError::Inval);
            }
            let capath = files
                .capath
                .map(to_owned_str)
                .transpose()?
                .map(PathBuf::from);
            let previous = session.tls.take().unwrap_or(TlsState {
                cert_reqs: 1,
                ..TlsState::default()
            });
            session.tls = Some(TlsState {
                cafile: checked_path(files.cafile)?,
                capath,
                certfile: checked_path(files.certfile)?,
                keyfile: checked_path(files.keyfile)?,
                has_password_callback: password_callback.is_some(),
                ..previous
            });
            session.password_callback = password_callback;
            Ok(())
        }))
    }

    fn tls_opts_set(
        &self,
        handle: RawHandle,
        cert_reqs: c_int,
        tls_version: Option<&CStr>,
        ciphers: Option<&CStr>,
    ) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            if cert_reqs != 0 && cert_reqs != 1 {
                return Err(MosquittoError::Inval);
            }
            let tls_version = tls_version.map(to_owned_str).transpose()?;
            if let Some(version) = tls_version.as_deref() {
                if !matches!(version, "tlsv1" | "tlsv1.1" | "tlsv1.2" | "tlsv1.3") {
                    return Err(MosquittoError::Inval);
                }
            }
            let ciphers = ciphers.map(to_owned_str).transpose()?;
            let tls = session.tls.get_or_insert_with(TlsState::default);
            tls.cert_reqs = cert_reqs;
            tls.tls_version = tls_version;
            tls.ciphers = ciphers;
            Ok(())
        }))
    }

    fn tls_insecure_set(&self, handle: RawHandle, insecure: bool) -> c_int {
        code_of(self.shared.with_session(handle, |session| {
            session.tls.get_or_insert_with(TlsState::default).insecure = insecure;
            Ok(())
        }))
    }
}
