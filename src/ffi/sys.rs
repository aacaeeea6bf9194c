//! `extern "C"` declarations for the system `libmosquitto`.

use super::{
    mosquitto, ConnectCallback, DisconnectCallback, LogCallback, MessageCallback,
    PasswordCallback, PublishCallback, SubscribeCallback, UnsubscribeCallback,
};
use std::ffi::{c_char, c_int, c_uint, c_void};

#[link(name = "mosquitto")]
extern "C" {
    pub fn mosquitto_lib_version(major: *mut c_int, minor: *mut c_int, revision: *mut c_int)
        -> c_int;
    pub fn mosquitto_lib_init() -> c_int;
    pub fn mosquitto_lib_cleanup() -> c_int;

    pub fn mosquitto_new(id: *const c_char, clean_session: bool, obj: *mut c_void)
        -> *mut mosquitto;
    pub fn mosquitto_destroy(mosq: *mut mosquitto);
    pub fn mosquitto_reinitialise(
        mosq: *mut mosquitto,
        id: *const c_char,
        clean_session: bool,
        obj: *mut c_void,
    ) -> c_int;
    pub fn mosquitto_user_data_set(mosq: *mut mosquitto, obj: *mut c_void);

    pub fn mosquitto_will_set(
        mosq: *mut mosquitto,
        topic: *const c_char,
        payloadlen: c_int,
        payload: *const c_void,
        qos: c_int,
        retain: bool,
    ) -> c_int;
    pub fn mosquitto_will_clear(mosq: *mut mosquitto) -> c_int;
    pub fn mosquitto_username_pw_set(
        mosq: *mut mosquitto,
        username: *const c_char,
        password: *const c_char,
    ) -> c_int;

    pub fn mosquitto_connect_bind(
        mosq: *mut mosquitto,
        host: *const c_char,
        port: c_int,
        keepalive: c_int,
        bind_address: *const c_char,
    ) -> c_int;
    pub fn mosquitto_reconnect(mosq: *mut mosquitto) -> c_int;
    pub fn mosquitto_disconnect(mosq: *mut mosquitto) -> c_int;

    pub fn mosquitto_publish(
        mosq: *mut mosquitto,
        mid: *mut c_int,
        topic: *const c_char,
        payloadlen: c_int,
        payload: *const c_void,
        qos: c_int,
        retain: bool,
    ) -> c_int;
    pub fn mosquitto_subscribe(
        mosq: *mut mosquitto,
        mid: *mut c_int,
        sub: *const c_char,
        qos: c_int,
    ) -> c_int;
    pub fn mosquitto_unsubscribe(mosq: *mut mosquitto, mid: *mut c_int, sub: *const c_char)
        -> c_int;

    pub fn mosquitto_loop(mosq: *mut mosquitto, timeout: c_int, max_packets: c_int) -> c_int;
    pub fn mosquitto_loop_forever(mosq: *mut mosquitto, timeout: c_int, max_packets: c_int)
        -> c_int;
    pub fn mosquitto_loop_start(mosq: *mut mosquitto) -> c_int;
    pub fn mosquitto_loop_stop(mosq: *mut mosquitto, force: bool) -> c_int;
    pub fn mosquitto_loop_read(mosq: *mut mosquitto, max_packets: c_int) -> c_int;
    pub fn mosquitto_loop_write(mosq: *mut mosquitto, max_packets: c_int) -> c_int;
    pub fn mosquitto_loop_misc(mosq: *mut mosquitto) -> c_int;
    pub fn mosquitto_want_write(mosq: *mut mosquitto) -> bool;
    pub fn mosquitto_threaded_set(mosq: *mut mosquitto, threaded: bool) -> c_int;

    pub fn mosquitto_opts_set(mosq: *mut mosquitto, option: c_int, value: *mut c_void) -> c_int;
    pub fn mosquitto_reconnect_delay_set(
        mosq: *mut mosquitto,
        reconnect_delay: c_uint,
        reconnect_delay_max: c_uint,
        reconnect_exponential_backoff: bool,
    ) -> c_int;
    pub fn mosquitto_max_inflight_messages_set(mosq: *mut mosquitto, max_inflight: c_uint)
        -> c_int;
    pub fn mosquitto_socks5_set(
        mosq: *mut mosquitto,
        host: *const c_char,
        port: c_int,
        username: *const c_char,
        password: *const c_char,
    ) -> c_int;

    pub fn mosquitto_tls_set(
        mosq: *mut mosquitto,
        cafile: *const c_char,
        capath: *const c_char,
        certfile: *const c_char,
        keyfile: *const c_char,
        pw_callback: Option<PasswordCallback>,
    ) -> c_int;
    pub fn mosquitto_tls_opts_set(
        mosq: *mut mosquitto,
        cert_reqs: c_int,
        tls_version: *const c_char,
        ciphers: *const c_char,
    ) -> c_int;
    pub fn mosquitto_tls_insecure_set(mosq: *mut mosquitto, value: bool) -> c_int;

    pub fn mosquitto_connect_callback_set(mosq: *mut mosquitto, on_connect: Option<ConnectCallback>);
    pub fn mosquitto_disconnect_callback_set(
        mosq: *mut mosquitto,
        on_disconnect: Option<DisconnectCallback>,
    );
    pub fn mosquitto_publish_callback_set(mosq: *mut mosquitto, on_publish: Option<PublishCallback>);
    pub fn mosquitto_message_callback_set(mosq: *mut mosquitto, on_message: Option<MessageCallback>);
    pub fn mosquitto_subscribe_callback_set(
        mosq: *mut mosquitto,
        on_subscribe: Option<SubscribeCallback>,
    );
    pub fn mosquitto_unsubscribe_callback_set(
        mosq: *mut mosquitto,
        on_unsubscribe: Option<UnsubscribeCallback>,
    );
    pub fn mosquitto_log_callback_set(mosq: *mut mosquitto, on_log: Option<LogCallback>);
}
