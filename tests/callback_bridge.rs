//! Trampoline routing: from a raw native invocation to the right client's
//! handler, and nowhere else.

mod common;

use common::{connected_client, loopback_library, pump};
use smosquitto::bridge::trampolines;
use smosquitto::ffi::{self, mosquitto_message, RawHandle};
use smosquitto::registry::global_stats;
use smosquitto::{
    Client, ConnectionResponseCode, DisconnectReason, Event, LogLevel, MessageId, MosquittoError,
    Payload, QoS, Timeout,
};
use std::ffi::{c_int, CString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

fn raw_message(topic: &CString, payload: &[u8], qos: c_int, retain: bool) -> mosquitto_message {
    mosquitto_message {
        mid: 11,
        topic: topic.as_ptr().cast_mut(),
        payload: payload.as_ptr().cast_mut().cast(),
        payloadlen: c_int::try_from(payload.len()).unwrap(),
        qos,
        retain,
    }
}

#[test]
fn test_direct_message_invocation_reaches_handler() {
    let (_engine, library) = loopback_library();
    let client = Client::new(&library, Some("X"), true).unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    client.on_message(move |message| sink.lock().unwrap().push(message.clone()));

    let topic = CString::new("t").unwrap();
    let raw = raw_message(&topic, b"hello", 2, false);
    // SAFETY: `raw` and the buffers it points to outlive the call
    unsafe {
        trampolines::on_message(client.handle().as_ptr(), std::ptr::null_mut(), &raw);
    }

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].topic, "t");
    assert_eq!(received[0].payload, Payload::from("hello"));
    assert_eq!(received[0].qos, QoS::ExactlyOnce);
    assert!(!received[0].retain);
}

#[test]
fn test_engine_delivery_reaches_handler() {
    let (engine, library) = loopback_library();
    let (client, events) = connected_client(&library, "X");

    engine
        .deliver_message(client.handle(), "t", "hello", QoS::ExactlyOnce, false)
        .unwrap();
    let delivered = pump(&client, &events);

    assert_eq!(delivered.len(), 1);
    let Event::Message(message) = &delivered[0] else {
        panic!("expected a message, got {:?}", delivered[0]);
    };
    assert_eq!(message.topic, "t");
    assert_eq!(message.payload.as_str(), Some("hello"));
    assert_eq!(message.qos, QoS::ExactlyOnce);
}

#[test]
fn test_events_reach_only_their_own_client() {
    let (engine, library) = loopback_library();
    let (first, first_events) = connected_client(&library, "first");
    let (second, second_events) = connected_client(&library, "second");

    engine
        .deliver_message(second.handle(), "only/second", "x", QoS::AtMostOnce, false)
        .unwrap();
    assert!(pump(&first, &first_events).is_empty());
    assert_eq!(pump(&second, &second_events).len(), 1);
}

#[test]
fn test_unregistered_handle_invokes_nothing() {
    let (_engine, library) = loopback_library();
    let client = Client::new(&library, Some("bystander"), true).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    client.on_publish(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // Never handed out by any engine
    let stranger = 0x40 as *mut ffi::mosquitto;
    // SAFETY: trampolines never dereference the handle
    unsafe {
        trampolines::on_publish(stranger, std::ptr::null_mut(), 1);
        trampolines::on_connect(stranger, std::ptr::null_mut(), 0);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_malformed_suback_is_dropped() {
    let (_engine, library) = loopback_library();
    let client = Client::new(&library, Some("suback"), true).unwrap();
    let events = client.events();
    let ptr = client.handle().as_ptr();
    let granted: [c_int; 3] = [1, 7, 2];

    // SAFETY: `granted` holds three readable entries
    unsafe {
        trampolines::on_subscribe(ptr, std::ptr::null_mut(), 1, 0, granted.as_ptr());
        trampolines::on_subscribe(ptr, std::ptr::null_mut(), 2, 3, std::ptr::null());
        trampolines::on_subscribe(ptr, std::ptr::null_mut(), 3, -1, granted.as_ptr());
        trampolines::on_subscribe(ptr, std::ptr::null_mut(), 4, 3, granted.as_ptr());
    }

    let received: Vec<Event> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![Event::Subscribe {
            mid: MessageId(4),
            granted: vec![QoS::AtLeastOnce, QoS::ExactlyOnce],
        }]
    );
}

#[test]
fn test_null_message_is_dropped() {
    let (_engine, library) = loopback_library();
    let client = Client::new(&library, Some("nullmsg"), true).unwrap();
    let events = client.events();
    // SAFETY: a null message is rejected before any dereference
    unsafe {
        trampolines::on_message(client.handle().as_ptr(), std::ptr::null_mut(), std::ptr::null());
    }
    assert!(events.try_iter().next().is_none());
}

#[test]
fn test_message_with_invalid_topic_is_dropped() {
    let (_engine, library) = loopback_library();
    let client = Client::new(&library, Some("badtopic"), true).unwrap();
    let events = client.events();

    let topic = CString::new(vec![0xff, 0xfe]).unwrap();
    let raw = raw_message(&topic, b"x", 0, false);
    // SAFETY: `raw` and its buffers outlive the call
    unsafe {
        trampolines::on_message(client.handle().as_ptr(), std::ptr::null_mut(), &raw);
    }
    assert!(events.try_iter().next().is_none());
}

#[test]
fn test_unknown_log_level_maps_to_all() {
    let (engine, library) = loopback_library();
    let client = Client::new(&library, Some("logger"), true).unwrap();
    let events = client.events();

    engine
        .deliver_log(client.handle(), 0x1234, "odd severity")
        .unwrap();
    engine
        .deliver_log(client.handle(), ffi::MOSQ_LOG_WARNING, "careful")
        .unwrap();
    client.loop_read(10).unwrap();

    let received: Vec<Event> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![
            Event::Log {
                level: LogLevel::All,
                message: "odd severity".to_string(),
            },
            Event::Log {
                level: LogLevel::Warning,
                message: "careful".to_string(),
            },
        ]
    );
}

#[test]
fn test_handler_panic_is_contained() {
    let (engine, library) = loopback_library();
    let (client, _events) = connected_client(&library, "fragile");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on_message(move |message| {
        if message.topic == "boom" {
            panic!("handler failure");
        }
        sink.lock().unwrap().push(message.topic.clone());
    });

    engine
        .deliver_message(client.handle(), "boom", "", QoS::AtMostOnce, false)
        .unwrap();
    engine
        .deliver_message(client.handle(), "after", "", QoS::AtMostOnce, false)
        .unwrap();
    client.run_loop(Timeout::Instant, 1).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["after".to_string()]);
}

#[test]
fn test_refused_connect_reports_broker_code() {
    let (engine, library) = loopback_library();
    let client = Client::new(&library, Some("refused"), true).unwrap();
    let events = client.events();
    engine.set_connack_code(42);

    client.connect("localhost", 1883, 60, None).unwrap();
    let received = pump(&client, &events);
    assert_eq!(
        received,
        vec![Event::Connect(ConnectionResponseCode::Unknown(42))]
    );
    assert_eq!(
        client.publish("t", "x", QoS::AtMostOnce, false),
        Err(MosquittoError::NoConnection)
    );
}

#[test]
fn test_disconnect_reasons() {
    let (engine, library) = loopback_library();
    let (lost, lost_events) = connected_client(&library, "lost");
    let (quitter, quitter_events) = connected_client(&library, "quitter");

    engine.drop_connection(lost.handle(), ffi::MOSQ_ERR_CONN_LOST).unwrap();
    assert_eq!(
        pump(&lost, &lost_events),
        vec![Event::Disconnect(DisconnectReason::Error(
            MosquittoError::ConnectionLost
        ))]
    );

    quitter.disconnect().unwrap();
    assert_eq!(
        pump(&quitter, &quitter_events),
        vec![Event::Disconnect(DisconnectReason::UserInitiated)]
    );
}

#[test]
fn test_concurrent_invocations_are_all_delivered() {
    const THREADS: usize = 8;
    const CALLS: usize = 250;

    let (_engine, library) = loopback_library();
    let client = Client::new(&library, Some("busy"), true).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    client.on_publish(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let handle = client.handle();
    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            thread::spawn(move || {
                for mid in 0..CALLS {
                    // SAFETY: trampolines never dereference the handle
                    unsafe {
                        trampolines::on_publish(
                            handle.as_ptr(),
                            std::ptr::null_mut(),
                            c_int::try_from(mid).unwrap(),
                        );
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), THREADS * CALLS);
}

#[test]
fn test_registry_tracks_live_clients() {
    let (_engine, library) = loopback_library();
    let client = Client::new(&library, Some("counted"), true).unwrap();
    let stats = global_stats();
    assert!(stats.live >= 1);
    assert!(stats.entries >= stats.live);
    assert!(RawHandle::from_ptr(client.handle().as_ptr()).is_some());
}
