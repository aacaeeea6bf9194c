#![allow(dead_code)]

//! Shared helpers for integration tests. Everything runs against the
//! in-process loopback engine; no broker or native library is needed.

use crossbeam::channel::Receiver;
use smosquitto::{Client, Event, Library, LoopbackEngine, Timeout};
use std::time::{Duration, Instant};

pub fn loopback_library() -> (LoopbackEngine, Library) {
    let engine = LoopbackEngine::new();
    let library = Library::init(engine.clone()).expect("loopback init never fails");
    (engine, library)
}

/// A client connected to the loopback broker with its connect events drained.
pub fn connected_client(library: &Library, id: &str) -> (Client, Receiver<Event>) {
    let client = Client::new(library, Some(id), true).unwrap();
    let events = client.events();
    client.connect("localhost", 1883, 60, None).unwrap();
    client.run_loop(Timeout::Instant, 1).unwrap();
    let drained = without_logs(events.try_iter().collect());
    assert_eq!(
        drained,
        vec![Event::Connect(smosquitto::ConnectionResponseCode::Success)]
    );
    (client, events)
}

/// Run one loop iteration and return the non-log events it produced.
pub fn pump(client: &Client, events: &Receiver<Event>) -> Vec<Event> {
    client.run_loop(Timeout::Instant, 1).unwrap();
    without_logs(events.try_iter().collect())
}

pub fn without_logs(events: Vec<Event>) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| !matches!(event, Event::Log { .. }))
        .collect()
}

/// Wait for the first event matching `predicate`, e.g. from a background
/// loop thread.
pub fn wait_for(
    events: &Receiver<Event>,
    timeout: Duration,
    predicate: impl Fn(&Event) -> bool,
) -> Option<Event> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        match events.recv_timeout(remaining) {
            Ok(event) if predicate(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}
