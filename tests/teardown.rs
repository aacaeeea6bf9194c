//! A callback racing with client teardown must find nothing.
//!
//! Kept in its own test binary: the dead handle's address may be handed out
//! again by the allocator, which would route the late call into whichever
//! client got it.

mod common;

use common::loopback_library;
use smosquitto::bridge::trampolines;
use smosquitto::{Client, LifecycleState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_late_callback_after_teardown_delivers_nothing() {
    let (engine, library) = loopback_library();
    let client = Client::new(&library, Some("ephemeral"), true).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    client.on_publish(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let handle = client.handle();
    // SAFETY: trampolines never dereference the handle
    unsafe { trampolines::on_publish(handle.as_ptr(), std::ptr::null_mut(), 1) };
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.state(), LifecycleState::Active);

    drop(client);
    assert!(engine.session(handle).is_none());

    thread::spawn(move || {
        // SAFETY: as above; the handle is now unregistered
        unsafe { trampolines::on_publish(handle.as_ptr(), std::ptr::null_mut(), 2) };
    })
    .join()
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
