use criterion::{black_box, criterion_group, criterion_main, Criterion};
use smosquitto::bridge::trampolines;
use smosquitto::ffi::{mosquitto, RawHandle};
use smosquitto::{Client, InstanceRegistry, Library, LoopbackEngine};
use std::sync::Arc;
use std::thread;

fn benchmark_registry_lookup(c: &mut Criterion) {
    let registry = InstanceRegistry::new();
    let instances: Vec<(RawHandle, Arc<u64>)> = (1..=1024usize)
        .map(|n| {
            let handle = RawHandle::from_ptr((n * 8) as *mut mosquitto).unwrap();
            (handle, Arc::new(n as u64))
        })
        .collect();
    for (handle, instance) in &instances {
        registry.register(*handle, instance).unwrap();
    }
    let hit = instances[512].0;

    c.bench_function("registry_lookup_hit", |b| {
        b.iter(|| registry.lookup(black_box(hit)))
    });

    let miss = RawHandle::from_ptr(0x7 as *mut mosquitto).unwrap();
    c.bench_function("registry_lookup_miss", |b| {
        b.iter(|| registry.lookup(black_box(miss)))
    });
}

fn benchmark_trampoline_dispatch(c: &mut Criterion) {
    let library = Library::init(LoopbackEngine::new()).unwrap();
    let client = Client::new(&library, Some("bench"), true).unwrap();
    client.on_publish(|mid| {
        black_box(mid);
    });
    let handle = client.handle();

    c.bench_function("trampoline_publish_dispatch", |b| {
        // SAFETY: trampolines never dereference the handle
        b.iter(|| unsafe { trampolines::on_publish(handle.as_ptr(), std::ptr::null_mut(), 1) })
    });

    c.bench_function("trampoline_publish_dispatch_contended", |b| {
        b.iter(|| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    thread::spawn(move || {
                        for mid in 0..256 {
                            // SAFETY: as above
                            unsafe {
                                trampolines::on_publish(handle.as_ptr(), std::ptr::null_mut(), mid)
                            };
                        }
                    })
                })
                .collect();
            for worker in workers {
                let _ = worker.join();
            }
        })
    });
}

criterion_group!(benches, benchmark_registry_lookup, benchmark_trampoline_dispatch);
criterion_main!(benches);
