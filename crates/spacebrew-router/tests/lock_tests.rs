//! Concurrency tests
//!
//! Tests for:
//! - Concurrent add/delete of the same publisher from many threads
//! - Dispatching while the table is being mutated
//! - File contents matching memory once all writers are done

use bytes::Bytes;
use spacebrew_router::routes::parse_routes;
use spacebrew_test_utils::{RecordingTransport, TempRoutes};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_add_delete_same_key() {
    let routes = TempRoutes::with_contents("");
    let router = routes.router();
    let table = router.routes().clone();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let table = table.clone();
            thread::spawn(move || {
                for n in 0..50 {
                    if (i + n) % 2 == 0 {
                        let _ = table.add_route("shared/pub", &format!("sub/{}", i));
                    } else {
                        let _ = table.delete_route("shared/pub");
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let (on_disk, skipped) = parse_routes(&routes.read());
    assert_eq!(skipped, 0);
    assert_eq!(on_disk, table.list());
}

#[test]
fn test_concurrent_distinct_keys_all_persisted() {
    let routes = TempRoutes::with_contents("");
    let router = routes.router();
    let table = router.routes().clone();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let table = table.clone();
            thread::spawn(move || {
                for n in 0..25 {
                    table
                        .add_route(&format!("pub/{}/{}", i, n), &format!("sub/{}", n))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(table.len(), 100);
    let (on_disk, _) = parse_routes(&routes.read());
    assert_eq!(on_disk, table.list());
}

#[test]
fn test_dispatch_during_mutation() {
    let routes = TempRoutes::with_contents("hot/pub,hot/sub\n");
    let router = routes.router();
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = Arc::new(router.dispatcher(transport.clone()));
    let table = router.routes().clone();

    let writer = {
        let table = table.clone();
        thread::spawn(move || {
            for n in 0..100 {
                table.add_route("hot/pub", &format!("hot/sub{}", n % 3)).unwrap();
            }
        })
    };
    let reader = {
        let dispatcher = dispatcher.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                dispatcher.dispatch("hot/pub", Bytes::from_static(b"1"));
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();

    // the route always exists, so every dispatch publishes once
    assert_eq!(transport.count(), 200);
    assert!(transport
        .published()
        .iter()
        .all(|p| p.topic.starts_with("hot/sub")));
}
