/// Concurrent access integration tests
///
/// These tests verify that the registry behaves correctly when many threads
/// race on first use: factories run once, every thread sees the same
/// instance, and unrelated keys never wait on each other.
use crossbeam_utils::thread;
use service_registry::{DiError, Resolver, ServiceRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

// ===== Test Services =====

#[derive(Debug)]
pub struct ExpensiveService {
    created_by: String,
}

#[derive(Debug)]
pub struct SharedResource {
    data: Mutex<Vec<String>>,
}

impl SharedResource {
    pub fn add(&self, item: String) {
        self.data.lock().unwrap().push(item);
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }
}

// ===== Tests =====

#[test]
fn test_concurrent_first_use_runs_factory_once() {
    const THREADS: usize = 16;

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let registry = ServiceRegistry::named("global");
    registry
        .add_factory::<ExpensiveService, _>(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(ExpensiveService {
                created_by: format!("{:?}", std::thread::current().id()),
            })
        })
        .unwrap();

    let barrier = Barrier::new(THREADS);
    let results: Vec<Arc<ExpensiveService>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    registry.get_required::<ExpensiveService>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let first = &results[0];
    assert!(!first.created_by.is_empty());
    for r in &results {
        assert!(Arc::ptr_eq(first, r));
    }
}

#[test]
fn test_concurrent_failure_is_shared() {
    const THREADS: usize = 8;

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let registry = ServiceRegistry::new();
    registry
        .add_factory::<u64, _>(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(10));
            Err(DiError::msg("backend offline"))
        })
        .unwrap();

    let barrier = Barrier::new(THREADS);
    let errors: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    registry.get::<u64>().unwrap_err().to_string()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(errors.iter().all(|e| e.contains("backend offline")));
}

#[test]
fn test_unrelated_keys_do_not_block_each_other() {
    let registry = ServiceRegistry::new();
    let slow_started = Arc::new(Barrier::new(2));
    let release_slow = Arc::new(Barrier::new(2));

    let started = slow_started.clone();
    let release = release_slow.clone();
    registry
        .add_factory::<String, _>(move |_| {
            started.wait();
            // Stays in the factory until the other thread resolved its key
            release.wait();
            Ok("slow".to_string())
        })
        .unwrap();
    registry.add_factory::<u32, _>(|_| Ok(7)).unwrap();

    thread::scope(|s| {
        let slow = s.spawn(|_| registry.get_required::<String>());

        slow_started.wait();
        // The String cell is Creating; u32 must still resolve
        assert_eq!(*registry.get_required::<u32>(), 7);
        release_slow.wait();

        assert_eq!(*slow.join().unwrap(), "slow");
    })
    .unwrap();
}

#[test]
fn test_shared_singleton_mutation_is_visible() {
    const THREADS: usize = 10;
    const ITEMS: usize = 50;

    let registry = ServiceRegistry::new();
    registry
        .add_factory::<SharedResource, _>(|_| {
            Ok(SharedResource {
                data: Mutex::new(Vec::new()),
            })
        })
        .unwrap();

    thread::scope(|s| {
        for t in 0..THREADS {
            let registry = &registry;
            s.spawn(move |_| {
                let resource = registry.get_required::<SharedResource>();
                for i in 0..ITEMS {
                    resource.add(format!("{}-{}", t, i));
                }
            });
        }
    })
    .unwrap();

    assert_eq!(registry.get_required::<SharedResource>().len(), THREADS * ITEMS);
}

#[test]
fn test_concurrent_child_scopes_share_parent_singletons() {
    const THREADS: usize = 8;

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let root = ServiceRegistry::named("root");
    root.add_factory::<ExpensiveService, _>(move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        Ok(ExpensiveService {
            created_by: "root".to_string(),
        })
    })
    .unwrap();

    let instances: Vec<Arc<ExpensiveService>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let root = &root;
                s.spawn(move |_| {
                    let child = root.create_child(format!("worker-{}", i));
                    child.add_instance(i).unwrap();
                    assert_eq!(*child.get_required::<usize>(), i);
                    let service = child.get_required::<ExpensiveService>();
                    child.close().unwrap();
                    service
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|s| Arc::ptr_eq(s, &instances[0])));
    assert!(!root.is_closed());
}

#[test]
fn test_concurrent_registration_and_resolution() {
    const THREADS: usize = 4;

    let registry = ServiceRegistry::new();
    registry.add_instance("base".to_string()).unwrap();

    thread::scope(|s| {
        for i in 0..THREADS {
            let registry = &registry;
            s.spawn(move |_| match i {
                0 => registry.add_instance(1u8).map(|_| ()).unwrap(),
                1 => registry.add_instance(2u16).map(|_| ()).unwrap(),
                2 => registry.add_instance(3u32).map(|_| ()).unwrap(),
                _ => assert_eq!(*registry.get_required::<String>(), "base"),
            });
        }
    })
    .unwrap();

    assert_eq!(*registry.get_required::<u8>(), 1);
    assert_eq!(*registry.get_required::<u16>(), 2);
    assert_eq!(*registry.get_required::<u32>(), 3);
}
