//! Engine pool checkout/checkin under concurrency

use heron_runtime::prelude::*;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn pool(max: usize) -> EnginePool {
    EnginePool::new(
        PoolConfig::new()
            .max_size(max)
            .wait_timeout(Duration::from_secs(5))
            .sweep_interval(Duration::from_secs(60)),
    )
    .unwrap()
}

#[test]
fn test_no_runtime_is_shared_concurrently() {
    let pool = Arc::new(pool(2));
    let in_use = Arc::new(Mutex::new(HashSet::new()));

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            let in_use = Arc::clone(&in_use);
            thread::spawn(move || {
                for round in 0..5 {
                    let engine = pool.get_engine().unwrap();
                    assert!(in_use.lock().insert(engine.id()), "runtime handed out twice");
                    engine.global().set("worker", worker as i64).unwrap();
                    assert!(engine.execute_bool("typeof previous === 'undefined'").unwrap());
                    engine.execute_void("var previous = worker").unwrap();
                    assert_eq!(engine.execute_i64("previous").unwrap(), worker as i64);
                    thread::sleep(Duration::from_millis(2 + round));
                    in_use.lock().remove(&engine.id());
                    engine.release().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let stats = pool.stats().snapshot();
    assert!(stats.created <= 2);
    assert_eq!(stats.checkouts, 20);
    assert_eq!(stats.checkins, 20);
    assert_eq!(stats.outstanding(), 0);
    assert_eq!(pool.active_count(), 0);
}

#[test]
fn test_bindings_do_not_leak_between_checkouts() {
    let pool = pool(1);
    let engine = pool.get_engine().unwrap();
    let map = HostMap::new();
    engine.global().set("cache", map).unwrap();
    engine.execute_void("cache.put('k', 1); let scratch = 2").unwrap();
    assert_eq!(engine.binding_count(), 1);
    engine.release().unwrap();

    let engine = pool.get_engine().unwrap();
    assert_eq!(engine.binding_count(), 0);
    assert!(!engine.global().has("cache").unwrap());
    assert!(engine.execute_bool("typeof scratch === 'undefined'").unwrap());
    engine.release().unwrap();
}

#[test]
fn test_waiting_checkout_gets_released_engine() {
    let pool = Arc::new(pool(1));
    let engine = pool.get_engine().unwrap();
    let first = engine.id();

    let waiting = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let engine = pool.get_engine().unwrap();
            let id = engine.id();
            engine.release().unwrap();
            id
        })
    };
    thread::sleep(Duration::from_millis(30));
    engine.release().unwrap();
    assert_eq!(waiting.join().unwrap(), first);
}

#[test]
fn test_background_sweeper_disposes_idle_engines() {
    let pool = EnginePool::new(
        PoolConfig::new()
            .max_size(2)
            .idle_timeout(Duration::from_millis(20))
            .sweep_interval(Duration::from_millis(10)),
    )
    .unwrap();
    let a = pool.get_engine().unwrap();
    let b = pool.get_engine().unwrap();
    a.release().unwrap();
    b.release().unwrap();
    assert_eq!(pool.size(), 2);

    let mut remaining = pool.size();
    for _ in 0..100 {
        remaining = pool.size();
        if remaining == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(remaining, 0);
    assert_eq!(pool.stats().snapshot().disposed, 2);
}

#[test]
fn test_close_fails_waiting_checkouts() {
    let pool = Arc::new(pool(1));
    let engine = pool.get_engine().unwrap();
    let waiting = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.get_engine().map(|engine| engine.release()))
    };
    thread::sleep(Duration::from_millis(30));
    pool.close();
    assert!(matches!(waiting.join().unwrap(), Err(HeronError::PoolClosed)));
    assert!(engine.is_closed());
    engine.release().unwrap();
}

#[test]
fn test_pool_config_from_json() {
    let config = PoolConfig::from_json(r#"{ "maxSize": 3, "waitTimeout": 250 }"#).unwrap();
    assert_eq!(config.max_size, 3);
    assert_eq!(config.wait_timeout, Duration::from_millis(250));
    assert!(PoolConfig::from_json(r#"{ "maxSize": 0 }"#).is_err());
    assert!(EnginePool::new(PoolConfig::new().min_size(5).max_size(2)).is_err());
}
