use crate::{
    DecodeError, Dispatcher, Error, ImageHeader, ImageLoader, ImageSize, InfoRequest, InfoResult,
    PixelFormat, PoolConfig, Proxy, ProxyThumbnailPolicy, ThumbnailMode,
};
use crossbeam_channel::{Receiver, Sender};
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::scope;
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Answers every path with a 64x48 header tagged with the handling thread.
struct ThreadTagLoader;

impl ImageLoader for ThreadTagLoader {
    fn open_header(&self, path: &Path) -> Result<ImageHeader, DecodeError> {
        let thread = std::thread::current().name().unwrap_or_default().to_owned();
        Ok(ImageHeader::new(path, ImageSize::new(64, 48), PixelFormat::Rgb8).with_tag("thread", thread))
    }
}

/// Records the order in which each thread sees paths.
#[derive(Default)]
struct OrderLoader {
    seen: Mutex<Vec<(String, PathBuf)>>,
}

impl ImageLoader for OrderLoader {
    fn open_header(&self, path: &Path) -> Result<ImageHeader, DecodeError> {
        let thread = std::thread::current().name().unwrap_or_default().to_owned();
        self.seen.lock().unwrap().push((thread, path.to_path_buf()));
        Ok(ImageHeader::new(path, ImageSize::new(1, 1), PixelFormat::L8))
    }
}

/// Blocks on paths starting with `block` until the test releases them.
struct GateLoader {
    entered: Sender<PathBuf>,
    release: Receiver<()>,
}

impl ImageLoader for GateLoader {
    fn open_header(&self, path: &Path) -> Result<ImageHeader, DecodeError> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.starts_with("block") {
            self.entered.send(path.to_path_buf()).unwrap();
            self.release.recv().unwrap();
        }
        if name.starts_with("panic") {
            panic!("loader exploded on {name}");
        }
        Ok(ImageHeader::new(path, ImageSize::new(8, 8), PixelFormat::L8))
    }
}

struct Gate {
    entered: Receiver<PathBuf>,
    release: Sender<()>,
}

fn gated_pool(config: PoolConfig) -> (Dispatcher, Gate) {
    let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::unbounded();
    let loader = GateLoader {
        entered: entered_tx,
        release: release_rx,
    };
    let dispatcher = Dispatcher::new(config, loader, ProxyThumbnailPolicy).unwrap();
    let gate = Gate {
        entered: entered_rx,
        release: release_tx,
    };
    (dispatcher, gate)
}

/// Unblocks `count` gated decodes from another thread, but only after the
/// dispatcher has started shutting down.
fn release_once_shut_down(dispatcher: &Dispatcher, gate: &Gate, count: usize) {
    let token = dispatcher.shutdown_token();
    let release = gate.release.clone();
    std::thread::spawn(move || {
        while !token.load(Ordering::Acquire) {
            std::thread::yield_now();
        }
        for _ in 0..count {
            release.send(()).unwrap();
        }
    });
}

fn collect(dispatcher: &Dispatcher, count: usize) -> Vec<InfoResult> {
    (0..count)
        .map(|_| dispatcher.results().recv_timeout(RECV_TIMEOUT).unwrap())
        .collect()
}

fn wait_until_settled(dispatcher: &Dispatcher, settled: u64) {
    let deadline = std::time::Instant::now() + RECV_TIMEOUT;
    while dispatcher.stats().settled() < settled {
        assert!(std::time::Instant::now() < deadline, "pool never settled");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::File::create(&path).unwrap().write_all(bytes).unwrap();
    path
}

fn ppm(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = format!("P6\n{width} {height}\n255\n").into_bytes();
    bytes.resize(bytes.len() + (width * height * 3) as usize, 0);
    bytes
}

#[test]
fn next_worker_index_cycles_through_the_pool() {
    let dispatcher = Dispatcher::new(
        PoolConfig::default().with_num_workers(3),
        ThreadTagLoader,
        ProxyThumbnailPolicy,
    )
    .unwrap();

    let indices: Vec<usize> = (0..7).map(|_| dispatcher.next_worker_index()).collect();
    assert_eq!(indices, [0, 1, 2, 0, 1, 2, 0]);
}

#[test]
fn worker_cursor_never_leaves_the_pool_range() {
    let dispatcher = Dispatcher::new(
        PoolConfig::default().with_num_workers(12),
        ThreadTagLoader,
        ProxyThumbnailPolicy,
    )
    .unwrap();

    for call in 0..10_000 {
        assert_eq!(dispatcher.next_worker_index(), call % 12);
        assert!(dispatcher.worker_cursor() < 12);
    }
}

#[test]
fn requests_are_routed_round_robin() {
    let dispatcher =
        Dispatcher::new(PoolConfig::default(), ThreadTagLoader, ProxyThumbnailPolicy).unwrap();
    assert_eq!(dispatcher.num_workers(), 12);

    for row in 0..24 {
        dispatcher
            .request(InfoRequest::new(format!("{row}.exr"), row, 0))
            .unwrap();
    }

    let threads: HashMap<usize, String> = collect(&dispatcher, 24)
        .into_iter()
        .map(|r| {
            let thread = r.metadata.unwrap().tag("thread").unwrap().to_owned();
            (r.row, thread)
        })
        .collect();

    for i in 0..12 {
        assert_eq!(threads[&i], threads[&(i + 12)], "row {i}");
        assert_eq!(threads[&i], format!("thumbpool-worker-{i}"));
    }
    for i in 0..23 {
        assert_ne!(threads[&i], threads[&(i + 1)], "row {i}");
    }
}

#[test]
fn same_worker_requests_are_processed_in_order() {
    let loader = Arc::new(OrderLoader::default());
    let dispatcher = Dispatcher::new(
        PoolConfig::default().with_num_workers(3).with_queue_depth(2),
        Arc::clone(&loader),
        ProxyThumbnailPolicy,
    )
    .unwrap();

    for row in 0..60 {
        dispatcher
            .request(InfoRequest::new(format!("{row}"), row, 0))
            .unwrap();
    }
    collect(&dispatcher, 60);

    let seen = loader.seen.lock().unwrap();
    let mut per_thread: HashMap<&str, Vec<usize>> = HashMap::new();
    for (thread, path) in seen.iter() {
        let row: usize = path.to_str().unwrap().parse().unwrap();
        per_thread.entry(thread.as_str()).or_default().push(row);
    }

    assert_eq!(per_thread.len(), 3);
    for rows in per_thread.values() {
        assert_eq!(rows.len(), 20);
        assert!(rows.windows(2).all(|w| w[0] < w[1]), "{rows:?}");
        assert!(rows.iter().all(|r| r % 3 == rows[0] % 3));
    }
}

#[test]
fn results_carry_the_request_correlation_fields() {
    let mut dispatcher = Dispatcher::new(
        PoolConfig::default().with_num_workers(2),
        ThreadTagLoader,
        ProxyThumbnailPolicy,
    )
    .unwrap();
    dispatcher.set_generation_id(u64::MAX);

    dispatcher
        .request(InfoRequest::new("edge.exr", usize::MAX, u64::MAX).with_thumbnail(ThumbnailMode::High, 32))
        .unwrap();

    let result = dispatcher.results().recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(result.row, usize::MAX);
    assert_eq!(result.generation_id, u64::MAX);
    assert!(result.is_success());
    assert_eq!(result.thumbnail.unwrap().dimensions(), (32, 24));
    assert_eq!(result.proxy, Proxy::None);

    dispatcher.shutdown().unwrap();
}

#[test]
fn stale_generation_requests_are_dropped_at_pickup() {
    let config = PoolConfig::default().with_num_workers(1).with_queue_depth(8);
    let (dispatcher, gate) = gated_pool(config);
    dispatcher.set_generation_id(1);

    // Occupy the only worker so everything below queues up behind it.
    dispatcher.request(InfoRequest::new("block", 0, 1)).unwrap();
    gate.entered.recv_timeout(RECV_TIMEOUT).unwrap();

    for row in 1..=3 {
        dispatcher.request(InfoRequest::new("old", row, 1)).unwrap();
    }
    dispatcher.set_generation_id(2);
    assert_eq!(dispatcher.generation_id_of(0), Some(2));
    for row in 4..=5 {
        dispatcher.request(InfoRequest::new("new", row, 2)).unwrap();
    }

    gate.release.send(()).unwrap();
    wait_until_settled(&dispatcher, 6);

    let mut rows: Vec<(usize, u64)> = dispatcher
        .results()
        .try_iter()
        .map(|r| (r.row, r.generation_id))
        .collect();
    rows.sort_unstable();

    // The blocked request passed its check before the bump, so it completes.
    assert_eq!(rows, [(0, 1), (4, 2), (5, 2)]);
    let stats = dispatcher.stats();
    assert_eq!(stats.stale, 3);
    assert_eq!(stats.completed, 3);
}

#[test]
fn decode_failure_yields_one_empty_result_and_the_worker_keeps_going() {
    let dir = tempfile::tempdir().unwrap();
    let corrupt = write_file(&dir, "corrupt.ppm", b"not a netpbm file");
    let valid = write_file(&dir, "valid.ppm", &ppm(400, 300));

    let dispatcher = Dispatcher::with_defaults(PoolConfig::default().with_num_workers(1)).unwrap();
    dispatcher.set_generation_id(9);
    dispatcher.request(InfoRequest::new(&corrupt, 3, 9)).unwrap();
    dispatcher
        .request(InfoRequest::new(&valid, 4, 9).with_thumbnail(ThumbnailMode::Low, 100))
        .unwrap();

    let results = collect(&dispatcher, 2);
    let failed = &results[0];
    assert_eq!((failed.row, failed.generation_id), (3, 9));
    assert!(failed.metadata.is_none());
    assert!(failed.thumbnail.is_none());
    assert!(matches!(
        failed.error,
        Some(DecodeError::Unrecognized { ref path }) if *path == corrupt
    ));

    let ok = &results[1];
    assert_eq!((ok.row, ok.generation_id), (4, 9));
    let header = ok.metadata.as_ref().unwrap();
    assert_eq!(header.size, ImageSize::new(400, 300));
    assert_eq!(ok.thumbnail.as_ref().unwrap().dimensions(), (100, 75));
    assert_eq!(ok.proxy, Proxy::Half);
    assert!(ok.error.is_none());

    // Exactly one result per request.
    assert!(dispatcher.results().try_recv().is_err());
}

#[test]
fn loader_panic_stays_inside_the_request() {
    let (dispatcher, _gate) = gated_pool(PoolConfig::default().with_num_workers(1));

    dispatcher.request(InfoRequest::new("panic.exr", 0, 0)).unwrap();
    dispatcher.request(InfoRequest::new("fine.exr", 1, 0)).unwrap();

    let results = collect(&dispatcher, 2);
    match &results[0].error {
        Some(DecodeError::Panicked { message, .. }) => {
            assert!(message.contains("loader exploded"), "{message}");
        }
        other => panic!("expected a panic failure, got {other:?}"),
    }
    assert!(results[1].is_success());
    assert_eq!(dispatcher.stats().failed, 1);
}

#[test]
fn shutdown_discards_queued_requests_and_joins_every_worker() {
    let config = PoolConfig::default().with_num_workers(2).with_queue_depth(8);
    let (mut dispatcher, gate) = gated_pool(config);
    let results = dispatcher.results().clone();

    dispatcher.request(InfoRequest::new("block-a", 0, 0)).unwrap();
    dispatcher.request(InfoRequest::new("block-b", 1, 0)).unwrap();
    gate.entered.recv_timeout(RECV_TIMEOUT).unwrap();
    gate.entered.recv_timeout(RECV_TIMEOUT).unwrap();

    for row in 2..8 {
        dispatcher.request(InfoRequest::new("queued", row, 0)).unwrap();
    }

    release_once_shut_down(&dispatcher, &gate, 2);
    dispatcher.shutdown().unwrap();

    let stats = dispatcher.stats();
    assert_eq!(stats.discarded, 6);
    assert_eq!(stats.completed, 2);

    // The channel disconnects only after every worker thread has exited.
    let mut rows: Vec<usize> = results.iter().map(|r| r.row).collect();
    rows.sort_unstable();
    assert_eq!(rows, [0, 1]);

    assert_eq!(dispatcher.generation_id_of(0), None);
    assert!(matches!(
        dispatcher.request(InfoRequest::new("late", 9, 0)),
        Err(Error::ServiceShutdown)
    ));
    assert!(dispatcher.shutdown().is_ok());
}

#[test]
fn dropping_the_dispatcher_stops_its_threads() {
    let dispatcher = Dispatcher::new(
        PoolConfig::default().with_num_workers(4),
        ThreadTagLoader,
        ProxyThumbnailPolicy,
    )
    .unwrap();
    let results = dispatcher.results().clone();
    for row in 0..4 {
        dispatcher.request(InfoRequest::new("x.exr", row, 0)).unwrap();
    }
    drop(dispatcher);

    // Whatever finished before the drop is still readable; then it disconnects.
    assert!(results.iter().count() <= 4);
    assert!(results.recv().is_err());
}

#[test]
fn unwinding_past_the_dispatcher_joins_every_worker() {
    let config = PoolConfig::default().with_num_workers(2).with_queue_depth(8);
    let (dispatcher, gate) = gated_pool(config);
    let results = dispatcher.results().clone();

    dispatcher.request(InfoRequest::new("block-a", 0, 0)).unwrap();
    dispatcher.request(InfoRequest::new("block-b", 1, 0)).unwrap();
    gate.entered.recv_timeout(RECV_TIMEOUT).unwrap();
    gate.entered.recv_timeout(RECV_TIMEOUT).unwrap();
    for row in 2..6 {
        dispatcher.request(InfoRequest::new("queued", row, 0)).unwrap();
    }
    release_once_shut_down(&dispatcher, &gate, 2);

    let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
        let _dispatcher = dispatcher;
        panic!("caller failed while the pool was busy");
    }));
    assert!(outcome.is_err());

    // In-flight decodes still report; queued ones are discarded.
    let mut rows: Vec<usize> = results.iter().map(|r| r.row).collect();
    rows.sort_unstable();
    assert_eq!(rows, [0, 1]);
    // Disconnected: every worker's result sender is gone.
    assert!(results.recv().is_err());
}

#[test]
fn failed_spawn_tears_down_the_workers_already_started() {
    let loader = Arc::new(ThreadTagLoader);
    let mut spawned = Vec::new();

    let result = Dispatcher::start(
        PoolConfig::default().with_num_workers(4),
        Arc::clone(&loader),
        ProxyThumbnailPolicy,
        &mut |index, builder, body| {
            if index == 2 {
                return Err(io::Error::other("thread limit reached"));
            }
            spawned.push(index);
            builder.spawn(body)
        },
    );

    match result {
        Err(Error::WorkerSpawn { index, source }) => {
            assert_eq!(index, 2);
            assert_eq!(source.to_string(), "thread limit reached");
        }
        other => panic!("expected a spawn failure, got {other:?}"),
    }
    assert_eq!(spawned, [0, 1]);
    // Workers 0 and 1 were joined and the unstarted body was dropped, so
    // nothing else holds the loader.
    assert_eq!(Arc::strong_count(&loader), 1);
}

#[test]
fn snapshots_never_settle_more_than_was_requested() {
    const REQUESTS: usize = 2_000;

    let dispatcher = Dispatcher::new(
        PoolConfig::default().with_num_workers(4),
        ThreadTagLoader,
        ProxyThumbnailPolicy,
    )
    .unwrap();
    let done = AtomicBool::new(false);

    scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                let stats = dispatcher.stats();
                assert!(stats.settled() <= stats.requested, "{stats:?}");
            }
        });
        for row in 0..REQUESTS {
            dispatcher.request(InfoRequest::new("x.exr", row, 0)).unwrap();
        }
        collect(&dispatcher, REQUESTS);
        wait_until_settled(&dispatcher, REQUESTS as u64);
        done.store(true, Ordering::Release);
    });

    let stats = dispatcher.stats();
    assert_eq!(stats.requested, REQUESTS as u64);
    assert_eq!(stats.completed, REQUESTS as u64);
}

#[test]
fn concurrent_generation_updates_leave_an_issued_value() {
    let dispatcher = Dispatcher::new(
        PoolConfig::default().with_num_workers(4),
        ThreadTagLoader,
        ProxyThumbnailPolicy,
    )
    .unwrap();

    let issued: HashSet<u64> = (1..=8_u64).map(|t| (t << 40) | t).collect();
    scope(|s| {
        for &value in &issued {
            let dispatcher = &dispatcher;
            s.spawn(move || {
                for _ in 0..1_000 {
                    dispatcher.set_generation_id(value);
                }
            });
        }
    });

    for worker in 0..dispatcher.num_workers() {
        let current = dispatcher.generation_id_of(worker).unwrap();
        assert!(issued.contains(&current), "worker {worker} holds {current:#x}");
    }
}

#[test]
fn invalid_config_fails_construction() {
    let result = Dispatcher::new(
        PoolConfig::default().with_num_workers(0),
        ThreadTagLoader,
        ProxyThumbnailPolicy,
    );
    assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}
