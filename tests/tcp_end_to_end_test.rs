//! Camera streamer → real TCP loopback → collector

use camstream::camera::TestPatternCamera;
use camstream::config::{CameraConfig, FrameSize};
use camstream::connection::ConnectionManager;
use camstream::streamer::{CycleOutcome, FrameStreamer, StreamerConfig, SystemClock};
use camstream::transport::{Endpoint, TcpTransport};
use camstream::Collector;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;

fn streamer_config() -> StreamerConfig {
    StreamerConfig {
        pacing_interval: Duration::from_millis(5),
        retry_delay: Duration::from_millis(10),
        stats_interval_frames: 0,
    }
}

fn transport() -> TcpTransport {
    TcpTransport::new(Duration::from_secs(1), Duration::from_secs(1))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_frames_arrive_intact() {
    let collector = Collector::bind("127.0.0.1:0", 1024 * 1024).await.unwrap();
    let addr = collector.local_addr().unwrap();
    let (tx, mut rx) = mpsc::channel(32);
    tokio::spawn(collector.run(tx));

    const FRAMES: usize = 8;

    let sender = tokio::task::spawn_blocking(move || {
        let camera_config = CameraConfig {
            frame_size: FrameSize::Qvga,
            ..Default::default()
        };
        let connection = ConnectionManager::new(
            transport(),
            Endpoint::new(addr.ip().to_string(), addr.port()),
        );
        let mut streamer = FrameStreamer::new(
            connection,
            TestPatternCamera::new(&camera_config),
            SystemClock,
            streamer_config(),
        );

        let started = Instant::now();
        let outcomes: Vec<CycleOutcome> = (0..FRAMES).map(|_| streamer.run_cycle()).collect();
        (outcomes, started.elapsed(), streamer.stats().clone())
    });

    let (outcomes, elapsed, stats) = sender.await.unwrap();
    assert!(outcomes.iter().all(|o| matches!(o, CycleOutcome::Sent { .. })));
    assert_eq!(stats.frames_sent, FRAMES as u64);
    assert!(elapsed >= Duration::from_millis(5) * FRAMES as u32);

    let mut previous: Option<Vec<u8>> = None;
    for seq in 0..FRAMES as u64 {
        let frame = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("frame not received in time")
            .unwrap();

        assert_eq!(frame.seq, seq);
        assert!(frame.valid_jpeg);
        assert_eq!(frame.dimensions, Some((320, 240)));

        if let Some(prev) = &previous {
            assert_eq!(prev.len(), frame.payload.len());
            assert_ne!(&prev[..], &frame.payload[..]);
        }
        previous = Some(frame.payload.to_vec());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_collector_reports_connect_failure() {
    // Grab a free port, then close it so nothing is listening
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let result = tokio::task::spawn_blocking(move || {
        let connection =
            ConnectionManager::new(transport(), Endpoint::new("127.0.0.1", port));
        let mut streamer = FrameStreamer::new(
            connection,
            TestPatternCamera::new(&CameraConfig::default()),
            SystemClock,
            streamer_config(),
        );

        let outcomes = [streamer.run_cycle(), streamer.run_cycle()];
        (outcomes, streamer.stats().clone())
    })
    .await
    .unwrap();

    let (outcomes, stats) = result;
    assert_eq!(outcomes, [CycleOutcome::ConnectFailed, CycleOutcome::ConnectFailed]);
    assert_eq!(stats.connect_failures, 2);
    assert_eq!(stats.frames_sent, 0);
}
