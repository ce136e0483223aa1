//! # Integration Tests
//!
//! End-to-end tests wiring the simulated devices through the real
//! pipeline: orchestrated lifecycle, capture-to-CSV flow, overflow
//! behavior under a stalled consumer, cooperative shutdown, and
//! offline verification of synthesized session trees.

#[cfg(test)]
mod lifecycle_tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use contracts::{DeviceManager, RecorderConfig};
    use devices::{MockBagProbe, MockGazeSource, MockRgbdSource};
    use managers::{GazeManager, RgbdManager};
    use orchestrator::Orchestrator;

    fn config_at(root: &std::path::Path, record_duration: u64) -> RecorderConfig {
        RecorderConfig {
            output_path: root.to_path_buf(),
            verified_path: root.join("verified"),
            calibration_path: None,
            record_duration,
        }
    }

    /// Happy path: one 60 Hz device recorded for ~2 s produces a
    /// plausible row count, `is_running` is observed promptly, and
    /// stop+cleanup finish within the teardown budget.
    #[tokio::test]
    async fn test_happy_path_single_device() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path(), 2);

        let manager = Arc::new(GazeManager::new(
            config.clone(),
            Arc::new(MockGazeSource::with_defaults("gaze")),
        ));

        let mut orchestrator = Orchestrator::new();
        orchestrator.set_timeout(Duration::from_secs(10));
        orchestrator.register(manager.clone()).unwrap();

        assert!(orchestrator.execute_setup().await);
        assert!(orchestrator.execute_warmup().await);

        let start_instant = Instant::now();
        assert!(orchestrator.execute_start().await);
        assert!(manager.phases().is_running());
        assert!(start_instant.elapsed() < Duration::from_secs(3));

        tokio::time::sleep(Duration::from_secs(2)).await;

        let teardown_instant = Instant::now();
        orchestrator.execute_stop().await;
        orchestrator.execute_cleanup();
        assert!(teardown_instant.elapsed() < Duration::from_secs(2));

        let csv = std::fs::read_to_string(dir.path().join("gaze/gaze_data.csv")).unwrap();
        let rows = csv.lines().count() - 1;
        assert!(
            (60..=140).contains(&rows),
            "expected ~120 rows for 2s at 60Hz, got {rows}"
        );

        // index column: 0, 1, 2, ... strictly increasing, gap-free.
        for (i, line) in csv.lines().skip(1).enumerate() {
            assert!(line.starts_with(&format!("{i},")), "row {i} mismatched: {line}");
        }
    }

    /// Warmup timeout: a device whose first frame never arrives fails
    /// the warmup barrier, sets the abort flag, and stop+cleanup still
    /// reach every manager.
    #[tokio::test]
    async fn test_warmup_timeout_aborts_but_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path(), 2);

        let silent = Arc::new(
            GazeManager::new(config.clone(), Arc::new(MockGazeSource::silent("gaze")))
                .with_warmup_timeout(Duration::from_millis(300)),
        );
        let healthy = Arc::new(
            RgbdManager::new(
                config.clone(),
                Arc::new(MockRgbdSource::with_defaults("rgbd")),
                Arc::new(MockBagProbe),
            )
            .without_preview(),
        );

        let mut orchestrator = Orchestrator::new();
        orchestrator.set_timeout(Duration::from_secs(5));
        orchestrator.register(silent.clone()).unwrap();
        orchestrator.register(healthy.clone()).unwrap();

        assert!(orchestrator.execute_setup().await);
        assert!(!orchestrator.execute_warmup().await);
        assert!(orchestrator.is_aborted());

        // Subsequent stages are gated off.
        assert!(!orchestrator.execute_start().await);
        assert!(!silent.phases().is_running());

        // Mandatory teardown still runs for both managers.
        orchestrator.execute_stop().await;
        orchestrator.execute_cleanup();
        assert!(!healthy.phases().is_running());
    }

    /// Cooperative shutdown mid-record: stop arrives while frames are
    /// flowing; every written row is complete and teardown is quick.
    #[tokio::test]
    async fn test_mid_record_stop_leaves_complete_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path(), 60);

        let manager = Arc::new(
            RgbdManager::new(
                config.clone(),
                Arc::new(MockRgbdSource::with_defaults("rgbd")),
                Arc::new(MockBagProbe),
            )
            .without_preview(),
        );

        let mut orchestrator = Orchestrator::new();
        orchestrator.set_timeout(Duration::from_secs(10));
        orchestrator.register(manager.clone()).unwrap();

        assert!(orchestrator.execute_setup().await);
        assert!(orchestrator.execute_warmup().await);
        assert!(orchestrator.execute_start().await);

        tokio::time::sleep(Duration::from_millis(500)).await;

        let teardown_instant = Instant::now();
        orchestrator.execute_stop().await;
        orchestrator.execute_cleanup();
        assert!(teardown_instant.elapsed() < Duration::from_secs(2));

        let csv = std::fs::read_to_string(dir.path().join("rgbd/rgbd_data.csv")).unwrap();
        assert!(csv.ends_with('\n'), "csv must end on a complete row");
        for line in csv.lines().skip(1) {
            assert_eq!(line.split(',').count(), 5, "partial row: {line}");
        }
    }

    /// Both devices through the full lifecycle, then the flat check.
    #[tokio::test]
    async fn test_two_device_record_then_check() {
        let dir = tempfile::tempdir().unwrap();
        // Duration floor of 1 s keeps the check bound reachable for a
        // ~1.5 s capture window.
        let config = config_at(dir.path(), 1);

        let rgbd = Arc::new(
            RgbdManager::new(
                config.clone(),
                Arc::new(MockRgbdSource::with_defaults("rgbd")),
                Arc::new(MockBagProbe),
            )
            .without_preview(),
        );
        let gaze = Arc::new(GazeManager::new(
            config.clone(),
            Arc::new(MockGazeSource::with_defaults("gaze")),
        ));

        let mut orchestrator = Orchestrator::new();
        orchestrator.set_timeout(Duration::from_secs(10));
        orchestrator.register(rgbd).unwrap();
        orchestrator.register(gaze).unwrap();

        assert!(orchestrator.execute_setup().await);
        assert!(orchestrator.execute_warmup().await);
        assert!(orchestrator.execute_start().await);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        orchestrator.execute_stop().await;
        orchestrator.execute_cleanup();

        assert!(orchestrator.execute_check());
        assert!(dir.path().join("gaze/gaze_data.csv").exists());
        assert!(dir.path().join("rgbd/rgbd_data.csv").exists());
    }
}

#[cfg(test)]
mod overflow_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use brokers::{BrokerWorker, RecordProcessor};
    use ring_buffer::SpscRing;

    struct StalledProcessor {
        processed: Arc<AtomicU64>,
        delay: Duration,
    }

    impl RecordProcessor<u64> for StalledProcessor {
        fn process(&mut self, _record: u64) {
            thread::sleep(self.delay);
            self.processed.fetch_add(1, Ordering::Relaxed);
        }

        fn flush(&mut self) {}
    }

    /// Overflow under a stalled consumer: the ring never grows past
    /// its capacity, the overflow hook fires for every rejected frame,
    /// and the processed count equals the successful enqueues.
    #[test]
    fn test_overflow_under_stalled_consumer() {
        const CAPACITY: usize = 64;
        const TOTAL: u64 = 2000;

        let overflows = Arc::new(AtomicU64::new(0));
        let overflow_counter = overflows.clone();
        let ring = Arc::new(
            SpscRing::new(CAPACITY)
                .with_overflow_hook(move || {
                    overflow_counter.fetch_add(1, Ordering::Relaxed);
                }),
        );
        ring.open();

        let processed = Arc::new(AtomicU64::new(0));
        let mut worker = BrokerWorker::spawn(
            "stalled",
            ring.clone(),
            StalledProcessor {
                processed: processed.clone(),
                delay: Duration::from_millis(2),
            },
        );

        let mut successful = 0u64;
        for i in 0..TOTAL {
            assert!(ring.len() <= CAPACITY, "ring exceeded its bound");
            if ring.enqueue(i) {
                successful += 1;
            }
            thread::sleep(Duration::from_micros(50));
        }

        // Let the consumer drain what made it into the ring.
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while !ring.is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        worker.stop();

        assert!(successful < TOTAL, "the stalled consumer must cause rejections");
        assert_eq!(overflows.load(Ordering::Relaxed), TOTAL - successful);
        assert_eq!(processed.load(Ordering::Relaxed), successful);
    }
}

#[cfg(test)]
mod verify_tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use contracts::RecorderConfig;
    use devices::{MockBagProbe, MockGazeSource, MockRgbdSource};
    use managers::{GazeManager, RgbdManager};
    use orchestrator::Orchestrator;

    /// Synthesize one session for both devices with `rows` CSV rows
    /// inside a 5 s video window.
    fn make_session(root: &Path, rows: usize) {
        let session = root.join("session_1700000100");
        let window_start_s = 1000.0;
        let window_end_s = 1005.0;

        fs::create_dir_all(&session).unwrap();
        fs::write(
            session.join("frame_timing.log"),
            format!(
                "FIRST_FRAME {window_start_s} VIDEO_INDEX_1\n\
                 LAST_FRAME {window_end_s} VIDEO_INDEX_1 COMPLETED\n"
            ),
        )
        .unwrap();

        // Gaze CSV: 27 columns, all rows tracked on the left eye.
        let gaze_dir = session.join("gaze");
        fs::create_dir_all(&gaze_dir).unwrap();
        let mut gaze_csv = String::from("index,frame_timestamp,frame_hardware_timestamp");
        gaze_csv.push_str(&",x".repeat(24));
        gaze_csv.push('\n');
        for i in 0..rows {
            let ts_ms = (window_start_s + 0.001 + i as f64 / 70.0) * 1000.0;
            let mut fields = vec!["0".to_string(); 27];
            fields[0] = i.to_string();
            fields[1] = format!("{ts_ms:.3}");
            fields[8] = "1".to_string();
            gaze_csv.push_str(&fields.join(","));
            gaze_csv.push('\n');
        }
        fs::write(gaze_dir.join("gaze_data.csv"), gaze_csv).unwrap();

        // RGB-D CSV plus a probe-able bag.
        let rgbd_dir = session.join("rgbd");
        fs::create_dir_all(&rgbd_dir).unwrap();
        let mut rgbd_csv =
            String::from("index,color_timestamp,depth_timestamp,color_frame_number,depth_frame_number\n");
        for i in 0..rows {
            let ts_ms = (window_start_s + 0.001 + i as f64 / 70.0) * 1000.0;
            rgbd_csv.push_str(&format!("{i},{ts_ms:.3},{ts_ms:.3},{i},{i}\n"));
        }
        fs::write(rgbd_dir.join("rgbd_data.csv"), rgbd_csv).unwrap();

        let mut bag = devices::BAG_MAGIC.to_vec();
        bag.extend_from_slice(&[0u8; 16 * 4]);
        fs::write(rgbd_dir.join("1700000100.bag"), bag).unwrap();
    }

    fn orchestrator_at(root: &Path) -> Orchestrator {
        let config = RecorderConfig {
            output_path: root.to_path_buf(),
            verified_path: root.join("verified"),
            calibration_path: None,
            record_duration: 5,
        };

        let mut orchestrator = Orchestrator::new();
        orchestrator
            .register(Arc::new(
                RgbdManager::new(
                    config.clone(),
                    Arc::new(MockRgbdSource::with_defaults("rgbd")),
                    Arc::new(MockBagProbe),
                )
                .without_preview(),
            ))
            .unwrap();
        orchestrator
            .register(Arc::new(GazeManager::new(
                config,
                Arc::new(MockGazeSource::with_defaults("gaze")),
            )))
            .unwrap();
        orchestrator
    }

    /// 340 rows in a 5 s window (expected 300): WARN territory, still
    /// valid overall.
    #[tokio::test]
    async fn test_verify_accepts_extra_frames() {
        let dir = tempfile::tempdir().unwrap();
        make_session(dir.path(), 340);

        let orchestrator = orchestrator_at(dir.path());
        assert!(orchestrator.execute_verify());

        let gaze_result =
            fs::read_to_string(dir.path().join("verified/gaze_verify_result.csv")).unwrap();
        assert!(gaze_result.contains("VIDEO_INDEX_1,5.000,340,300,340,0"));
    }

    /// 280 rows in a 5 s window (expected 300): below the 0.95 floor,
    /// the overall verify is false.
    #[tokio::test]
    async fn test_verify_rejects_insufficient_frames() {
        let dir = tempfile::tempdir().unwrap();
        make_session(dir.path(), 280);

        let orchestrator = orchestrator_at(dir.path());
        assert!(!orchestrator.execute_verify());

        let gaze_result =
            fs::read_to_string(dir.path().join("verified/gaze_verify_result.csv")).unwrap();
        assert!(gaze_result.contains("VIDEO_INDEX_1,5.000,280,300,280,0"));
    }

    /// An empty output tree fails verification outright.
    #[tokio::test]
    async fn test_verify_without_sessions_fails() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator_at(dir.path());
        assert!(!orchestrator.execute_verify());
    }
}
