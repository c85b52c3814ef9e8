//! # Integration Tests
//!
//! Cross-crate tests: configuration loading, pipeline runtime, collaborator
//! primitives and measurement aggregation working together.

#[cfg(test)]
mod contract_tests {
    use std::path::PathBuf;

    use contracts::{ConfigVersion, PipelineState};

    pub(crate) fn sample_config() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../pipeline.toml")
    }

    #[test]
    fn test_sample_config_loads() {
        let blueprint = config_loader::ConfigLoader::load_from_path(&sample_config()).unwrap();
        assert_eq!(blueprint.version, ConfigVersion::V1);
        assert_eq!(blueprint.pipeline.name, "arithmetic");
        assert_eq!(blueprint.stages.len(), 4);
        assert_eq!(blueprint.measured_stages().count(), 2);
    }

    #[test]
    fn test_state_transitions() {
        assert!(PipelineState::Running.can_pause());
        assert!(!PipelineState::Paused.can_pause());
        assert!(PipelineState::Running.can_resume());
        assert!(!PipelineState::Stopped.can_stop());
        assert_eq!(PipelineState::Paused.to_string(), "paused");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use concurrent::{AtomicCounter, Counter, Debouncer, MutexCounter, MutexGroup, RateLimiter};
    use contracts::{MeasurementRecord, PipelineBlueprint, PipelineState};
    use observability::StageLatencyAggregator;
    use pipeline::{Pipeline, PipelineConfig, PipelineError, StageHandle};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::contract_tests::sample_config;

    fn build(blueprint: &PipelineBlueprint) -> (Pipeline<i64>, Vec<StageHandle<i64>>) {
        let mut pipeline = Pipeline::with_config(PipelineConfig::from(&blueprint.pipeline));
        let handles = blueprint
            .stages
            .iter()
            .map(|stage| {
                let op = stage.operation;
                pipeline.add_fallible_stage(&stage.name, stage.buffer_capacity, move |x| {
                    op.apply(x)
                })
            })
            .collect();
        (pipeline, handles)
    }

    fn expected(blueprint: &PipelineBlueprint, inputs: std::ops::Range<i64>) -> Vec<i64> {
        inputs
            .filter_map(|x| {
                blueprint
                    .stages
                    .iter()
                    .try_fold(x, |acc, s| s.operation.apply(acc))
                    .ok()
            })
            .collect()
    }

    fn simple_pipeline(stages: usize, capacity: usize) -> Pipeline<i64> {
        let mut pipeline = Pipeline::<i64>::new();
        for i in 0..stages {
            pipeline.add_stage(format!("add-{i}"), capacity, |x| x + 1);
        }
        pipeline
    }

    /// End-to-end test: config file -> Pipeline -> output + measurement
    ///
    /// 1. Load the sample configuration
    /// 2. Build one stage per configured operation, measuring as configured
    /// 3. Feed 0..200 and check the output against the sequential result
    /// 4. Aggregate measurement records per stage
    #[tokio::test]
    async fn test_e2e_config_driven_pipeline() {
        let blueprint = config_loader::ConfigLoader::load_from_path(&sample_config()).unwrap();
        let (pipeline, stages) = build(&blueprint);

        let records: Vec<mpsc::Receiver<MeasurementRecord<i64>>> = blueprint
            .stages
            .iter()
            .zip(&stages)
            .filter(|(config, _)| config.measure)
            .map(|(_, handle)| handle.enable_measurement())
            .collect();

        let (tx, rx) = mpsc::channel(blueprint.input.capacity);
        let (handle, mut output) = pipeline.start(rx).unwrap();

        tokio::spawn(async move {
            for i in 0..200 {
                if tx.send(i).await.is_err() {
                    break;
                }
            }
        });

        let collect = async {
            let mut items = Vec::new();
            while let Some(item) = output.recv().await {
                items.push(item);
            }
            items
        };
        let items = timeout(Duration::from_secs(5), collect)
            .await
            .expect("Pipeline timed out");

        assert_eq!(items, expected(&blueprint, 0..200));
        assert_eq!(handle.state(), PipelineState::Running);

        handle.stop().await.unwrap();
        for stage in &stages {
            stage.disable_measurement();
        }

        let mut aggregator = StageLatencyAggregator::new();
        for mut rx in records {
            while let Some(record) = rx.recv().await {
                aggregator.update(&record);
            }
        }
        let summary = aggregator.summary();
        assert_eq!(summary.len(), 2);
        assert!(summary.iter().all(|s| s.processed == 200));

        for (name, metrics) in handle.stage_metrics() {
            assert_eq!(metrics.processed_count, 200, "stage {name}");
            assert_eq!(metrics.failure_count, 0);
        }
    }

    /// Rate-limited feeder, pause/resume mid-run, counters on both ends
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_rate_limited_feed_with_pause() {
        let (tx, rx) = mpsc::channel(8);
        let (handle, mut output) = simple_pipeline(3, 4).start(rx).unwrap();

        let limiter = Arc::new(RateLimiter::new(20, Duration::from_millis(50)).unwrap());
        let fed = Arc::new(AtomicCounter::new());
        let feeder = {
            let limiter = Arc::clone(&limiter);
            let fed = Arc::clone(&fed);
            tokio::spawn(async move {
                for i in 0..60 {
                    limiter.acquire().await?;
                    if tx.send(i).await.is_err() {
                        break;
                    }
                    fed.increment();
                }
                Ok::<_, concurrent::ConcurrentError>(())
            })
        };

        let received = MutexCounter::new();
        let mut items = Vec::new();
        while received.value() < 10 {
            let item = timeout(Duration::from_secs(2), output.recv())
                .await
                .expect("Output timed out")
                .expect("Output ended early");
            items.push(item);
            received.increment();
        }

        handle.pause().await;
        assert_eq!(handle.state(), PipelineState::Paused);

        // in-flight items settle, then nothing moves
        tokio::time::sleep(Duration::from_millis(50)).await;
        let before: u64 = handle
            .stage_metrics()
            .iter()
            .map(|(_, m)| m.processed_count)
            .sum();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let after: u64 = handle
            .stage_metrics()
            .iter()
            .map(|(_, m)| m.processed_count)
            .sum();
        assert_eq!(before, after);

        handle.resume().await;
        while let Ok(Some(item)) = timeout(Duration::from_secs(2), output.recv()).await {
            items.push(item);
            received.increment();
        }

        assert!(feeder.await.unwrap().is_ok());
        assert_eq!(fed.value(), 60);
        assert_eq!(received.value(), 60);
        assert_eq!(items, (3..63).collect::<Vec<_>>());

        handle.stop().await.unwrap();
        limiter.shutdown();
        assert!(limiter.acquire().await.is_err());
    }

    /// Stop while the producer is blocked on a full pipeline
    #[tokio::test]
    async fn test_e2e_stop_under_backpressure() {
        let (tx, rx) = mpsc::channel(1);
        let (handle, mut output) = simple_pipeline(2, 1).start(rx).unwrap();

        let fed = Arc::new(AtomicCounter::new());
        let feeder = {
            let fed = Arc::clone(&fed);
            tokio::spawn(async move {
                for i in 0.. {
                    if tx.send(i).await.is_err() {
                        break;
                    }
                    fed.increment();
                }
            })
        };

        // output capacity 100 + two stage buffers + input queue, plus in-flight
        tokio::time::sleep(Duration::from_millis(100)).await;
        let accepted = fed.value();
        assert!(accepted > 0);
        assert!(accepted < 120, "producer should be blocked, fed {accepted}");

        let stopper = handle.clone();
        timeout(Duration::from_secs(2), tokio::spawn(async move { stopper.stop().await }))
            .await
            .expect("Stop timed out")
            .unwrap()
            .unwrap();

        assert_eq!(handle.state(), PipelineState::Stopped);
        assert_eq!(output.recv().await, None);

        // the input receiver is gone, so the blocked producer is released
        timeout(Duration::from_secs(2), feeder)
            .await
            .expect("Producer still blocked")
            .unwrap();

        let err = handle.stop().await.unwrap_err();
        assert!(err.is_protocol_violation());
    }

    /// Controllers sharing a pipeline serialize pause/resume cycles
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_e2e_serialized_controllers() {
        let (_tx, rx) = mpsc::channel::<i64>(4);
        let (handle, _output) = simple_pipeline(2, 4).start(rx).unwrap();

        let locks = Arc::new(MutexGroup::new());
        locks.register(["control"]).unwrap();

        let mut controllers = Vec::new();
        for _ in 0..4 {
            let locks = Arc::clone(&locks);
            let handle = handle.clone();
            controllers.push(tokio::spawn(async move {
                let _guard = locks.lock(&["control"]).await?;
                let paused =
                    handle.try_pause().await.is_ok() && handle.state() == PipelineState::Paused;
                tokio::time::sleep(Duration::from_millis(5)).await;
                let resumed = handle.try_resume().await.is_ok();
                Ok::<_, concurrent::ConcurrentError>(paused && resumed)
            }));
        }

        for controller in controllers {
            assert!(controller.await.unwrap().unwrap());
        }
        assert_eq!(handle.state(), PipelineState::Running);
        handle.stop().await.unwrap();
    }

    /// A burst of pause requests results in exactly one pause
    #[tokio::test]
    async fn test_e2e_debounced_pause() {
        let (_tx, rx) = mpsc::channel::<i64>(4);
        let (handle, _output) = simple_pipeline(1, 4).start(rx).unwrap();

        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(20)));
        let requested = Arc::new(AtomicCounter::new());

        let mut calls = Vec::new();
        for _ in 0..5 {
            let debouncer = Arc::clone(&debouncer);
            let requested = Arc::clone(&requested);
            calls.push(tokio::spawn(async move {
                debouncer.call(|| requested.increment()).await
            }));
        }
        let mut ran = 0;
        for call in calls {
            if call.await.unwrap() {
                ran += 1;
            }
        }
        assert_eq!(ran, 1);
        assert_eq!(requested.value(), 1);

        handle.try_pause().await.unwrap();
        assert!(matches!(
            handle.try_pause().await,
            Err(PipelineError::ProtocolViolation { .. })
        ));
        handle.stop().await.unwrap();
        assert_eq!(handle.state(), PipelineState::Stopped);
    }
}
