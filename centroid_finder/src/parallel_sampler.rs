// THEORY:
// Frames at different instants share nothing, so the pipeline can run on many of
// them at once. The `ParallelSampler` does exactly that while keeping the output
// byte-for-byte identical to the sequential `Sampler`.
//
// Key architectural principles:
// 1.  **Sequential Acquisition**: Decoders are seek-then-grab state machines, so
//     frames are still pulled from the source one at a time, in time order.
// 2.  **Worker Pool**: Each frame is handed to a pool of blocking workers fed
//     round-robin by a dispatcher task. A worker owns nothing but a shared,
//     read-only pipeline; results come back through a oneshot channel.
// 3.  **Ordered, Bounded Output**: Pending results are awaited through
//     `StreamExt::buffered`, which yields them in submission order and caps the
//     number of frames in flight. Records therefore reach the sink in ascending
//     time order and memory stays bounded by the window, not the media length.

use crate::core_modules::error::SamplingError;
use crate::core_modules::group::GroupList;
use crate::core_modules::raster::Raster;
use crate::pipeline::ImageGroupFinder;
use crate::sampler::{FrameSource, RecordSink, SampleRecord, SamplingConfig, SamplingSummary, acquire};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Frames allowed in flight per worker.
const FRAMES_IN_FLIGHT_PER_WORKER: usize = 2;

struct FrameTask {
    raster: Raster,
    result_sender: oneshot::Sender<GroupList>,
}

/// A fixed set of blocking workers running one pipeline.
pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<FrameTask>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `worker_count` workers (at least one). Must be called inside a
    /// tokio runtime.
    pub fn new<P>(pipeline: Arc<P>, worker_count: usize) -> Self
    where
        P: ImageGroupFinder + Send + Sync + 'static,
    {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<FrameTask>();
        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<FrameTask>())
            .unzip();

        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        let workers = worker_receivers
            .into_iter()
            .map(|mut worker_receiver| {
                let pipeline = Arc::clone(&pipeline);
                tokio::task::spawn_blocking(move || {
                    while let Some(task) = worker_receiver.blocking_recv() {
                        let groups = pipeline.find_connected_groups(&task.raster);
                        let _ = task.result_sender.send(groups);
                    }
                })
            })
            .collect();

        Self {
            task_sender,
            dispatcher,
            workers,
        }
    }

    /// Queues a frame and returns the channel its groups will arrive on.
    pub fn submit(&self, raster: Raster) -> Result<oneshot::Receiver<GroupList>, SamplingError> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.task_sender
            .send(FrameTask {
                raster,
                result_sender,
            })
            .map_err(|_| SamplingError::Worker("worker pool is closed".into()))?;
        Ok(result_receiver)
    }

    /// Stops accepting frames and waits for every worker to drain.
    pub async fn shutdown(self) -> Result<(), SamplingError> {
        drop(self.task_sender);
        self.dispatcher
            .await
            .map_err(|e| SamplingError::Worker(e.to_string()))?;
        for worker in self.workers {
            worker.await.map_err(|e| SamplingError::Worker(e.to_string()))?;
        }
        Ok(())
    }
}

/// Samples like `Sampler`, running the pipeline on several frames at once.
pub struct ParallelSampler<P> {
    pipeline: Arc<P>,
    config: SamplingConfig,
    workers: usize,
}

impl<P> ParallelSampler<P>
where
    P: ImageGroupFinder + Send + Sync + 'static,
{
    /// Uses one worker per logical CPU.
    pub fn new(pipeline: P, config: SamplingConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config,
            workers: num_cpus::get(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn run<S, K>(&self, source: &mut S, sink: &mut K) -> Result<SamplingSummary, SamplingError>
    where
        S: FrameSource + ?Sized,
        K: RecordSink + ?Sized,
    {
        let duration = source.duration();
        info!(
            "Sampling {:.3}s of media every {:?} on {} workers",
            duration.as_secs_f64(),
            self.config.interval,
            self.workers
        );

        let pool = WorkerPool::new(Arc::clone(&self.pipeline), self.workers);
        let mut summary = SamplingSummary::default();
        sink.write_header()?;

        {
            let pool = &pool;
            let mut pending = stream::iter(self.config.instants(duration))
                .map(|instant| {
                    let submitted = acquire(&mut *source, instant)
                        .map_err(SamplingError::from)
                        .and_then(|frame| frame.map(|raster| pool.submit(raster)).transpose());
                    async move {
                        let groups = match submitted? {
                            Some(receiver) => Some(receiver.await.map_err(|_| {
                                SamplingError::Worker("worker dropped a frame".into())
                            })?),
                            None => None,
                        };
                        Ok::<_, SamplingError>((instant, groups))
                    }
                })
                .buffered(self.workers * FRAMES_IN_FLIGHT_PER_WORKER);

            while let Some(outcome) = pending.next().await {
                let (instant, groups) = outcome?;
                let Some(groups) = groups else {
                    warn!("No frame available at {:?}, skipping", instant);
                    summary.skipped += 1;
                    continue;
                };

                let record = SampleRecord {
                    second: instant.as_secs(),
                    centroid: groups.top().map(|group| group.centroid),
                };
                sink.write_record(&record)?;
                summary.count(&record);
                debug!("Processed second {}", record.second);
            }
        }

        pool.shutdown().await?;
        sink.finish()?;
        info!(
            "Sampled {} instants ({} detections, {} skipped)",
            summary.sampled, summary.detected, summary.skipped
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::tests::{MockFrameSource, blank_frame, frame_with_marker, marker_pipeline};
    use crate::sampler::{CsvRecordWriter, Sampler};

    fn long_source() -> MockFrameSource {
        let frames = (0..40u32)
            .map(|i| match i % 7 {
                3 => None,
                5 => Some(blank_frame()),
                _ => Some(frame_with_marker(i % 6, (i / 6) % 4)),
            })
            .collect();
        MockFrameSource::new(frames)
    }

    #[tokio::test]
    async fn test_parallel_output_matches_sequential() {
        let sequential = Sampler::new(marker_pipeline(), SamplingConfig::default());
        let mut expected_sink = CsvRecordWriter::new(Vec::new());
        let expected_summary = sequential.run(&mut long_source(), &mut expected_sink).unwrap();
        let expected = expected_sink.into_inner().unwrap();

        for workers in [1, 3, 8] {
            let parallel = ParallelSampler::new(marker_pipeline(), SamplingConfig::default()).with_workers(workers);
            let mut sink = CsvRecordWriter::new(Vec::new());
            let summary = parallel.run(&mut long_source(), &mut sink).await.unwrap();

            assert_eq!(summary, expected_summary);
            assert_eq!(sink.into_inner().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_records_arrive_in_time_order() {
        let parallel = ParallelSampler::new(marker_pipeline(), SamplingConfig::default()).with_workers(4);
        let mut records: Vec<SampleRecord> = Vec::new();
        let summary = parallel.run(&mut long_source(), &mut records).await.unwrap();

        assert!(records.windows(2).all(|pair| pair[0].second < pair[1].second));
        assert_eq!(summary.sampled as usize, records.len());
        assert!(summary.skipped > 0);
    }

    #[tokio::test]
    async fn test_worker_pool_returns_groups() {
        let pool = WorkerPool::new(Arc::new(marker_pipeline()), 2);
        let receiver = pool.submit(frame_with_marker(1, 1)).unwrap();
        let groups = receiver.await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.top().map(|g| g.size), Some(4));
        pool.shutdown().await.unwrap();
    }

    #[test]
    fn test_worker_count_is_at_least_one() {
        let parallel = ParallelSampler::new(marker_pipeline(), SamplingConfig::default()).with_workers(0);
        assert_eq!(parallel.workers(), 1);
    }
}
