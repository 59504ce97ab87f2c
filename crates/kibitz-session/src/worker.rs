//! Background advisory worker.
//!
//! A single thread owns the engine. It connects first, then serves analysis jobs from
//! a queue in order, reporting every outcome as a [`WorkerMessage`]. Jobs are tagged
//! with the session generation they were issued for. The latest generation is
//! published through an atomic so that queued stale jobs are skipped and a running
//! search is stopped early. Whether a result is still wanted is decided by the
//! controller, not here.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, unbounded};
use kibitz_uci::{Advisor, Analysis, AnalysisRequest, EngineError};
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Free-play advice.
    Advice,
    /// Puzzle hint, one line.
    Hint,
    /// On-demand deep puzzle solve.
    Solve,
    /// Next move of the exhibition loop.
    ExhibitionMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTag {
    pub generation: u64,
    pub purpose: Purpose,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub tag: RequestTag,
    pub request: AnalysisRequest,
}

#[derive(Debug)]
pub enum WorkerMessage {
    Connected { engine: String },
    ConnectFailed(String),
    Finished {
        tag: RequestTag,
        result: Result<Analysis, EngineError>,
    },
}

/// Where the controller sends its requests.
pub trait Dispatch {
    fn submit(&mut self, job: Job);

    /// Publishes the session's current generation. Anything older is stale.
    fn invalidate(&mut self, generation: u64);
}

pub struct AdvisoryWorker {
    jobs: Option<Sender<Job>>,
    latest: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl AdvisoryWorker {
    /// Starts the worker thread. `connect` runs on that thread.
    pub fn spawn<A, E, F>(connect: F, events: Sender<WorkerMessage>) -> std::io::Result<Self>
    where
        A: Advisor + 'static,
        E: fmt::Display,
        F: FnOnce() -> Result<A, E> + Send + 'static,
    {
        let (jobs_tx, jobs_rx) = unbounded::<Job>();
        let latest = Arc::new(AtomicU64::new(0));
        let latest_for_worker = Arc::clone(&latest);

        let handle = std::thread::Builder::new()
            .name("advisory-worker".to_string())
            .spawn(move || {
                let mut advisor = match connect() {
                    Ok(advisor) => {
                        let engine = advisor.name().to_string();
                        info!("advisory engine ready: {engine}");
                        if events.send(WorkerMessage::Connected { engine }).is_err() {
                            return;
                        }
                        Some(advisor)
                    }
                    Err(e) => {
                        warn!("advisory engine unavailable: {e}");
                        if events.send(WorkerMessage::ConnectFailed(e.to_string())).is_err() {
                            return;
                        }
                        None
                    }
                };

                for job in jobs_rx.iter() {
                    let generation = job.tag.generation;
                    if generation < latest_for_worker.load(Ordering::Acquire) {
                        debug!("skipping stale {:?} job for generation {generation}", job.tag.purpose);
                        continue;
                    }
                    let result = match advisor.as_mut() {
                        Some(a) => {
                            let cancel = || latest_for_worker.load(Ordering::Acquire) > generation;
                            a.analyse(&job.request, &cancel)
                        }
                        None => Err(EngineError::Unavailable),
                    };
                    if let Err(EngineError::Exited(label)) = &result {
                        warn!("{label} exited; advisory disabled");
                        advisor = None;
                    }
                    if events
                        .send(WorkerMessage::Finished {
                            tag: job.tag,
                            result,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                debug!("advisory worker stopping");
            })?;

        Ok(Self {
            jobs: Some(jobs_tx),
            latest,
            handle: Some(handle),
        })
    }
}

impl Dispatch for AdvisoryWorker {
    fn submit(&mut self, job: Job) {
        if let Some(jobs) = &self.jobs {
            if jobs.send(job).is_err() {
                warn!("advisory worker is gone; request dropped");
            }
        }
    }

    fn invalidate(&mut self, generation: u64) {
        self.latest.fetch_max(generation, Ordering::AcqRel);
    }
}

impl Drop for AdvisoryWorker {
    fn drop(&mut self) {
        self.latest.store(u64::MAX, Ordering::Release);
        drop(self.jobs.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use kibitz_core::{Color, STARTPOS_FEN};
    use kibitz_uci::{LineCount, SearchLimit};

    use super::*;

    /// Records the requests it sees and blocks each one until cancelled or released.
    struct FakeAdvisor {
        seen: Arc<Mutex<Vec<u64>>>,
        block: bool,
    }

    impl Advisor for FakeAdvisor {
        fn name(&self) -> &str {
            "fake"
        }

        fn analyse(
            &mut self,
            request: &AnalysisRequest,
            cancel: &dyn Fn() -> bool,
        ) -> Result<Analysis, EngineError> {
            let depth = request.limit.depth.unwrap_or(0);
            self.seen.lock().unwrap().push(u64::from(depth));
            if self.block {
                while !cancel() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                return Err(EngineError::Cancelled);
            }
            Ok(Analysis {
                lines: Vec::new(),
                bestmove: None,
                depth,
                nodes: 0,
                elapsed: Duration::ZERO,
            })
        }
    }

    fn job(generation: u64, depth: u32) -> Job {
        Job {
            tag: RequestTag {
                generation,
                purpose: Purpose::Advice,
            },
            request: AnalysisRequest {
                fen: STARTPOS_FEN.to_string(),
                turn: Color::White,
                limit: SearchLimit::depth(depth),
                lines: LineCount::One,
            },
        }
    }

    #[test]
    fn reports_connection_then_results_in_order() {
        let (tx, rx) = unbounded();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let advisor = FakeAdvisor {
            seen: Arc::clone(&seen),
            block: false,
        };
        let mut worker =
            AdvisoryWorker::spawn(move || Ok::<_, String>(advisor), tx).unwrap();
        worker.submit(job(0, 3));
        worker.submit(job(0, 4));

        let timeout = Duration::from_secs(5);
        assert!(matches!(
            rx.recv_timeout(timeout).unwrap(),
            WorkerMessage::Connected { ref engine } if engine == "fake"
        ));
        for depth in [3, 4] {
            match rx.recv_timeout(timeout).unwrap() {
                WorkerMessage::Finished { result, .. } => {
                    assert_eq!(result.unwrap().depth, depth);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn failed_connection_answers_jobs_with_unavailable() {
        let (tx, rx) = unbounded();
        let mut worker = AdvisoryWorker::spawn(
            || Err::<FakeAdvisor, _>("no engine here".to_string()),
            tx,
        )
        .unwrap();
        worker.submit(job(0, 1));
        let timeout = Duration::from_secs(5);
        assert!(matches!(
            rx.recv_timeout(timeout).unwrap(),
            WorkerMessage::ConnectFailed(ref reason) if reason == "no engine here"
        ));
        assert!(matches!(
            rx.recv_timeout(timeout).unwrap(),
            WorkerMessage::Finished {
                result: Err(EngineError::Unavailable),
                ..
            }
        ));
    }

    #[test]
    fn invalidation_cancels_running_and_skips_queued_jobs() {
        let (tx, rx) = unbounded();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let advisor = FakeAdvisor {
            seen: Arc::clone(&seen),
            block: true,
        };
        let mut worker =
            AdvisoryWorker::spawn(move || Ok::<_, String>(advisor), tx).unwrap();
        let timeout = Duration::from_secs(5);
        assert!(matches!(
            rx.recv_timeout(timeout).unwrap(),
            WorkerMessage::Connected { .. }
        ));

        worker.submit(job(1, 10));
        worker.submit(job(1, 11));
        // wait until the first job is running
        while seen.lock().unwrap().is_empty() {
            std::thread::sleep(Duration::from_millis(5));
        }
        worker.invalidate(2);

        match rx.recv_timeout(timeout).unwrap() {
            WorkerMessage::Finished { tag, result } => {
                assert_eq!(tag.generation, 1);
                assert!(matches!(result, Err(EngineError::Cancelled)));
            }
            other => panic!("unexpected {other:?}"),
        }
        drop(worker);
        assert_eq!(*seen.lock().unwrap(), vec![10]);
    }
}
