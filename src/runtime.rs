//! Executes dashboard jobs and reports each completion as an `Event`.

use crate::client::Classifier;
use crate::csv_ingest::{CsvIngest, IngestError};
use crate::dashboard::{Event, Job};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

/// Async side of the dashboard.
///
/// Cheap to clone. Every returned future owns its inputs, so the host may
/// drop or replace dashboard state while jobs are still running.
#[derive(Clone)]
pub struct Runtime {
    classifier: Arc<dyn Classifier>,
    ingest: Arc<CsvIngest>,
}

impl Runtime {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Runtime::with_ingest(classifier, CsvIngest::default())
    }

    pub fn with_ingest(classifier: Arc<dyn Classifier>, ingest: CsvIngest) -> Self {
        Runtime {
            classifier,
            ingest: Arc::new(ingest),
        }
    }

    /// Run `job` to completion.
    pub fn perform(&self, job: Job) -> BoxFuture<'static, Event> {
        match job {
            Job::ParsePreview { generation, file } => {
                let ingest = Arc::clone(&self.ingest);
                async move {
                    let result = tokio::task::spawn_blocking(move || ingest.parse(&file))
                        .await
                        .unwrap_or_else(|e| Err(IngestError::Io(format!("preview task failed: {}", e))));
                    Event::PreviewParsed { generation, result }
                }
                .boxed()
            }
            Job::ClassifyBatch(file) => self
                .classifier
                .classify_batch(file)
                .map(Event::BatchSettled)
                .boxed(),
            Job::ClassifySingle(flow) => self
                .classifier
                .classify_single(flow)
                .map(Event::ManualSettled)
                .boxed(),
            Job::Timer {
                delay,
                generation,
                phase,
            } => async move {
                tokio::time::sleep(delay).await;
                Event::ThemePhase { generation, phase }
            }
            .boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClassifyFuture, FlowRecord, SubmitError};
    use crate::model::{AnalysisResult, SingleFlowResult, SourceFile};
    use crate::theme::ThemePhase;
    use std::time::Duration;

    struct Unreachable;

    impl Classifier for Unreachable {
        fn classify_batch(&self, _file: SourceFile) -> ClassifyFuture<AnalysisResult> {
            async { Err(SubmitError::Transport("connection refused".to_string())) }.boxed()
        }
        fn classify_single(&self, _flow: FlowRecord) -> ClassifyFuture<SingleFlowResult> {
            async { Err(SubmitError::Transport("connection refused".to_string())) }.boxed()
        }
    }

    fn runtime() -> Runtime {
        Runtime::new(Arc::new(Unreachable))
    }

    #[tokio::test]
    async fn test_preview_job_reports_generation() {
        let file = SourceFile::from_bytes("a.csv", b"x,y\n1,2\n".to_vec());
        match runtime().perform(Job::ParsePreview { generation: 4, file }).await {
            Event::PreviewParsed { generation, result } => {
                assert_eq!(generation, 4);
                assert_eq!(result.unwrap().columns, vec!["x", "y"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_batch_failure_is_reported() {
        let file = SourceFile::from_bytes("a.csv", b"x\n".to_vec());
        match runtime().perform(Job::ClassifyBatch(file)).await {
            Event::BatchSettled(Err(e)) => assert_eq!(e.to_string(), "connection refused"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timer_fires_phase() {
        let job = Job::Timer {
            delay: Duration::from_millis(1),
            generation: 2,
            phase: ThemePhase::Settle,
        };
        assert!(matches!(
            runtime().perform(job).await,
            Event::ThemePhase {
                generation: 2,
                phase: ThemePhase::Settle
            }
        ));
    }
}
