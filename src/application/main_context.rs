use std::future::Future;
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The single interaction context listener callbacks run on.
///
/// Jobs are executed one at a time, in the order they were dispatched, by a
/// single task. A job runs to completion (including any `.await` inside it)
/// before the next one starts.
#[derive(Clone)]
pub struct MainContext {
    jobs: mpsc::UnboundedSender<Job>,
}

impl MainContext {
    /// Spawns the context's executor task on the current runtime.
    ///
    /// The task ends once every `MainContext` handle has been dropped.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
            }
        });
        (Self { jobs }, handle)
    }

    /// Queues `job` behind everything dispatched so far. Never blocks.
    pub fn dispatch<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.jobs.send(Box::pin(job)).is_err() {
            tracing::warn!("main context is gone; dropping dispatched job");
        }
    }

    /// Waits until every job dispatched before this call has run.
    pub async fn flush(&self) {
        let (done, finished) = oneshot::channel();
        self.dispatch(async move {
            let _ = done.send(());
        });
        let _ = finished.await;
    }
}
