//! Fixed-delay background tasks.

use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Runs repeating tasks on the tokio runtime and aborts them when dropped.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps `delay`, runs `task` to completion, and repeats.
    ///
    /// The next delay only starts once the previous run has finished. The
    /// task stops repeating once it returns false.
    pub fn add_task<F, Fut>(&mut self, delay: Duration, mut task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(delay).await;
                if !task().await {
                    debug!("Scheduled task finished");
                    break;
                }
            }
        });
        self.tasks.push(handle);
    }

    pub fn len(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_finished()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
