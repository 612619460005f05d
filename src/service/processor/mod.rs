use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

mod ingestor;
mod worker;

pub use ingestor::EventIngestor;
pub use worker::DeploymentWorker;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// Start/stop plumbing shared by the long-running loops.
#[derive(Debug)]
struct Lifecycle {
    name: &'static str,
    shutdown: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Lifecycle {
    fn new(name: &'static str) -> Self {
        let (shutdown, _) = broadcast::channel(1);

        Lifecycle {
            name,
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Spawns the loop built from a fresh shutdown receiver. Fails if the
    /// loop is already running.
    fn spawn<F, Fut>(&self, run: F) -> anyhow::Result<()>
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut handle = self
            .handle
            .lock()
            .map_err(|_| anyhow::anyhow!("{} handle lock poisoned", self.name))?;

        if handle.as_ref().map_or(false, |handle| !handle.is_finished()) {
            anyhow::bail!("{} is already running", self.name);
        }

        *handle = Some(tokio::spawn(run(self.shutdown.subscribe())));

        tracing::info!("{}: started", self.name);

        Ok(())
    }

    /// Signals the loop and waits up to five seconds before aborting it.
    async fn stop(&self) -> anyhow::Result<()> {
        let handle = self
            .handle
            .lock()
            .map_err(|_| anyhow::anyhow!("{} handle lock poisoned", self.name))?
            .take();

        let Some(mut handle) = handle else {
            return Ok(());
        };

        // no receivers means the loop already exited
        let _ = self.shutdown.send(());

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => tracing::info!("{}: stopped", self.name),
            Ok(Err(err)) => tracing::error!("{}: loop ended abnormally: {err}", self.name),
            Err(_) => {
                tracing::warn!("{}: did not stop within {:?}, aborting", self.name, SHUTDOWN_TIMEOUT);
                handle.abort();
            }
        }

        Ok(())
    }
}
