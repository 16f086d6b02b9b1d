// SPDX-License-Identifier: GPL-3.0-only

//! Dedicated camera worker thread
//!
//! Hardware calls can block for a long time, so they never run on the owner
//! task. The worker is a single thread driving its own current-thread tokio
//! runtime; everything spawned on it runs there, one poll at a time.

use crate::constants::timing;
use std::future::Future;
use std::thread::JoinHandle;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const THREAD_NAME: &str = "camera-worker";

pub struct CameraWorker {
    handle: Handle,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CameraWorker {
    /// Start the worker thread and wait until its runtime is up
    pub fn spawn() -> std::io::Result<Self> {
        let (handle_tx, handle_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = handle_tx.send(Err(e));
                        return;
                    }
                };
                let _ = handle_tx.send(Ok(runtime.handle().clone()));

                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });

                // Blocking hardware calls that never return are abandoned
                runtime.shutdown_timeout(timing::WORKER_SHUTDOWN_GRACE);
                debug!("Camera worker runtime stopped");
            })?;

        let handle = handle_rx
            .recv()
            .map_err(|_| std::io::Error::other("camera worker exited during startup"))??;

        info!("Camera worker started");
        Ok(Self {
            handle,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Run `future` on the worker thread
    pub fn spawn_task<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Stop the runtime and join the thread. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Camera worker thread panicked");
            } else {
                info!("Camera worker stopped");
            }
        }
    }
}

impl Drop for CameraWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CameraWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraWorker")
            .field("running", &self.thread.is_some())
            .finish()
    }
}
