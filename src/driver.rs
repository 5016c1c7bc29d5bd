//! Async facade over a synchronous browser session
//!
//! The worker thread owns the [`Session`] exclusively and executes commands
//! sent from async tasks, so the orchestrator gets an async interface while
//! the session never has to be `Send` across threads. One command is in
//! flight at a time by construction; every reply is raced against a fixed
//! ceiling, and exceeding it is a hard failure of the run.

use crate::session::{CropArea, Session};
use crate::{Error, Example, Result};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time;

enum Command {
    InitErrors(oneshot::Sender<Result<Vec<String>>>),
    Examples(oneshot::Sender<Result<Vec<Example>>>),
    Resize(u32, u32, oneshot::Sender<Result<()>>),
    Render(String, oneshot::Sender<Result<CropArea>>),
    Screenshot(oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// Handle to a session worker thread
#[derive(Clone)]
pub struct Driver {
    cmd_tx: Sender<Command>,
    command_timeout: Duration,
}

impl Driver {
    /// Spawn a worker thread that creates and owns the session.
    ///
    /// The factory runs on the worker thread; a factory error surfaces here
    /// as the spawn result, so callers see session startup failures directly.
    pub async fn spawn<S, F>(factory: F, command_timeout: Duration) -> Result<Self>
    where
        S: Session,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::spawn(move || {
            let mut session = match factory() {
                Ok(s) => s,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };

            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::InitErrors(resp) => {
                        let _ = resp.send(session.initialization_errors());
                    }
                    Command::Examples(resp) => {
                        let _ = resp.send(session.all_examples());
                    }
                    Command::Resize(width, height, resp) => {
                        let _ = resp.send(session.resize_viewport(width, height));
                    }
                    Command::Render(description, resp) => {
                        let _ = resp.send(session.render(&description));
                    }
                    Command::Screenshot(resp) => {
                        let _ = resp.send(session.screenshot());
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(session.close());
                        break;
                    }
                }
            }
        });

        let init_res = init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self {
            cmd_tx,
            command_timeout,
        })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .map_err(|_| Error::Other("Session worker is gone".to_string()))?;

        match time::timeout(self.command_timeout, rx).await {
            Err(_) => Err(Error::Timeout(self.command_timeout.as_millis() as u64)),
            Ok(Err(e)) => Err(Error::Other(format!("Command canceled: {}", e))),
            Ok(Ok(res)) => res,
        }
    }

    /// JavaScript errors the harness page collected while loading
    pub async fn initialization_errors(&self) -> Result<Vec<String>> {
        self.request(Command::InitErrors).await
    }

    /// Enumerate the renderable examples exposed by the harness page
    pub async fn all_examples(&self) -> Result<Vec<Example>> {
        self.request(Command::Examples).await
    }

    /// Resize the remote viewport
    pub async fn resize_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.request(|resp| Command::Resize(width, height, resp)).await
    }

    /// Render one example and return its bounding box
    pub async fn render(&self, description: &str) -> Result<CropArea> {
        self.request(|resp| Command::Render(description.to_string(), resp))
            .await
    }

    /// Capture the full page as PNG bytes
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.request(Command::Screenshot).await
    }

    /// Shutdown the worker and close the session
    pub async fn close(self) -> Result<()> {
        self.request(Command::Close).await
    }
}
