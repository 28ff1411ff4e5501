//! Host event loop for an `UploadController`.
//!
//! The controller is only ever touched from the thread that owns the
//! `Runtime`. Slow work (preview encoding, the prediction call, timers) runs
//! on short-lived helper threads that report back through one channel.

use anyhow::{anyhow, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::controller::{Effect, Event, UploadController};
use crate::preview::PreviewImage;
use crate::transport::{PredictionOutcome, PredictionService};
use crate::ui::Renderer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Work {
    Preview,
    Prediction,
    Timer,
}

enum Message {
    External(Event),
    Finished(Work, Event),
    /// A helper panicked and had no event to report instead.
    Abandoned(Work),
    Redraw,
    Shutdown,
}

/// Sends input into a running loop from other threads.
#[derive(Clone)]
pub struct RuntimeHandle {
    tx: Sender<Message>,
}

impl RuntimeHandle {
    pub fn send(&self, event: Event) -> Result<()> {
        self.tx
            .send(Message::External(event))
            .map_err(|_| anyhow!("event loop has stopped"))
    }

    /// Asks the renderer to draw the whole view again.
    pub fn redraw(&self) -> Result<()> {
        self.tx
            .send(Message::Redraw)
            .map_err(|_| anyhow!("event loop has stopped"))
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
    }
}

#[derive(Debug, Default)]
struct Pending {
    previews: usize,
    predictions: usize,
    timers: usize,
}

impl Pending {
    fn start(&mut self, work: Work) {
        match work {
            Work::Preview => self.previews += 1,
            Work::Prediction => self.predictions += 1,
            Work::Timer => self.timers += 1,
        }
    }

    fn finish(&mut self, work: Work) {
        let slot = match work {
            Work::Preview => &mut self.previews,
            Work::Prediction => &mut self.predictions,
            Work::Timer => &mut self.timers,
        };
        *slot = slot.saturating_sub(1);
    }
}

pub struct Runtime<S: PredictionService + 'static> {
    controller: UploadController,
    service: Arc<S>,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    pending: Pending,
    shutdown: bool,
}

impl<S: PredictionService + 'static> Runtime<S> {
    pub fn new(controller: UploadController, service: Arc<S>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            controller,
            service,
            tx,
            rx,
            pending: Pending::default(),
            shutdown: false,
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn controller(&self) -> &UploadController {
        &self.controller
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown
    }

    /// No helper thread, timers included, is still due to report back.
    pub fn is_idle(&self) -> bool {
        self.pending.previews == 0 && self.pending.predictions == 0 && self.pending.timers == 0
    }

    /// Feeds one event to the controller and starts the work it asks for.
    pub fn dispatch(&mut self, event: Event, renderer: &mut dyn Renderer) -> Result<()> {
        let effects = self.controller.handle(event);
        for effect in effects {
            self.execute(effect, renderer)?;
        }
        renderer.render(&self.controller.view())
    }

    /// Processes messages until no preview or prediction is outstanding.
    /// Timers keep running in the background.
    pub fn run_until_settled(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        while !self.shutdown && (self.pending.previews > 0 || self.pending.predictions > 0) {
            let message = self
                .rx
                .recv()
                .map_err(|_| anyhow!("event channel closed"))?;
            self.process(message, renderer)?;
        }
        Ok(())
    }

    /// Processes messages for `duration`, e.g. to let timers fire.
    pub fn run_for(&mut self, duration: Duration, renderer: &mut dyn Renderer) -> Result<()> {
        let deadline = Instant::now() + duration;
        while !self.shutdown {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(message) => self.process(message, renderer)?,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Err(anyhow!("event channel closed")),
            }
        }
        Ok(())
    }

    /// Processes messages until a shutdown is requested.
    pub fn run(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.redraw(&self.controller.view())?;
        while !self.shutdown {
            let message = self
                .rx
                .recv()
                .map_err(|_| anyhow!("event channel closed"))?;
            self.process(message, renderer)?;
        }
        Ok(())
    }

    fn process(&mut self, message: Message, renderer: &mut dyn Renderer) -> Result<()> {
        match message {
            Message::External(event) => self.dispatch(event, renderer),
            Message::Finished(work, event) => {
                self.pending.finish(work);
                self.dispatch(event, renderer)
            }
            Message::Abandoned(work) => {
                self.pending.finish(work);
                Ok(())
            }
            Message::Redraw => renderer.redraw(&self.controller.view()),
            Message::Shutdown => {
                log::info!("shutting down event loop");
                self.shutdown = true;
                Ok(())
            }
        }
    }

    fn execute(&mut self, effect: Effect, renderer: &mut dyn Renderer) -> Result<()> {
        match effect {
            Effect::LoadPreview { generation, file } => {
                self.spawn(
                    Work::Preview,
                    move || Event::PreviewLoaded {
                        generation,
                        preview: PreviewImage::load(&file),
                    },
                    None,
                );
            }
            Effect::SubmitPrediction {
                request,
                file,
                threshold,
            } => {
                let service = Arc::clone(&self.service);
                let on_panic = Event::PredictionFinished {
                    request,
                    outcome: PredictionOutcome::NetworkError(
                        "prediction worker panicked".to_string(),
                    ),
                };
                self.spawn(
                    Work::Prediction,
                    move || Event::PredictionFinished {
                        request,
                        outcome: service.predict(&file, threshold),
                    },
                    Some(on_panic),
                );
            }
            Effect::StartTimer { after, timer } => {
                self.spawn(
                    Work::Timer,
                    move || {
                        thread::sleep(after);
                        Event::TimerFired(timer)
                    },
                    None,
                );
            }
            Effect::ScrollResultsIntoView => {
                return renderer.scroll_results_into_view(&self.controller.view());
            }
        }
        Ok(())
    }

    /// Runs `job` on a helper thread. Every spawned job reports back exactly
    /// once, with `on_panic` (or `Abandoned`) standing in if the job panics.
    fn spawn<F>(&mut self, work: Work, job: F, on_panic: Option<Event>)
    where
        F: FnOnce() -> Event + Send + 'static,
    {
        self.pending.start(work);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let message = match panic::catch_unwind(AssertUnwindSafe(job)) {
                Ok(event) => Message::Finished(work, event),
                Err(_) => {
                    log::error!("{:?} worker panicked", work);
                    match on_panic {
                        Some(event) => Message::Finished(work, event),
                        None => Message::Abandoned(work),
                    }
                }
            };
            let _ = tx.send(message);
        });
    }
}
