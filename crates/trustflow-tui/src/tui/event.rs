use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Terminal events
#[derive(Clone, Debug)]
pub enum Event {
    /// Periodic redraw while rounds are pending
    Tick,
    Key(KeyEvent),
    Resize(u16, u16),
    Error(String),
}

/// Reads terminal input on a background task
pub struct EventHandler {
    receiver: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut reader = EventStream::new();
                let mut ticks = tokio::time::interval(tick_rate);

                loop {
                    let next = reader.next().fuse();
                    let event = tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticks.tick() => Event::Tick,
                        maybe = next => match maybe {
                            // Release events arrive on some platforms; only presses count
                            Some(Ok(CrosstermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                                Event::Key(key)
                            }
                            Some(Ok(CrosstermEvent::Resize(w, h))) => Event::Resize(w, h),
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => Event::Error(e.to_string()),
                            None => break,
                        },
                    };

                    if sender.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        Self {
            receiver,
            cancel,
            task,
        }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Stop reading input and wait for the reader task to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}
