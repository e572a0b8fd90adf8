//! Latest-call-wins execution for interactive lookups.
//!
//! Each call to [`Supersede::run`] takes a new generation number. When a
//! newer call starts, every older call still in flight stops polling its
//! future and returns `None`, so a slow search for "hal" can never overwrite
//! the results of the later search for "half-life".

use std::future::Future;

use tokio::sync::watch;

#[derive(Debug)]
pub struct Supersede {
    generation: watch::Sender<u64>,
}

impl Default for Supersede {
    fn default() -> Self {
        Self::new()
    }
}

impl Supersede {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self { generation }
    }

    /// Run `task` unless a newer call supersedes it first.
    ///
    /// Returns `None` if the task was abandoned. The abandoned future is
    /// dropped, which cancels whatever it was awaiting.
    pub async fn run<F: Future>(&self, task: F) -> Option<F::Output> {
        let mut mine = 0;
        self.generation.send_modify(|g| {
            *g += 1;
            mine = *g;
        });
        let mut rx = self.generation.subscribe();
        tokio::pin!(task);

        loop {
            tokio::select! {
                out = &mut task => {
                    return if *self.generation.borrow() == mine {
                        Some(out)
                    } else {
                        None
                    };
                }
                changed = rx.changed() => {
                    if changed.is_err() {
                        // Sender lives in self, so this cannot happen; finish normally.
                        return Some(task.await);
                    }
                    if *rx.borrow_and_update() != mine {
                        log::debug!("Supersede: generation {} abandoned", mine);
                        return None;
                    }
                }
            }
        }
    }

    /// Abandon every call currently in flight without starting a new one.
    pub fn cancel_all(&self) {
        self.generation.send_modify(|g| *g += 1);
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }
}
