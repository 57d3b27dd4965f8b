//! Deadline and cancellation signals passed down from the caller.

use std::future::pending;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::PipelineError;

/// Limits on a single run, checked while waiting on synthesis calls.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Sender half of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // No receivers left means the run has already finished
        let _ = self.tx.send(true);
    }
}

/// Why a run stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Deadline,
    Cancelled,
}

impl Interrupt {
    pub fn into_error(self, completed: usize, total: usize) -> PipelineError {
        match self {
            Interrupt::Deadline => PipelineError::DeadlineExceeded { completed, total },
            Interrupt::Cancelled => PipelineError::Cancelled { completed, total },
        }
    }
}

impl RunControl {
    /// No deadline and no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// A control plus the handle that cancels it.
    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (Self::new().with_cancel(rx), CancelHandle { tx })
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Cancel when `true` is sent on the channel.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Whether cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Check both limits without waiting.
    pub fn check(&self) -> Option<Interrupt> {
        if self.is_cancelled() {
            Some(Interrupt::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(Interrupt::Deadline)
        } else {
            None
        }
    }

    /// Resolve when the deadline passes or cancellation is requested.
    ///
    /// Never resolves if neither is set. Cancellation wins a tie.
    pub async fn interrupted(&self) -> Interrupt {
        let deadline = self.deadline;
        let cancel = self.cancel.clone();

        tokio::select! {
            biased;
            _ = wait_cancelled(cancel) => Interrupt::Cancelled,
            _ = wait_deadline(deadline) => Interrupt::Deadline,
        }
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

async fn wait_cancelled(cancel: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = cancel else {
        return pending::<()>().await;
    };

    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without cancelling
            return pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uncontrolled_run_never_interrupts() {
        let control = RunControl::new();
        assert_eq!(control.check(), None);
        let waited = tokio::time::timeout(Duration::from_millis(20), control.interrupted()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_deadline_interrupts() {
        let control = RunControl::new().with_timeout(Duration::from_millis(10));
        assert_eq!(control.interrupted().await, Interrupt::Deadline);
        assert_eq!(control.check(), Some(Interrupt::Deadline));
    }

    #[tokio::test]
    async fn test_cancel_interrupts() {
        let (control, handle) = RunControl::cancellable();
        assert!(!control.is_cancelled());

        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.interrupted().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.cancel();

        assert_eq!(waiter.await.unwrap(), Interrupt::Cancelled);
        assert!(control.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel() {
        let (control, handle) = RunControl::cancellable();
        drop(handle);
        let waited = tokio::time::timeout(Duration::from_millis(20), control.interrupted()).await;
        assert!(waited.is_err());
        assert!(!control.is_cancelled());
    }

    #[test]
    fn test_interrupt_errors_carry_counts() {
        assert!(matches!(
            Interrupt::Deadline.into_error(2, 5),
            PipelineError::DeadlineExceeded { completed: 2, total: 5 }
        ));
        assert!(matches!(
            Interrupt::Cancelled.into_error(0, 3),
            PipelineError::Cancelled { completed: 0, total: 3 }
        ));
    }
}
