//! Live views: values that push themselves to subscribers when their source
//! changes.
//!
//! Each view is backed by a `tokio::sync::watch` channel. The channel caches
//! the latest value, so a new subscriber sees the current state immediately
//! and is then woken on every change. The source publishes only when the
//! value actually differs from the cached one.

use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct LiveView<T> {
    rx: watch::Receiver<T>,
}

impl<T> LiveView<T> {
    pub(crate) fn new(rx: watch::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Run `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.rx.borrow())
    }

    /// True if a value arrived that this subscriber has not seen yet.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// A raw receiver, for callers that want to `select!` over several views.
    #[must_use]
    pub fn receiver(&self) -> watch::Receiver<T> {
        let mut rx = self.rx.clone();
        rx.borrow_and_update();
        rx
    }
}

impl<T: Clone> LiveView<T> {
    /// Snapshot of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Wait for the next change and return it. `None` once the source is gone.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Cloning registers a new subscriber that has seen the current value.
impl<T> Clone for LiveView<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.receiver(),
        }
    }
}

pub(crate) fn channel<T>(initial: T) -> (watch::Sender<T>, LiveView<T>) {
    let (tx, rx) = watch::channel(initial);
    (tx, LiveView::new(rx))
}

/// Store `value` and wake subscribers, unless it equals the cached value.
pub(crate) fn publish<T: PartialEq>(tx: &watch::Sender<T>, value: T) -> bool {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    })
}

/// Derive a view from two others. `f` runs once now and again whenever
/// either input changes.
///
/// The returned task ends when every subscriber of the output is gone or
/// either input closes; aborting the handle tears it down early. Must be
/// called from within a Tokio runtime.
pub fn combine<A, B, C, F>(a: &LiveView<A>, b: &LiveView<B>, f: F) -> (LiveView<C>, JoinHandle<()>)
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    C: PartialEq + Send + Sync + 'static,
    F: Fn(&A, &B) -> C + Send + 'static,
{
    let mut a_rx = a.receiver();
    let mut b_rx = b.receiver();
    let initial = f(&a_rx.borrow(), &b_rx.borrow());
    let (tx, view) = channel(initial);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                res = a_rx.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
                res = b_rx.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
                () = tx.closed() => break,
            }
            let next = f(&a_rx.borrow_and_update(), &b_rx.borrow_and_update());
            publish(&tx, next);
        }
        tracing::trace!("derived view stopped");
    });

    (view, handle)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_new_subscriber_sees_cached_value() {
        let (tx, view) = channel(1);
        publish(&tx, 5);
        let late = view.clone();
        assert_eq!(late.get(), 5);
        assert!(!late.has_changed());
    }

    #[tokio::test]
    async fn test_publish_skips_equal_values() {
        let (tx, view) = channel(String::from("a"));
        assert!(!publish(&tx, String::from("a")));
        assert!(!view.has_changed());
        assert!(publish(&tx, String::from("b")));
        assert!(view.has_changed());
    }

    #[tokio::test]
    async fn test_changed_delivers_next_value() {
        let (tx, mut view) = channel(0);
        let producer = tokio::spawn(async move {
            publish(&tx, 42);
            tx
        });
        let got = tokio::time::timeout(WAIT, view.changed()).await.unwrap();
        assert_eq!(got, Some(42));
        drop(producer.await.unwrap());
        assert_eq!(view.changed().await, None);
    }

    #[tokio::test]
    async fn test_combine_recomputes_on_either_input() {
        let (a_tx, a) = channel(2);
        let (b_tx, b) = channel(3);
        let (mut product, _task) = combine(&a, &b, |x: &i32, y: &i32| x * y);
        assert_eq!(product.get(), 6);

        publish(&a_tx, 4);
        assert_eq!(
            tokio::time::timeout(WAIT, product.changed()).await.unwrap(),
            Some(12)
        );

        publish(&b_tx, 10);
        assert_eq!(
            tokio::time::timeout(WAIT, product.changed()).await.unwrap(),
            Some(40)
        );
    }

    #[tokio::test]
    async fn test_combine_stops_when_output_dropped() {
        let (_a_tx, a) = channel(1);
        let (_b_tx, b) = channel(1);
        let (out, task) = combine(&a, &b, |x: &i32, y: &i32| x + y);
        drop(out);
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_combine_stops_when_input_closes() {
        let (a_tx, a) = channel(1);
        let (_b_tx, b) = channel(1);
        let (_out, task) = combine(&a, &b, |x: &i32, y: &i32| x + y);
        drop(a_tx);
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    }
}
