//! Work queue shared by the resolver and the worker pool

use crate::migration::ImageReference;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

/// Unbounded multi-producer, multi-consumer FIFO of images to migrate.
///
/// Producers push while workers pop. Once [`WorkQueue::close`] has been called
/// a pop on an empty queue returns `None` instead of waiting, which is how the
/// pool learns that population is complete.
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<ImageReference>>,
    closed: AtomicBool,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue pre-filled with the given images and already closed
    pub fn from_images(images: impl IntoIterator<Item = ImageReference>) -> Self {
        let queue = Self::new();
        queue.extend(images);
        queue.close();
        queue
    }

    pub fn push(&self, image: ImageReference) {
        self.lock().push_back(image);
        self.notify.notify_one();
    }

    pub fn extend(&self, images: impl IntoIterator<Item = ImageReference>) {
        for image in images {
            self.push(image);
        }
    }

    /// Mark population as complete and wake every waiting worker
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Take the next image, waiting while the queue is empty but still open
    pub async fn pop(&self) -> Option<ImageReference> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a push or close in between is not missed
            notified.as_mut().enable();

            if let Some(image) = self.lock().pop_front() {
                return Some(image);
            }
            if self.is_closed() {
                return self.lock().pop_front();
            }

            notified.await;
        }
    }

    /// Non-blocking pop
    pub fn try_pop(&self) -> Option<ImageReference> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ImageReference>> {
        // A panic while holding the lock cannot leave the deque half-updated
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order_and_close() {
        let queue = WorkQueue::from_images(vec![
            ImageReference::new("a", "1"),
            ImageReference::new("b", "2"),
        ]);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().await, Some(ImageReference::new("a", "1")));
        assert_eq!(queue.pop().await, Some(ImageReference::new("b", "2")));
        assert_eq!(queue.pop().await, None);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(WorkQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(ImageReference::new("late", "v1"));

        let popped = consumer.await.unwrap();
        assert_eq!(popped, Some(ImageReference::new("late", "v1")));
    }

    #[tokio::test]
    async fn test_close_wakes_all_waiters() {
        let queue = Arc::new(WorkQueue::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.pop().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        for waiter in waiters {
            let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter should wake on close")
                .unwrap();
            assert_eq!(popped, None);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_push_and_pop_lose_nothing() {
        let queue = Arc::new(WorkQueue::new());

        let consumers: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while let Some(image) = queue.pop().await {
                        seen.push(image);
                    }
                    seen
                })
            })
            .collect();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    for i in 0..250 {
                        queue.push(ImageReference::new(format!("repo{}", p), i.to_string()));
                        if i % 50 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.await.unwrap();
        }
        queue.close();

        let mut total = 0;
        for consumer in consumers {
            total += consumer.await.unwrap().len();
        }
        assert_eq!(total, 1000);
        assert!(queue.is_empty());
    }
}
