//! Mock producer for tests.
//!
//! Lets tests inject synthetic [`DeviceReport`]s without any hardware.  The
//! producer side is registered with the context; the cloneable
//! [`MockProducerHandle`] stays with the test and feeds it through a channel.

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::trace;

use super::{DeviceProducer, DeviceReport};

/// A [`DeviceProducer`] that replays whatever its handle injected.
pub struct MockProducer {
    name: String,
    receiver: Receiver<DeviceReport>,
}

/// Injection side of a [`MockProducer`].
#[derive(Clone)]
pub struct MockProducerHandle {
    sender: Sender<DeviceReport>,
}

impl MockProducer {
    /// Creates a producer and the handle that feeds it.
    pub fn new(name: &str) -> (Self, MockProducerHandle) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                name: name.to_owned(),
                receiver,
            },
            MockProducerHandle { sender },
        )
    }
}

impl MockProducerHandle {
    /// Queues a report for the next poll.  Returns `false` once the producer is gone.
    pub fn inject(&self, report: DeviceReport) -> bool {
        self.sender.send(report).is_ok()
    }

    pub fn inject_all(&self, reports: impl IntoIterator<Item = DeviceReport>) -> bool {
        reports.into_iter().all(|report| self.inject(report))
    }
}

impl DeviceProducer for MockProducer {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_once(&mut self) -> Vec<DeviceReport> {
        let reports: Vec<DeviceReport> = self.receiver.try_iter().collect();
        if !reports.is_empty() {
            trace!(producer = %self.name, count = reports.len(), "mock reports drained");
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::DeviceAnnouncement;

    #[test]
    fn test_injected_reports_arrive_in_order() {
        // Arrange
        let (mut producer, handle) = MockProducer::new("mock");

        // Act
        handle.inject(DeviceReport::Added(DeviceAnnouncement::keyboard("kbd")));
        handle.inject(DeviceReport::Quit);

        // Assert
        let reports = producer.poll_once();
        assert_eq!(reports.len(), 2);
        assert!(matches!(reports[0], DeviceReport::Added(_)));
        assert_eq!(reports[1], DeviceReport::Quit);
        assert!(producer.poll_once().is_empty());
    }

    #[test]
    fn test_inject_fails_after_producer_dropped() {
        let (producer, handle) = MockProducer::new("mock");
        drop(producer);
        assert!(!handle.inject(DeviceReport::Quit));
    }

    #[test]
    fn test_cloned_handles_feed_the_same_producer() {
        let (mut producer, handle) = MockProducer::new("mock");
        let other = handle.clone();

        assert!(handle.inject_all([DeviceReport::Quit, DeviceReport::Quit]));
        other.inject(DeviceReport::Quit);

        assert_eq!(producer.poll_once().len(), 3);
        assert_eq!(producer.name(), "mock");
    }
}
