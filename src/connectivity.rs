use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

/// Process-wide network status, observable by any number of subscribers.
///
/// The HTTP client reports what it sees; views hold a [`watch::Receiver`]
/// from [`subscribe`](Self::subscribe) and drop it to unsubscribe.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: watch::Sender<NetworkStatus>,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new()
    }
}

impl Connectivity {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(NetworkStatus::Unknown);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Record a status. Subscribers are only woken when it actually changes.
    pub fn report(&self, status: NetworkStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                tracing::info!(?status, "network status changed");
                *current = status;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_changes() {
        let connectivity = Connectivity::new();
        let mut rx = connectivity.subscribe();
        assert_eq!(*rx.borrow(), NetworkStatus::Unknown);

        connectivity.report(NetworkStatus::Offline);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), NetworkStatus::Offline);
    }

    #[test]
    fn repeated_status_does_not_notify() {
        let connectivity = Connectivity::new();
        let mut rx = connectivity.subscribe();

        connectivity.report(NetworkStatus::Online);
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        connectivity.report(NetworkStatus::Online);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn dropping_receiver_unsubscribes() {
        let connectivity = Connectivity::new();
        let rx = connectivity.subscribe();
        assert_eq!(connectivity.subscriber_count(), 1);
        drop(rx);
        assert_eq!(connectivity.subscriber_count(), 0);
    }

    #[test]
    fn report_without_subscribers_still_updates() {
        let connectivity = Connectivity::new();
        connectivity.report(NetworkStatus::Offline);
        assert_eq!(*connectivity.subscribe().borrow(), NetworkStatus::Offline);
    }
}
