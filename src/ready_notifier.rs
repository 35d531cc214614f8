//! Avisa al cliente cuando su pedido esta listo para retirar.
//!
//! Cada observador revisa el aviso de listo cada `poll_wait` mientras el
//! cliente tenga pedidos en curso, asi un mismo observador avisa cada pedido
//! que termina. El aviso se consume con `claim_ready`, asi aunque haya varios
//! observadores para el mismo cliente se manda un solo mensaje por pedido.
use std::{sync::Arc, time::Duration};

use log::{debug, error, Level};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{errors::CafeError, event_log::EventSink, order_store::OrderStore, protocol};

/// Como termino un observador
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Notified,
    NothingPending,
    Cancelled,
    Failed,
}

pub struct ReadyNotifier {
    store: Arc<OrderStore>,
    events: Arc<dyn EventSink>,
    poll_wait: Duration,
}

impl ReadyNotifier {
    pub fn new(
        store: Arc<OrderStore>,
        events: Arc<dyn EventSink>,
        poll_wait: Duration,
    ) -> ReadyNotifier {
        ReadyNotifier {
            store,
            events,
            poll_wait,
        }
    }

    /// Vale la pena observar si hay algo en curso o un aviso sin dar
    pub fn should_watch(&self, name: &str) -> Result<bool, CafeError> {
        if !self.store.is_registered(name)? {
            return Ok(false);
        }
        Ok(self.store.has_work_in_flight(name)? || self.store.is_ready(name)?)
    }

    pub fn spawn_watcher(
        self: &Arc<Self>,
        name: &str,
        outbox: UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> JoinHandle<WatchOutcome> {
        let notifier = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            match notifier.watch(&name, &outbox, &cancel).await {
                Ok(outcome) => {
                    debug!("[NOTIFIER {}] Finished: {:?}", name, outcome);
                    outcome
                }
                Err(e) => {
                    error!("[NOTIFIER {}] Stopped: {}", name, e);
                    WatchOutcome::Failed
                }
            }
        })
    }

    async fn watch(
        &self,
        name: &str,
        outbox: &UnboundedSender<String>,
        cancel: &CancellationToken,
    ) -> Result<WatchOutcome, CafeError> {
        let mut outcome = WatchOutcome::NothingPending;
        loop {
            // Se lee antes que el aviso: un pedido marca el aviso y despues deja de estar en curso.
            let in_flight = self.store.has_work_in_flight(name)?;
            if self.store.claim_ready(name)? {
                if outbox.send(protocol::ready_notice(name)).is_err() {
                    return Ok(WatchOutcome::Cancelled);
                }
                self.events.record(
                    Level::Info,
                    &format!("Order ready to be collected message for: {}", name),
                );
                outcome = WatchOutcome::Notified;
            }
            if !in_flight {
                return Ok(outcome);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(WatchOutcome::Cancelled),
                _ = tokio::time::sleep(self.poll_wait) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event_log::MemoryEventLog, order::ItemCounts};
    use tokio::sync::mpsc;

    fn notifier_with(store: &Arc<OrderStore>) -> Arc<ReadyNotifier> {
        Arc::new(ReadyNotifier::new(
            store.clone(),
            Arc::new(MemoryEventLog::new()),
            Duration::from_millis(5),
        ))
    }

    fn store_brewing(name: &str) -> Arc<OrderStore> {
        let store = Arc::new(OrderStore::new());
        store.register_customer(name).unwrap();
        store.set_waiting(name, ItemCounts::new(1, 0)).unwrap();
        store.move_waiting_to_brewing(name, &CancellationToken::new()).unwrap();
        store
    }

    #[tokio::test]
    async fn should_notify_once_when_the_order_finishes() {
        let store = store_brewing("Alice");
        let notifier = notifier_with(&store);
        let (outbox, mut inbox) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let first = notifier.spawn_watcher("Alice", outbox.clone(), cancel.clone());
        let second = notifier.spawn_watcher("Alice", outbox.clone(), cancel.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.add_to_tray("Alice", ItemCounts::new(1, 0), &cancel).unwrap();
        store.finalize_order("Alice", ItemCounts::new(1, 0), &cancel).unwrap();

        let outcomes = [first.await.unwrap(), second.await.unwrap()];
        drop(outbox);

        let mut notices = Vec::new();
        while let Some(line) = inbox.recv().await {
            notices.push(line);
        }
        assert_eq!(vec!["your order is ready for collection, Alice!".to_string()], notices);
        assert!(outcomes.contains(&WatchOutcome::Notified));
        assert!(outcomes.contains(&WatchOutcome::NothingPending));
    }

    #[tokio::test]
    async fn should_notify_every_order_that_finishes_while_watching() {
        let store = store_brewing("Alice");
        let cancel = CancellationToken::new();
        store.set_waiting("Alice", ItemCounts::new(0, 1)).unwrap();
        store.move_waiting_to_brewing("Alice", &cancel).unwrap();
        let notifier = notifier_with(&store);
        let (outbox, mut inbox) = mpsc::unbounded_channel();

        let watcher = notifier.spawn_watcher("Alice", outbox, cancel.clone());
        store.finalize_order("Alice", ItemCounts::new(1, 0), &cancel).unwrap();
        let first = tokio::time::timeout(Duration::from_secs(2), inbox.recv()).await.unwrap();
        assert_eq!(Some("your order is ready for collection, Alice!".to_string()), first);

        store.finalize_order("Alice", ItemCounts::new(0, 1), &cancel).unwrap();
        assert_eq!(WatchOutcome::Notified, watcher.await.unwrap());
        assert_eq!(
            Some("your order is ready for collection, Alice!".to_string()),
            inbox.recv().await
        );
        assert!(inbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn should_not_notify_after_the_tray_was_collected() {
        let store = Arc::new(OrderStore::new());
        store.register_customer("Alice").unwrap();
        store.finalize_order("Alice", ItemCounts::new(1, 0), &CancellationToken::new()).unwrap();
        store.clear_ready("Alice").unwrap();
        let notifier = notifier_with(&store);
        let (outbox, mut inbox) = mpsc::unbounded_channel();

        let outcome = notifier
            .spawn_watcher("Alice", outbox, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(WatchOutcome::NothingPending, outcome);
        assert!(inbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn should_stop_when_the_connection_closes() {
        let store = store_brewing("Alice");
        let notifier = notifier_with(&store);
        let (outbox, _inbox) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let watcher = notifier.spawn_watcher("Alice", outbox, cancel.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        assert_eq!(WatchOutcome::Cancelled, watcher.await.unwrap());
    }

    #[tokio::test]
    async fn should_watch_only_with_pending_work() {
        let store = Arc::new(OrderStore::new());
        store.register_customer("Alice").unwrap();
        let notifier = notifier_with(&store);
        assert_eq!(false, notifier.should_watch("Alice").unwrap());

        store.set_waiting("Alice", ItemCounts::new(0, 1)).unwrap();
        assert_eq!(true, notifier.should_watch("Alice").unwrap());
    }
}
