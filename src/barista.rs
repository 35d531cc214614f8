use std::sync::Arc;

use log::{error, info, Level};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::{
    brewing_scheduler::BrewingScheduler,
    config::CafeConfig,
    errors::CafeError,
    event_log::EventSink,
    order_engine::{BrewSettings, OrderEngine},
    order_store::OrderStore,
    ready_notifier::ReadyNotifier,
    session,
};

pub struct Barista {
    config: CafeConfig,
    engine: Arc<OrderEngine>,
    notifier: Arc<ReadyNotifier>,
    events: Arc<dyn EventSink>,
    shutdown: CancellationToken,
}

impl Barista {
    pub fn new(config: CafeConfig, events: Arc<dyn EventSink>) -> Result<Barista, CafeError> {
        let store = Arc::new(OrderStore::new());
        let scheduler = Arc::new(BrewingScheduler::new(
            config.tea_slots,
            config.coffee_slots,
            config.slot_retry,
        ));
        let engine = OrderEngine::new(
            store.clone(),
            scheduler,
            events.clone(),
            BrewSettings::from_config(&config),
        )?;
        let notifier = ReadyNotifier::new(store, events.clone(), config.ready_poll);

        Ok(Barista {
            config,
            engine: Arc::new(engine),
            notifier: Arc::new(notifier),
            events,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn engine(&self) -> &Arc<OrderEngine> {
        &self.engine
    }

    pub fn notifier(&self) -> &Arc<ReadyNotifier> {
        &self.notifier
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub async fn bind(&self) -> Result<TcpListener, CafeError> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port)).await?;
        Ok(listener)
    }

    /// Acepta clientes hasta que se cancele `shutdown_token`. Cada cliente tiene su propia tarea.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), CafeError> {
        let addr = listener.local_addr()?;
        info!("[BARISTA] Barista is running and listening on {}", addr);
        self.events.record(
            Level::Info,
            &format!("Barista has started listening on: {}", addr.port()),
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("[BARISTA] Shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("[BARISTA] New customer connected: {}", addr);
                        tokio::spawn(session::handle_connection(self.clone(), stream, addr));
                    }
                    Err(e) => {
                        error!("[BARISTA] Failed to accept connection: {}", e);
                        self.events.record(Level::Error, "Server error accepting a connection");
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{event_log::MemoryEventLog, protocol};
    use std::{net::SocketAddr, time::Duration};
    use tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
        net::{tcp::OwnedReadHalf, tcp::OwnedWriteHalf, TcpStream},
    };

    pub fn quick_config() -> CafeConfig {
        CafeConfig {
            port: 0,
            slot_retry: Duration::from_millis(5),
            brew_time: Duration::from_millis(30),
            ready_poll: Duration::from_millis(5),
            ..CafeConfig::default()
        }
    }

    struct Client {
        lines: Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl Client {
        async fn connect(addr: SocketAddr) -> Client {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (reader, writer) = stream.into_split();
            Client {
                lines: BufReader::new(reader).lines(),
                writer,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
        }

        async fn receive(&mut self) -> Option<String> {
            tokio::time::timeout(Duration::from_secs(2), self.lines.next_line())
                .await
                .unwrap()
                .unwrap()
        }
    }

    async fn start() -> (Arc<Barista>, SocketAddr, Arc<MemoryEventLog>) {
        let events = Arc::new(MemoryEventLog::new());
        let barista = Arc::new(Barista::new(quick_config(), events.clone()).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(barista.clone().serve(listener));
        (barista, addr, events)
    }

    #[tokio::test]
    async fn should_serve_a_full_order_cycle() {
        let (barista, addr, _) = start().await;
        let mut alice = Client::connect(addr).await;

        alice.send("Alice").await;
        assert_eq!(Some("success".to_string()), alice.receive().await);

        alice.send("order 2 tea and 1 coffee").await;
        assert_eq!(Some(protocol::ORDER_PLACED.to_string()), alice.receive().await);
        assert_eq!(
            Some("your order is ready for collection, Alice!".to_string()),
            alice.receive().await
        );

        alice.send("order status").await;
        assert_eq!(
            Some(
                "Order status: Order status for Alice: Waiting: 0; Brewing: 0; Tray: Tea: 2, Coffee: 1."
                    .to_string()
            ),
            alice.receive().await
        );
        alice.send("collect").await;
        assert_eq!(
            Some("You collected your order: Tea: 2, Coffee: 1.".to_string()),
            alice.receive().await
        );

        alice.send("exit").await;
        assert_eq!(Some("goodbye :( ".to_string()), alice.receive().await);
        assert_eq!(None, alice.receive().await);
        assert_eq!(false, barista.engine().store().is_registered("Alice").unwrap());
        barista.shutdown_token().cancel();
    }

    #[tokio::test]
    async fn should_reject_a_malformed_name() {
        let (barista, addr, events) = start().await;
        let mut client = Client::connect(addr).await;

        client.send("a1").await;

        assert_eq!(Some("bad customer name".to_string()), client.receive().await);
        assert_eq!(None, client.receive().await);
        assert_eq!(false, barista.engine().store().is_registered("a1").unwrap());
        assert!(events.contains(Level::Error, "Bad Customer Name: a1"));
        barista.shutdown_token().cancel();
    }

    #[tokio::test]
    async fn should_reject_a_name_already_connected() {
        let (barista, addr, _) = start().await;
        let mut first = Client::connect(addr).await;
        first.send("Alice").await;
        assert_eq!(Some("success".to_string()), first.receive().await);

        let mut second = Client::connect(addr).await;
        second.send("Alice").await;

        assert_eq!(Some("name already taken".to_string()), second.receive().await);
        barista.shutdown_token().cancel();
    }

    #[tokio::test]
    async fn should_unregister_a_client_that_drops_the_connection() {
        let (barista, addr, _) = start().await;
        let mut client = Client::connect(addr).await;
        client.send("Alice").await;
        assert_eq!(Some("success".to_string()), client.receive().await);

        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(false, barista.engine().store().is_registered("Alice").unwrap());
        barista.shutdown_token().cancel();
    }
}
