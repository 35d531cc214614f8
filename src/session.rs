//! Conexion de un cliente: saludo con el nombre, lectura de comandos y
//! escritura de respuestas y avisos.
use std::{net::SocketAddr, sync::Arc};

use log::{debug, error, info, warn, Level};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines},
    net::TcpStream,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    barista::Barista,
    errors::CafeError,
    protocol::{self, Command},
    ready_notifier::WatchOutcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Estado de un cliente ya registrado
pub struct Session {
    name: String,
    barista: Arc<Barista>,
    outbox: UnboundedSender<String>,
    cancel: CancellationToken,
    watcher: Option<JoinHandle<WatchOutcome>>,
}

impl Session {
    pub fn new(
        name: String,
        barista: Arc<Barista>,
        outbox: UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Session {
        Session {
            name,
            barista,
            outbox,
            cancel,
            watcher: None,
        }
    }

    pub fn handle_line(&mut self, line: &str) -> Result<Flow, CafeError> {
        let Some(command) = Command::parse(line) else {
            return Ok(Flow::Continue);
        };
        debug!("[SESSION {}] Received command: {}", self.name, line.trim());
        self.barista
            .events()
            .record(Level::Info, &format!("Received Command {}", line.trim()));

        let flow = self.handle_command(command)?;
        if flow == Flow::Continue {
            self.watch_if_needed()?;
        }
        Ok(flow)
    }

    fn handle_command(&mut self, command: Command) -> Result<Flow, CafeError> {
        let engine = self.barista.engine();
        match command {
            Command::PlaceOrder(details) => {
                match engine.place_order(&self.name, &details, &self.cancel) {
                    Ok(placed) => {
                        info!("[SESSION {}] Order placed: {}", self.name, placed.counts);
                        self.reply(protocol::ORDER_PLACED)?;
                        self.barista.events().record(
                            Level::Info,
                            &format!("Order has been successfully placed by: {}", self.name),
                        );
                    }
                    Err(CafeError::EmptyOrder) => self.reply(protocol::ORDER_FAILED)?,
                    Err(CafeError::OrderTooLarge) => self.reply(&protocol::order_too_large())?,
                    Err(e) => return Err(e),
                }
            }
            Command::OrderStatus => {
                let status = engine.get_status(&self.name)?;
                self.reply(&protocol::order_status(&status))?;
            }
            Command::MissingOrderDetails => self.reply(protocol::MISSING_ORDER_DETAILS)?,
            Command::Collect => match engine.collect(&self.name)? {
                Some(counts) => self.reply(&protocol::collected(counts))?,
                None => self.reply(protocol::NOTHING_TO_COLLECT)?,
            },
            Command::Exit => {
                info!("[SESSION {}] Disconnected on exit", self.name);
                self.reply(protocol::GOODBYE)?;
                return Ok(Flow::Exit);
            }
            Command::Invalid(line) => {
                self.reply(protocol::INVALID_COMMAND)?;
                self.barista.events().record(
                    Level::Error,
                    &format!("Invalid command from: {} ({})", self.name, line),
                );
            }
        }
        Ok(Flow::Continue)
    }

    fn reply(&self, line: &str) -> Result<(), CafeError> {
        self.outbox
            .send(line.to_string())
            .map_err(|_| CafeError::Cancelled)
    }

    /// Lanza un observador nuevo si hay algo para avisar, reemplazando al anterior.
    /// El anterior solo se corta mientras espera, nunca con un aviso tomado y sin mandar.
    fn watch_if_needed(&mut self) -> Result<(), CafeError> {
        if !self.barista.notifier().should_watch(&self.name)? {
            return Ok(());
        }
        if let Some(previous) = self.watcher.take() {
            previous.abort();
        }
        self.watcher = Some(self.barista.notifier().spawn_watcher(
            &self.name,
            self.outbox.clone(),
            self.cancel.clone(),
        ));
        Ok(())
    }

    /// Corta todo lo pendiente del cliente y lo da de baja
    pub fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.barista.engine().remove_customer(&self.name) {
            error!("[SESSION {}] Could not remove client: {}", self.name, e);
        }
    }
}

pub async fn handle_connection(barista: Arc<Barista>, stream: TcpStream, addr: SocketAddr) {
    let (reader, writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let (outbox, inbox) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_lines(writer, inbox));
    let cancel = barista.shutdown_token().child_token();

    if let Err(e) = run_session(&barista, &mut lines, &outbox, &cancel).await {
        warn!("[SESSION] Connection {} ended with error: {}", addr, e);
        barista
            .events()
            .record(Level::Error, &format!("Error in the client handler: {}", e));
    }

    cancel.cancel();
    drop(outbox);
    match writer_task.await {
        Ok(Err(e)) => debug!("[SESSION] Writer for {} stopped: {}", addr, e),
        Err(e) => error!("[SESSION] Writer task for {} panicked: {}", addr, e),
        Ok(Ok(())) => {}
    }
    debug!("[SESSION] Connection {} closed", addr);
}

async fn run_session<R>(
    barista: &Arc<Barista>,
    lines: &mut Lines<R>,
    outbox: &UnboundedSender<String>,
    cancel: &CancellationToken,
) -> Result<(), CafeError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(name) = handshake(barista, lines, outbox, cancel).await? else {
        return Ok(());
    };
    let mut session = Session::new(name, barista.clone(), outbox.clone(), cancel.clone());

    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            line = lines.next_line() => match line {
                Ok(Some(line)) => match session.handle_line(&line) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Exit) => break Ok(()),
                    Err(e) => break Err(e),
                },
                Ok(None) => {
                    info!("[SESSION {}] Connection closed by the client", session.name);
                    break Ok(());
                }
                Err(e) => break Err(e.into()),
            }
        }
    };

    session.close();
    result
}

/// Lee el nombre y lo registra. `None` si se rechazo o el cliente se fue.
async fn handshake<R>(
    barista: &Arc<Barista>,
    lines: &mut Lines<R>,
    outbox: &UnboundedSender<String>,
    cancel: &CancellationToken,
) -> Result<Option<String>, CafeError>
where
    R: AsyncBufRead + Unpin,
{
    let line = tokio::select! {
        _ = cancel.cancelled() => return Ok(None),
        line = lines.next_line() => line?,
    };
    let Some(line) = line else {
        return Ok(None);
    };
    let name = line.trim().to_string();
    info!("[SESSION] New connection from: {}", name);

    if protocol::validate_name(&name).is_err() {
        send(outbox, protocol::BAD_NAME)?;
        barista
            .events()
            .record(Level::Error, &format!("Bad Customer Name: {}", name));
        return Ok(None);
    }
    match barista.engine().register_customer(&name) {
        Ok(()) => {}
        Err(CafeError::DuplicateName) => {
            send(outbox, protocol::NAME_TAKEN)?;
            barista
                .events()
                .record(Level::Error, &format!("Duplicated Customer Name: {}", name));
            return Ok(None);
        }
        Err(e) => return Err(e),
    }
    send(outbox, protocol::SUCCESS)?;
    Ok(Some(name))
}

fn send(outbox: &UnboundedSender<String>, line: &str) -> Result<(), CafeError> {
    outbox
        .send(line.to_string())
        .map_err(|_| CafeError::Cancelled)
}

async fn write_lines<W>(mut writer: W, mut inbox: UnboundedReceiver<String>) -> Result<(), CafeError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = inbox.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}
