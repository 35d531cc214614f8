//! Orquesta los pedidos: los deja en espera, lanza una tarea por pedido que
//! prepara todas sus unidades en paralelo y, cuando terminan, lo pasa a la bandeja.
use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn, Level};
use rand::Rng;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    brewing_scheduler::BrewingScheduler,
    config::CafeConfig,
    errors::CafeError,
    event_log::EventSink,
    order::{ItemCounts, OrderParser, Product},
    order_store::{OrderStore, StatusSnapshot},
};

/// Como se simula la preparacion de una unidad
#[derive(Debug, Clone, Copy)]
pub struct BrewSettings {
    pub brew_time: Duration,
    pub brew_jitter: Duration,
    pub failure_rate: f64,
}

impl BrewSettings {
    pub fn from_config(config: &CafeConfig) -> BrewSettings {
        BrewSettings {
            brew_time: config.brew_time,
            brew_jitter: config.brew_jitter,
            failure_rate: config.brew_failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Devuelve cuanto va a tardar la unidad y si va a fallar
    fn sample(&self) -> (Duration, bool) {
        let mut rng = rand::thread_rng();
        let jitter_ms = self.brew_jitter.as_millis() as u64;
        let extra = if jitter_ms > 0 {
            rng.gen_range(0, jitter_ms + 1)
        } else {
            0
        };
        let fails = self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate);
        (self.brew_time + Duration::from_millis(extra), fails)
    }
}

/// Pedido aceptado. `pipeline` termina cuando el pedido llega a la bandeja.
pub struct PlacedOrder {
    pub counts: ItemCounts,
    pub pipeline: JoinHandle<()>,
}

pub struct OrderEngine {
    store: Arc<OrderStore>,
    scheduler: Arc<BrewingScheduler>,
    parser: OrderParser,
    events: Arc<dyn EventSink>,
    brew: BrewSettings,
}

impl OrderEngine {
    pub fn new(
        store: Arc<OrderStore>,
        scheduler: Arc<BrewingScheduler>,
        events: Arc<dyn EventSink>,
        brew: BrewSettings,
    ) -> Result<OrderEngine, CafeError> {
        Ok(OrderEngine {
            store,
            scheduler,
            parser: OrderParser::new()?,
            events,
            brew,
        })
    }

    #[cfg(test)]
    pub fn store(&self) -> &Arc<OrderStore> {
        &self.store
    }

    pub fn register_customer(&self, name: &str) -> Result<(), CafeError> {
        self.store.register_customer(name)?;
        self.events
            .record(Level::Info, &format!("New Connection: {}", name));
        Ok(())
    }

    pub fn remove_customer(&self, name: &str) -> Result<(), CafeError> {
        self.store.remove_customer(name)?;
        self.events
            .record(Level::Info, &format!("{} Disconnected", name));
        Ok(())
    }

    /// Parsea el pedido, lo deja en espera y lanza su preparacion en segundo plano.
    /// `cancel` es el token de la sesion del cliente.
    pub fn place_order(
        self: &Arc<Self>,
        name: &str,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<PlacedOrder, CafeError> {
        let counts = self.parser.parse(description)?;
        self.store.set_waiting(name, counts)?;
        self.events.record(
            Level::Info,
            &format!("Order is added to waiting area for: {}", name),
        );

        let engine = self.clone();
        let customer = name.to_string();
        let cancel = cancel.clone();
        let pipeline = tokio::spawn(async move {
            engine.brew_order(customer, cancel).await;
        });
        info!("[BARISTA] Started brewing {} for {}", counts, name);
        Ok(PlacedOrder { counts, pipeline })
    }

    async fn brew_order(self: Arc<Self>, name: String, cancel: CancellationToken) {
        let counts = match self.store.move_waiting_to_brewing(&name, &cancel) {
            Ok(Some(counts)) => counts,
            Ok(None) => {
                debug!("[BARISTA] Nothing waiting for {}, already taken or gone", name);
                return;
            }
            Err(e) => {
                error!("[BARISTA] Could not move order of {} to brewing: {}", name, e);
                return;
            }
        };
        self.events.record(
            Level::Info,
            &format!("Order moved from waiting area to brewing area for: {}", name),
        );

        let mut units = JoinSet::new();
        for (product, quantity) in [(Product::Tea, counts.tea), (Product::Coffee, counts.coffee)] {
            for number in 1..=quantity {
                let engine = self.clone();
                let name = name.clone();
                let cancel = cancel.clone();
                units.spawn(async move { engine.brew_unit(&name, product, number, &cancel).await });
            }
        }

        let mut delivered = ItemCounts::default();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(Ok(unit)) => delivered.add(unit),
                Ok(Err(CafeError::Cancelled)) => {}
                Ok(Err(e)) => {
                    warn!("[BARISTA] A unit for {} was not delivered: {}", name, e);
                    self.events.record(
                        Level::Error,
                        &format!("Brewing failed for: {} ({})", name, e),
                    );
                }
                Err(e) => error!("[BARISTA] Brewing task for {} panicked: {}", name, e),
            }
        }

        if cancel.is_cancelled() {
            info!("[BARISTA] {} left, dropping the rest of the order", name);
            return;
        }

        if let Err(e) = self.store.finalize_order(&name, delivered, &cancel) {
            error!("[BARISTA] Could not finalize order of {}: {}", name, e);
            return;
        }
        info!("[BARISTA] Order moved to tray area for {}: {}", name, delivered);
        self.events.record(
            Level::Info,
            &format!("Order moved from brewing to tray area for: {}", name),
        );
    }

    async fn brew_unit(
        &self,
        name: &str,
        product: Product,
        number: u32,
        cancel: &CancellationToken,
    ) -> Result<ItemCounts, CafeError> {
        let unit = ItemCounts::unit(product);
        let result = self
            .scheduler
            .run_unit(product, cancel, self.brew_one(name, product, number, cancel))
            .await;
        if result.is_err() {
            self.store.release_brewing(name, unit, cancel)?;
        }
        result
    }

    /// Prepara una unidad teniendo ya la estacion tomada.
    /// Una vez empezada no se corta aunque el cliente se vaya.
    async fn brew_one(
        &self,
        name: &str,
        product: Product,
        number: u32,
        cancel: &CancellationToken,
    ) -> Result<ItemCounts, CafeError> {
        let (duration, fails) = self.brew.sample();
        if let Ok(busy) = self.scheduler.active(product) {
            debug!(
                "[BARISTA] Brewing {:?} {} for {} ({} stations busy)",
                product, number, name, busy
            );
        }
        tokio::time::sleep(duration).await;

        if fails {
            return Err(CafeError::BrewFailed);
        }
        let unit = ItemCounts::unit(product);
        self.store.release_brewing(name, unit, cancel)?;
        if !self.store.add_to_tray(name, unit, cancel)? {
            return Err(CafeError::Cancelled);
        }
        debug!("[BARISTA] {:?} {} added to tray area for {}", product, number, name);
        Ok(unit)
    }

    pub fn get_status(&self, name: &str) -> Result<String, CafeError> {
        let snapshot = self.store.status_snapshot(name)?;
        Ok(format_status(name, &snapshot))
    }

    /// Retira la bandeja. Devuelve `None` si no habia nada listo.
    pub fn collect(&self, name: &str) -> Result<Option<ItemCounts>, CafeError> {
        let Some(collected) = self.store.take_tray(name)? else {
            return Ok(None);
        };
        self.store.clear_ready(name)?;
        info!("[BARISTA] Order collected for {}: {}", name, collected);
        self.events
            .record(Level::Info, &format!("Order collected for: {}", name));
        Ok(Some(collected))
    }
}

fn format_stage(stage: Option<ItemCounts>) -> String {
    stage.map_or_else(|| "0".to_string(), |counts| counts.to_string())
}

pub fn format_status(name: &str, snapshot: &StatusSnapshot) -> String {
    format!(
        "Order status for {}: Waiting: {}; Brewing: {}; Tray: {}.",
        name,
        format_stage(snapshot.waiting),
        format_stage(snapshot.brewing),
        format_stage(snapshot.tray)
    )
}
