//! Estado de los pedidos de cada cliente.
//!
//! Cada etapa (espera, preparacion, bandeja) tiene su propio lock, asi las
//! operaciones sobre etapas distintas no se bloquean entre si. Cuando hace falta
//! tomar dos locks a la vez el orden es siempre: preparacion, espera.
//!
//! Las escrituras que hacen las tareas de preparacion reciben el token de la
//! sesion y lo revisan con el lock tomado. Como la sesion cancela su token
//! antes de llamar a `remove_customer`, una tarea vieja nunca escribe sobre
//! un cliente nuevo que se registro con el mismo nombre.
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::{errors::CafeError, order::ItemCounts};

/// Lo que queda por preparar de los pedidos en curso de un cliente
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BrewingRecord {
    remaining: ItemCounts,
    orders_in_progress: u32,
}

/// Foto de las tres etapas de un cliente. `None` significa que la etapa esta vacia.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub waiting: Option<ItemCounts>,
    pub brewing: Option<ItemCounts>,
    pub tray: Option<ItemCounts>,
}

#[derive(Default)]
pub struct OrderStore {
    customers: Mutex<HashSet<String>>,
    waiting: Mutex<HashMap<String, ItemCounts>>,
    brewing: Mutex<HashMap<String, BrewingRecord>>,
    tray: Mutex<HashMap<String, ItemCounts>>,
    ready: Mutex<HashSet<String>>,
}

impl OrderStore {
    pub fn new() -> OrderStore {
        OrderStore::default()
    }

    pub fn register_customer(&self, name: &str) -> Result<(), CafeError> {
        {
            let mut customers = self.customers.lock()?;
            if !customers.insert(name.to_string()) {
                return Err(CafeError::DuplicateName);
            }
        }
        info!("[BARISTA] Added client: {}", name);
        self.log_state()
    }

    /// Borra todo lo asociado al cliente. Si no existe no hace nada.
    pub fn remove_customer(&self, name: &str) -> Result<(), CafeError> {
        let removed = self.customers.lock()?.remove(name);
        self.waiting.lock()?.remove(name);
        self.brewing.lock()?.remove(name);
        self.tray.lock()?.remove(name);
        self.ready.lock()?.remove(name);
        if removed {
            info!("[BARISTA] Removed client: {}", name);
            self.log_state()?;
        }
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> Result<bool, CafeError> {
        Ok(self.customers.lock()?.contains(name))
    }

    /// Un pedido nuevo pisa al que estaba esperando y descarta el aviso de listo pendiente.
    pub fn set_waiting(&self, name: &str, counts: ItemCounts) -> Result<(), CafeError> {
        self.ready.lock()?.remove(name);
        self.waiting.lock()?.insert(name.to_string(), counts);
        debug!("[BARISTA] Order added to waiting area for {}: {}", name, counts);
        Ok(())
    }

    /// Pasa el pedido en espera a preparacion. Devuelve `None` si no habia nada
    /// esperando o si la sesion ya se cerro.
    pub fn move_waiting_to_brewing(
        &self,
        name: &str,
        session: &CancellationToken,
    ) -> Result<Option<ItemCounts>, CafeError> {
        let mut brewing = self.brewing.lock()?;
        let mut waiting = self.waiting.lock()?;
        if session.is_cancelled() {
            return Ok(None);
        }
        let Some(counts) = waiting.remove(name) else {
            return Ok(None);
        };
        let record = brewing.entry(name.to_string()).or_default();
        record.remaining.add(counts);
        record.orders_in_progress += 1;
        debug!("[BARISTA] Order moved from waiting to brewing area for {}: {}", name, counts);
        Ok(Some(counts))
    }

    /// Saca una unidad terminada (o fallida) de la etapa de preparacion.
    pub fn release_brewing(
        &self,
        name: &str,
        unit: ItemCounts,
        session: &CancellationToken,
    ) -> Result<(), CafeError> {
        let mut brewing = self.brewing.lock()?;
        if session.is_cancelled() {
            return Ok(());
        }
        if let Some(record) = brewing.get_mut(name) {
            record.remaining.subtract(unit);
        }
        Ok(())
    }

    /// Suma a la bandeja. Devuelve `false` sin tocar nada si la sesion ya se cerro.
    pub fn add_to_tray(
        &self,
        name: &str,
        delta: ItemCounts,
        session: &CancellationToken,
    ) -> Result<bool, CafeError> {
        let mut tray = self.tray.lock()?;
        if session.is_cancelled() {
            return Ok(false);
        }
        tray.entry(name.to_string()).or_default().add(delta);
        Ok(true)
    }

    /// Cierra un pedido: marca el aviso de listo (solo si se entrego algo) y
    /// despues lo saca de la etapa de preparacion.
    pub fn finalize_order(
        &self,
        name: &str,
        delivered: ItemCounts,
        session: &CancellationToken,
    ) -> Result<(), CafeError> {
        if !delivered.is_empty() {
            let mut ready = self.ready.lock()?;
            if session.is_cancelled() {
                return Ok(());
            }
            ready.insert(name.to_string());
        }
        let mut brewing = self.brewing.lock()?;
        if session.is_cancelled() {
            return Ok(());
        }
        let last_order = match brewing.get_mut(name) {
            Some(record) => {
                record.orders_in_progress = record.orders_in_progress.saturating_sub(1);
                record.orders_in_progress == 0
            }
            None => false,
        };
        if last_order {
            brewing.remove(name);
        }
        debug!("[BARISTA] Order brewing finished for {}: {}", name, delivered);
        Ok(())
    }

    /// Retira lo que hay en la bandeja. `None` si no habia nada para retirar.
    pub fn take_tray(&self, name: &str) -> Result<Option<ItemCounts>, CafeError> {
        let taken = self.tray.lock()?.remove(name);
        Ok(taken.filter(|counts| !counts.is_empty()))
    }

    pub fn clear_ready(&self, name: &str) -> Result<(), CafeError> {
        self.ready.lock()?.remove(name);
        Ok(())
    }

    /// Lee y limpia el aviso de listo en un solo paso, asi solo un observador lo ve.
    pub fn claim_ready(&self, name: &str) -> Result<bool, CafeError> {
        Ok(self.ready.lock()?.remove(name))
    }

    pub fn is_ready(&self, name: &str) -> Result<bool, CafeError> {
        Ok(self.ready.lock()?.contains(name))
    }

    /// Indica si el cliente tiene algun pedido esperando o en preparacion.
    pub fn has_work_in_flight(&self, name: &str) -> Result<bool, CafeError> {
        let brewing = self.brewing.lock()?;
        let waiting = self.waiting.lock()?;
        Ok(brewing.contains_key(name) || waiting.contains_key(name))
    }

    pub fn status_snapshot(&self, name: &str) -> Result<StatusSnapshot, CafeError> {
        let waiting = self.waiting.lock()?.get(name).copied();
        let brewing = self.brewing.lock()?.get(name).map(|record| record.remaining);
        let tray = self.tray.lock()?.get(name).copied();
        Ok(StatusSnapshot {
            waiting: waiting.filter(|counts| !counts.is_empty()),
            brewing: brewing.filter(|counts| !counts.is_empty()),
            tray: tray.filter(|counts| !counts.is_empty()),
        })
    }

    pub fn log_state(&self) -> Result<(), CafeError> {
        let customers = self.customers.lock()?.len();
        let waiting = self.waiting.lock()?.clone();
        let brewing = self.brewing.lock()?.clone();
        let tray = self.tray.lock()?.clone();
        info!(
            "[BARISTA] Clients in the cafe: {} | waiting for orders: {} | brewing: {} | with tray: {}",
            customers,
            waiting.len(),
            brewing.len(),
            tray.len()
        );
        debug!("[BARISTA] Waiting area: {:?}", waiting);
        debug!("[BARISTA] Brewing area: {:?}", brewing);
        debug!("[BARISTA] Tray area: {:?}", tray);
        Ok(())
    }
}
