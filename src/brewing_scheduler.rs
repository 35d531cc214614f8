//! Estaciones de preparacion compartidas por todos los clientes.
//!
//! Hay un pool por producto con una capacidad fija. Una unidad que no
//! encuentra estacion libre reintenta cada `retry_wait` hasta conseguirla o
//! hasta que se cancele su sesion.
use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{debug, error, warn};
use tokio_util::sync::CancellationToken;

use crate::{errors::CafeError, order::Product};

/// Contador de estaciones ocupadas de un producto
pub struct SlotPool {
    product: Product,
    capacity: usize,
    active: Mutex<usize>,
}

impl SlotPool {
    pub fn new(product: Product, capacity: usize) -> SlotPool {
        SlotPool {
            product,
            capacity,
            active: Mutex::new(0),
        }
    }

    fn try_acquire(&self) -> Result<bool, CafeError> {
        let mut active = self.active.lock()?;
        if *active < self.capacity {
            *active += 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn release(&self) {
        match self.active.lock() {
            Ok(mut active) => *active = active.saturating_sub(1),
            Err(_) => error!("[SCHEDULER] Error releasing a {:?} slot", self.product),
        }
    }

    pub fn active(&self) -> Result<usize, CafeError> {
        Ok(*self.active.lock()?)
    }
}

/// Estacion tomada. Se libera al salir de scope, por cualquier camino.
pub struct SlotGuard {
    pool: Arc<SlotPool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.pool.release();
        debug!("[SCHEDULER] Released a {:?} slot", self.pool.product);
    }
}

pub struct BrewingScheduler {
    tea: Arc<SlotPool>,
    coffee: Arc<SlotPool>,
    retry_wait: Duration,
}

impl BrewingScheduler {
    pub fn new(tea_slots: usize, coffee_slots: usize, retry_wait: Duration) -> BrewingScheduler {
        BrewingScheduler {
            tea: Arc::new(SlotPool::new(Product::Tea, tea_slots)),
            coffee: Arc::new(SlotPool::new(Product::Coffee, coffee_slots)),
            retry_wait,
        }
    }

    fn pool(&self, product: Product) -> &Arc<SlotPool> {
        match product {
            Product::Tea => &self.tea,
            Product::Coffee => &self.coffee,
        }
    }

    pub fn active(&self, product: Product) -> Result<usize, CafeError> {
        self.pool(product).active()
    }

    /// Espera hasta que haya una estacion libre para `product`.
    /// Si se cancela mientras espera devuelve `CafeError::Cancelled` sin haber tomado nada.
    pub async fn acquire_slot(
        &self,
        product: Product,
        cancel: &CancellationToken,
    ) -> Result<SlotGuard, CafeError> {
        let pool = self.pool(product);
        let mut attempts: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(CafeError::Cancelled);
            }
            if pool.try_acquire()? {
                debug!(
                    "[SCHEDULER] Took a {:?} slot after {} retries",
                    product, attempts
                );
                return Ok(SlotGuard { pool: pool.clone() });
            }
            attempts += 1;
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("[SCHEDULER] Cancelled while waiting for a {:?} slot", product);
                    return Err(CafeError::Cancelled);
                }
                _ = tokio::time::sleep(self.retry_wait) => {}
            }
        }
    }

    /// Toma una estacion, ejecuta `work` y libera la estacion, salga bien o mal.
    pub async fn run_unit<F, T>(
        &self,
        product: Product,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<T, CafeError>
    where
        F: Future<Output = Result<T, CafeError>>,
    {
        let _slot = self.acquire_slot(product, cancel).await?;
        work.await
    }
}
