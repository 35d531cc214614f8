//! Configuracion del barista.
//!
//! Todos los parametros pueden sobreescribirse con variables de entorno:
//!
//! | Variable | Default |
//! |----------|---------|
//! | CAFE_PORT | 12345 |
//! | CAFE_BREW_TIME_MS | 30000 |
//! | CAFE_BREW_JITTER_MS | 0 |
//! | CAFE_BREW_FAILURE_RATE | 0.0 |
//! | CAFE_SLOT_RETRY_MS | 100 |
//! | CAFE_READY_POLL_MS | 600 |
//! | CAFE_LOG_FILE | server_logs.json |
//! | CAFE_LOG_LEVEL | info |
use std::{str::FromStr, time::Duration};

use log::LevelFilter;

use crate::constants::{
    BREW_FAILURE_RATE, BREW_JITTER_IN_MS, BREW_TIME_IN_MS, COFFEE_SLOTS, EVENT_LOG_FILE, PORT,
    READY_POLL_WAIT_IN_MS, SLOT_RETRY_WAIT_IN_MS, TEA_SLOTS,
};

#[derive(Debug, Clone)]
pub struct CafeConfig {
    pub port: u16,
    pub tea_slots: usize,
    pub coffee_slots: usize,
    /// Tiempo de espera entre intentos de tomar una estacion
    pub slot_retry: Duration,
    pub brew_time: Duration,
    /// Se suma un valor aleatorio en `[0, brew_jitter]` al tiempo de preparacion
    pub brew_jitter: Duration,
    /// Probabilidad (entre 0 y 1) de que una unidad falle
    pub brew_failure_rate: f64,
    pub ready_poll: Duration,
    pub event_log_file: String,
    pub log_level: LevelFilter,
}

impl Default for CafeConfig {
    fn default() -> Self {
        CafeConfig {
            port: PORT,
            tea_slots: TEA_SLOTS,
            coffee_slots: COFFEE_SLOTS,
            slot_retry: Duration::from_millis(SLOT_RETRY_WAIT_IN_MS),
            brew_time: Duration::from_millis(BREW_TIME_IN_MS),
            brew_jitter: Duration::from_millis(BREW_JITTER_IN_MS),
            brew_failure_rate: BREW_FAILURE_RATE,
            ready_poll: Duration::from_millis(READY_POLL_WAIT_IN_MS),
            event_log_file: EVENT_LOG_FILE.to_string(),
            log_level: LevelFilter::Info,
        }
    }
}

impl CafeConfig {
    /// Carga la configuracion desde variables de entorno.
    /// Si una variable no esta o no se puede parsear, se usa el valor por defecto.
    pub fn from_env() -> Self {
        let defaults = CafeConfig::default();
        CafeConfig {
            port: env_or("CAFE_PORT", defaults.port),
            tea_slots: defaults.tea_slots,
            coffee_slots: defaults.coffee_slots,
            slot_retry: env_millis_or("CAFE_SLOT_RETRY_MS", defaults.slot_retry),
            brew_time: env_millis_or("CAFE_BREW_TIME_MS", defaults.brew_time),
            brew_jitter: env_millis_or("CAFE_BREW_JITTER_MS", defaults.brew_jitter),
            brew_failure_rate: env_or("CAFE_BREW_FAILURE_RATE", defaults.brew_failure_rate)
                .clamp(0.0, 1.0),
            ready_poll: env_millis_or("CAFE_READY_POLL_MS", defaults.ready_poll),
            event_log_file: std::env::var("CAFE_LOG_FILE").unwrap_or(defaults.event_log_file),
            log_level: env_or("CAFE_LOG_LEVEL", defaults.log_level),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis_or(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_the_constants_as_defaults() {
        let config = CafeConfig::default();
        assert_eq!(12345, config.port);
        assert_eq!(2, config.tea_slots);
        assert_eq!(2, config.coffee_slots);
        assert_eq!(Duration::from_millis(100), config.slot_retry);
        assert_eq!(Duration::from_millis(30000), config.brew_time);
        assert_eq!("server_logs.json", config.event_log_file);
    }

    #[test]
    fn should_fall_back_to_default_on_unparsable_value() {
        std::env::set_var("CAFE_TEST_UNPARSABLE_PORT", "not a port");
        assert_eq!(8080u16, env_or("CAFE_TEST_UNPARSABLE_PORT", 8080u16));
        std::env::remove_var("CAFE_TEST_UNPARSABLE_PORT");
    }

    #[test]
    fn should_read_millis_from_env() {
        std::env::set_var("CAFE_TEST_BREW_MS", " 250 ");
        assert_eq!(
            Duration::from_millis(250),
            env_millis_or("CAFE_TEST_BREW_MS", Duration::from_secs(1))
        );
        std::env::remove_var("CAFE_TEST_BREW_MS");
    }
}
