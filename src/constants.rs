//! Parametros de configuracion de la cafeteria

/// Puerto en el que escucha el barista
pub const PORT: u16 = 12345;

/// Cantidad de estaciones de preparacion de te que pueden trabajar a la vez
pub const TEA_SLOTS: usize = 2;

/// Cantidad de estaciones de preparacion de cafe que pueden trabajar a la vez
pub const COFFEE_SLOTS: usize = 2;

/// Tiempo de espera entre reintentos cuando no hay una estacion libre
pub const SLOT_RETRY_WAIT_IN_MS: u64 = 100;

/// Tiempo que tarda en prepararse una unidad (un te o un cafe)
pub const BREW_TIME_IN_MS: u64 = 30000;

/// Variacion aleatoria maxima que se le suma al tiempo de preparacion
pub const BREW_JITTER_IN_MS: u64 = 0;

/// Probabilidad de que falle la preparacion de una unidad
pub const BREW_FAILURE_RATE: f64 = 0.0;

/// Cada cuanto se revisa si el pedido de un cliente esta listo
pub const READY_POLL_WAIT_IN_MS: u64 = 600;

/// Largo minimo del nombre de un cliente
pub const MIN_NAME_LENGTH: usize = 2;

/// Largo maximo del nombre de un cliente
pub const MAX_NAME_LENGTH: usize = 20;

/// Cantidad maxima de unidades (te + cafe) que puede tener un pedido.
/// Por ejemplo, suponiendo que es 50, no se puede pedir `30 tea and 30 coffee`.
pub const MAX_UNITS_IN_AN_ORDER: u32 = 50;

/// Archivo donde se persiste el registro de eventos en formato JSON
pub const EVENT_LOG_FILE: &str = "server_logs.json";
