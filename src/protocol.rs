//! Comandos y respuestas del protocolo de lineas entre cliente y barista
use crate::{
    constants::{MAX_NAME_LENGTH, MAX_UNITS_IN_AN_ORDER, MIN_NAME_LENGTH},
    errors::CafeError,
    order::ItemCounts,
};

pub const SUCCESS: &str = "success";
pub const BAD_NAME: &str = "bad customer name";
pub const NAME_TAKEN: &str = "name already taken";
pub const ORDER_PLACED: &str = "your order has been placed.";
pub const ORDER_FAILED: &str = "Failed to place order. Please check your syntax and try again.";
pub const MISSING_ORDER_DETAILS: &str =
    "Invalid order command. Please specify the order details or type 'order status'.";
pub const NOTHING_TO_COLLECT: &str = "No order ready for collection.";
pub const INVALID_COMMAND: &str = "Invalid command. Please try again.";
pub const GOODBYE: &str = "goodbye :( ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    PlaceOrder(String),
    OrderStatus,
    MissingOrderDetails,
    Collect,
    Exit,
    Invalid(String),
}

impl Command {
    /// Interpreta una linea del cliente. `None` si la linea esta vacia.
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (verb, details) = match line.split_once(' ') {
            Some((verb, details)) => (verb, Some(details.trim())),
            None => (line, None),
        };

        let command = match verb.to_lowercase().as_str() {
            "order" => match details {
                Some(details) if details.eq_ignore_ascii_case("status") => Command::OrderStatus,
                Some(details) if !details.is_empty() => Command::PlaceOrder(details.to_string()),
                _ => Command::MissingOrderDetails,
            },
            "collect" => Command::Collect,
            "exit" => Command::Exit,
            _ => Command::Invalid(line.to_string()),
        };
        Some(command)
    }
}

/// El nombre debe tener entre 2 y 20 caracteres, solo letras y espacios.
pub fn validate_name(name: &str) -> Result<(), CafeError> {
    let length = name.chars().count();
    if length < MIN_NAME_LENGTH || length > MAX_NAME_LENGTH {
        return Err(CafeError::InvalidName);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_ascii_whitespace())
    {
        return Err(CafeError::InvalidName);
    }
    Ok(())
}

pub fn ready_notice(name: &str) -> String {
    format!("your order is ready for collection, {}!", name)
}

pub fn order_status(status: &str) -> String {
    format!("Order status: {}", status)
}

pub fn collected(counts: ItemCounts) -> String {
    format!("You collected your order: {}.", counts)
}

pub fn order_too_large() -> String {
    format!(
        "Failed to place order. You can order at most {} items at once.",
        MAX_UNITS_IN_AN_ORDER
    )
}
