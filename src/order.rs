//! Productos, cantidades y el parseo de pedidos
use std::fmt;

use regex::Regex;

use crate::{constants::MAX_UNITS_IN_AN_ORDER, errors::CafeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    Tea,
    Coffee,
}

/// Cantidad de unidades de cada producto en una etapa del pedido
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemCounts {
    pub tea: u32,
    pub coffee: u32,
}

impl ItemCounts {
    pub fn new(tea: u32, coffee: u32) -> ItemCounts {
        ItemCounts { tea, coffee }
    }

    pub fn unit(product: Product) -> ItemCounts {
        match product {
            Product::Tea => ItemCounts::new(1, 0),
            Product::Coffee => ItemCounts::new(0, 1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tea == 0 && self.coffee == 0
    }

    pub fn total(&self) -> u32 {
        self.tea.saturating_add(self.coffee)
    }

    pub fn add(&mut self, other: ItemCounts) {
        self.tea = self.tea.saturating_add(other.tea);
        self.coffee = self.coffee.saturating_add(other.coffee);
    }

    pub fn subtract(&mut self, other: ItemCounts) {
        self.tea = self.tea.saturating_sub(other.tea);
        self.coffee = self.coffee.saturating_sub(other.coffee);
    }
}

impl fmt::Display for ItemCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tea: {}, Coffee: {}", self.tea, self.coffee)
    }
}

/// Parsea descripciones de pedidos del estilo `2 tea and 1 coffee`.
///
/// Los items que no se reconocen no suman nada. Un item sin cantidad
/// (por ejemplo `tea`) tambien suma 0.
pub struct OrderParser {
    separator: Regex,
    item: Regex,
}

impl OrderParser {
    pub fn new() -> Result<OrderParser, CafeError> {
        Ok(OrderParser {
            separator: Regex::new(r"(?i)\s+and\s+")?,
            item: Regex::new(r"(?i)([0-9]+)\s*(tea|coffee)")?,
        })
    }

    /// Devuelve las cantidades de te y cafe del pedido.
    /// Falla si no hay ningun item o si se supera el maximo de unidades por pedido.
    pub fn parse(&self, description: &str) -> Result<ItemCounts, CafeError> {
        let mut counts = ItemCounts::default();
        for item in self.separator.split(description.trim()) {
            let Some(captures) = self.item.captures(item) else {
                continue;
            };
            // Solo hay digitos, asi que el unico error posible es que no entre en un u32.
            let quantity = captures[1]
                .parse::<u32>()
                .map_err(|_| CafeError::OrderTooLarge)?;
            match captures[2].to_lowercase().as_str() {
                "tea" => counts.tea = counts.tea.saturating_add(quantity),
                _ => counts.coffee = counts.coffee.saturating_add(quantity),
            }
        }

        if counts.is_empty() {
            return Err(CafeError::EmptyOrder);
        }
        if counts.total() > MAX_UNITS_IN_AN_ORDER {
            return Err(CafeError::OrderTooLarge);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> OrderParser {
        OrderParser::new().unwrap()
    }

    #[test]
    fn should_parse_tea_and_coffee() {
        let counts = parser().parse("2 tea and 1 coffee").unwrap();
        assert_eq!(ItemCounts::new(2, 1), counts);
    }

    #[test]
    fn should_ignore_case() {
        let counts = parser().parse("3 TEA AND 4 Coffee").unwrap();
        assert_eq!(ItemCounts::new(3, 4), counts);
    }

    #[test]
    fn should_sum_repeated_products() {
        let counts = parser().parse("1 tea and 2 coffee and 3 tea").unwrap();
        assert_eq!(ItemCounts::new(4, 2), counts);
    }

    #[test]
    fn should_ignore_unrecognised_items() {
        let counts = parser().parse("2 croissant and 1 tea and lots of coffee").unwrap();
        assert_eq!(ItemCounts::new(1, 0), counts);
    }

    #[test]
    fn should_not_split_words_containing_the_separator() {
        let counts = parser().parse("1 tea with sandwiches and 2 coffee").unwrap();
        assert_eq!(ItemCounts::new(1, 2), counts);
    }

    #[test]
    fn should_reject_an_order_without_items() {
        let result = parser().parse("tea and coffee");
        assert!(matches!(result, Err(CafeError::EmptyOrder)));
    }

    #[test]
    fn should_reject_an_order_over_the_limit() {
        let result = parser().parse("30 tea and 30 coffee");
        assert!(matches!(result, Err(CafeError::OrderTooLarge)));
    }

    #[test]
    fn should_reject_a_quantity_that_does_not_fit() {
        let result = parser().parse("99999999999 tea");
        assert!(matches!(result, Err(CafeError::OrderTooLarge)));
    }

    #[test]
    fn should_format_counts_for_display() {
        assert_eq!("Tea: 2, Coffee: 1", ItemCounts::new(2, 1).to_string());
    }

    #[test]
    fn should_not_go_below_zero_when_subtracting() {
        let mut counts = ItemCounts::new(1, 0);
        counts.subtract(ItemCounts::new(2, 1));
        assert!(counts.is_empty());
    }
}
