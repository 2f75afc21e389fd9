//! Priced line items shared by quotations and invoices.
//!
//! # Invariants
//! - Quantities are whole units >= 1; unit prices are non-negative cents.
//! - Totals are always derived from items, never stored.

use super::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable line item identifier.
pub type LineItemId = Uuid;

/// One priced row on a quotation or invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Display position within the document, 0-based.
    pub position: u32,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            quantity,
            unit_price_cents,
            position: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("description", &self.description)?;
        if self.quantity < 1 {
            return Err(ValidationError::NonPositiveQuantity(self.quantity));
        }
        if self.unit_price_cents < 0 {
            return Err(ValidationError::NegativeUnitPrice(self.unit_price_cents));
        }
        Ok(())
    }

    pub fn line_total_cents(&self) -> i64 {
        self.quantity * self.unit_price_cents
    }
}

/// Derived money totals for a priced document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Computes subtotal/tax/total for a set of items.
///
/// Tax is applied on the subtotal in basis points, rounded down to whole
/// cents.
pub fn compute_totals(items: &[LineItem], tax_rate_bp: u32) -> DocumentTotals {
    let subtotal_cents: i64 = items.iter().map(LineItem::line_total_cents).sum();
    let tax_cents = subtotal_cents * i64::from(tax_rate_bp) / 10_000;
    DocumentTotals {
        subtotal_cents,
        tax_cents,
        total_cents: subtotal_cents + tax_cents,
    }
}

/// Validates a whole item set and normalizes display positions in order.
pub fn normalize_items(items: &mut [LineItem]) -> Result<(), ValidationError> {
    for (index, item) in items.iter_mut().enumerate() {
        item.validate()?;
        item.position = index as u32;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{compute_totals, LineItem};

    #[test]
    fn totals_apply_basis_point_tax_rounded_down() {
        let items = vec![
            LineItem::new("General pest treatment", 2, 7_500),
            LineItem::new("Rodent station", 3, 1_999),
        ];
        // subtotal 20997, 21% -> 4409.37 truncated to 4409
        let totals = compute_totals(&items, 2_100);
        assert_eq!(totals.subtotal_cents, 20_997);
        assert_eq!(totals.tax_cents, 4_409);
        assert_eq!(totals.total_cents, 25_406);
    }

    #[test]
    fn zero_rate_keeps_total_equal_to_subtotal() {
        let items = vec![LineItem::new("Deep clean", 1, 12_000)];
        let totals = compute_totals(&items, 0);
        assert_eq!(totals.tax_cents, 0);
        assert_eq!(totals.total_cents, 12_000);
    }
}
