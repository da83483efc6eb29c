//! Inventory arithmetic shared by the database layer and the API.
//!
//! A level is the pair `(quantity, reserved)`; `available = quantity - reserved`.
//! Every transition keeps `quantity >= 0` and `0 <= reserved <= quantity`.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("quantity change {change} would take stock from {quantity} below zero")]
    NegativeQuantity { quantity: i32, change: i32 },

    #[error("quantity {new_quantity} would fall below reserved quantity {reserved}")]
    BelowReserved { new_quantity: i32, reserved: i32 },

    #[error("cannot reserve {requested}: only {available} available")]
    InsufficientAvailable { requested: i32, available: i32 },

    #[error("cannot release {requested}: only {reserved} reserved")]
    ReleaseExceedsReserved { requested: i32, reserved: i32 },

    #[error("quantity must be positive, got {0}")]
    NonPositiveAmount(i32),

    #[error("quantity change must be non-zero")]
    ZeroChange,

    #[error("quantity arithmetic overflowed")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InventoryLevel {
    pub quantity: i32,
    pub reserved: i32,
}

impl InventoryLevel {
    #[must_use]
    pub fn new(quantity: i32, reserved: i32) -> Self {
        Self { quantity, reserved }
    }

    #[must_use]
    pub fn available(&self) -> i32 {
        self.quantity - self.reserved
    }

    /// Apply a signed quantity delta.
    ///
    /// # Errors
    ///
    /// Fails when the delta is zero, when stock would go negative, or when
    /// the new quantity would no longer cover the reserved units.
    pub fn apply_change(&self, change: i32) -> Result<Self, InventoryError> {
        if change == 0 {
            return Err(InventoryError::ZeroChange);
        }
        let new_quantity = self
            .quantity
            .checked_add(change)
            .ok_or(InventoryError::Overflow)?;
        if new_quantity < 0 {
            return Err(InventoryError::NegativeQuantity {
                quantity: self.quantity,
                change,
            });
        }
        if new_quantity < self.reserved {
            return Err(InventoryError::BelowReserved {
                new_quantity,
                reserved: self.reserved,
            });
        }
        Ok(Self::new(new_quantity, self.reserved))
    }

    /// Replace the on-hand quantity, returning the new level and the delta.
    ///
    /// Channel-reported stock is authoritative, so reservations larger than
    /// the new quantity are clamped down to it.
    ///
    /// # Errors
    ///
    /// Fails when `quantity` is negative.
    pub fn set_quantity(&self, quantity: i32) -> Result<(Self, i32), InventoryError> {
        if quantity < 0 {
            return Err(InventoryError::NegativeQuantity {
                quantity: self.quantity,
                change: quantity - self.quantity,
            });
        }
        let delta = quantity
            .checked_sub(self.quantity)
            .ok_or(InventoryError::Overflow)?;
        Ok((Self::new(quantity, self.reserved.min(quantity)), delta))
    }

    /// # Errors
    ///
    /// Fails when `amount` is not positive or exceeds available stock.
    pub fn reserve(&self, amount: i32) -> Result<Self, InventoryError> {
        if amount <= 0 {
            return Err(InventoryError::NonPositiveAmount(amount));
        }
        if amount > self.available() {
            return Err(InventoryError::InsufficientAvailable {
                requested: amount,
                available: self.available(),
            });
        }
        Ok(Self::new(self.quantity, self.reserved + amount))
    }

    /// # Errors
    ///
    /// Fails when `amount` is not positive or exceeds the reserved units.
    pub fn release(&self, amount: i32) -> Result<Self, InventoryError> {
        if amount <= 0 {
            return Err(InventoryError::NonPositiveAmount(amount));
        }
        if amount > self.reserved {
            return Err(InventoryError::ReleaseExceedsReserved {
                requested: amount,
                reserved: self.reserved,
            });
        }
        Ok(Self::new(self.quantity, self.reserved - amount))
    }
}
