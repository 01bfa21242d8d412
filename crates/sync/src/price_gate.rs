// Path: crates/sync/src/price_gate.rs
//! The acceptance check applied before a message is projected: the anchoring
//! payment must cover the price due for the specification at its height.

use fleet_api::pricing::Pricing;
use fleet_types::app::{AppMessage, AppSpecification, MessageType, PriceFork};
use fleet_types::config::PricingConfig;
use fleet_types::error::SyncError;
use fleet_types::Height;

/// The specification a message updates, and the height it was anchored at.
#[derive(Debug, Clone, Copy)]
pub struct PreviousSpec<'a> {
    /// The previously accepted specification.
    pub spec: &'a AppSpecification,
    /// Its anchor height.
    pub height: Height,
}

/// Computes due prices from a [`PricingConfig`] and a [`Pricing`] model.
pub struct PriceGate<'a> {
    config: &'a PricingConfig,
    pricing: &'a dyn Pricing,
}

fn ceil_cents(value: f64) -> f64 {
    (value * 100.0).ceil() / 100.0
}

impl<'a> PriceGate<'a> {
    /// Creates a gate.
    pub fn new(config: &'a PricingConfig, pricing: &'a dyn Pricing) -> Self {
        Self { config, pricing }
    }

    fn fork(&self, height: Height) -> Result<&'a PriceFork, SyncError> {
        self.config
            .fork_at(height)
            .ok_or(SyncError::NoPriceFork(height))
    }

    /// Full price of `spec` at `height`: resource price times the expiry
    /// multiplier, ceiled to cents and floored at the fork minimum.
    pub fn spec_price(&self, spec: &AppSpecification, height: Height) -> Result<f64, SyncError> {
        let fork = self.fork(height)?;
        let mut price = self.pricing.price_for(spec, height, fork)?;
        if let Some(expire) = spec.expire {
            if expire != 0 && expire != self.config.default_expire && self.config.default_expire > 0
            {
                price *= expire as f64 / self.config.default_expire as f64;
            }
        }
        Ok(ceil_cents(price).max(fork.min_price))
    }

    /// Price owed by `message`, given the specification it replaces.
    pub fn due_price(
        &self,
        message: &AppMessage,
        spec: &AppSpecification,
        previous: Option<PreviousSpec<'_>>,
    ) -> Result<f64, SyncError> {
        let height = message.height;
        let new_price = self.spec_price(spec, height)?;
        if message.message_type != MessageType::Update {
            return Ok(new_price);
        }
        let factor = self.config.update_fee_factor;
        let min_price = self.fork(height)?.min_price;
        let due = match previous {
            Some(prev) => {
                let prev_price = self.spec_price(prev.spec, prev.height)?;
                let prev_expire = prev.spec.expire.unwrap_or(self.config.default_expire);
                let since = height.saturating_sub(prev.height);
                let remaining = if prev_expire == 0 {
                    0.0
                } else {
                    (prev_expire as f64 - since as f64) / prev_expire as f64
                };
                if remaining > 0.0 {
                    (new_price - remaining * prev_price) * factor
                } else {
                    new_price * factor
                }
            }
            None => new_price * factor,
        };
        Ok(due.max(min_price))
    }

    /// Converts a paid amount in ledger units to coins.
    pub fn paid_coins(&self, paid_amount: u64) -> f64 {
        paid_amount as f64 / self.config.units_per_coin.max(1) as f64
    }

    /// Ok if `message` paid at least what is due, otherwise `SyncError::Underpaid`.
    pub fn check(
        &self,
        message: &AppMessage,
        spec: &AppSpecification,
        previous: Option<PreviousSpec<'_>>,
    ) -> Result<(), SyncError> {
        let due = self.due_price(message, spec, previous)?;
        let paid = self.paid_coins(message.paid_amount);
        if paid + 1e-9 < due {
            return Err(SyncError::Underpaid { paid, due });
        }
        Ok(())
    }
}
