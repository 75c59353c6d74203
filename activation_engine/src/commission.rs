//! # Commission calculator
//!
//! Pure functions mapping `(plan tier, transaction kind, gross amount)` to the platform's commission and the amount
//! owed to the business.
//!
//! Rates are held in basis points so that the arithmetic stays in integers:
//!
//! `commission = (gross × bps + 5 000) / 10 000`
//!
//! which is `round(gross × percent / 100)` with half-up rounding on the whole-cent boundary. The result is
//! deterministic and reproducible for audit, and `net = gross - commission` is never negative because
//! rates are capped at 100%.
//!
//! Boosts are platform revenue: the whole gross is commission and the net payout is zero.
use serde::{Deserialize, Serialize};
use tae_common::{BasisPoints, Cents, BPS_DENOMINATOR};

use crate::db_types::{PlanTier, TransactionKind};

/// The kinds of sale that carry independently configured commission rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleFamily {
    Ticket,
    Offer,
    Reservation,
    Boost,
}

impl From<TransactionKind> for SaleFamily {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::TicketOrder => SaleFamily::Ticket,
            TransactionKind::OfferPurchase => SaleFamily::Offer,
            TransactionKind::Reservation => SaleFamily::Reservation,
            TransactionKind::ProfileBoost | TransactionKind::EventBoost | TransactionKind::OfferBoost => {
                SaleFamily::Boost
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRates {
    pub ticket: BasisPoints,
    pub offer: BasisPoints,
    pub reservation: BasisPoints,
}

impl TierRates {
    pub const fn new(ticket: u32, offer: u32, reservation: u32) -> Self {
        Self {
            ticket: BasisPoints::new(ticket),
            offer: BasisPoints::new(offer),
            reservation: BasisPoints::new(reservation),
        }
    }

    /// Parses `ticket=1000,offer=1200,reservation=1000`. Missing keys keep the values in `self`.
    pub fn parse_overrides(&self, s: &str) -> Result<Self, String> {
        let mut result = *self;
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| format!("Expected key=value, got '{pair}'"))?;
            let bps = value
                .trim()
                .parse::<u32>()
                .map_err(|e| format!("Invalid basis points for {key}: {e}"))
                .and_then(|v| {
                    if i64::from(v) > BPS_DENOMINATOR {
                        Err(format!("Rate for {key} exceeds 100%: {v}"))
                    } else {
                        Ok(BasisPoints::new(v))
                    }
                })?;
            match key.trim() {
                "ticket" => result.ticket = bps,
                "offer" => result.offer = bps,
                "reservation" => result.reservation = bps,
                other => return Err(format!("Unknown commission family: {other}")),
            }
        }
        Ok(result)
    }
}

/// Commission rates per plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSchedule {
    pub basic: TierRates,
    pub pro: TierRates,
    pub premium: TierRates,
}

impl Default for CommissionSchedule {
    fn default() -> Self {
        Self {
            basic: TierRates::new(1000, 1200, 1000),
            pro: TierRates::new(700, 800, 700),
            premium: TierRates::new(500, 500, 500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub rate: BasisPoints,
    pub gross: Cents,
    pub commission: Cents,
    pub net: Cents,
}

impl CommissionSplit {
    pub fn at_rate(gross: Cents, rate: BasisPoints) -> Self {
        let commission = gross.apply_bps(rate).min(gross.max(Cents::zero()));
        Self { rate, gross, commission, net: gross - commission }
    }

    pub fn commission_free(gross: Cents) -> Self {
        Self::at_rate(gross, BasisPoints::new(0))
    }
}

impl CommissionSchedule {
    pub fn tier(&self, plan: PlanTier) -> &TierRates {
        match plan {
            PlanTier::Basic => &self.basic,
            PlanTier::Pro => &self.pro,
            PlanTier::Premium => &self.premium,
        }
    }

    pub fn tier_mut(&mut self, plan: PlanTier) -> &mut TierRates {
        match plan {
            PlanTier::Basic => &mut self.basic,
            PlanTier::Pro => &mut self.pro,
            PlanTier::Premium => &mut self.premium,
        }
    }

    /// The commission rate in effect for the given plan and transaction kind.
    pub fn rate_for(&self, plan: PlanTier, kind: TransactionKind) -> BasisPoints {
        let rates = self.tier(plan);
        match SaleFamily::from(kind) {
            SaleFamily::Ticket => rates.ticket,
            SaleFamily::Offer => rates.offer,
            SaleFamily::Reservation => rates.reservation,
            SaleFamily::Boost => BasisPoints::new(BPS_DENOMINATOR as u32),
        }
    }

    pub fn split(&self, plan: PlanTier, kind: TransactionKind, gross: Cents) -> CommissionSplit {
        CommissionSplit::at_rate(gross, self.rate_for(plan, kind))
    }
}

/// Daily prices for each boost kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostRates {
    pub profile: Cents,
    pub event: Cents,
    pub offer: Cents,
}

impl Default for BoostRates {
    fn default() -> Self {
        Self { profile: Cents::from(500), event: Cents::from(700), offer: Cents::from(300) }
    }
}

impl BoostRates {
    pub fn daily_rate(&self, kind: TransactionKind) -> Option<Cents> {
        match kind {
            TransactionKind::ProfileBoost => Some(self.profile),
            TransactionKind::EventBoost => Some(self.event),
            TransactionKind::OfferBoost => Some(self.offer),
            _ => None,
        }
    }

    pub fn price(&self, kind: TransactionKind, days: u32) -> Option<Cents> {
        self.daily_rate(kind).map(|rate| rate * i64::from(days))
    }

    /// Parses `profile=500,event=700,offer=300` (cents per day).
    pub fn parse_overrides(&self, s: &str) -> Result<Self, String> {
        let mut result = *self;
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| format!("Expected key=value, got '{pair}'"))?;
            let cents = value.trim().parse::<i64>().map_err(|e| format!("Invalid daily rate for {key}: {e}"))?;
            if cents < 0 {
                return Err(format!("Daily rate for {key} cannot be negative"));
            }
            match key.trim() {
                "profile" => result.profile = Cents::from(cents),
                "event" => result.event = Cents::from(cents),
                "offer" => result.offer = Cents::from(cents),
                other => return Err(format!("Unknown boost kind: {other}")),
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn offer_on_basic_plan() {
        let schedule = CommissionSchedule::default();
        let split = schedule.split(PlanTier::Basic, TransactionKind::OfferPurchase, Cents::from(800));
        assert_eq!(split.commission, Cents::from(96));
        assert_eq!(split.net, Cents::from(704));
        assert_eq!(split.rate, BasisPoints::new(1200));
    }

    #[test]
    fn rates_differ_per_family_and_plan() {
        let schedule = CommissionSchedule::default();
        assert_eq!(schedule.rate_for(PlanTier::Basic, TransactionKind::TicketOrder), BasisPoints::new(1000));
        assert_eq!(schedule.rate_for(PlanTier::Pro, TransactionKind::OfferPurchase), BasisPoints::new(800));
        assert_eq!(schedule.rate_for(PlanTier::Premium, TransactionKind::Reservation), BasisPoints::new(500));
    }

    #[test]
    fn half_up_on_whole_cents() {
        let schedule = CommissionSchedule::default();
        // 1005 * 10% = 100.5 -> 101
        let split = schedule.split(PlanTier::Basic, TransactionKind::TicketOrder, Cents::from(1005));
        assert_eq!(split.commission, Cents::from(101));
        assert_eq!(split.net, Cents::from(904));
        // 1004 * 10% = 100.4 -> 100
        let split = schedule.split(PlanTier::Basic, TransactionKind::TicketOrder, Cents::from(1004));
        assert_eq!(split.commission, Cents::from(100));
    }

    #[test]
    fn amounts_always_balance() {
        let schedule = CommissionSchedule::default();
        for gross in (0..5_000).step_by(7) {
            for kind in [TransactionKind::TicketOrder, TransactionKind::OfferPurchase, TransactionKind::EventBoost] {
                let split = schedule.split(PlanTier::Pro, kind, Cents::from(gross));
                assert_eq!(split.net + split.commission, split.gross);
                assert!(!split.net.is_negative());
            }
        }
    }

    #[test]
    fn boosts_are_platform_revenue() {
        let schedule = CommissionSchedule::default();
        let split = schedule.split(PlanTier::Premium, TransactionKind::ProfileBoost, Cents::from(3000));
        assert_eq!(split.commission, Cents::from(3000));
        assert_eq!(split.net, Cents::zero());
    }

    #[test]
    fn commission_free_offer() {
        let split = CommissionSplit::commission_free(Cents::from(800));
        assert_eq!(split.commission, Cents::zero());
        assert_eq!(split.net, Cents::from(800));
    }

    #[test]
    fn parse_tier_overrides() {
        let base = TierRates::new(1000, 1200, 1000);
        let rates = base.parse_overrides("offer=1500, ticket=900").unwrap();
        assert_eq!(rates, TierRates::new(900, 1500, 1000));
        assert!(base.parse_overrides("offer=10001").is_err());
        assert!(base.parse_overrides("boost=10").is_err());
        assert!(base.parse_overrides("ticket").is_err());
    }

    #[test]
    fn boost_prices() {
        let rates = BoostRates::default();
        assert_eq!(rates.price(TransactionKind::EventBoost, 3), Some(Cents::from(2100)));
        assert_eq!(rates.price(TransactionKind::TicketOrder, 3), None);
        let rates = rates.parse_overrides("profile=1000").unwrap();
        assert_eq!(rates.price(TransactionKind::ProfileBoost, 3), Some(Cents::from(3000)));
    }
}
