use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

/// Full/sale price pair, held as integer cents. Serialized as decimal
/// amounts (`"1299.00"`) on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PricesWire", into = "PricesWire")]
pub struct Prices {
    pub full_cents: i64,
    pub sale_cents: i64,
}

impl Prices {
    pub fn new(full_cents: i64, sale_cents: i64) -> Self {
        Self { full_cents, sale_cents }
    }

    pub fn full(&self) -> Decimal {
        cents_to_decimal(self.full_cents)
    }

    pub fn sale(&self) -> Decimal {
        cents_to_decimal(self.sale_cents)
    }
}

#[derive(Serialize, Deserialize)]
struct PricesWire {
    full_price: Decimal,
    sale_price: Decimal,
}

/// A wire amount whose cent value does not fit in an i64.
#[derive(Debug, Error)]
#[error("price {0} is out of range")]
pub struct PriceOutOfRange(pub Decimal);

impl TryFrom<PricesWire> for Prices {
    type Error = PriceOutOfRange;

    fn try_from(wire: PricesWire) -> Result<Self, Self::Error> {
        let full_cents =
            decimal_to_cents(wire.full_price).ok_or(PriceOutOfRange(wire.full_price))?;
        let sale_cents =
            decimal_to_cents(wire.sale_price).ok_or(PriceOutOfRange(wire.sale_price))?;
        Ok(Self { full_cents, sale_cents })
    }
}

impl From<Prices> for PricesWire {
    fn from(prices: Prices) -> Self {
        Self { full_price: prices.full(), sale_price: prices.sale() }
    }
}

pub fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub fn decimal_to_cents(value: Decimal) -> Option<i64> {
    value.checked_mul(Decimal::ONE_HUNDRED)?.round().to_i64()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub rating: u8,
    pub comment: String,
    pub date: DateTime<Utc>,
}

/// A catalog item. Read-only from the storefront's perspective; rows are
/// created by seeding. The stored query embedding lives alongside the row in
/// the database, not on the domain type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub brand: String,
    pub prices: Prices,
    pub categories: Vec<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub embedding_text: String,
}
