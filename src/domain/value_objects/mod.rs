//! Value Objects for the stock ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog code printed on receipts and matched by report search
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductCode(String);

impl ProductCode {
    pub fn new(value: impl Into<String>) -> Result<Self, ProductCodeError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(ProductCodeError::Empty); }
        if value.len() > 50 { return Err(ProductCodeError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for ProductCode {
    type Error = ProductCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<ProductCode> for String {
    fn from(code: ProductCode) -> Self { code.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductCodeError { Empty, TooLong }
impl std::error::Error for ProductCodeError {}
impl fmt::Display for ProductCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "product code empty"), Self::TooLong => write!(f, "product code too long") }
    }
}

/// Largest price or amount accepted anywhere in the ledger.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }

    /// Accepts at most cents and at most `MAX_AMOUNT` either way.
    pub fn check_amount(value: Decimal) -> Result<Decimal, MoneyError> {
        let value = value.normalize();
        if value.scale() > 2 { return Err(MoneyError::TooPrecise); }
        if value.abs() > MAX_AMOUNT { return Err(MoneyError::OutOfRange); }
        Ok(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {:.2}", self.currency, self.amount) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { TooPrecise, OutOfRange }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooPrecise => write!(f, "amounts are limited to two decimal places"),
            Self::OutOfRange => write!(f, "amount exceeds {}", MAX_AMOUNT),
        }
    }
}

/// Count of bulk units (dozens). Half units are a valid business quantity,
/// so this wraps a decimal rather than an integer. Never negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

/// Upper bound for any quantity, on-hand totals included.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, QuantityError> {
        let value = value.normalize();
        if value.is_sign_negative() && !value.is_zero() { return Err(QuantityError::Negative); }
        if value.scale() > 1 { return Err(QuantityError::TooPrecise); }
        if value > MAX_QUANTITY { return Err(QuantityError::TooLarge); }
        Ok(Self(value))
    }
    pub fn value(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }

    /// Applies a signed delta, flooring the result at zero.
    pub fn apply_delta(&self, delta: Decimal) -> Result<Self, QuantityError> {
        let next = self.0.checked_add(delta).ok_or(QuantityError::TooLarge)?;
        Self::new(next.max(Decimal::ZERO))
    }
}

impl Default for Quantity { fn default() -> Self { Self::ZERO } }

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<Decimal> for Quantity {
    type Error = QuantityError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for Decimal {
    fn from(qty: Quantity) -> Self { qty.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { Negative, TooPrecise, TooLarge }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negative => write!(f, "quantity cannot be negative"),
            Self::TooPrecise => write!(f, "quantities are counted in half units, one decimal place at most"),
            Self::TooLarge => write!(f, "quantity exceeds {}", MAX_QUANTITY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_product_code() { let code = ProductCode::new(" zap-001 ").unwrap(); assert_eq!(code.as_str(), "ZAP-001"); }
    #[test]
    fn test_product_code_empty() { assert_eq!(ProductCode::new("  "), Err(ProductCodeError::Empty)); }
    #[test]
    fn test_amount_scale_and_range() {
        assert_eq!(Money::check_amount(Decimal::new(1025, 2)), Ok(Decimal::new(1025, 2)));
        assert_eq!(Money::check_amount(Decimal::new(12500, 3)), Ok(Decimal::new(125, 1)));
        assert_eq!(Money::check_amount(Decimal::new(5125, 3)), Err(MoneyError::TooPrecise));
        assert_eq!(Money::check_amount(MAX_AMOUNT + Decimal::ONE), Err(MoneyError::OutOfRange));
    }
    #[test]
    fn test_quantity_floor() {
        let qty = Quantity::new(Decimal::new(2, 0)).unwrap();
        assert_eq!(qty.apply_delta(Decimal::new(-5, 0)), Ok(Quantity::ZERO));
        assert_eq!(qty.apply_delta(Decimal::new(15, 1)).unwrap().value(), Decimal::new(35, 1));
    }
    #[test]
    fn test_quantity_scale_guard() {
        assert_eq!(Quantity::new(Decimal::new(555, 3)), Err(QuantityError::TooPrecise));
        assert_eq!(Quantity::new(Decimal::new(1500, 3)).unwrap().value(), Decimal::new(15, 1));
    }
    #[test]
    fn test_quantity_upper_bound() {
        assert_eq!(Quantity::new(MAX_QUANTITY + Decimal::ONE), Err(QuantityError::TooLarge));
        let full = Quantity::new(MAX_QUANTITY).unwrap();
        assert_eq!(full.apply_delta(Decimal::ONE), Err(QuantityError::TooLarge));
        assert_eq!(full.apply_delta(Decimal::MAX), Err(QuantityError::TooLarge));
    }
    #[test]
    fn test_quantity_rejects_negative() { assert_eq!(Quantity::new(Decimal::NEGATIVE_ONE), Err(QuantityError::Negative)); }
}
