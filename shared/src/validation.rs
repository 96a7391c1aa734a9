//! Validation utilities for the resale stock platform
//!
//! Inputs typed by point-of-sale clients (quantities, prices in Brazilian
//! format) are parsed here before they reach the engine.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::models::{CustomerInfo, IdentificationKind, RegisterBatchInput};
use crate::stock::MAX_AMOUNT;

/// Largest exchange rate the rate column holds (`NUMERIC(14, 4)`)
pub const MAX_EXCHANGE_RATE: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 4);
use crate::types::LooseNumber;

// ============================================================================
// Number Parsing
// ============================================================================

/// Parse a strictly positive unit quantity
pub fn parse_quantity(value: &LooseNumber) -> Result<i32, &'static str> {
    let quantity = match value {
        LooseNumber::Integer(n) => i32::try_from(*n).map_err(|_| "Quantity is out of range")?,
        LooseNumber::Float(f) => {
            if f.fract() != 0.0 || !f.is_finite() {
                return Err("Quantity must be a whole number");
            }
            if *f > f64::from(i32::MAX) || *f < f64::from(i32::MIN) {
                return Err("Quantity is out of range");
            }
            *f as i32
        }
        LooseNumber::Text(s) => s
            .trim()
            .parse::<i32>()
            .map_err(|_| "Quantity must be a whole number")?,
    };

    if quantity <= 0 {
        return Err("Quantity must be greater than zero");
    }
    Ok(quantity)
}

/// Parse a money amount, rounded to cents
///
/// Strings may carry a currency symbol and use Brazilian formatting, where
/// `.` groups thousands and `,` marks decimals (`R$ 1.234,56`). Without a
/// comma the string is read as a plain decimal. An empty string is `None`.
pub fn parse_price(value: &LooseNumber) -> Result<Option<Decimal>, &'static str> {
    let price = match value {
        LooseNumber::Integer(n) => Decimal::from(*n),
        LooseNumber::Float(f) => Decimal::try_from(*f).map_err(|_| "Invalid price")?,
        LooseNumber::Text(s) => {
            let cleaned = strip_price_formatting(s);
            if cleaned.is_empty() {
                return Ok(None);
            }
            Decimal::from_str(&cleaned).map_err(|_| "Invalid price")?
        }
    };

    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    let price = price.round_dp(2);
    if price > MAX_AMOUNT {
        return Err("Price is too large");
    }
    Ok(Some(price))
}

/// Reduce a formatted price string to a plain decimal literal
pub fn strip_price_formatting(raw: &str) -> String {
    let compact: String = raw
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if compact.contains(',') {
        compact.replace('.', "").replacen(',', ".", 1)
    } else {
        compact
    }
}

// ============================================================================
// Catalog Validations
// ============================================================================

/// Validate a batch registration
pub fn validate_batch_input(input: &RegisterBatchInput) -> Result<(), &'static str> {
    if input.name.trim().is_empty() {
        return Err("Product name is required");
    }
    if input.quantity < 0 {
        return Err("Quantity cannot be negative");
    }
    if input.unit_cost_usd < Decimal::ZERO {
        return Err("Unit cost cannot be negative");
    }
    if input.unit_cost_usd > MAX_AMOUNT {
        return Err("Unit cost is too large");
    }
    if input.exchange_rate <= Decimal::ZERO {
        return Err("Exchange rate must be greater than zero");
    }
    if input.exchange_rate > MAX_EXCHANGE_RATE {
        return Err("Exchange rate is too large");
    }
    validate_identification(
        input.identification,
        input.serial_number.as_deref(),
        input.barcode.as_deref(),
    )
}

/// The identification mode requires the matching code to be present
pub fn validate_identification(
    kind: IdentificationKind,
    serial_number: Option<&str>,
    barcode: Option<&str>,
) -> Result<(), &'static str> {
    let present = |v: Option<&str>| v.is_some_and(|s| !s.trim().is_empty());

    if kind.keeps_serial() && !present(serial_number) {
        return Err("Serial number is required for this identification mode");
    }
    if kind.keeps_barcode() && !present(barcode) {
        return Err("Barcode is required for this identification mode");
    }
    Ok(())
}

/// Validate serial number / IMEI format: 8 to 20 alphanumerics
pub fn validate_serial_number(serial: &str) -> Result<(), &'static str> {
    let serial = serial.trim();
    if serial.len() < 8 || serial.len() > 20 {
        return Err("Serial number must be between 8 and 20 characters");
    }
    if !serial.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Serial number must be alphanumeric");
    }
    Ok(())
}

// ============================================================================
// Sale Validations
// ============================================================================

/// Validate the customer block of a checkout
pub fn validate_customer(customer: &CustomerInfo) -> Result<(), &'static str> {
    if customer.name.trim().is_empty() {
        return Err("Customer name is required");
    }
    if customer.phone.trim().is_empty() {
        return Err("Customer phone is required");
    }
    if customer.address.trim().is_empty() {
        return Err("Customer address is required");
    }
    Ok(())
}

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}
