//! Price conversion between display units and the ledger's minor unit.
//!
//! The minor-unit integer is authoritative: it is what records store and
//! what payments move. Display values exist only at the edges, for what a
//! creator types in and what a viewer reads.

/// Minor units (lamports) per display unit (SOL).
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Errors converting a display price.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PriceError {
    /// No price was entered
    #[error("Price is empty")]
    Empty,

    /// The text is not a number
    #[error("Price is not a number: {0}")]
    NotANumber(String),

    /// NaN or infinite
    #[error("Price must be a finite number")]
    NotFinite,

    /// Prices cannot be negative
    #[error("Price cannot be negative: {0}")]
    Negative(f64),

    /// The minor-unit value does not fit in a u64
    #[error("Price too large: {0}")]
    Overflow(f64),
}

/// Convert a display price to minor units, rounding to the nearest unit.
///
/// This is the only place display values become minor units.
pub fn display_to_minor(value: f64) -> Result<u64, PriceError> {
    if !value.is_finite() {
        return Err(PriceError::NotFinite);
    }
    if value < 0.0 {
        return Err(PriceError::Negative(value));
    }
    let minor = (value * LAMPORTS_PER_SOL as f64).round();
    if minor >= u64::MAX as f64 {
        return Err(PriceError::Overflow(value));
    }
    Ok(minor as u64)
}

/// Parse a price as typed by a creator.
pub fn parse_display_price(text: &str) -> Result<f64, PriceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PriceError::Empty);
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| PriceError::NotANumber(trimmed.to_string()))?;
    // Validates range as a side effect
    display_to_minor(value)?;
    Ok(value)
}

/// Format minor units as display units, half-up to two decimals.
pub fn minor_to_display(minor: u64) -> String {
    let step = (LAMPORTS_PER_SOL / 100) as u128;
    let cents = (minor as u128 + step / 2) / step;
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Minor units as a floating display value, for wire formats that carry one.
pub fn minor_to_display_units(minor: u64) -> f64 {
    minor as f64 / LAMPORTS_PER_SOL as f64
}

/// Display value the program's truncating conversion maps back to `minor`.
///
/// `mint_video` takes an `f64` and truncates `price * 10^9`, so the nearest
/// float to `minor / 10^9` can land one lamport short. Exact for prices
/// below a million SOL.
pub fn program_price_units(minor: u64) -> f64 {
    let mut units = minor_to_display_units(minor);
    for _ in 0..4 {
        if (units * LAMPORTS_PER_SOL as f64) as u64 >= minor {
            break;
        }
        units = f64::from_bits(units.to_bits() + 1);
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_to_minor() {
        assert_eq!(display_to_minor(1.5).unwrap(), 1_500_000_000);
        assert_eq!(display_to_minor(0.0).unwrap(), 0);
        assert_eq!(display_to_minor(0.1).unwrap(), 100_000_000);
        assert_eq!(display_to_minor(0.000000001).unwrap(), 1);
    }

    #[test]
    fn test_display_to_minor_rejects() {
        assert_eq!(display_to_minor(f64::NAN), Err(PriceError::NotFinite));
        assert_eq!(display_to_minor(f64::INFINITY), Err(PriceError::NotFinite));
        assert_eq!(display_to_minor(-1.0), Err(PriceError::Negative(-1.0)));
        assert_eq!(display_to_minor(1e11), Err(PriceError::Overflow(1e11)));
    }

    #[test]
    fn test_parse_display_price() {
        assert_eq!(parse_display_price(" 2.25 ").unwrap(), 2.25);
        assert_eq!(parse_display_price(""), Err(PriceError::Empty));
        assert_eq!(parse_display_price("   "), Err(PriceError::Empty));
        assert_eq!(
            parse_display_price("two"),
            Err(PriceError::NotANumber("two".to_string()))
        );
        assert_eq!(parse_display_price("NaN"), Err(PriceError::NotFinite));
        assert!(matches!(parse_display_price("-3"), Err(PriceError::Negative(_))));
    }

    #[test]
    fn test_minor_to_display() {
        assert_eq!(minor_to_display(2_000_000_000), "2.00");
        assert_eq!(minor_to_display(0), "0.00");
        assert_eq!(minor_to_display(1_500_000_000), "1.50");
        assert_eq!(minor_to_display(1_005_000_000), "1.01");
        assert_eq!(minor_to_display(1_004_999_999), "1.00");
        assert_eq!(minor_to_display(4_999_999), "0.00");
        assert_eq!(minor_to_display(5_000_000), "0.01");
        assert_eq!(minor_to_display(u64::MAX), "18446744073.71");
    }

    #[test]
    fn test_program_price_units_truncate_back() {
        for minor in [0, 1, 4_350_000_000, 1_500_000_000, 123_456_789_012, 123_456_789_012_345] {
            let units = program_price_units(minor);
            assert_eq!((units * LAMPORTS_PER_SOL as f64) as u64, minor, "minor {minor}");
        }
    }

    #[test]
    fn test_display_units() {
        assert_eq!(minor_to_display_units(1_500_000_000), 1.5);
    }
}
