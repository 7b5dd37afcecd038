use std::fmt;

/// Money is represented as integer cents to avoid floating-point precision issues.
/// A decimal(20,2) balance maps to cents, so 1000.00 = 100000 cents.
pub type Cents = i64;

/// Interest rates are stored as basis points: 5.00% = 500 bps.
/// Matches a decimal(5,2) percentage column with two fractional digits.
pub type RateBps = i64;

/// Format cents as a human-readable amount string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Format a basis-point rate as a percentage string.
/// Example: 500 -> "5.00", 725 -> "7.25"
pub fn format_rate(rate: RateBps) -> String {
    format!("{}.{:02}", rate / 100, rate.abs() % 100)
}

/// Yearly interest on a balance: `balance * rate / 100`, rounded to the cent.
///
/// The multiplication runs in i128 so a decimal(20,2) balance cannot
/// overflow, and the single rounding step happens here, never on an
/// intermediate value.
pub fn interest_on(balance: Cents, rate: RateBps) -> Cents {
    // rate is a percentage in hundredths, so the divisor is 100 * 100.
    round_div(balance as i128 * rate as i128, 10_000)
}

/// Divide with half-away-from-zero rounding, the canonical rounding rule
/// applied at every balance computation.
fn round_div(numerator: i128, divisor: i128) -> Cents {
    let half = divisor / 2;
    let rounded = if numerator >= 0 {
        (numerator + half) / divisor
    } else {
        (numerator - half) / divisor
    };
    rounded as Cents
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.trim_start_matches('-');

    let parts: Vec<&str> = input.split('.').collect();
    match parts.len() {
        1 => {
            let units: i64 = parts[0]
                .parse()
                .map_err(|_| ParseCentsError::InvalidFormat)?;
            let cents = units
                .checked_mul(100)
                .ok_or(ParseCentsError::AmountTooLarge)?;
            Ok(if negative { -cents } else { cents })
        }
        2 => {
            let units: i64 = if parts[0].is_empty() {
                0
            } else {
                parts[0]
                    .parse()
                    .map_err(|_| ParseCentsError::InvalidFormat)?
            };

            // Pad or truncate the fractional part to 2 digits
            let decimal_str = parts[1];
            let decimal_cents: i64 = match decimal_str.len() {
                0 => 0,
                1 => {
                    decimal_str
                        .parse::<i64>()
                        .map_err(|_| ParseCentsError::InvalidFormat)?
                        * 10
                }
                2 => decimal_str
                    .parse()
                    .map_err(|_| ParseCentsError::InvalidFormat)?,
                _ => decimal_str[..2]
                    .parse()
                    .map_err(|_| ParseCentsError::InvalidFormat)?,
            };

            let cents = units
                .checked_mul(100)
                .and_then(|c| c.checked_add(decimal_cents))
                .ok_or(ParseCentsError::AmountTooLarge)?;
            Ok(if negative { -cents } else { cents })
        }
        _ => Err(ParseCentsError::InvalidFormat),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    AmountTooLarge,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::AmountTooLarge => write!(f, "amount out of range"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
