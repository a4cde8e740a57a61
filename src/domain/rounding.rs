//! Decimal rounding applied at every externally observed boundary.

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

pub fn round3(value: f64) -> f64 {
    round_to(value, 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(1.235_000_1), 1.24);
        assert_eq!(round2(-1.987), -1.99);
        assert_eq!(round3(3.14159), 3.142);
        assert_eq!(round2(62.0), 62.0);
    }
}
