use tracing::warn;

use common::{ChangeRecord, Symbol};

/// Percent and absolute change of `current` against `reference`.
///
/// Returns `(percent_change, absolute_change)`. A zero reference yields a
/// percent change of 0 instead of inf/NaN.
pub fn percent_change(current: f64, reference: f64) -> (f64, f64) {
    let change = current - reference;
    if reference == 0.0 {
        return (0.0, change);
    }
    (change / reference * 100.0, change)
}

/// Build the change record for one symbol.
///
/// Negative or non-finite references and non-finite current prices cannot
/// come from a healthy baseline; they are logged and reported as no change.
/// So is a pair whose change overflows, such as a denormal reference.
pub fn evaluate(symbol: &Symbol, current: f64, reference: f64) -> ChangeRecord {
    if !current.is_finite() || !reference.is_finite() || reference < 0.0 {
        return zero_change(symbol, current, reference);
    }

    let (percent_change, absolute_change) = percent_change(current, reference);
    if !percent_change.is_finite() || !absolute_change.is_finite() {
        return zero_change(symbol, current, reference);
    }
    ChangeRecord {
        symbol: symbol.clone(),
        current,
        reference,
        absolute_change,
        percent_change,
    }
}

fn zero_change(symbol: &Symbol, current: f64, reference: f64) -> ChangeRecord {
    warn!(
        symbol = %symbol,
        current,
        reference,
        "Impossible price pair, reporting zero change"
    );
    ChangeRecord {
        symbol: symbol.clone(),
        current,
        reference,
        absolute_change: 0.0,
        percent_change: 0.0,
    }
}

/// A change is significant when its magnitude reaches the threshold.
pub fn is_significant(change: &ChangeRecord, threshold_percent: f64) -> bool {
    change.percent_change.abs() >= threshold_percent
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym() -> Symbol {
        Symbol::new("AAPL")
    }

    #[test]
    fn overflowing_percent_is_zero_change() {
        let record = evaluate(&sym(), 1e300, 1e-300);
        assert_eq!(record.percent_change, 0.0);
        assert_eq!(record.absolute_change, 0.0);
        assert!(!is_significant(&record, 1.0));
    }

    #[test]
    fn rise_of_one_and_a_half_percent() {
        let record = evaluate(&sym(), 101.5, 100.0);
        assert!((record.percent_change - 1.5).abs() < 1e-9);
        assert!((record.absolute_change - 1.5).abs() < 1e-9);
        assert!(is_significant(&record, 1.0));
    }

    #[test]
    fn half_percent_is_below_one_percent_threshold() {
        let record = evaluate(&sym(), 100.5, 100.0);
        assert!(!is_significant(&record, 1.0));
    }

    #[test]
    fn falls_are_negative_and_compared_by_magnitude() {
        let record = evaluate(&sym(), 97.0, 100.0);
        assert!((record.percent_change + 3.0).abs() < 1e-9);
        assert!(is_significant(&record, 3.0));
        assert!(!is_significant(&record, 3.5));
    }

    #[test]
    fn exact_threshold_counts() {
        let record = evaluate(&sym(), 101.0, 100.0);
        assert!(is_significant(&record, 1.0));
    }

    #[test]
    fn zero_reference_gives_zero_percent() {
        let record = evaluate(&sym(), 42.0, 0.0);
        assert_eq!(record.percent_change, 0.0);
        assert_eq!(record.absolute_change, 42.0);
    }

    #[test]
    fn same_price_is_no_change() {
        let record = evaluate(&sym(), 123.45, 123.45);
        assert_eq!(record.absolute_change, 0.0);
        assert_eq!(record.percent_change, 0.0);
    }

    #[test]
    fn negative_reference_is_neutralized() {
        let record = evaluate(&sym(), 10.0, -5.0);
        assert_eq!(record.absolute_change, 0.0);
        assert_eq!(record.percent_change, 0.0);
    }

    #[test]
    fn nan_current_is_neutralized() {
        let record = evaluate(&sym(), f64::NAN, 10.0);
        assert_eq!(record.percent_change, 0.0);
        assert!(!is_significant(&record, 0.5));
    }
}
