/// Compounds `principal` at a fixed annual rate over `years`.
pub fn future_value(principal: f64, annual_rate: f64, years: f64) -> f64 {
    principal * (1.0 + annual_rate).powf(years)
}

pub fn deflator(inflation: f64, years: u32) -> f64 {
    future_value(1.0, inflation, years as f64)
}

pub fn deflate(amount: f64, inflation: f64, years: u32) -> f64 {
    amount / deflator(inflation, years).max(1e-12)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn zero_years_is_identity() {
        assert_approx(future_value(1_234.5, 0.07, 0.0), 1_234.5);
    }

    #[test]
    fn zero_rate_does_not_grow() {
        assert_approx(future_value(500.0, 0.0, 30.0), 500.0);
    }

    #[test]
    fn compounds_annually() {
        assert_approx(future_value(1_000.0, 0.05, 2.0), 1_102.5);
    }

    #[test]
    fn deflate_undoes_inflation() {
        let nominal = future_value(10_000.0, 0.02, 15.0);
        assert_approx(deflate(nominal, 0.02, 15), 10_000.0);
        assert_approx(deflator(0.02, 0), 1.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_compounding_splits_over_periods(
            principal in 0u32..2_000_000,
            rate_bp in 0u32..1_500,
            a in 0u32..40,
            b in 0u32..40
        ) {
            let x = principal as f64;
            let r = rate_bp as f64 / 10_000.0;
            let chained = future_value(future_value(x, r, a as f64), r, b as f64);
            let direct = future_value(x, r, (a + b) as f64);
            prop_assert!((chained - direct).abs() <= 1e-9 * direct.abs().max(1.0));
        }
    }
}
