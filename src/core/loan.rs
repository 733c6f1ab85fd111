use super::types::AmortizationYear;

const MONTHS_PER_YEAR: u32 = 12;

pub fn monthly_payment(principal: f64, annual_rate: f64, term_years: u32) -> f64 {
    let months = f64::from(term_years) * f64::from(MONTHS_PER_YEAR);
    if principal <= 0.0 || months <= 0.0 {
        return 0.0;
    }

    let monthly_rate = annual_rate / f64::from(MONTHS_PER_YEAR);
    // annuity formula is undefined at a zero rate
    if monthly_rate.abs() < 1e-12 {
        return principal / months;
    }

    let growth = (1.0 + monthly_rate).powf(months);
    if !growth.is_finite() {
        // interest-only in the limit
        return principal * monthly_rate;
    }
    principal * monthly_rate * growth / (growth - 1.0)
}

/// Month-by-month amortization aggregated into one row per loan year. The last row closes
/// the loan at exactly zero.
pub fn amortization_schedule(
    principal: f64,
    annual_rate: f64,
    term_years: u32,
) -> Vec<AmortizationYear> {
    let payment = monthly_payment(principal, annual_rate, term_years);
    let monthly_rate = annual_rate / f64::from(MONTHS_PER_YEAR);
    let mut remaining = principal.max(0.0);
    let mut schedule = Vec::with_capacity(term_years as usize);

    for year in 1..=term_years {
        let mut interest_paid = 0.0;
        let mut principal_paid = 0.0;
        for _ in 0..MONTHS_PER_YEAR {
            let interest = remaining * monthly_rate;
            let reduction = (payment - interest).min(remaining);
            interest_paid += interest;
            principal_paid += reduction;
            remaining -= reduction;
        }

        // floating-point residue is booked as principal of the last year
        if year == term_years {
            principal_paid += remaining;
            remaining = 0.0;
        }

        schedule.push(AmortizationYear {
            year,
            interest_paid,
            principal_paid,
            remaining_balance: remaining.max(0.0),
        });
    }

    schedule
}

pub fn remaining_balance(schedule: &[AmortizationYear], principal: f64, years: u32) -> f64 {
    if years == 0 {
        return principal.max(0.0);
    }
    schedule
        .get(years as usize - 1)
        .map_or(0.0, |row| row.remaining_balance)
}
