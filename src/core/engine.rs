use super::loan::{amortization_schedule, monthly_payment, remaining_balance};
use super::time_value::future_value;
use super::types::{
    BuyCashflowYear, BuyInputs, BuyResult, MacroAssumptions, RentCashflowYear, RentInputs,
    RentResult, ValidationError,
};

const MONTHS_PER_YEAR: f64 = 12.0;
pub const MAX_LOAN_TERM_YEARS: u32 = 100;

pub fn compute_buy_scenario(
    inputs: &BuyInputs,
    macros: &MacroAssumptions,
) -> Result<BuyResult, ValidationError> {
    validate_buy(inputs)?;
    validate_macros(macros)?;
    Ok(simulate_buy(inputs, macros, None))
}

/// `buyer_monthly_payment` is the `monthly_payment` of the buy scenario for the same
/// purchase, so the buy scenario has to be computed first.
pub fn compute_rent_scenario(
    inputs: &RentInputs,
    buyer_monthly_payment: f64,
    macros: &MacroAssumptions,
) -> Result<RentResult, ValidationError> {
    validate_rent(inputs, buyer_monthly_payment)?;
    validate_macros(macros)?;
    Ok(simulate_rent(inputs, buyer_monthly_payment, macros, None))
}

pub fn buy_cashflow_trace(
    inputs: &BuyInputs,
    macros: &MacroAssumptions,
) -> Result<Vec<BuyCashflowYear>, ValidationError> {
    validate_buy(inputs)?;
    validate_macros(macros)?;
    let mut trace = Vec::with_capacity(macros.horizon_years as usize);
    simulate_buy(inputs, macros, Some(&mut trace));
    Ok(trace)
}

pub fn rent_cashflow_trace(
    inputs: &RentInputs,
    buyer_monthly_payment: f64,
    macros: &MacroAssumptions,
) -> Result<Vec<RentCashflowYear>, ValidationError> {
    validate_rent(inputs, buyer_monthly_payment)?;
    validate_macros(macros)?;
    let mut trace = Vec::with_capacity(macros.horizon_years as usize);
    simulate_rent(inputs, buyer_monthly_payment, macros, Some(&mut trace));
    Ok(trace)
}

fn simulate_buy(
    inputs: &BuyInputs,
    macros: &MacroAssumptions,
    mut trace: Option<&mut Vec<BuyCashflowYear>>,
) -> BuyResult {
    let horizon = macros.horizon_years;
    let down_payment = inputs.down_payment();
    let upfront_fees = inputs.upfront_fees();
    let loan = inputs.loan_principal();

    // Nothing is spent yet: the down payment and fees are still cash.
    if horizon == 0 {
        return BuyResult {
            total_cost: 0.0,
            net_worth: down_payment + upfront_fees,
            monthly_payment: 0.0,
        };
    }

    let payment = monthly_payment(loan, inputs.loan_rate, inputs.loan_term_years);
    let schedule = amortization_schedule(loan, inputs.loan_rate, inputs.loan_term_years);

    let maintenance = inputs.price * inputs.maintenance_pct;
    let other_costs = inputs.other_costs_per_month * MONTHS_PER_YEAR;

    let mut monthly_income = macros.monthly_income;
    let mut compounded_surplus = 0.0;
    let mut carrying_total = 0.0;

    for year in 1..=horizon {
        let mortgage = if year <= inputs.loan_term_years {
            payment * MONTHS_PER_YEAR
        } else {
            0.0
        };
        let carrying_cost =
            mortgage + maintenance + inputs.insurance_per_year + inputs.property_tax + other_costs;
        let surplus = (monthly_income * MONTHS_PER_YEAR - carrying_cost).max(0.0);
        let surplus_at_horizon =
            future_value(surplus, macros.expected_return, (horizon - year) as f64);

        compounded_surplus += surplus_at_horizon;
        carrying_total += carrying_cost;

        if let Some(trace) = trace.as_deref_mut() {
            trace.push(BuyCashflowYear {
                year,
                monthly_income,
                mortgage,
                maintenance,
                insurance: inputs.insurance_per_year,
                property_tax: inputs.property_tax,
                other_costs,
                carrying_cost,
                surplus,
                surplus_at_horizon,
                remaining_balance: remaining_balance(&schedule, loan, year),
            });
        }

        monthly_income *= 1.0 + macros.inflation;
    }

    let missed_return = future_value(upfront_fees, macros.expected_return, horizon as f64);
    let property_value = future_value(inputs.price, macros.property_growth, horizon as f64);
    let balance = remaining_balance(&schedule, loan, horizon);
    let initial_equity = inputs.price - loan;

    BuyResult {
        total_cost: upfront_fees + missed_return + carrying_total,
        net_worth: property_value - balance + compounded_surplus + initial_equity,
        monthly_payment: payment,
    }
}

fn simulate_rent(
    inputs: &RentInputs,
    buyer_monthly_payment: f64,
    macros: &MacroAssumptions,
    mut trace: Option<&mut Vec<RentCashflowYear>>,
) -> RentResult {
    let horizon = macros.horizon_years;
    let initial_invested = inputs.initial_invested();

    if horizon == 0 {
        return RentResult {
            total_cost: 0.0,
            net_worth: initial_invested,
        };
    }

    let other_costs = inputs.other_costs_per_month * MONTHS_PER_YEAR;
    let mut pool = future_value(initial_invested, macros.expected_return, horizon as f64);
    let mut monthly_income = macros.monthly_income;
    let mut total_cost = 0.0;

    for year in 1..=horizon {
        // The first year is paid at the starting rent.
        let monthly_rent = future_value(
            inputs.monthly_rent,
            inputs.rent_indexation,
            (year - 1) as f64,
        );
        let housing_cost =
            monthly_rent * MONTHS_PER_YEAR + inputs.insurance_per_year + other_costs;
        let diverted_payment = (buyer_monthly_payment - monthly_rent).max(0.0) * MONTHS_PER_YEAR;
        let surplus = (monthly_income * MONTHS_PER_YEAR - housing_cost).max(0.0);

        let years_left = (horizon - year) as f64;
        let contributions_at_horizon =
            future_value(diverted_payment, macros.expected_return, years_left)
                + future_value(surplus, macros.expected_return, years_left);

        pool += contributions_at_horizon;
        total_cost += housing_cost;

        if let Some(trace) = trace.as_deref_mut() {
            trace.push(RentCashflowYear {
                year,
                monthly_income,
                monthly_rent,
                housing_cost,
                diverted_payment,
                surplus,
                contributions_at_horizon,
            });
        }

        monthly_income *= 1.0 + macros.inflation;
    }

    RentResult {
        total_cost,
        net_worth: pool - total_cost,
    }
}

fn validate_buy(inputs: &BuyInputs) -> Result<(), ValidationError> {
    non_negative("price", inputs.price)?;
    non_negative("other_costs_pct", inputs.other_costs_pct)?;
    unit_fraction("down_payment_pct", inputs.down_payment_pct)?;
    non_negative("loan_rate", inputs.loan_rate)?;
    if inputs.loan_term_years == 0 {
        return Err(ValidationError::ZeroLoanTerm);
    }
    if inputs.loan_term_years > MAX_LOAN_TERM_YEARS {
        return Err(ValidationError::LoanTermTooLong {
            years: inputs.loan_term_years,
            max: MAX_LOAN_TERM_YEARS,
        });
    }
    non_negative("property_tax", inputs.property_tax)?;
    non_negative("maintenance_pct", inputs.maintenance_pct)?;
    non_negative("insurance_per_year", inputs.insurance_per_year)?;
    non_negative("other_costs_per_month", inputs.other_costs_per_month)?;
    Ok(())
}

fn validate_rent(inputs: &RentInputs, buyer_monthly_payment: f64) -> Result<(), ValidationError> {
    non_negative("monthly_rent", inputs.monthly_rent)?;
    non_negative("rent_indexation", inputs.rent_indexation)?;
    non_negative("insurance_per_year", inputs.insurance_per_year)?;
    non_negative("other_costs_per_month", inputs.other_costs_per_month)?;
    non_negative("price", inputs.price)?;
    unit_fraction("down_payment_pct", inputs.down_payment_pct)?;
    non_negative("other_costs_pct", inputs.other_costs_pct)?;
    non_negative("buyer_monthly_payment", buyer_monthly_payment)?;
    Ok(())
}

fn validate_macros(macros: &MacroAssumptions) -> Result<(), ValidationError> {
    non_negative("expected_return", macros.expected_return)?;
    non_negative("property_growth", macros.property_growth)?;
    non_negative("monthly_income", macros.monthly_income)?;
    non_negative("inflation", macros.inflation)?;
    Ok(())
}

fn finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite { field })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}

fn unit_fraction(field: &'static str, value: f64) -> Result<(), ValidationError> {
    finite(field, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::OutOfUnitRange { field, value });
    }
    Ok(())
}
