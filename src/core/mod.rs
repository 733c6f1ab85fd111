mod compare;
mod engine;
mod loan;
pub mod solver;
mod time_value;
mod types;

pub use compare::{break_even_year, compare_scenarios, net_worth_trajectory};
pub use engine::{
    MAX_LOAN_TERM_YEARS, buy_cashflow_trace, compute_buy_scenario, compute_rent_scenario,
    rent_cashflow_trace,
};
pub use loan::{amortization_schedule, monthly_payment, remaining_balance};
pub use time_value::{deflate, deflator, future_value};
pub use types::{
    Advantage, AmortizationYear, BuyCashflowYear, BuyInputs, BuyResult, Comparison,
    DEFAULT_EXPECTED_RETURN, DEFAULT_HORIZON_YEARS, DEFAULT_INFLATION, DEFAULT_MONTHLY_INCOME,
    DEFAULT_PROPERTY_GROWTH, MacroAssumptions, RentCashflowYear, RentInputs, RentResult, Scenario,
    TrajectoryPoint, ValidationError,
};
