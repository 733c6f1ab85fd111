use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_HORIZON_YEARS: u32 = 20;
pub const DEFAULT_EXPECTED_RETURN: f64 = 0.04;
pub const DEFAULT_PROPERTY_GROWTH: f64 = 0.02;
pub const DEFAULT_MONTHLY_INCOME: f64 = 3_000.0;
pub const DEFAULT_INFLATION: f64 = 0.02;

/// Rates and income shared by both scenarios. All rates are annual fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroAssumptions {
    pub horizon_years: u32,
    pub expected_return: f64,
    /// Only read by the buy scenario.
    pub property_growth: f64,
    pub monthly_income: f64,
    pub inflation: f64,
}

impl Default for MacroAssumptions {
    fn default() -> Self {
        Self {
            horizon_years: DEFAULT_HORIZON_YEARS,
            expected_return: DEFAULT_EXPECTED_RETURN,
            property_growth: DEFAULT_PROPERTY_GROWTH,
            monthly_income: DEFAULT_MONTHLY_INCOME,
            inflation: DEFAULT_INFLATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuyInputs {
    pub price: f64,
    pub other_costs_pct: f64,
    pub down_payment_pct: f64,
    pub loan_rate: f64,
    pub loan_term_years: u32,
    pub property_tax: f64,
    pub maintenance_pct: f64,
    pub insurance_per_year: f64,
    pub other_costs_per_month: f64,
}

impl BuyInputs {
    pub fn down_payment(&self) -> f64 {
        self.price * self.down_payment_pct
    }

    pub fn upfront_fees(&self) -> f64 {
        self.price * self.other_costs_pct
    }

    pub fn loan_principal(&self) -> f64 {
        self.price - self.down_payment()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RentInputs {
    pub monthly_rent: f64,
    pub rent_indexation: f64,
    pub insurance_per_year: f64,
    pub other_costs_per_month: f64,
    /// Purchase terms of the competing buy scenario; they size the lump sum the renter keeps
    /// invested instead of spending it on the purchase.
    pub price: f64,
    pub down_payment_pct: f64,
    pub other_costs_pct: f64,
}

impl RentInputs {
    pub fn initial_invested(&self) -> f64 {
        self.price * (self.down_payment_pct + self.other_costs_pct)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    pub buy: BuyInputs,
    pub rent: RentInputs,
    pub macros: MacroAssumptions,
}

impl Scenario {
    pub fn with_horizon(&self, horizon_years: u32) -> Self {
        let mut scenario = *self;
        scenario.macros.horizon_years = horizon_years;
        scenario
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyResult {
    pub total_cost: f64,
    pub net_worth: f64,
    pub monthly_payment: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentResult {
    pub total_cost: f64,
    pub net_worth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmortizationYear {
    pub year: u32,
    pub interest_paid: f64,
    pub principal_paid: f64,
    pub remaining_balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyCashflowYear {
    pub year: u32,
    pub monthly_income: f64,
    pub mortgage: f64,
    pub maintenance: f64,
    pub insurance: f64,
    pub property_tax: f64,
    pub other_costs: f64,
    pub carrying_cost: f64,
    pub surplus: f64,
    pub surplus_at_horizon: f64,
    pub remaining_balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentCashflowYear {
    pub year: u32,
    pub monthly_income: f64,
    pub monthly_rent: f64,
    pub housing_cost: f64,
    pub diverted_payment: f64,
    pub surplus: f64,
    pub contributions_at_horizon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryPoint {
    pub year: u32,
    pub buy_net_worth: f64,
    pub rent_net_worth: f64,
    pub difference: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Advantage {
    Buy,
    Rent,
    Even,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub horizon_years: u32,
    pub buy: BuyResult,
    pub rent: RentResult,
    pub deflator: f64,
    pub buy_net_worth_real: f64,
    pub rent_net_worth_real: f64,
    pub advantage: Advantage,
    pub break_even_year: Option<u32>,
    pub trajectory: Vec<TrajectoryPoint>,
}

/// Rejected inputs. Raised before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} must be between 0 and 1, got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },
    #[error("loan term must be at least one year")]
    ZeroLoanTerm,
    #[error("loan term must be at most {max} years, got {years}")]
    LoanTermTooLong { years: u32, max: u32 },
}
