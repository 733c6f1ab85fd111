use super::engine::{compute_buy_scenario, compute_rent_scenario};
use super::time_value::{deflate, deflator};
use super::types::{Advantage, Comparison, Scenario, TrajectoryPoint, ValidationError};

// in today's money
const EVEN_TOLERANCE: f64 = 0.01;

pub fn compare_scenarios(scenario: &Scenario) -> Result<Comparison, ValidationError> {
    let macros = &scenario.macros;
    // the buyer's payment feeds the rent scenario
    let buy = compute_buy_scenario(&scenario.buy, macros)?;
    let rent = compute_rent_scenario(&scenario.rent, buy.monthly_payment, macros)?;
    let trajectory = net_worth_trajectory(scenario)?;

    let horizon = macros.horizon_years;
    let buy_net_worth_real = deflate(buy.net_worth, macros.inflation, horizon);
    let rent_net_worth_real = deflate(rent.net_worth, macros.inflation, horizon);

    Ok(Comparison {
        horizon_years: horizon,
        buy,
        rent,
        deflator: deflator(macros.inflation, horizon),
        buy_net_worth_real,
        rent_net_worth_real,
        advantage: advantage(buy_net_worth_real, rent_net_worth_real),
        break_even_year: break_even_year(&trajectory),
        trajectory,
    })
}

/// Nominal net worth of both choices for every horizon `1..=T`, each point a separate pair
/// of scenario runs.
pub fn net_worth_trajectory(scenario: &Scenario) -> Result<Vec<TrajectoryPoint>, ValidationError> {
    (1..=scenario.macros.horizon_years)
        .map(|year| {
            let at_year = scenario.with_horizon(year);
            let buy = compute_buy_scenario(&at_year.buy, &at_year.macros)?;
            let rent =
                compute_rent_scenario(&at_year.rent, buy.monthly_payment, &at_year.macros)?;
            Ok(TrajectoryPoint {
                year,
                buy_net_worth: buy.net_worth,
                rent_net_worth: rent.net_worth,
                difference: buy.net_worth - rent.net_worth,
            })
        })
        .collect()
}

pub fn break_even_year(trajectory: &[TrajectoryPoint]) -> Option<u32> {
    trajectory
        .iter()
        .find(|point| point.difference >= 0.0)
        .map(|point| point.year)
}

fn advantage(buy_real: f64, rent_real: f64) -> Advantage {
    let gap = buy_real - rent_real;
    if gap.abs() <= EVEN_TOLERANCE {
        Advantage::Even
    } else if gap > 0.0 {
        Advantage::Buy
    } else {
        Advantage::Rent
    }
}
