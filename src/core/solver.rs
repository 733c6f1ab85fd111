use serde::Serialize;

use super::{Scenario, compute_buy_scenario, compute_rent_scenario};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalType {
    BreakEvenRent,
    BreakEvenPropertyGrowth,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakEvenConfig {
    pub goal_type: GoalType,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakEvenIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub net_worth_gap: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakEvenResult {
    pub goal_type: GoalType,
    pub horizon_years: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_value: Option<f64>,
    pub achieved_gap: Option<f64>,
    pub iterations: Vec<BreakEvenIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Bracket {
    LevelAtLower,
    BuyAheadAtLower,
    RentAheadAtUpper,
    Crossing,
}

// The gap (buy minus rent) grows with both inputs.
fn classify_bracket(low_gap: f64, high_gap: f64) -> Bracket {
    if low_gap == 0.0 {
        Bracket::LevelAtLower
    } else if low_gap > 0.0 {
        Bracket::BuyAheadAtLower
    } else if high_gap < 0.0 {
        Bracket::RentAheadAtUpper
    } else {
        Bracket::Crossing
    }
}

pub fn solve_break_even(
    scenario: &Scenario,
    config: BreakEvenConfig,
) -> Result<BreakEvenResult, String> {
    validate_config(scenario, config)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_gap = evaluate_candidate(scenario, config.goal_type, config.search_min)?;
    let high_gap = evaluate_candidate(scenario, config.goal_type, config.search_max)?;

    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    let bracket = classify_bracket(low_gap, high_gap);
    if bracket == Bracket::LevelAtLower {
        solved_value = Some(config.search_min);
        converged = true;
        feasible = true;
        message = match config.goal_type {
            GoalType::BreakEvenRent => "Already level at the lower rent bound.".to_string(),
            GoalType::BreakEvenPropertyGrowth => {
                "Already level at the lower property growth bound.".to_string()
            }
        };
    } else if bracket == Bracket::BuyAheadAtLower {
        feasible = false;
        message = match config.goal_type {
            GoalType::BreakEvenRent => {
                "Buying is ahead even at the lower rent bound.".to_string()
            }
            GoalType::BreakEvenPropertyGrowth => {
                "Buying is ahead even at the lower property growth bound.".to_string()
            }
        };
    } else if bracket == Bracket::RentAheadAtUpper {
        feasible = false;
        message = match config.goal_type {
            GoalType::BreakEvenRent => {
                "Renting is still ahead at the upper rent bound; increase search max.".to_string()
            }
            GoalType::BreakEvenPropertyGrowth => {
                "Renting is still ahead at the upper property growth bound; increase search max."
                    .to_string()
            }
        };
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let gap = evaluate_candidate(scenario, config.goal_type, mid)?;
            iterations.push(BreakEvenIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_value: mid,
                net_worth_gap: gap,
            });

            if gap >= 0.0 {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_value = Some(hi);
        feasible = true;
        message = if converged {
            match config.goal_type {
                GoalType::BreakEvenRent => "Solved break-even starting rent.".to_string(),
                GoalType::BreakEvenPropertyGrowth => {
                    "Solved break-even property growth.".to_string()
                }
            }
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    let achieved_gap = match solved_value {
        Some(value) => Some(evaluate_candidate(scenario, config.goal_type, value)?),
        None => None,
    };

    Ok(BreakEvenResult {
        goal_type: config.goal_type,
        horizon_years: scenario.macros.horizon_years,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_value,
        achieved_gap,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn evaluate_candidate(
    base: &Scenario,
    goal_type: GoalType,
    candidate_value: f64,
) -> Result<f64, String> {
    let mut scenario = *base;
    match goal_type {
        GoalType::BreakEvenRent => scenario.rent.monthly_rent = candidate_value,
        GoalType::BreakEvenPropertyGrowth => scenario.macros.property_growth = candidate_value,
    }

    let buy = compute_buy_scenario(&scenario.buy, &scenario.macros).map_err(|e| e.to_string())?;
    let rent = compute_rent_scenario(&scenario.rent, buy.monthly_payment, &scenario.macros)
        .map_err(|e| e.to_string())?;
    Ok(buy.net_worth - rent.net_worth)
}

fn validate_config(scenario: &Scenario, config: BreakEvenConfig) -> Result<(), String> {
    if scenario.macros.horizon_years == 0 {
        return Err("horizon must be at least one year to solve a break-even".to_string());
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err("search bounds must be finite".to_string());
    }
    if config.search_min < 0.0 {
        return Err("search_min must be >= 0".to_string());
    }
    if config.search_max <= config.search_min {
        return Err("search_max must be greater than search_min".to_string());
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err("tolerance must be > 0".to_string());
    }
    if config.max_iterations == 0 {
        return Err("max_iterations must be > 0".to_string());
    }
    Ok(())
}
