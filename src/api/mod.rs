use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::solver::{BreakEvenConfig, BreakEvenResult, GoalType, solve_break_even};
use crate::core::{
    Advantage, BuyCashflowYear, BuyInputs, Comparison, DEFAULT_HORIZON_YEARS,
    DEFAULT_MONTHLY_INCOME, MacroAssumptions, RentCashflowYear, RentInputs, Scenario,
    buy_cashflow_trace, compare_scenarios, rent_cashflow_trace,
};
use crate::region::RegionTable;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliGoal {
    Rent,
    PropertyGrowth,
}

impl From<CliGoal> for GoalType {
    fn from(value: CliGoal) -> Self {
        match value {
            CliGoal::Rent => GoalType::BreakEvenRent,
            CliGoal::PropertyGrowth => GoalType::BreakEvenPropertyGrowth,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiGoal {
    #[serde(alias = "huur", alias = "monthlyRent", alias = "monthly_rent")]
    Rent,
    #[serde(
        alias = "vastgoedgroei",
        alias = "propertyGrowth",
        alias = "property_growth"
    )]
    PropertyGrowth,
}

impl From<ApiGoal> for CliGoal {
    fn from(value: ApiGoal) -> Self {
        match value {
            ApiGoal::Rent => CliGoal::Rent,
            ApiGoal::PropertyGrowth => CliGoal::PropertyGrowth,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ComparePayload {
    #[serde(alias = "tijdshorizon")]
    horizon_years: Option<u32>,
    #[serde(alias = "maandinkomen")]
    monthly_income: Option<f64>,
    #[serde(alias = "verwacht_rendement", alias = "rendement")]
    expected_return: Option<f64>,
    #[serde(alias = "vastgoedgroei")]
    property_growth: Option<f64>,
    #[serde(alias = "inflatie")]
    inflation: Option<f64>,

    #[serde(alias = "woningprijs")]
    price: Option<f64>,
    #[serde(alias = "overige_kosten_pct")]
    other_costs_pct: Option<f64>,
    #[serde(alias = "eigen_inbreng_pct")]
    down_payment_pct: Option<f64>,
    #[serde(alias = "rentevoet")]
    loan_rate: Option<f64>,
    #[serde(alias = "looptijd_jaren", alias = "looptijd")]
    loan_term_years: Option<u32>,
    #[serde(alias = "onroerende_voorheffing")]
    property_tax: Option<f64>,
    #[serde(alias = "onderhoud_pct")]
    maintenance_pct: Option<f64>,
    #[serde(alias = "verzekering_koper")]
    buy_insurance: Option<f64>,
    #[serde(alias = "andere_kosten_koper")]
    buy_other_costs: Option<f64>,

    #[serde(alias = "maandhuur")]
    monthly_rent: Option<f64>,
    #[serde(alias = "huurindexatie")]
    rent_indexation: Option<f64>,
    #[serde(alias = "verzekering_huur")]
    rent_insurance: Option<f64>,
    #[serde(alias = "andere_kosten_huurder")]
    rent_other_costs: Option<f64>,

    #[serde(alias = "gki")]
    cadastral_income: Option<f64>,
    #[serde(alias = "gemeente")]
    municipality: Option<String>,
    #[serde(alias = "provincie")]
    province: Option<String>,

    include_trace: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BreakEvenPayload {
    #[serde(flatten)]
    scenario: ComparePayload,
    goal: Option<ApiGoal>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

#[derive(Parser, Debug)]
#[command(
    name = "rent-or-buy",
    about = "Year-by-year net worth of buying versus renting a home"
)]
struct App {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare both scenarios at the horizon and year by year
    Compare {
        #[command(flatten)]
        scenario: Cli,
        #[command(flatten)]
        regions: RegionArgs,
        #[arg(long, help = "Print the comparison as JSON")]
        json: bool,
        #[arg(long, help = "Include the per-year cashflow of both scenarios")]
        trace: bool,
    },
    /// Solve the starting rent or property growth at which both scenarios end level
    BreakEven {
        #[command(flatten)]
        scenario: Cli,
        #[command(flatten)]
        regions: RegionArgs,
        #[command(flatten)]
        solve: SolveArgs,
        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[command(flatten)]
        regions: RegionArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct RegionArgs {
    #[arg(
        long,
        requires = "provinces",
        help = "CSV with municipal surcharges (Gemeente;Gemeentelijke Opcentiemen)"
    )]
    municipalities: Option<PathBuf>,
    #[arg(
        long,
        requires = "municipalities",
        help = "CSV with provincial surcharges (Provincie;Provinciale Opcentiemen)"
    )]
    provinces: Option<PathBuf>,
}

impl RegionArgs {
    fn load(&self) -> Result<Option<RegionTable>, String> {
        let (Some(municipalities), Some(provinces)) = (&self.municipalities, &self.provinces)
        else {
            return Ok(None);
        };
        let table = RegionTable::load(municipalities, provinces).map_err(|e| format!("{e:#}"))?;
        info!(
            municipalities = table.municipalities().count(),
            provinces = table.provinces().count(),
            "loaded region surcharges"
        );
        Ok(Some(table))
    }
}

#[derive(Args, Debug, Clone)]
struct SolveArgs {
    #[arg(long, value_enum, default_value_t = CliGoal::Rent)]
    goal: CliGoal,
    #[arg(
        long,
        help = "Lower search bound: monthly rent, or property growth in percent"
    )]
    search_min: Option<f64>,
    #[arg(
        long,
        help = "Upper search bound: monthly rent, or property growth in percent"
    )]
    search_max: Option<f64>,
    #[arg(long, help = "Stop once the search bracket is narrower than this")]
    tolerance: Option<f64>,
    #[arg(long, default_value_t = 100)]
    max_iterations: u32,
}

#[derive(Args, Debug, Clone)]
struct Cli {
    #[arg(
        long,
        default_value_t = DEFAULT_HORIZON_YEARS,
        help = "Projection horizon in years"
    )]
    horizon_years: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_MONTHLY_INCOME,
        help = "Net monthly household income"
    )]
    monthly_income: f64,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Expected nominal annual investment return in percent"
    )]
    expected_return: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Expected nominal annual property appreciation in percent"
    )]
    property_growth: f64,
    #[arg(long, default_value_t = 2.0, help = "Expected annual inflation in percent")]
    inflation: f64,

    #[arg(long, default_value_t = 380_000.0, help = "Purchase price")]
    price: f64,
    #[arg(
        long,
        default_value_t = 4.5,
        help = "Other purchase costs (registration, notary, loan fees) in percent of the price"
    )]
    other_costs_pct: f64,
    #[arg(long, default_value_t = 20.0, help = "Down payment in percent of the price")]
    down_payment_pct: f64,
    #[arg(long, default_value_t = 3.0, help = "Annual loan rate in percent")]
    loan_rate: f64,
    #[arg(long, default_value_t = 25, help = "Loan term in years")]
    loan_term_years: u32,
    #[arg(
        long,
        default_value_t = 1000.0,
        help = "Yearly property tax; ignored when --municipality and --province are given"
    )]
    property_tax: f64,
    #[arg(
        long,
        default_value_t = 1.5,
        help = "Yearly maintenance in percent of the price"
    )]
    maintenance_pct: f64,
    #[arg(long, default_value_t = 400.0, help = "Yearly home insurance for the buyer")]
    buy_insurance: f64,
    #[arg(long, default_value_t = 0.0, help = "Other monthly costs for the buyer")]
    buy_other_costs: f64,

    #[arg(long, default_value_t = 1000.0, help = "Starting monthly rent")]
    monthly_rent: f64,
    #[arg(long, default_value_t = 2.0, help = "Annual rent indexation in percent")]
    rent_indexation: f64,
    #[arg(long, default_value_t = 200.0, help = "Yearly insurance for the renter")]
    rent_insurance: f64,
    #[arg(long, default_value_t = 0.0, help = "Other monthly costs for the renter")]
    rent_other_costs: f64,

    #[arg(long, default_value_t = 2500.0, help = "Indexed cadastral income")]
    cadastral_income: f64,
    #[arg(long, help = "Municipality used to look up the municipal surcharge")]
    municipality: Option<String>,
    #[arg(long, help = "Province used to look up the provincial surcharge")]
    province: Option<String>,
}

#[derive(Clone)]
struct AppState {
    regions: Option<Arc<RegionTable>>,
}

#[derive(Debug)]
struct CompareRequest {
    scenario: Scenario,
    include_trace: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    property_tax: f64,
    #[serde(flatten)]
    comparison: Comparison,
    #[serde(skip_serializing_if = "Option::is_none")]
    buy_cashflow: Option<Vec<BuyCashflowYear>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rent_cashflow: Option<Vec<RentCashflowYear>>,
}

#[derive(Debug, Serialize)]
struct RegionsResponse {
    municipalities: Vec<String>,
    provinces: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run() -> Result<(), String> {
    let app = App::parse();
    match app.command {
        Command::Compare {
            scenario,
            regions,
            json,
            trace,
        } => {
            let regions = regions.load()?;
            let scenario = build_inputs(scenario, regions.as_ref())?;
            let response = run_compare(&CompareRequest {
                scenario,
                include_trace: trace,
            })?;
            if json {
                println!("{}", to_json(&response)?);
            } else {
                print!("{}", render_report(&response));
            }
            Ok(())
        }
        Command::BreakEven {
            scenario,
            regions,
            solve,
            json,
        } => {
            let regions = regions.load()?;
            let scenario = build_inputs(scenario, regions.as_ref())?;
            let result = solve_break_even(&scenario, break_even_config(&solve)?)?;
            if json {
                println!("{}", to_json(&result)?);
            } else {
                print!("{}", render_break_even(&result));
            }
            Ok(())
        }
        Command::Serve { port, regions } => {
            let regions = regions.load()?;
            run_http_server(port, regions)
                .await
                .map_err(|e| format!("Server error: {e}"))
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Cannot serialize output: {e}"))
}

fn build_inputs(cli: Cli, regions: Option<&RegionTable>) -> Result<Scenario, String> {
    if !(1..=40).contains(&cli.horizon_years) {
        return Err("--horizon-years must be between 1 and 40".to_string());
    }

    if !(1..=40).contains(&cli.loan_term_years) {
        return Err("--loan-term-years must be between 1 and 40".to_string());
    }

    for (name, value, min, max) in [
        ("--monthly-income", cli.monthly_income, 1_000.0, 10_000.0),
        ("--expected-return", cli.expected_return, 0.0, 15.0),
        ("--property-growth", cli.property_growth, 0.0, 10.0),
        ("--inflation", cli.inflation, 0.0, 10.0),
        ("--price", cli.price, 50_000.0, 2_000_000.0),
        ("--other-costs-pct", cli.other_costs_pct, 0.0, 10.0),
        ("--down-payment-pct", cli.down_payment_pct, 0.0, 100.0),
        ("--loan-rate", cli.loan_rate, 0.0, 10.0),
        ("--maintenance-pct", cli.maintenance_pct, 0.0, 5.0),
        ("--buy-insurance", cli.buy_insurance, 0.0, 2_000.0),
        ("--buy-other-costs", cli.buy_other_costs, 0.0, 5_000.0),
        ("--monthly-rent", cli.monthly_rent, 300.0, 5_000.0),
        ("--rent-indexation", cli.rent_indexation, 0.0, 10.0),
        ("--rent-insurance", cli.rent_insurance, 0.0, 2_000.0),
        ("--rent-other-costs", cli.rent_other_costs, 0.0, 5_000.0),
        ("--cadastral-income", cli.cadastral_income, 500.0, 10_000.0),
    ] {
        if !(min..=max).contains(&value) {
            return Err(format!("{name} must be between {min} and {max}"));
        }
    }

    if !cli.property_tax.is_finite() || cli.property_tax < 0.0 {
        return Err("--property-tax must be >= 0".to_string());
    }

    let property_tax = resolve_property_tax(&cli, regions)?;
    let price = cli.price;
    let other_costs_pct = cli.other_costs_pct / 100.0;
    let down_payment_pct = cli.down_payment_pct / 100.0;

    Ok(Scenario {
        buy: BuyInputs {
            price,
            other_costs_pct,
            down_payment_pct,
            loan_rate: cli.loan_rate / 100.0,
            loan_term_years: cli.loan_term_years,
            property_tax,
            maintenance_pct: cli.maintenance_pct / 100.0,
            insurance_per_year: cli.buy_insurance,
            other_costs_per_month: cli.buy_other_costs,
        },
        rent: RentInputs {
            monthly_rent: cli.monthly_rent,
            rent_indexation: cli.rent_indexation / 100.0,
            insurance_per_year: cli.rent_insurance,
            other_costs_per_month: cli.rent_other_costs,
            price,
            down_payment_pct,
            other_costs_pct,
        },
        macros: MacroAssumptions {
            horizon_years: cli.horizon_years,
            expected_return: cli.expected_return / 100.0,
            property_growth: cli.property_growth / 100.0,
            monthly_income: cli.monthly_income,
            inflation: cli.inflation / 100.0,
        },
    })
}

fn resolve_property_tax(cli: &Cli, regions: Option<&RegionTable>) -> Result<f64, String> {
    match (&cli.municipality, &cli.province) {
        (None, None) => Ok(cli.property_tax),
        (Some(municipality), Some(province)) => {
            let Some(regions) = regions else {
                return Err(
                    "--municipality and --province need a region dataset (--municipalities and --provinces)"
                        .to_string(),
                );
            };
            let tax = regions
                .property_tax(cli.cadastral_income, municipality, province)
                .map_err(|e| e.to_string())?;
            debug!(%municipality, %province, tax, "derived property tax from surcharges");
            Ok(tax)
        }
        _ => Err("--municipality and --province must be given together".to_string()),
    }
}

fn break_even_config(solve: &SolveArgs) -> Result<BreakEvenConfig, String> {
    let goal_type = GoalType::from(solve.goal);
    // Growth bounds are given in percent like every other rate.
    let (min, max, tolerance) = match goal_type {
        GoalType::BreakEvenRent => (
            solve.search_min.unwrap_or(0.0),
            solve.search_max.unwrap_or(10_000.0),
            solve.tolerance.unwrap_or(0.01),
        ),
        GoalType::BreakEvenPropertyGrowth => (
            solve.search_min.unwrap_or(0.0) / 100.0,
            solve.search_max.unwrap_or(20.0) / 100.0,
            solve.tolerance.unwrap_or(0.0001) / 100.0,
        ),
    };

    if solve.max_iterations == 0 {
        return Err("--max-iterations must be > 0".to_string());
    }

    Ok(BreakEvenConfig {
        goal_type,
        search_min: min,
        search_max: max,
        tolerance,
        max_iterations: solve.max_iterations,
    })
}

fn run_compare(request: &CompareRequest) -> Result<CompareResponse, String> {
    let scenario = &request.scenario;
    let comparison = compare_scenarios(scenario).map_err(|e| e.to_string())?;

    let (buy_cashflow, rent_cashflow) = if request.include_trace {
        let buy = buy_cashflow_trace(&scenario.buy, &scenario.macros).map_err(|e| e.to_string())?;
        let rent = rent_cashflow_trace(
            &scenario.rent,
            comparison.buy.monthly_payment,
            &scenario.macros,
        )
        .map_err(|e| e.to_string())?;
        (Some(buy), Some(rent))
    } else {
        (None, None)
    };

    Ok(CompareResponse {
        property_tax: scenario.buy.property_tax,
        comparison,
        buy_cashflow,
        rent_cashflow,
    })
}

pub async fn run_http_server(port: u16, regions: Option<RegionTable>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let state = Arc::new(AppState {
        regions: regions.map(Arc::new),
    });
    let app = Router::new()
        .route(
            "/api/compare",
            get(compare_get_handler).post(compare_post_handler),
        )
        .route(
            "/api/break-even",
            get(break_even_get_handler).post(break_even_handler),
        )
        .route("/api/regions", get(regions_handler))
        .fallback(not_found_handler)
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!("rent-or-buy HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/compare");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn compare_get_handler(
    State(state): State<Arc<AppState>>,
    Query(payload): Query<ComparePayload>,
) -> Response {
    compare_handler_impl(&state, payload).await
}

async fn compare_post_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ComparePayload>,
) -> Response {
    compare_handler_impl(&state, payload).await
}

async fn compare_handler_impl(state: &AppState, payload: ComparePayload) -> Response {
    let request = match api_request_from_payload(payload, state.regions.as_deref()) {
        Ok(request) => request,
        Err(msg) => {
            warn!(error = %msg, "rejected compare request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    debug!(
        horizon = request.scenario.macros.horizon_years,
        price = request.scenario.buy.price,
        "comparing scenarios"
    );
    match run_compare(&request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => {
            warn!(error = %msg, "compare failed validation");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

async fn break_even_get_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match break_even_payload_from_query(params) {
        Ok(payload) => break_even_handler_impl(&state, payload).await,
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

const TEXT_QUERY_KEYS: [&str; 5] = ["municipality", "gemeente", "province", "provincie", "goal"];

// Flattened payloads cannot read numbers straight from a query string, so values are
// typed before deserializing.
fn break_even_payload_from_query(
    params: HashMap<String, String>,
) -> Result<BreakEvenPayload, String> {
    let object = params
        .into_iter()
        .map(|(key, raw)| {
            let value = if TEXT_QUERY_KEYS.contains(&key.as_str()) {
                serde_json::Value::String(raw)
            } else if let Ok(number) = raw.parse::<serde_json::Number>() {
                serde_json::Value::Number(number)
            } else if let Ok(flag) = raw.parse::<bool>() {
                serde_json::Value::Bool(flag)
            } else {
                serde_json::Value::String(raw)
            };
            (key, value)
        })
        .collect::<serde_json::Map<_, _>>();
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| format!("Invalid break-even query: {e}"))
}

async fn break_even_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BreakEvenPayload>,
) -> Response {
    break_even_handler_impl(&state, payload).await
}

async fn break_even_handler_impl(state: &AppState, payload: BreakEvenPayload) -> Response {
    let result = break_even_request_from_payload(payload, state.regions.as_deref())
        .and_then(|(scenario, config)| solve_break_even(&scenario, config));
    match result {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(msg) => {
            warn!(error = %msg, "rejected break-even request");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

async fn regions_handler(State(state): State<Arc<AppState>>) -> Response {
    let Some(regions) = state.regions.as_deref() else {
        return error_response(StatusCode::NOT_FOUND, "No region dataset loaded");
    };
    json_response(
        StatusCode::OK,
        RegionsResponse {
            municipalities: regions.municipalities().map(str::to_string).collect(),
            provinces: regions.provinces().map(str::to_string).collect(),
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<CompareRequest, String> {
    let payload = serde_json::from_str::<ComparePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload, None)
}

fn api_request_from_payload(
    payload: ComparePayload,
    regions: Option<&RegionTable>,
) -> Result<CompareRequest, String> {
    let include_trace = payload.include_trace.unwrap_or(false);
    let cli = cli_from_payload(payload);
    let scenario = build_inputs(cli, regions)?;
    Ok(CompareRequest {
        scenario,
        include_trace,
    })
}

fn break_even_request_from_payload(
    payload: BreakEvenPayload,
    regions: Option<&RegionTable>,
) -> Result<(Scenario, BreakEvenConfig), String> {
    let solve = SolveArgs {
        goal: payload.goal.map_or(CliGoal::Rent, CliGoal::from),
        search_min: payload.search_min,
        search_max: payload.search_max,
        tolerance: payload.tolerance,
        max_iterations: payload.max_iterations.unwrap_or(100),
    };
    let scenario = build_inputs(cli_from_payload(payload.scenario), regions)?;
    Ok((scenario, break_even_config(&solve)?))
}

fn cli_from_payload(payload: ComparePayload) -> Cli {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.horizon_years {
        cli.horizon_years = v;
    }
    if let Some(v) = payload.monthly_income {
        cli.monthly_income = v;
    }
    if let Some(v) = payload.expected_return {
        cli.expected_return = v;
    }
    if let Some(v) = payload.property_growth {
        cli.property_growth = v;
    }
    if let Some(v) = payload.inflation {
        cli.inflation = v;
    }

    if let Some(v) = payload.price {
        cli.price = v;
    }
    if let Some(v) = payload.other_costs_pct {
        cli.other_costs_pct = v;
    }
    if let Some(v) = payload.down_payment_pct {
        cli.down_payment_pct = v;
    }
    if let Some(v) = payload.loan_rate {
        cli.loan_rate = v;
    }
    if let Some(v) = payload.loan_term_years {
        cli.loan_term_years = v;
    }
    if let Some(v) = payload.property_tax {
        cli.property_tax = v;
    }
    if let Some(v) = payload.maintenance_pct {
        cli.maintenance_pct = v;
    }
    if let Some(v) = payload.buy_insurance {
        cli.buy_insurance = v;
    }
    if let Some(v) = payload.buy_other_costs {
        cli.buy_other_costs = v;
    }

    if let Some(v) = payload.monthly_rent {
        cli.monthly_rent = v;
    }
    if let Some(v) = payload.rent_indexation {
        cli.rent_indexation = v;
    }
    if let Some(v) = payload.rent_insurance {
        cli.rent_insurance = v;
    }
    if let Some(v) = payload.rent_other_costs {
        cli.rent_other_costs = v;
    }

    if let Some(v) = payload.cadastral_income {
        cli.cadastral_income = v;
    }
    if payload.municipality.is_some() {
        cli.municipality = payload.municipality;
    }
    if payload.province.is_some() {
        cli.province = payload.province;
    }

    cli
}

fn default_cli_for_api() -> Cli {
    Cli {
        horizon_years: DEFAULT_HORIZON_YEARS,
        monthly_income: DEFAULT_MONTHLY_INCOME,
        expected_return: 4.0,
        property_growth: 2.0,
        inflation: 2.0,
        price: 380_000.0,
        other_costs_pct: 4.5,
        down_payment_pct: 20.0,
        loan_rate: 3.0,
        loan_term_years: 25,
        property_tax: 1_000.0,
        maintenance_pct: 1.5,
        buy_insurance: 400.0,
        buy_other_costs: 0.0,
        monthly_rent: 1_000.0,
        rent_indexation: 2.0,
        rent_insurance: 200.0,
        rent_other_costs: 0.0,
        cadastral_income: 2_500.0,
        municipality: None,
        province: None,
    }
}

fn render_report(response: &CompareResponse) -> String {
    let c = &response.comparison;
    let mut out = String::new();
    out.push_str("Buy\n");
    out.push_str(&format!(
        "  Monthly payment: {}\n",
        format_eur(c.buy.monthly_payment)
    ));
    out.push_str(&format!("  Total cost: {}\n", format_eur(c.buy.total_cost)));
    out.push_str(&format!(
        "  Net worth: {} (today's money: {})\n",
        format_eur(c.buy.net_worth),
        format_eur(c.buy_net_worth_real)
    ));
    out.push_str("Rent\n");
    out.push_str(&format!("  Total cost: {}\n", format_eur(c.rent.total_cost)));
    out.push_str(&format!(
        "  Net worth: {} (today's money: {})\n",
        format_eur(c.rent.net_worth),
        format_eur(c.rent_net_worth_real)
    ));
    out.push_str(&format!(
        "After {} years: {} ahead by {} in today's money\n",
        c.horizon_years,
        match c.advantage {
            Advantage::Buy => "buying",
            Advantage::Rent => "renting",
            Advantage::Even => "neither",
        },
        format_eur((c.buy_net_worth_real - c.rent_net_worth_real).abs())
    ));
    match c.break_even_year {
        Some(year) => out.push_str(&format!("Buying leads from year {year}\n")),
        None => out.push_str("Buying never leads within the horizon\n"),
    }

    out.push_str("\nYear  Buy net worth     Rent net worth    Difference\n");
    for point in &c.trajectory {
        out.push_str(&format!(
            "{:>4}  {:>16}  {:>16}  {:>16}\n",
            point.year,
            format_eur(point.buy_net_worth),
            format_eur(point.rent_net_worth),
            format_eur(point.difference)
        ));
    }
    out
}

fn render_break_even(result: &BreakEvenResult) -> String {
    let mut out = format!("{}\n", result.message);
    if let Some(value) = result.solved_value {
        match result.goal_type {
            GoalType::BreakEvenRent => {
                out.push_str(&format!("Break-even starting rent: {}\n", format_eur(value)));
            }
            GoalType::BreakEvenPropertyGrowth => {
                out.push_str(&format!(
                    "Break-even property growth: {:.3}%\n",
                    value * 100.0
                ));
            }
        }
    }
    out
}

fn format_eur(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-€ {grouped}")
    } else {
        format!("€ {grouped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    fn sample_regions() -> RegionTable {
        RegionTable::from_readers(
            "Gemeente;Gemeentelijke Opcentiemen\nGent;975\n".as_bytes(),
            "Provincie;Provinciale Opcentiemen\nOost-Vlaanderen;30,5\n".as_bytes(),
        )
        .expect("sample regions parse")
    }

    #[test]
    fn build_inputs_converts_percentages_to_fractions() {
        let inputs = build_inputs(sample_cli(), None).expect("valid inputs");
        assert_approx(inputs.buy.other_costs_pct, 0.045);
        assert_approx(inputs.buy.down_payment_pct, 0.20);
        assert_approx(inputs.buy.loan_rate, 0.03);
        assert_approx(inputs.buy.maintenance_pct, 0.015);
        assert_approx(inputs.rent.rent_indexation, 0.02);
        assert_approx(inputs.macros.expected_return, 0.04);
        assert_approx(inputs.macros.inflation, 0.02);
        assert_approx(inputs.rent.price, inputs.buy.price);
        assert_approx(inputs.rent.down_payment_pct, inputs.buy.down_payment_pct);
        assert_approx(inputs.buy.property_tax, 1_000.0);
    }

    #[test]
    fn build_inputs_rejects_out_of_range_values() {
        let mut cli = sample_cli();
        cli.down_payment_pct = 120.0;
        let err = build_inputs(cli, None).expect_err("must reject down payment above 100%");
        assert!(err.contains("--down-payment-pct"));

        let mut cli = sample_cli();
        cli.horizon_years = 0;
        let err = build_inputs(cli, None).expect_err("must reject zero horizon");
        assert!(err.contains("--horizon-years"));

        let mut cli = sample_cli();
        cli.loan_term_years = 0;
        let err = build_inputs(cli, None).expect_err("must reject zero loan term");
        assert!(err.contains("--loan-term-years"));

        let mut cli = sample_cli();
        cli.monthly_rent = f64::NAN;
        let err = build_inputs(cli, None).expect_err("must reject NaN rent");
        assert!(err.contains("--monthly-rent"));
    }

    #[test]
    fn build_inputs_derives_property_tax_from_regions() {
        let mut cli = sample_cli();
        cli.cadastral_income = 2_000.0;
        cli.municipality = Some("gent".to_string());
        cli.province = Some("Oost-Vlaanderen".to_string());

        let inputs = build_inputs(cli, Some(&sample_regions())).expect("valid inputs");
        assert_approx(inputs.buy.property_tax, 50.0 * (1.0 + 9.75 + 0.305));
    }

    #[test]
    fn build_inputs_requires_region_dataset_and_both_names() {
        let mut cli = sample_cli();
        cli.municipality = Some("Gent".to_string());
        cli.province = Some("Oost-Vlaanderen".to_string());
        let err = build_inputs(cli, None).expect_err("needs dataset");
        assert!(err.contains("region dataset"));

        let mut cli = sample_cli();
        cli.municipality = Some("Gent".to_string());
        let err = build_inputs(cli, Some(&sample_regions())).expect_err("needs province");
        assert!(err.contains("together"));

        let mut cli = sample_cli();
        cli.municipality = Some("Brugge".to_string());
        cli.province = Some("Oost-Vlaanderen".to_string());
        let err = build_inputs(cli, Some(&sample_regions())).expect_err("unknown municipality");
        assert!(err.contains("Brugge"));
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "horizonYears": 15,
          "monthlyIncome": 4200,
          "price": 300000,
          "otherCostsPct": 7,
          "downPaymentPct": 25,
          "loanRate": 3.5,
          "loanTermYears": 20,
          "propertyTax": 900,
          "monthlyRent": 1100,
          "rentIndexation": 1.5,
          "includeTrace": true
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let scenario = request.scenario;

        assert!(request.include_trace);
        assert_eq!(scenario.macros.horizon_years, 15);
        assert_approx(scenario.macros.monthly_income, 4_200.0);
        assert_approx(scenario.buy.price, 300_000.0);
        assert_approx(scenario.buy.other_costs_pct, 0.07);
        assert_approx(scenario.buy.down_payment_pct, 0.25);
        assert_approx(scenario.buy.loan_rate, 0.035);
        assert_eq!(scenario.buy.loan_term_years, 20);
        assert_approx(scenario.buy.property_tax, 900.0);
        assert_approx(scenario.rent.monthly_rent, 1_100.0);
        assert_approx(scenario.rent.rent_indexation, 0.015);
    }

    #[test]
    fn api_request_from_json_accepts_dutch_field_names() {
        let json = r#"{
          "tijdshorizon": 10,
          "woningprijs": 250000,
          "eigen_inbreng_pct": 30,
          "rentevoet": 2.5,
          "looptijd_jaren": 30,
          "onroerende_voorheffing": 1200,
          "maandhuur": 900,
          "huurindexatie": 3,
          "inflatie": 2.5
        }"#;
        let scenario = api_request_from_json(json).expect("json should parse").scenario;
        assert_eq!(scenario.macros.horizon_years, 10);
        assert_approx(scenario.buy.price, 250_000.0);
        assert_approx(scenario.buy.down_payment_pct, 0.30);
        assert_approx(scenario.buy.loan_rate, 0.025);
        assert_eq!(scenario.buy.loan_term_years, 30);
        assert_approx(scenario.buy.property_tax, 1_200.0);
        assert_approx(scenario.rent.monthly_rent, 900.0);
        assert_approx(scenario.rent.rent_indexation, 0.03);
        assert_approx(scenario.macros.inflation, 0.025);
    }

    #[test]
    fn compare_response_serialization_contains_expected_fields() {
        let request = api_request_from_json(r#"{"includeTrace": true, "horizonYears": 5}"#)
            .expect("json should parse");
        let response = run_compare(&request).expect("valid scenario");
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"propertyTax\""));
        assert!(json.contains("\"buy\""));
        assert!(json.contains("\"rent\""));
        assert!(json.contains("\"monthlyPayment\""));
        assert!(json.contains("\"buyNetWorthReal\""));
        assert!(json.contains("\"rentNetWorthReal\""));
        assert!(json.contains("\"advantage\""));
        assert!(json.contains("\"trajectory\""));
        assert!(json.contains("\"buyCashflow\""));
        assert!(json.contains("\"rentCashflow\""));

        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["trajectory"].as_array().map(Vec::len), Some(5));
        assert_eq!(value["buyCashflow"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn compare_without_trace_omits_cashflow() {
        let request = api_request_from_json("{}").expect("defaults are valid");
        let response = run_compare(&request).expect("valid scenario");
        assert!(response.buy_cashflow.is_none());
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(!json.contains("buyCashflow"));
    }

    #[test]
    fn break_even_payload_parses_goal_and_bounds() {
        let json = r#"{
          "goal": "property-growth",
          "searchMin": 0,
          "searchMax": 15,
          "monthlyRent": 400,
          "price": 300000,
          "otherCostsPct": 7,
          "maintenancePct": 1
        }"#;
        let payload = serde_json::from_str::<BreakEvenPayload>(json).expect("json should parse");
        let (scenario, config) =
            break_even_request_from_payload(payload, None).expect("valid request");
        assert_eq!(config.goal_type, GoalType::BreakEvenPropertyGrowth);
        assert_approx(config.search_max, 0.15);
        assert_approx(scenario.rent.monthly_rent, 400.0);

        let result = solve_break_even(&scenario, config).expect("must solve");
        assert!(result.feasible);
    }

    #[test]
    fn break_even_query_types_numeric_values() {
        let params = HashMap::from([
            ("goal".to_string(), "rent".to_string()),
            ("searchMax".to_string(), "5000".to_string()),
            ("maandhuur".to_string(), "900".to_string()),
            ("gemeente".to_string(), "Gent".to_string()),
        ]);
        let payload = break_even_payload_from_query(params).expect("query should parse");
        assert_eq!(payload.goal, Some(ApiGoal::Rent));
        assert_eq!(payload.search_max, Some(5_000.0));
        assert_eq!(payload.scenario.monthly_rent, Some(900.0));
        assert_eq!(payload.scenario.municipality.as_deref(), Some("Gent"));

        let params = HashMap::from([("searchMax".to_string(), "veel".to_string())]);
        assert!(break_even_payload_from_query(params).is_err());
    }

    #[test]
    fn break_even_query_keeps_region_names_as_text() {
        let params = HashMap::from([
            ("gemeente".to_string(), "1".to_string()),
            ("province".to_string(), "2".to_string()),
            ("maandhuur".to_string(), "900".to_string()),
        ]);
        let payload = break_even_payload_from_query(params).expect("query should parse");
        assert_eq!(payload.scenario.municipality.as_deref(), Some("1"));
        assert_eq!(payload.scenario.province.as_deref(), Some("2"));
        assert_eq!(payload.scenario.monthly_rent, Some(900.0));
    }

    #[tokio::test]
    async fn compare_get_handler_reads_query_string() {
        let uri: axum::http::Uri = "/api/compare?horizonYears=5&maandhuur=900&includeTrace=true"
            .parse()
            .expect("valid uri");
        let query = Query::<ComparePayload>::try_from_uri(&uri).expect("query should parse");
        assert_eq!(query.monthly_rent, Some(900.0));

        let state = Arc::new(AppState { regions: None });
        let response = compare_get_handler(State(state), query).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("valid json");
        assert_eq!(value["horizonYears"], 5);
        assert_eq!(value["trajectory"].as_array().map(Vec::len), Some(5));
        assert_eq!(value["buyCashflow"].as_array().map(Vec::len), Some(5));
    }

    #[tokio::test]
    async fn compare_get_handler_rejects_out_of_range_query() {
        let uri: axum::http::Uri = "/api/compare?price=10".parse().expect("valid uri");
        let query = Query::<ComparePayload>::try_from_uri(&uri).expect("query should parse");
        let state = Arc::new(AppState { regions: None });
        let response = compare_get_handler(State(state), query).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn format_eur_groups_thousands() {
        assert_eq!(format_eur(0.0), "€ 0");
        assert_eq!(format_eur(999.4), "€ 999");
        assert_eq!(format_eur(1_174_050.94), "€ 1,174,051");
        assert_eq!(format_eur(-12_345.0), "-€ 12,345");
    }

    #[test]
    fn report_lists_every_trajectory_year() {
        let request = api_request_from_json(r#"{"horizonYears": 3}"#).expect("valid");
        let response = run_compare(&request).expect("valid scenario");
        let report = render_report(&response);
        assert!(report.contains("Monthly payment"));
        assert!(report.contains("After 3 years"));
        assert_eq!(report.lines().filter(|l| l.starts_with("   ")).count(), 3);
    }

    #[tokio::test]
    async fn compare_handler_rejects_invalid_payload() {
        let state = AppState { regions: None };
        let payload = ComparePayload {
            price: Some(10.0),
            ..ComparePayload::default()
        };
        let response = compare_handler_impl(&state, payload).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn compare_handler_returns_ok_for_defaults() {
        let state = AppState { regions: None };
        let response = compare_handler_impl(&state, ComparePayload::default()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&header::HeaderValue::from_static("no-store"))
        );
    }

    #[tokio::test]
    async fn regions_handler_requires_dataset() {
        let response = regions_handler(State(Arc::new(AppState { regions: None }))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let state = Arc::new(AppState {
            regions: Some(Arc::new(sample_regions())),
        });
        let response = regions_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
