//! AWS Lambda handler for running the financial model
//!
//! Accepts optional assumption overrides as JSON and returns the projected statements,
//! cap table and exit analysis. History and base assumptions are read from the paths in
//! `HISTORY_PATH` and `ASSUMPTIONS_PATH`.
//!
//! Supports Lambda Function URLs for direct HTTP access.

use financial_model::assumptions::loader::DEFAULT_ASSUMPTIONS_PATH;
use financial_model::exit::{holder_returns, run_waterfall};
use financial_model::history::loader::DEFAULT_HISTORY_PATH;
use financial_model::report::{self, StatementTable};
use financial_model::scenario::{Scenario, ScenarioSummary};
use financial_model::{FinancialModel, ModelError, ModelOutput, SensitivityAnalyzer};
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Input for one model run
#[derive(Debug, Default, Deserialize)]
pub struct ModelRequest {
    /// Dotted-path overrides, e.g. {"revenue_growth.rates.2025": 0.45}
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,

    /// Equity proceeds to run the waterfall on instead of the modelled exit value
    #[serde(default)]
    pub exit_proceeds: Option<f64>,

    /// Also run the named scenarios alongside the base case
    #[serde(default)]
    pub scenarios: Vec<ScenarioRequest>,

    /// Include the full model output as well as the tables
    #[serde(default)]
    pub include_detail: bool,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioRequest {
    pub name: String,
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct ModelResponse {
    pub series_c_pre_money: f64,
    pub exit_enterprise_value: f64,
    pub exit_equity_proceeds: f64,
    pub tables: Vec<StatementTable>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<ScenarioSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<ModelOutput>,
    pub execution_time_ms: u64,
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

fn load_base_model() -> Result<FinancialModel, ModelError> {
    let history = env_path("HISTORY_PATH", DEFAULT_HISTORY_PATH);
    let assumptions = env_path("ASSUMPTIONS_PATH", DEFAULT_ASSUMPTIONS_PATH);
    // Fall back to the base plan when no assumptions file is deployed
    let assumptions: Option<&Path> = if assumptions.exists() {
        Some(assumptions.as_path())
    } else {
        None
    };
    FinancialModel::load(&history, assumptions)
}

fn run_request(request: &ModelRequest) -> Result<ModelResponse, ModelError> {
    let start = std::time::Instant::now();

    let base = load_base_model()?;
    let assumptions = base
        .assumptions()
        .with_overrides(request.overrides.iter().map(|(k, v)| (k.as_str(), *v)))?;
    let model = base.with_assumptions(assumptions)?;
    let output = model.run()?;
    let projection = &output.projection;

    let (waterfall, returns) = match request.exit_proceeds {
        Some(amount) => {
            let entries = output
                .cap_table
                .latest()
                .map(|s| s.entries.as_slice())
                .unwrap_or_default();
            let result = run_waterfall(entries, amount)?;
            let returns = holder_returns(
                &model.assumptions().financing,
                &result,
                model.assumptions().exit.exit_year,
            );
            (result, returns)
        }
        None => (output.exit.waterfall.clone(), output.exit.returns.clone()),
    };

    let mut tables = vec![
        report::income_statement(&output.history, projection),
        report::cash_flow_statement(projection),
        report::balance_sheet(projection),
        report::metrics_table(&output.historical_metrics, &projection.metrics),
        report::round_summary(&output.cap_table),
    ];
    if let Some(latest) = output.cap_table.latest() {
        tables.push(report::cap_table_snapshot(latest));
    }
    tables.push(report::waterfall_table(&waterfall, &returns));

    let scenarios = if request.scenarios.is_empty() {
        Vec::new()
    } else {
        let scenarios: Vec<Scenario> = request
            .scenarios
            .iter()
            .map(|s| Scenario {
                name: s.name.clone(),
                overrides: s.overrides.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            })
            .collect();
        SensitivityAnalyzer::new(model).run_scenarios(&scenarios)?
    };

    Ok(ModelResponse {
        series_c_pre_money: output.series_c_pre_money,
        exit_enterprise_value: output.exit.valuation.enterprise_value,
        exit_equity_proceeds: waterfall.proceeds,
        tables,
        scenarios,
        detail: if request.include_detail { Some(output.clone()) } else { None },
        execution_time_ms: start.elapsed().as_millis() as u64,
    })
}

fn cors(builder: lambda_http::http::response::Builder) -> lambda_http::http::response::Builder {
    builder
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
}

fn error_response(status: u16, message: &str) -> Result<Response<Body>, Error> {
    let body = serde_json::json!({ "error": message });
    Ok(cors(Response::builder())
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::Text(body.to_string()))?)
}

fn json_response(body: &ModelResponse) -> Result<Response<Body>, Error> {
    Ok(cors(Response::builder())
        .status(200)
        .header("Content-Type", "application/json")
        .body(Body::Text(serde_json::to_string(body)?))?)
}

/// Lambda handler function
async fn handler(event: Request) -> Result<Response<Body>, Error> {
    // Handle CORS preflight
    if event.method().as_str() == "OPTIONS" {
        return Ok(cors(Response::builder()).status(200).body(Body::Empty)?);
    }

    let body_str = match event.body() {
        Body::Text(s) => s.clone(),
        Body::Binary(b) => String::from_utf8_lossy(b).to_string(),
        Body::Empty => "{}".to_string(),
    };

    let request: ModelRequest = match serde_json::from_str(&body_str) {
        Ok(r) => r,
        Err(e) => return error_response(400, &format!("Invalid JSON: {}", e)),
    };

    match run_request(&request) {
        Ok(response) => json_response(&response),
        Err(
            e @ (ModelError::InvalidOverride { .. }
            | ModelError::InvalidAssumption { .. }
            | ModelError::InvalidInput(_)),
        ) => error_response(400, &e.to_string()),
        Err(e) => {
            log::error!("Model run failed: {}", e);
            error_response(500, &e.to_string())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    run(service_fn(handler)).await
}
