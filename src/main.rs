//! Financial model CLI
//!
//! Runs the projection, cap table and exit analysis from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use financial_model::assumptions::loader::apply_overrides_file;
use financial_model::exit::{holder_returns, run_waterfall};
use financial_model::history::loader::DEFAULT_HISTORY_PATH;
use financial_model::report::{self, StatementTable};
use financial_model::{FinancialModel, SensitivityAnalyzer};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(
    name = "financial_model",
    version,
    about = "Three-statement projection, cap table and exit waterfall model"
)]
struct Cli {
    /// Historical financials CSV export
    #[arg(long, global = true, default_value = DEFAULT_HISTORY_PATH)]
    history: PathBuf,

    /// Assumptions JSON (base plan when omitted)
    #[arg(long, global = true)]
    assumptions: Option<PathBuf>,

    /// CSV of `key,value` assumption overrides applied on top
    #[arg(long, global = true)]
    overrides: Option<PathBuf>,

    /// Directory to write each table as CSV
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Project the statements and print every table (default)
    Run,

    /// Run the exit waterfall over the final cap table
    Waterfall {
        /// Equity proceeds to distribute instead of the modelled exit value
        #[arg(long)]
        proceeds: Option<f64>,
    },

    /// Run the built-in sensitivity suites
    Sensitivity,
}

fn load_model(cli: &Cli) -> Result<FinancialModel> {
    let model = FinancialModel::load(&cli.history, cli.assumptions.as_deref()).with_context(|| {
        format!("Failed to load model inputs from {}", cli.history.display())
    })?;

    match &cli.overrides {
        Some(path) => {
            let assumptions = apply_overrides_file(model.assumptions(), path)
                .with_context(|| format!("Failed to apply overrides from {}", path.display()))?;
            Ok(model.with_assumptions(assumptions)?)
        }
        None => Ok(model),
    }
}

fn emit(tables: &[StatementTable], output_dir: Option<&Path>) -> Result<()> {
    for table in tables {
        println!("{}", table);
    }

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Unable to create output directory {}", dir.display()))?;
        for table in tables {
            let path = dir.join(format!("{}.csv", table.slug()));
            table
                .write_csv_file(&path)
                .with_context(|| format!("Unable to write {}", path.display()))?;
        }
        println!("{} tables written to: {}", tables.len(), dir.display());
    }
    Ok(())
}

fn run(model: &FinancialModel, output_dir: Option<&Path>) -> Result<()> {
    let output = model.run().context("Model run failed")?;
    let projection = &output.projection;

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
    tables.push(report::waterfall_table(&output.exit.waterfall, &output.exit.returns));
    emit(&tables, output_dir)?;

    let summary = projection.summary();
    let valuation = &output.exit.valuation;
    println!("Summary:");
    println!("  Projected Years: {}", summary.total_years);
    println!("  Total Revenue: ${:.0}", summary.total_revenue);
    println!("  Cumulative Free Cash Flow: ${:.0}", summary.cumulative_free_cash_flow);
    match summary.first_ebitda_positive_year {
        Some(year) => println!("  First EBITDA-positive Year: {}", year),
        None => println!("  First EBITDA-positive Year: not reached"),
    }
    println!("  Minimum Cash: ${:.0}", summary.minimum_cash);
    println!("  Series C Pre-money: ${:.0}", output.series_c_pre_money);
    let cap = output.cap_table.summary();
    println!(
        "  Cap Table: {} rounds, ${:.0} invested, founder {:.2}%, pool {:.2}%",
        cap.rounds,
        cap.total_invested,
        cap.founder_ownership * 100.0,
        cap.pool_ownership * 100.0
    );
    println!(
        "  Exit {}: EV ${:.0}, debt repaid ${:.0}, equity ${:.0}",
        valuation.year, valuation.enterprise_value, valuation.total_debt, valuation.equity_proceeds
    );
    for s in &output.exit.waterfall.shortfalls {
        println!(
            "  Shortfall: {} ({}) paid ${:.0} of ${:.0}",
            s.holder, s.class_name, s.paid, s.claim
        );
    }
    Ok(())
}

fn waterfall(model: &FinancialModel, proceeds: Option<f64>, output_dir: Option<&Path>) -> Result<()> {
    let output = model.run().context("Model run failed")?;
    let exit_year = model.assumptions().exit.exit_year;

    let (result, returns) = match proceeds {
        Some(amount) => {
            let entries = output
                .cap_table
                .latest()
                .map(|s| s.entries.as_slice())
                .context("Cap table has no rounds")?;
            let result = run_waterfall(entries, amount)?;
            let returns = holder_returns(&model.assumptions().financing, &result, exit_year);
            (result, returns)
        }
        None => (output.exit.waterfall, output.exit.returns),
    };

    println!("Distributing ${:.0} at exit in {}\n", result.proceeds, exit_year);
    emit(&[report::waterfall_table(&result, &returns)], output_dir)
}

fn sensitivity(model: FinancialModel, output_dir: Option<&Path>) -> Result<()> {
    let start = Instant::now();
    let analyzer = SensitivityAnalyzer::new(model);
    let suites = analyzer.run_all().context("Sensitivity analysis failed")?;
    let tables: Vec<StatementTable> = suites.iter().map(report::sensitivity_table).collect();
    emit(&tables, output_dir)?;
    println!("Completed {} suites in {:?}", suites.len(), start.elapsed());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let model = load_model(&cli)?;
    let output_dir = cli.output_dir.as_deref();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&model, output_dir),
        Commands::Waterfall { proceeds } => waterfall(&model, proceeds, output_dir),
        Commands::Sensitivity => sensitivity(model, output_dir),
    }
}
