//! `simulate`: Monte Carlo projection of each configured portfolio.

use anyhow::{Context, Result};
use comfy_table::Cell;
use tracing::info;

use crate::cli::data::load_portfolios;
use crate::cli::ui;
use crate::config::AppConfig;
use crate::core::simulation::{MonteCarloSimulator, SimulationSummary};

pub async fn run(config: &AppConfig) -> Result<()> {
    info!("Running Monte Carlo simulations...");
    let portfolios = load_portfolios(config).await?;

    for portfolio in &portfolios {
        let simulator = MonteCarloSimulator::for_portfolio(portfolio)
            .with_context(|| format!("Cannot simulate portfolio '{}'", portfolio.name()))?;
        let result = simulator
            .run(&config.simulation)
            .with_context(|| format!("Simulation failed for portfolio '{}'", portfolio.name()))?;
        let summary = result.summary(config.analysis.var_confidence)?;

        println!(
            "\n{}",
            ui::style_text(
                &format!(
                    "Monte Carlo: {} ({} trials, {} days)",
                    portfolio.name(),
                    summary.n_simulations,
                    summary.n_days
                ),
                ui::StyleType::Title
            )
        );
        display_summary(&summary);
    }
    Ok(())
}

fn display_summary(summary: &SimulationSummary) {
    let money = |v: f64| format!("${v:.2}");
    let vs_initial = |v: f64| (v / summary.initial_investment - 1.0) * 100.0;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Metric"),
        ui::header_cell("Value"),
        ui::header_cell("vs. Initial"),
    ]);
    table.add_row(vec![
        Cell::new("Initial investment"),
        ui::value_cell(money(summary.initial_investment)),
        ui::value_cell(String::new()),
    ]);
    table.add_row(vec![
        Cell::new("Expected final value"),
        ui::value_cell(money(summary.mean_final)),
        ui::change_cell(vs_initial(summary.mean_final)),
    ]);
    table.add_row(vec![
        Cell::new("Median final value"),
        ui::value_cell(money(summary.median_final)),
        ui::change_cell(vs_initial(summary.median_final)),
    ]);
    table.add_row(vec![
        Cell::new("5th percentile"),
        ui::value_cell(money(summary.percentile_5)),
        ui::change_cell(vs_initial(summary.percentile_5)),
    ]);
    table.add_row(vec![
        Cell::new("95th percentile"),
        ui::value_cell(money(summary.percentile_95)),
        ui::change_cell(vs_initial(summary.percentile_95)),
    ]);
    table.add_row(vec![
        Cell::new(format!(
            "Value at risk ({:.0}%)",
            summary.confidence_level * 100.0
        )),
        ui::value_cell(money(summary.value_at_risk)),
        ui::change_cell(vs_initial(summary.value_at_risk)),
    ]);
    table.add_row(vec![
        Cell::new("Std. dev of final value"),
        ui::value_cell(money(summary.std_final)),
        ui::value_cell(String::new()),
    ]);
    println!("{table}");

    println!(
        "{} {:.2}%",
        ui::style_text("Probability of loss:", ui::StyleType::TotalLabel),
        summary.probability_of_loss * 100.0
    );
}
