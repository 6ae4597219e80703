//! `analyze`: per-asset and per-portfolio statistics tables.

use anyhow::Result;
use comfy_table::Cell;
use tracing::info;

use crate::cli::data::load_portfolios;
use crate::cli::ui;
use crate::config::AppConfig;
use crate::core::portfolio::Portfolio;
use crate::core::stats;

pub async fn run(config: &AppConfig) -> Result<()> {
    info!("Analyzing configured portfolios...");
    let portfolios = load_portfolios(config).await?;

    for portfolio in &portfolios {
        display_portfolio(portfolio, config);
    }
    Ok(())
}

fn display_portfolio(portfolio: &Portfolio, config: &AppConfig) {
    let analysis = &config.analysis;
    let ppy = analysis.periods_per_year;

    println!(
        "\n{}",
        ui::style_text(&format!("Portfolio: {}", portfolio.name()), ui::StyleType::Title)
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Type"),
        ui::header_cell("Weight"),
        ui::header_cell("Total Return"),
        ui::header_cell("Ann. Volatility"),
        ui::header_cell("Sharpe"),
        ui::header_cell("Max Drawdown"),
    ]);

    for symbol in portfolio.symbols() {
        let series = portfolio
            .series(symbol)
            .expect("portfolio symbols always have a series");
        let returns = series.returns();
        let weight = portfolio.weight(symbol).unwrap_or(0.0);
        table.add_row(vec![
            Cell::new(symbol),
            Cell::new(series.asset_type().to_string()),
            ui::value_cell(format!("{:.1}%", weight * 100.0)),
            ui::change_cell(series.total_return() * 100.0),
            ui::value_cell(format!(
                "{:.2}%",
                stats::annualized_volatility(returns, ppy) * 100.0
            )),
            ui::ratio_cell(stats::sharpe_ratio(returns, analysis.risk_free_rate, ppy)),
            ui::change_cell(stats::max_drawdown(returns) * 100.0),
        ]);
    }
    println!("{table}");

    // Portfolio-level metrics over the weighted return sequence.
    let weighted = portfolio.weighted_returns();
    let portfolio_vol = portfolio.volatility() * ppy.sqrt();
    let sharpe = stats::sharpe_ratio(weighted, analysis.risk_free_rate, ppy);
    let drawdown = stats::max_drawdown(weighted);

    println!(
        "{} {} aligned observations",
        ui::style_text("Observations:", ui::StyleType::TotalLabel),
        portfolio.aligned_dates().len()
    );
    println!(
        "{} {}",
        ui::style_text("Annualized volatility:", ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}%", portfolio_vol * 100.0), ui::StyleType::TotalValue)
    );
    if sharpe.is_finite() {
        println!(
            "{} {sharpe:.2}",
            ui::style_text("Sharpe ratio:", ui::StyleType::TotalLabel)
        );
    } else {
        println!(
            "{} undefined (zero volatility)",
            ui::style_text("Sharpe ratio:", ui::StyleType::TotalLabel)
        );
    }
    println!(
        "{} {:.2}%",
        ui::style_text("Max drawdown:", ui::StyleType::TotalLabel),
        drawdown * 100.0
    );

    match (
        portfolio.value_at_risk(analysis.var_confidence),
        portfolio.parametric_value_at_risk(analysis.var_confidence),
    ) {
        (Ok(historical), Ok(parametric)) => {
            println!(
                "{} {:.2}% daily (historical), {:.2}% daily (parametric) at {:.0}% confidence",
                ui::style_text("Value at risk:", ui::StyleType::TotalLabel),
                historical * 100.0,
                parametric * 100.0,
                analysis.var_confidence * 100.0
            );
        }
        (Err(e), _) | (_, Err(e)) => {
            println!("{}", ui::style_text(&format!("VaR unavailable: {e}"), ui::StyleType::Warning));
        }
    }
}
