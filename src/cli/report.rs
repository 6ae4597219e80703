//! `report`: Markdown portfolio report, written to stdout or a file.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::cli::data::load_portfolios;
use crate::config::{AnalysisConfig, AppConfig};
use crate::core::portfolio::Portfolio;
use crate::core::simulation::{MonteCarloSimulator, SimulationSummary};
use crate::core::stats;

pub async fn run(config: &AppConfig, output: Option<&Path>) -> Result<()> {
    info!("Generating portfolio reports...");
    let portfolios = load_portfolios(config).await?;

    let mut sections = Vec::with_capacity(portfolios.len());
    for portfolio in &portfolios {
        let simulation = MonteCarloSimulator::for_portfolio(portfolio)
            .and_then(|sim| sim.run(&config.simulation))
            .and_then(|result| result.summary(config.analysis.var_confidence))
            .with_context(|| format!("Simulation failed for portfolio '{}'", portfolio.name()))?;
        sections.push(render(portfolio, &config.analysis, Some(&simulation), Utc::now()));
    }
    let report = sections.join("\n\n---\n\n");

    match output {
        Some(path) => {
            std::fs::write(path, &report)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => println!("{report}"),
    }
    Ok(())
}

/// Renders one portfolio's report as Markdown.
pub fn render(
    portfolio: &Portfolio,
    analysis: &AnalysisConfig,
    simulation: Option<&SimulationSummary>,
    generated_at: DateTime<Utc>,
) -> String {
    let ppy = analysis.periods_per_year;
    let mut lines = vec![
        format!("# Portfolio Report: {}", portfolio.name()),
        format!(
            "\n**Generated:** {}",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        "\n## Composition\n".to_string(),
        "| Symbol | Weight | Type | Source |".to_string(),
        "|--------|--------|------|--------|".to_string(),
    ];

    for symbol in portfolio.symbols() {
        let series = portfolio.series(symbol).unwrap();
        let weight = portfolio.weight(symbol).unwrap_or(0.0);
        lines.push(format!(
            "| {symbol} | {:.2}% | {} | {} |",
            weight * 100.0,
            series.asset_type(),
            series.source()
        ));
    }

    let weighted = portfolio.weighted_returns();
    let annualized_vol = portfolio.volatility() * ppy.sqrt();
    lines.push("\n## Portfolio Statistics\n".to_string());
    lines.push(format!(
        "- **Mean Daily Return:** {:.4}%",
        stats::mean_return(weighted) * 100.0
    ));
    lines.push(format!(
        "- **Annualized Return:** {:.2}%",
        stats::annualized_return(weighted, ppy) * 100.0
    ));
    lines.push(format!(
        "- **Annualized Volatility:** {:.2}%",
        annualized_vol * 100.0
    ));
    let sharpe = stats::sharpe_ratio(weighted, analysis.risk_free_rate, ppy);
    lines.push(if sharpe.is_finite() {
        format!("- **Sharpe Ratio:** {sharpe:.4}")
    } else {
        "- **Sharpe Ratio:** undefined (zero volatility)".to_string()
    });
    if let Ok(var) = portfolio.value_at_risk(analysis.var_confidence) {
        lines.push(format!(
            "- **Historical VaR ({:.0}%):** {:.2}% daily",
            analysis.var_confidence * 100.0,
            var * 100.0
        ));
    }

    lines.push("\n## Per-Asset Statistics\n".to_string());
    for symbol in portfolio.symbols() {
        let series = portfolio.series(symbol).unwrap();
        lines.push(format!("\n### {symbol}"));
        for (name, value) in stats::summary(series, analysis.risk_free_rate, ppy) {
            let rendered = match name {
                "sharpe_ratio" if !value.is_finite() => "undefined".to_string(),
                "sharpe_ratio" => format!("{value:.4}"),
                "mean_return" | "volatility" => format!("{:.4}%", value * 100.0),
                _ => format!("{:.2}%", value * 100.0),
            };
            lines.push(format!("- {name}: {rendered}"));
        }
    }

    if let Some(summary) = simulation {
        lines.push("\n## Monte Carlo Projection\n".to_string());
        lines.push(format!(
            "{} trials over {} days from an initial ${:.2}:\n",
            summary.n_simulations, summary.n_days, summary.initial_investment
        ));
        lines.push(format!(
            "- **Expected Final Value:** ${:.2}",
            summary.mean_final
        ));
        lines.push(format!(
            "- **5th / 50th / 95th Percentile:** ${:.2} / ${:.2} / ${:.2}",
            summary.percentile_5, summary.median_final, summary.percentile_95
        ));
        lines.push(format!(
            "- **VaR ({:.0}%):** ${:.2}",
            summary.confidence_level * 100.0,
            summary.value_at_risk
        ));
        lines.push(format!(
            "- **Probability of Loss:** {:.2}%",
            summary.probability_of_loss * 100.0
        ));
    }

    let warnings = collect_warnings(portfolio, annualized_vol);
    if !warnings.is_empty() {
        lines.push("\n## Warnings\n".to_string());
        lines.extend(warnings);
    }

    lines.join("\n")
}

fn collect_warnings(portfolio: &Portfolio, annualized_vol: f64) -> Vec<String> {
    let mut warnings = Vec::new();
    if annualized_vol > 0.3 {
        warnings.push(format!(
            "- **High volatility:** annualized portfolio volatility is {:.1}%, above 30%.",
            annualized_vol * 100.0
        ));
    }
    if let Some(max_weight) = portfolio
        .weights()
        .iter()
        .copied()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        && max_weight > 0.4
    {
        warnings.push(format!(
            "- **Concentration:** a single asset carries {:.1}% of the portfolio, above 40%.",
            max_weight * 100.0
        ));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::test_support::series_from_closes;
    use std::collections::HashMap;

    fn sample_portfolio() -> Portfolio {
        let closes_a = [100.0, 102.0, 101.0, 103.0, 104.5, 103.2];
        let closes_b = [50.0, 49.5, 50.2, 50.0, 51.0, 50.4];
        let holdings = HashMap::from([
            ("AAA".to_string(), series_from_closes("AAA", &closes_a)),
            ("BBB".to_string(), series_from_closes("BBB", &closes_b)),
        ]);
        let weights = HashMap::from([("AAA".to_string(), 0.7), ("BBB".to_string(), 0.3)]);
        Portfolio::new("Sample", holdings, weights).unwrap()
    }

    #[test]
    fn test_report_contains_sections_and_symbols() {
        let portfolio = sample_portfolio();
        let report = render(&portfolio, &AnalysisConfig::default(), None, Utc::now());

        assert!(report.contains("# Portfolio Report: Sample"));
        assert!(report.contains("## Composition"));
        assert!(report.contains("| AAA | 70.00% |"));
        assert!(report.contains("| BBB | 30.00% |"));
        assert!(report.contains("## Portfolio Statistics"));
        assert!(report.contains("### AAA"));
        assert!(report.contains("max_drawdown"));
        // No simulation section when none is supplied.
        assert!(!report.contains("Monte Carlo Projection"));
    }

    #[test]
    fn test_concentration_warning() {
        let portfolio = sample_portfolio();
        let report = render(&portfolio, &AnalysisConfig::default(), None, Utc::now());
        // AAA carries 70% of the portfolio.
        assert!(report.contains("**Concentration:**"));
    }

    #[test]
    fn test_simulation_section_rendered() {
        let portfolio = sample_portfolio();
        let simulator = MonteCarloSimulator::for_portfolio(&portfolio).unwrap();
        let config = crate::core::simulation::SimulationConfig {
            n_simulations: 50,
            n_days: 10,
            seed: Some(3),
            ..Default::default()
        };
        let summary = simulator.run(&config).unwrap().summary(0.95).unwrap();
        let report = render(
            &portfolio,
            &AnalysisConfig::default(),
            Some(&summary),
            Utc::now(),
        );
        assert!(report.contains("## Monte Carlo Projection"));
        assert!(report.contains("50 trials over 10 days"));
        assert!(report.contains("Probability of Loss"));
    }
}
