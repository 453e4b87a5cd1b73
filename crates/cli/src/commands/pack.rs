//! `recall pack`: pack prompt components into the context budget.

use anyhow::{Context, Result, bail};
use recall_config::AppConfig;
use recall_context::{BudgetConfig, ContextComponent, PackResult, TokenBudgeter};
use std::path::Path;

pub fn run(
    config: &AppConfig,
    file: &Path,
    in_max: Option<usize>,
    reserve_out: Option<f64>,
    json: bool,
) -> Result<()> {
    let components = load_components(file)?;
    let budget = budget_config(config, in_max, reserve_out)?;
    let result = TokenBudgeter::new(budget).pack(&components);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&result);
    }
    Ok(())
}

pub(crate) fn load_components(file: &Path) -> Result<Vec<ContextComponent>> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of components", file.display()))
}

pub(crate) fn budget_config(
    config: &AppConfig,
    in_max: Option<usize>,
    reserve_out: Option<f64>,
) -> Result<BudgetConfig> {
    let reserve_out = reserve_out.unwrap_or(config.context.reserve_out);
    if !(0.0..1.0).contains(&reserve_out) {
        bail!("--reserve-out must be in [0.0, 1.0), got {reserve_out}");
    }
    Ok(BudgetConfig::new(
        in_max.unwrap_or(config.context.in_max),
        reserve_out,
    ))
}

fn print_report(result: &PackResult) {
    println!(
        "📦 Packed {}/{} tokens ({:.1}%)",
        result.used_tokens, result.available, result.utilization_pct
    );
    for component in &result.included {
        let mark = if component.truncated { " (truncated)" } else { "" };
        println!("   ✅ {:<24} {:>6} tokens{mark}", component.name, component.tokens);
    }
    for drop in &result.dropped {
        println!(
            "   ❌ {:<24} {:>6} tokens ({})",
            drop.name, drop.tokens_dropped, drop.reason
        );
    }
    if !result.contents.is_empty() {
        println!();
        println!("{}", result.contents.join("\n\n"));
    }
}
