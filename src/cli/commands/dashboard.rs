//! `lfa dashboard` - totals, recent items and top categories

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::context::{reload_section, AdminContext};
use crate::cli::helpers::{format_timestamp, truncate_str};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::stats::{dashboard, DashboardMetrics};

/// Width of the longest category bar
const BAR_WIDTH: usize = 24;

pub fn run(global: &GlobalOpts) -> Result<()> {
    let mut ctx = AdminContext::open()?;

    // The dashboard always shows fresh numbers
    reload_section(&mut ctx.cache.items, &ctx.store);
    reload_section(&mut ctx.cache.users, &ctx.store);

    let metrics = dashboard(&ctx.cache);

    match ctx.format(global) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&metrics).into_diagnostic()?);
        }
        _ => print_dashboard(&metrics),
    }
    Ok(())
}

fn print_dashboard(metrics: &DashboardMetrics) {
    println!("{}", style("Overview").bold().underlined());
    println!();
    println!("  {:<14} {}", "Items", style(metrics.total_items).cyan());
    println!("  {:<14} {}", "Lost", style(metrics.lost_items).red());
    println!("  {:<14} {}", "Found", style(metrics.found_items).green());
    println!("  {:<14} {}", "Users", style(metrics.total_users).cyan());

    println!();
    println!("{}", style("Recent items").bold().underlined());
    println!();
    if metrics.recent.is_empty() {
        println!("  {}", style("(none)").dim());
    }
    for item in &metrics.recent {
        let status = if item.status == "Lost" {
            style(item.status).red()
        } else {
            style(item.status).green()
        };
        println!(
            "  {}  {:<5}  {:<30}  {}",
            style(format_timestamp(&item.timestamp)).dim(),
            status,
            truncate_str(item.heading.as_deref().unwrap_or("-"), 30),
            item.building.as_deref().unwrap_or("-"),
        );
    }

    println!();
    println!("{}", style("Top categories").bold().underlined());
    println!();
    if metrics.categories.is_empty() {
        println!("  {}", style("(none)").dim());
    }
    for category in &metrics.categories {
        let bar_len = ((category.share * BAR_WIDTH as f64).round() as usize).max(1);
        println!(
            "  {:<20} {} {}",
            truncate_str(&category.name, 20),
            style("█".repeat(bar_len)).cyan(),
            category.count
        );
    }
}
