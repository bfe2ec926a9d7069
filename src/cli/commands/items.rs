//! `lfa items` command - Lost & found listing moderation

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::{miette, IntoDiagnostic, Result};

use crate::cli::context::{finish_action, load_section, prompter, AdminContext};
use crate::cli::helpers::{format_item_date, format_timestamp};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::dispatch::ActionDispatcher;
use crate::core::filter::{derive, FilterState};
use crate::core::record::{Item, ItemFacet};

/// Buildings offered by the mobile app's building picker
pub const KNOWN_BUILDINGS: &[&str] = &[
    "อาคาร 1", "อาคาร 2", "อาคาร 3", "อาคาร 4", "อาคาร 5", "อาคาร 6", "อาคาร 7", "อาคาร 8",
    "อาคาร 9", "อาคาร 10", "อาคาร 11", "อาคาร 12", "อาคาร 15", "อาคาร 16", "อาคาร 17",
    "อาคาร 18", "อาคาร 19", "อาคาร 20", "อาคาร 22", "อาคาร 24", "อาคาร 26", "อาคาร 27",
    "อาคาร 28", "อาคาร 29", "อาคาร 30", "อาคาร 31", "อาคาร 33", "โรงอาหาร", "ห้องสมุด",
    "สำนักงาน", "สนาม",
];

#[derive(Subcommand, Debug)]
pub enum ItemsCommands {
    /// List items with search and filters
    List(ListArgs),

    /// Show one item's details
    Show(ShowArgs),

    /// Delete an item
    Delete(DeleteArgs),

    /// Known buildings with item counts
    Buildings,
}

/// Lost/found filter
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    Lost,
    Found,
}

impl StatusFilter {
    fn label(self) -> &'static str {
        match self {
            StatusFilter::Lost => "Lost",
            StatusFilter::Found => "Found",
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Case-insensitive text search over titles, places, contact and dates
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Exact building name
    #[arg(long, short = 'b')]
    pub building: Option<String>,

    /// Lost or found listings only
    #[arg(long, value_enum)]
    pub status: Option<StatusFilter>,

    /// Show at most this many items
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Print only the number of matching items
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Item id
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Item id
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 28),
    ColumnDef::new("status", "STATUS", 6),
    ColumnDef::new("title", "TITLE", 28),
    ColumnDef::new("category", "CATEGORY", 16),
    ColumnDef::new("building", "BUILDING", 14),
    ColumnDef::new("place", "PLACE", 16),
    ColumnDef::new("poster", "POSTED BY", 16),
    ColumnDef::new("date", "DATE", 16),
];

/// Run an items subcommand
pub fn run(cmd: ItemsCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ItemsCommands::List(args) => run_list(args, global),
        ItemsCommands::Show(args) => run_show(args, global),
        ItemsCommands::Delete(args) => run_delete(args, global),
        ItemsCommands::Buildings => run_buildings(global),
    }
}

/// Filter state for the list flags
pub fn filter_from_args(args: &ListArgs) -> FilterState<ItemFacet> {
    let mut filter = FilterState::new();
    if let Some(search) = &args.search {
        filter.set_query(search.as_str());
    }
    if let Some(building) = &args.building {
        filter.set_facet(ItemFacet::Building, building.as_str());
    }
    if let Some(status) = args.status {
        filter.set_facet(ItemFacet::Status, status.label());
    }
    filter
}

fn item_row(item: &Item) -> TableRow {
    TableRow::new(item.id.as_str())
        .cell("id", CellValue::Id(item.id.clone()))
        .cell("status", CellValue::Status(item.status_label()))
        .cell("title", CellValue::opt_text(item.heading()))
        .cell("category", CellValue::opt_text(item.category_name.as_deref()))
        .cell("building", CellValue::opt_text(item.building.as_deref()))
        .cell("place", CellValue::opt_text(item.place()))
        .cell("poster", CellValue::opt_text(item.poster()))
        .cell(
            "date",
            CellValue::Text(format_item_date(item.created_at.as_ref(), item.date.as_deref())),
        )
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut ctx = AdminContext::open()?;
    load_section(&mut ctx.cache.items, &ctx.store);

    let filter = filter_from_args(&args);
    let mut items = derive(ctx.cache.items.records(), &filter);

    if let Some(limit) = args.limit {
        items.truncate(limit);
    }

    if args.count {
        println!("{}", items.len());
        return Ok(());
    }

    let format = ctx.format(global);
    if items.is_empty() && format != OutputFormat::Json {
        if !global.quiet {
            println!("No items found.");
        }
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items).into_diagnostic()?);
        }
        format => {
            let mut formatter = TableFormatter::new(COLUMNS, "item(s)");
            if global.quiet {
                formatter = formatter.without_summary();
            }
            formatter.output(items.into_iter().map(item_row), format);
        }
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let mut ctx = AdminContext::open()?;
    load_section(&mut ctx.cache.items, &ctx.store);

    let item = ctx
        .cache
        .items
        .get(&args.id)
        .ok_or_else(|| miette!("No item with id '{}'", args.id))?;

    match ctx.format(global) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item).into_diagnostic()?);
        }
        OutputFormat::Id => println!("{}", item.id),
        _ => print_item(item),
    }
    Ok(())
}

fn print_item(item: &Item) {
    let field = |label: &str, value: Option<&str>| {
        println!(
            "{:<12} {}",
            style(format!("{}:", label)).bold(),
            value.unwrap_or("-")
        );
    };

    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{:<12} {}",
        style("ID:").bold(),
        style(&item.id).cyan()
    );
    let status = if item.is_lost() {
        style(item.status_label()).red()
    } else {
        style(item.status_label()).green()
    };
    println!("{:<12} {}", style("Status:").bold(), status);
    field("Title", item.heading());
    field("Category", item.category_name.as_deref());
    field("Building", item.building.as_deref());
    field("Place", item.place());
    field("Contact", item.contact.as_deref());
    field("Posted by", item.poster());
    println!(
        "{:<12} {}",
        style("Date:").bold(),
        format_item_date(None, item.date.as_deref())
    );
    println!(
        "{:<12} {}",
        style("Created:").bold(),
        item.created_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_else(|| "-".to_string())
    );
    field("Image", item.image_url.as_deref());
    println!("{}", style("─".repeat(60)).dim());

    if let Some(body) = item.body() {
        println!();
        println!("{}", body);
    }
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let mut ctx = AdminContext::open()?;
    load_section(&mut ctx.cache.items, &ctx.store);

    let Some(item) = ctx.cache.items.get(&args.id) else {
        return Err(miette!("No item with id '{}' in the loaded items", args.id));
    };
    if !args.yes && !global.quiet {
        println!(
            "{} {} ({})",
            style(item.status_label()).bold(),
            item.heading().unwrap_or("-"),
            item.building.as_deref().unwrap_or("-")
        );
    }

    let prompter = prompter(args.yes);
    let mut dispatcher = ActionDispatcher::new(&ctx.store, prompter.as_ref());
    let outcome = dispatcher.delete_record(&mut ctx.cache.items, &args.id);

    finish_action(outcome, |()| {
        if !global.quiet {
            println!("{} Deleted item {}", style("✓").green(), style(&args.id).cyan());
        }
    })
}

/// Item counts per building, known buildings first
pub fn building_counts(items: &[Item]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = KNOWN_BUILDINGS
        .iter()
        .map(|b| (b.to_string(), 0))
        .collect();
    for building in items.iter().filter_map(|i| i.building.as_deref()) {
        match counts.iter_mut().find(|(name, _)| name.as_str() == building) {
            Some((_, count)) => *count += 1,
            None => counts.push((building.to_string(), 1)),
        }
    }
    counts
}

fn run_buildings(global: &GlobalOpts) -> Result<()> {
    let mut ctx = AdminContext::open()?;
    load_section(&mut ctx.cache.items, &ctx.store);

    let counts = building_counts(ctx.cache.items.records());

    match ctx.format(global) {
        OutputFormat::Json => {
            let json: Vec<_> = counts
                .iter()
                .map(|(building, count)| serde_json::json!({ "building": building, "count": count }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Id => {
            for (building, _) in &counts {
                println!("{}", building);
            }
        }
        format => {
            const BUILDING_COLUMNS: &[ColumnDef] = &[
                ColumnDef::new("building", "BUILDING", 20),
                ColumnDef::new("count", "ITEMS", 6),
            ];
            let rows = counts.iter().map(|(building, count)| {
                TableRow::new(building.as_str())
                    .cell("building", CellValue::Text(building.clone()))
                    .cell("count", CellValue::Number(*count as i64))
            });
            let mut formatter = TableFormatter::new(BUILDING_COLUMNS, "building(s)");
            if global.quiet {
                formatter = formatter.without_summary();
            }
            formatter.output(rows, format);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, building: Option<&str>) -> Item {
        let mut item = Item::new(id);
        item.building = building.map(str::to_string);
        item
    }

    #[test]
    fn test_building_counts_keeps_known_order_and_appends_unknown() {
        let items = vec![
            item("a", Some("อาคาร 2")),
            item("b", Some("อาคาร 2")),
            item("c", Some("หอพัก")),
            item("d", None),
        ];
        let counts = building_counts(&items);
        assert_eq!(counts.len(), KNOWN_BUILDINGS.len() + 1);
        assert_eq!(counts[0], ("อาคาร 1".to_string(), 0));
        assert_eq!(counts[1], ("อาคาร 2".to_string(), 2));
        assert_eq!(counts.last(), Some(&("หอพัก".to_string(), 1)));
    }

    #[test]
    fn test_filter_from_args() {
        let args = ListArgs {
            search: Some("wallet".into()),
            building: Some("อาคาร 1".into()),
            status: Some(StatusFilter::Lost),
            limit: None,
            count: false,
        };
        let filter = filter_from_args(&args);
        assert_eq!(filter.query(), "wallet");
        assert_eq!(filter.selected(ItemFacet::Building), Some("อาคาร 1"));
        assert_eq!(filter.selected(ItemFacet::Status), Some("Lost"));
    }
}
