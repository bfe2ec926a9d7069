//! `lfa notifications` command - Match notifications sent to users

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::{miette, IntoDiagnostic, Result};

use crate::cli::context::{finish_action, prompter, reload_section, AdminContext};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::dispatch::ActionDispatcher;
use crate::core::filter::{derive, FilterState};
use crate::core::record::{Notification, NotificationFacet};

#[derive(Subcommand, Debug)]
pub enum NotificationsCommands {
    /// List notifications
    List(ListArgs),

    /// Delete a notification
    Delete(DeleteArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReadFilter {
    Read,
    Unread,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Case-insensitive search over title and body
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Read or unread notifications only
    #[arg(long, value_enum)]
    pub read: Option<ReadFilter>,

    /// Show at most this many notifications
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Print only the number of matching notifications
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Notification id
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 28),
    ColumnDef::new("type", "TYPE", 12),
    ColumnDef::new("title", "TITLE", 30),
    ColumnDef::new("user", "USER", 16),
    ColumnDef::new("match", "MATCH", 5),
    ColumnDef::new("read", "READ", 6),
    ColumnDef::new("created", "CREATED", 16),
];

pub fn run(cmd: NotificationsCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        NotificationsCommands::List(args) => run_list(args, global),
        NotificationsCommands::Delete(args) => run_delete(args, global),
    }
}

fn notification_row(n: &Notification) -> TableRow {
    TableRow::new(n.id.as_str())
        .cell("id", CellValue::Id(n.id.clone()))
        .cell("type", CellValue::Text(n.kind_label().to_string()))
        .cell("title", CellValue::opt_text(n.title.as_deref()))
        .cell("user", CellValue::opt_text(n.user_id.as_deref()))
        .cell("match", CellValue::Percent(n.match_percent()))
        .cell("read", n.is_read.map_or(CellValue::Empty, CellValue::Read))
        .cell("created", n.created_at.map_or(CellValue::Empty, CellValue::DateTime))
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut ctx = AdminContext::open()?;
    // Notifications are always refetched
    reload_section(&mut ctx.cache.notifications, &ctx.store);

    let mut filter = FilterState::new();
    if let Some(search) = &args.search {
        filter.set_query(search.as_str());
    }
    match args.read {
        Some(ReadFilter::Read) => filter.set_facet(NotificationFacet::Read, "true"),
        Some(ReadFilter::Unread) => filter.set_facet(NotificationFacet::Read, "false"),
        None => {}
    }

    let mut notifications = derive(ctx.cache.notifications.records(), &filter);
    if let Some(limit) = args.limit {
        notifications.truncate(limit);
    }

    if args.count {
        println!("{}", notifications.len());
        return Ok(());
    }

    let format = ctx.format(global);
    if notifications.is_empty() && format != OutputFormat::Json {
        if !global.quiet {
            println!("No notifications found.");
        }
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&notifications).into_diagnostic()?);
        }
        format => {
            let mut formatter = TableFormatter::new(COLUMNS, "notification(s)");
            if global.quiet {
                formatter = formatter.without_summary();
            }
            formatter.output(notifications.into_iter().map(notification_row), format);
        }
    }
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let mut ctx = AdminContext::open()?;
    reload_section(&mut ctx.cache.notifications, &ctx.store);

    if !ctx.cache.notifications.contains(&args.id) {
        return Err(miette!(
            "No notification with id '{}' in the loaded notifications",
            args.id
        ));
    }

    let prompter = prompter(args.yes);
    let mut dispatcher = ActionDispatcher::new(&ctx.store, prompter.as_ref());
    let outcome = dispatcher.delete_record(&mut ctx.cache.notifications, &args.id);

    finish_action(outcome, |()| {
        if !global.quiet {
            println!(
                "{} Deleted notification {}",
                style("✓").green(),
                style(&args.id).cyan()
            );
        }
    })
}
