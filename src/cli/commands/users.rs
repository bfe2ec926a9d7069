//! `lfa users` command - Accounts, roles and cascading deletion

use clap::Subcommand;
use console::style;
use miette::{miette, IntoDiagnostic, Result};

use crate::cli::context::{finish_action, load_section, prompter, AdminContext};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::cache::LocalCache;
use crate::core::dispatch::{ActionDispatcher, ActionError, ActionOutcome};
use crate::core::filter::{derive, FilterState};
use crate::core::record::{Role, User, UserFacet};

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// List users with their item counts
    List(ListArgs),

    /// Delete a user together with their items and notifications
    Delete(UserActionArgs),

    /// Switch a user between the admin and user roles
    ToggleRole(UserActionArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Case-insensitive search over email and names
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Only users whose stored role is exactly this
    #[arg(long, value_enum)]
    pub role: Option<Role>,

    /// Show at most this many users
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Print only the number of matching users
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct UserActionArgs {
    /// User id
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 28),
    ColumnDef::new("name", "NAME", 24),
    ColumnDef::new("email", "EMAIL", 30),
    ColumnDef::new("role", "ROLE", 5),
    ColumnDef::new("items", "ITEMS", 5),
    ColumnDef::new("created", "CREATED", 16),
];

/// Run a users subcommand
pub fn run(cmd: UsersCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        UsersCommands::List(args) => run_list(args, global),
        UsersCommands::Delete(args) => run_delete(args, global),
        UsersCommands::ToggleRole(args) => run_toggle_role(args, global),
    }
}

fn user_row(user: &User, cache: &LocalCache) -> TableRow {
    TableRow::new(user.id.as_str())
        .cell("id", CellValue::Id(user.id.clone()))
        .cell("name", CellValue::opt_text(user.display_name()))
        .cell("email", CellValue::opt_text(user.email.as_deref()))
        .cell("role", CellValue::Role(user.role_label().to_string()))
        .cell("items", CellValue::Number(cache.item_count_for(&user.id) as i64))
        .cell(
            "created",
            user.created_at.map_or(CellValue::Empty, CellValue::DateTime),
        )
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut ctx = AdminContext::open()?;
    load_section(&mut ctx.cache.users, &ctx.store);
    // Item counts come from the items cache
    load_section(&mut ctx.cache.items, &ctx.store);

    let mut filter = FilterState::new();
    if let Some(search) = &args.search {
        filter.set_query(search.as_str());
    }
    if let Some(role) = args.role {
        filter.set_facet(UserFacet::Role, role.as_str());
    }

    let mut users = derive(ctx.cache.users.records(), &filter);
    if let Some(limit) = args.limit {
        users.truncate(limit);
    }

    if args.count {
        println!("{}", users.len());
        return Ok(());
    }

    let format = ctx.format(global);
    if users.is_empty() && format != OutputFormat::Json {
        if !global.quiet {
            println!("No users found.");
        }
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = users
                .iter()
                .map(|u| -> Result<serde_json::Value> {
                    let mut value = serde_json::to_value(u).into_diagnostic()?;
                    if let Some(obj) = value.as_object_mut() {
                        obj.insert(
                            "itemCount".to_string(),
                            ctx.cache.item_count_for(&u.id).into(),
                        );
                    }
                    Ok(value)
                })
                .collect::<Result<_>>()?;
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        format => {
            let mut formatter = TableFormatter::new(COLUMNS, "user(s)");
            if global.quiet {
                formatter = formatter.without_summary();
            }
            formatter.output(users.iter().map(|u| user_row(u, &ctx.cache)), format);
        }
    }
    Ok(())
}

fn run_delete(args: UserActionArgs, global: &GlobalOpts) -> Result<()> {
    let mut ctx = AdminContext::open()?;

    // Related records are found in the cache, so every section must load
    // cleanly or the cascade would leave orphans behind
    ctx.cache.users.ensure_loaded(&ctx.store).into_diagnostic()?;
    ctx.cache.items.ensure_loaded(&ctx.store).into_diagnostic()?;
    ctx.cache.notifications.ensure_loaded(&ctx.store).into_diagnostic()?;

    let Some(user) = ctx.cache.users.get(&args.id) else {
        return Err(miette!("No user with id '{}' in the loaded users", args.id));
    };
    if !args.yes && !global.quiet {
        println!(
            "{} <{}>",
            style(user.display_name().unwrap_or("-")).bold(),
            user.email.as_deref().unwrap_or("-")
        );
    }

    let prompter = prompter(args.yes);
    let mut dispatcher = ActionDispatcher::new(&ctx.store, prompter.as_ref());
    match dispatcher.delete_user_cascade(&mut ctx.cache, &args.id) {
        ActionOutcome::Failed(ActionError::PartialCascade(report)) => {
            for failure in &report.failed {
                eprintln!(
                    "{} {} {}: {}",
                    style("✗").red(),
                    failure.collection.singular(),
                    style(&failure.id).cyan(),
                    failure.error
                );
            }
            Err(miette!("{}", report))
        }
        outcome => finish_action(outcome, |report| {
            if !global.quiet {
                println!("{} {}", style("✓").green(), report);
            }
        }),
    }
}

fn run_toggle_role(args: UserActionArgs, global: &GlobalOpts) -> Result<()> {
    let mut ctx = AdminContext::open()?;
    load_section(&mut ctx.cache.users, &ctx.store);

    let prompter = prompter(args.yes);
    let mut dispatcher = ActionDispatcher::new(&ctx.store, prompter.as_ref());
    let outcome = dispatcher.toggle_role(&mut ctx.cache.users, &args.id);

    finish_action(outcome, |role| {
        if !global.quiet {
            println!(
                "{} Role of {} is now {}",
                style("✓").green(),
                style(&args.id).cyan(),
                style(role).yellow()
            );
        }
    })
}
