//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::commands::{
    auth::LoginArgs, completions::CompletionsArgs, config::ConfigCommands, items::ItemsCommands,
    notifications::NotificationsCommands, users::UsersCommands,
};

#[derive(Parser)]
#[command(name = "lfa")]
#[command(author, version, about = "Lost & Found admin console")]
#[command(long_about = "Moderate lost & found listings, user accounts and match notifications stored in Firestore.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in as an administrator
    Login(LoginArgs),

    /// Forget the saved session
    Logout,

    /// Show the signed-in administrator
    Whoami,

    /// Totals, recent items and top categories
    Dashboard,

    /// Lost & found listings
    #[command(subcommand)]
    Items(ItemsCommands),

    /// User accounts and roles
    #[command(subcommand)]
    Users(UsersCommands),

    /// Match notifications sent to users
    #[command(subcommand)]
    Notifications(NotificationsCommands),

    /// View and modify configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Table on a terminal
    #[default]
    Auto,
    /// Aligned, colored columns
    Table,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}

impl OutputFormat {
    /// Resolve `auto` against the configured default
    pub fn resolve(self, default_format: Option<&str>) -> OutputFormat {
        match self {
            OutputFormat::Auto => default_format
                .and_then(|f| OutputFormat::from_str(f, true).ok())
                .filter(|f| *f != OutputFormat::Auto)
                .unwrap_or(OutputFormat::Table),
            f => f,
        }
    }
}
