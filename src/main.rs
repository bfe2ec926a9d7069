use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

use lfa::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    init_tracing(global.verbose);

    match cli.command {
        Commands::Login(args) => lfa::cli::commands::auth::run_login(args, &global),
        Commands::Logout => lfa::cli::commands::auth::run_logout(&global),
        Commands::Whoami => lfa::cli::commands::auth::run_whoami(&global),
        Commands::Dashboard => lfa::cli::commands::dashboard::run(&global),
        Commands::Items(cmd) => lfa::cli::commands::items::run(cmd, &global),
        Commands::Users(cmd) => lfa::cli::commands::users::run(cmd, &global),
        Commands::Notifications(cmd) => lfa::cli::commands::notifications::run(cmd, &global),
        Commands::Config(cmd) => lfa::cli::commands::config::run(cmd, &global),
        Commands::Completions(args) => lfa::cli::commands::completions::run(args),
    }
}

/// Logs go to stderr; `RUST_LOG` wins, then `--verbose`, then warnings only
fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,lfa=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
