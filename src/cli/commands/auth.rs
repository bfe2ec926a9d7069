//! `lfa login`, `lfa logout`, `lfa whoami` - administrator session

use console::style;
use dialoguer::{theme::ColorfulTheme, Password};
use miette::{IntoDiagnostic, Result};

use crate::cli::context::session_path;
use crate::cli::helpers::format_timestamp;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::auth::{admin_sign_in, FirebaseAuth, Session};
use crate::core::store::FirestoreStore;
use crate::core::Config;

#[derive(clap::Args, Debug)]
pub struct LoginArgs {
    /// Administrator email address
    pub email: String,

    /// Password (prompted for when omitted)
    #[arg(long, env = "LFA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

pub fn run_login(args: LoginArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let auth = FirebaseAuth::from_config(&config).into_diagnostic()?;
    let project_id = config.project_id().into_diagnostic()?;

    let password = match args.password {
        Some(p) => p,
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Password")
            .interact()
            .into_diagnostic()?,
    };

    let session = admin_sign_in(&auth, &args.email, &password, |credentials| {
        FirestoreStore::new(
            config.http_agent(),
            project_id,
            config.database(),
            credentials.id_token.clone(),
        )
    })
    .into_diagnostic()?;

    session.save(&session_path()?).into_diagnostic()?;

    if !global.quiet {
        println!(
            "{} Signed in as {}",
            style("✓").green(),
            style(&session.email).cyan()
        );
    }
    Ok(())
}

/// Sign out by forgetting the saved tokens
pub fn run_logout(global: &GlobalOpts) -> Result<()> {
    let removed = Session::remove(&session_path()?).into_diagnostic()?;
    if !global.quiet {
        if removed {
            println!("{} Signed out", style("✓").green());
        } else {
            println!("Not signed in.");
        }
    }
    Ok(())
}

pub fn run_whoami(global: &GlobalOpts) -> Result<()> {
    let session = Session::load(&session_path()?).into_diagnostic()?;
    let config = Config::load();

    match global.format.resolve(config.default_format.as_deref()) {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "uid": session.uid,
                "email": session.email,
                "expires_at": session.expires_at,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Id => println!("{}", session.uid),
        _ => {
            println!("{}: {}", style("Email").bold(), style(&session.email).cyan());
            println!("{}: {}", style("UID").bold(), session.uid);
            println!(
                "{}: {}",
                style("Token expires").bold(),
                format_timestamp(&session.expires_at)
            );
        }
    }
    Ok(())
}
