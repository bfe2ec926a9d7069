//! Signed-in command context and terminal prompts

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{miette, IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::auth::{FirebaseAuth, Session};
use crate::core::cache::{CollectionCache, LocalCache};
use crate::core::dispatch::{ActionOutcome, AssumeYes, Prompter};
use crate::core::record::Record;
use crate::core::store::{FirestoreStore, StoreError};
use crate::core::Config;

/// Interactive yes/no prompt, defaulting to No
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str) -> bool {
        // A prompt that cannot be shown (no tty) counts as a decline
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(message)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// `--yes` answers every prompt; otherwise ask on the terminal
pub fn prompter(yes: bool) -> Box<dyn Prompter> {
    if yes {
        Box::new(AssumeYes)
    } else {
        Box::new(TerminalPrompter)
    }
}

pub fn session_path() -> Result<PathBuf> {
    Session::default_path()
        .ok_or_else(|| miette!("Could not determine a configuration directory; set LFA_CONFIG_DIR"))
}

/// Everything a signed-in command needs: config, session, store and cache
pub struct AdminContext {
    pub config: Config,
    pub session: Session,
    pub store: FirestoreStore,
    pub cache: LocalCache,
}

impl AdminContext {
    /// Restore the saved session, refreshing its token if needed
    pub fn open() -> Result<Self> {
        let config = Config::load();
        let path = session_path()?;
        let mut session = Session::load(&path).into_diagnostic()?;

        let auth = FirebaseAuth::from_config(&config).into_diagnostic()?;
        if session.ensure_fresh(&auth).into_diagnostic()? {
            debug!(uid = %session.uid, "id token refreshed");
            session.save(&path).into_diagnostic()?;
        }

        let store = FirestoreStore::new(
            config.http_agent(),
            config.project_id().into_diagnostic()?,
            config.database(),
            session.id_token.clone(),
        );

        Ok(Self {
            config,
            session,
            store,
            cache: LocalCache::new(),
        })
    }

    /// Output format after resolving `auto` against the config default
    pub fn format(&self, global: &GlobalOpts) -> OutputFormat {
        global.format.resolve(self.config.default_format.as_deref())
    }
}

/// Populate a section if empty; read failures are reported and leave the
/// cache as it was
pub fn load_section<R: Record>(cache: &mut CollectionCache<R>, store: &FirestoreStore) {
    if let Err(e) = cache.ensure_loaded(store) {
        report_read_failure::<R>(&e);
    }
}

/// Refetch a section unconditionally, with the same failure handling
pub fn reload_section<R: Record>(cache: &mut CollectionCache<R>, store: &FirestoreStore) {
    if let Err(e) = cache.reload(store) {
        report_read_failure::<R>(&e);
    }
}

fn report_read_failure<R: Record>(error: &StoreError) {
    warn!(collection = %R::COLLECTION, %error, "read failed");
    eprintln!(
        "{} Could not load {}: {}",
        style("!").yellow(),
        R::COLLECTION,
        error
    );
}

/// Print the common ending of an action; failures become the command error
pub fn finish_action<T>(outcome: ActionOutcome<T>, on_success: impl FnOnce(T)) -> Result<()> {
    match outcome {
        ActionOutcome::Aborted => {
            println!("Aborted.");
            Ok(())
        }
        ActionOutcome::Succeeded(value) => {
            on_success(value);
            Ok(())
        }
        ActionOutcome::Failed(err) => Err(miette!("{}", err)),
    }
}
