//! `lfa completions` - shell completion scripts
//!
//! `source <(lfa completions bash)` in `~/.bashrc`, or write the fish
//! script to `~/.config/fish/completions/lfa.fish`.

use clap::CommandFactory;
use clap_complete::Shell;
use miette::Result;
use std::io::{self, Write};

use crate::cli::Cli;

#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Completion script for `shell`, named after the binary
pub fn script(shell: Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_string();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, bin, &mut buf);
    buf
}

pub fn run(args: CompletionsArgs) -> Result<()> {
    let mut out = io::stdout().lock();
    // A closed pipe just ends the script early
    let _ = out.write_all(&script(args.shell));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_covers_subcommands() {
        let bash = String::from_utf8(script(Shell::Bash)).unwrap();
        assert!(bash.contains("lfa"));
        assert!(bash.contains("toggle-role"));
    }
}
