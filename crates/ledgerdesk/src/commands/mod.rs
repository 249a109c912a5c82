//! Command dispatch: bridges CLI args -> data layer -> output formatting.

pub mod columns;
pub mod config_cmd;
pub mod decode;
pub mod holidays;
pub mod list;
pub mod util;
pub mod vouchers;
pub mod watch;

use ledgerdesk_core::Session;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an API-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Holidays(args) => holidays::handle(session, args, global).await,
        Command::Vouchers(args) => vouchers::handle(session, args, global).await,
        Command::Watch(args) => watch::handle(session, args, global).await,
        // Local-only commands are handled before a session exists
        Command::Columns(_) | Command::Decode(_) | Command::Config(_) | Command::Completions(_) => {
            Err(CliError::Internal("command does not use the API".into()))
        }
    }
}
