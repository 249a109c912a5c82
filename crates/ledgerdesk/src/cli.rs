//! Clap derive structures for the `ledgerdesk` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Also compiled by `build.rs` for man pages, so it depends on clap only.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ledgerdesk -- back-office ledger records from the command line
#[derive(Debug, Parser)]
#[command(
    name = "ledgerdesk",
    version,
    about = "Browse and edit ledger records from the command line",
    long_about = "A CLI for ledger back-office APIs.\n\n\
        Lists, creates and deletes records through a cached data layer,\n\
        and follows real-time change topics for a branch.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Profile to use
    #[arg(long, short = 'p', env = "LEDGERDESK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API origin (overrides profile)
    #[arg(long, short = 'u', env = "LEDGERDESK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token
    #[arg(long, env = "LEDGERDESK_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Branch id for real-time topics (overrides profile)
    #[arg(long, short = 'b', env = "LEDGERDESK_BRANCH", global = true)]
    pub branch: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LEDGERDESK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "LEDGERDESK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "LEDGERDESK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one id per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage branch holidays
    #[command(alias = "hol")]
    Holidays(HolidaysArgs),

    /// Manage journal vouchers
    #[command(alias = "jv")]
    Vouchers(VouchersArgs),

    /// Follow real-time change topics for a branch
    Watch(WatchArgs),

    /// Column order and visibility for list tables
    #[command(alias = "cols")]
    Columns(ColumnsArgs),

    /// Decode `filter` / `sort` query parameters
    Decode(DecodeArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared List Arguments ────────────────────────────────────────────

/// Pagination, filtering and sorting shared by every list command.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Page number, starting at 1
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Rows per page (defaults to the saved table preference, then 10)
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(1..=500))]
    pub page_size: Option<u32>,

    /// Fetch every record instead of one page
    #[arg(long, short = 'a', conflicts_with_all = ["page", "page_size", "filter", "sort"])]
    pub all: bool,

    /// Filter as FIELD:MODE:VALUE, e.g. "name:contains:year" (repeatable)
    #[arg(long, short = 'f')]
    pub filter: Vec<String>,

    /// Sort as FIELD[:asc|desc] (repeatable, earlier wins)
    #[arg(long, short = 's')]
    pub sort: Vec<String>,

    /// Print the request that would be sent and exit
    #[arg(long)]
    pub explain: bool,
}

/// Bulk delete by id.
#[derive(Debug, Args)]
pub struct DeleteManyArgs {
    /// Record ids
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<String>,
}

// ── Holidays ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct HolidaysArgs {
    #[command(subcommand)]
    pub command: HolidaysCommand,
}

#[derive(Debug, Subcommand)]
pub enum HolidaysCommand {
    /// List holidays
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show one holiday
    Get {
        /// Holiday id
        id: String,
    },

    /// Create a holiday
    Create {
        /// Read the payload from a JSON file instead of flags
        #[arg(long, short = 'F', conflicts_with_all = ["name", "date", "description"])]
        from_file: Option<PathBuf>,

        /// Holiday name
        #[arg(long)]
        name: Option<String>,

        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Free-text description
        #[arg(long)]
        description: Option<String>,
    },

    /// Update a holiday; unset flags keep their current value
    Update {
        /// Holiday id
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a holiday
    #[command(alias = "rm")]
    Delete {
        /// Holiday id
        id: String,
    },

    /// Delete several holidays in one request
    DeleteMany(DeleteManyArgs),
}

// ── Vouchers ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct VouchersArgs {
    #[command(subcommand)]
    pub command: VouchersCommand,
}

#[derive(Debug, Subcommand)]
pub enum VouchersCommand {
    /// List vouchers
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show one voucher with its lines
    Get {
        /// Voucher id
        id: String,
    },

    /// Create a voucher
    Create {
        /// Read the payload from a JSON file instead of flags
        #[arg(long, short = 'F', conflicts_with_all = ["date", "narration", "line"])]
        from_file: Option<PathBuf>,

        /// Entry date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        narration: Option<String>,

        /// Line as ACCOUNT:DEBIT:CREDIT[:DESCRIPTION] in minor units (repeatable)
        #[arg(long)]
        line: Vec<String>,
    },

    /// Delete a voucher
    #[command(alias = "rm")]
    Delete {
        /// Voucher id
        id: String,
    },

    /// Delete several vouchers in one request
    DeleteMany(DeleteManyArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Entities to follow (comma-separated)
    #[arg(long, short = 'e', value_delimiter = ',', default_values_t = [String::from("holiday"), String::from("voucher")])]
    pub entities: Vec<String>,

    /// WebSocket endpoint (overrides profile)
    #[arg(long, env = "LEDGERDESK_REALTIME_URL")]
    pub realtime_url: Option<String>,
}

// ── Columns ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    #[command(subcommand)]
    pub command: ColumnsCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableId {
    Holiday,
    Voucher,
}

#[derive(Debug, Subcommand)]
pub enum ColumnsCommand {
    /// Show column order and visibility
    Show { table: TableId },

    /// Set the column order (unlisted columns keep their relative order at the end)
    Order {
        table: TableId,
        #[arg(required = true, num_args = 1..)]
        columns: Vec<String>,
    },

    /// Hide a column
    Hide { table: TableId, column: String },

    /// Show a hidden column again
    Unhide { table: TableId, column: String },

    /// Set the default page size
    PageSize {
        table: TableId,
        #[arg(value_parser = clap::value_parser!(u32).range(1..=500))]
        size: u32,
    },

    /// Forget saved preferences
    Reset { table: TableId },
}

// ── Decode ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
#[command(arg_required_else_help = true)]
pub struct DecodeArgs {
    /// Encoded `filter` parameter
    #[arg(long)]
    pub filter: Option<String>,

    /// Encoded `sort` parameter
    #[arg(long)]
    pub sort: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration
    Show,

    /// Print the config file path
    Path,

    /// Set a value on the active profile
    Set {
        /// Profile key: api_url, realtime_url, branch, token_env, ca_cert, insecure, timeout
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a bearer token in the system keyring
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
