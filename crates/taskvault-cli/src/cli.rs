use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "taskvault")]
#[command(about = "Task index over a plain-text vault", version)]
pub struct Cli {
    /// Vault root directory.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan the vault and print an index summary.
    Scan,
    /// List indexed tasks, optionally for one page.
    List(ListArgs),
    /// Show one task by identifier.
    Show(IdArg),
    /// Rewrite a task's state token in place.
    SetState(SetStateArgs),
    /// Rewrite, insert, or remove a task's priority token.
    SetPriority(SetPriorityArgs),
    /// Upsert or delete one metadata property on a task.
    SetProp(SetPropArgs),
    /// Cycle a task's state (or priority with --priority).
    Cycle(CycleArgs),
    /// Run, save, list, or delete queries.
    Query(QueryArgs),
    /// Group all tasks by page, state, or a property value.
    Group(GroupArgs),
    /// Poll the vault for changes and print applied events.
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Restrict to one page path.
    #[arg(long)]
    pub page: Option<String>,
}

#[derive(Debug, Args)]
pub struct IdArg {
    /// Task identifier, `page-path:line`.
    pub id: String,
}

#[derive(Debug, Args)]
pub struct SetStateArgs {
    pub id: String,
    /// One of TODO, DOING, DONE, CANCELED, WAITING.
    pub state: String,
}

#[derive(Debug, Args)]
pub struct SetPriorityArgs {
    pub id: String,
    /// A, B, C, or `none` to remove the token.
    pub priority: String,
}

#[derive(Debug, Args)]
pub struct SetPropArgs {
    pub id: String,
    pub key: String,
    /// Omit to delete the key.
    pub value: Option<String>,
}

#[derive(Debug, Args)]
pub struct CycleArgs {
    pub id: String,
    /// Cycle priority (none -> C -> B -> A) instead of state.
    #[arg(long)]
    pub priority: bool,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub command: QueryCommand,
}

#[derive(Debug, Subcommand)]
pub enum QueryCommand {
    /// Run a saved query by id, or an ad-hoc one from flags.
    Run(QueryRunArgs),
    /// List saved queries.
    List,
    /// Save (or replace) a query built from flags.
    Save(QuerySaveArgs),
    /// Delete a saved query.
    Rm(IdArg),
}

#[derive(Debug, Args, Default)]
pub struct QueryRunArgs {
    /// Saved query id; flags are ignored when given.
    #[arg(long)]
    pub id: Option<String>,
    #[command(flatten)]
    pub filter: FilterFlags,
}

#[derive(Debug, Args)]
pub struct QuerySaveArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[command(flatten)]
    pub filter: FilterFlags,
}

#[derive(Debug, Args, Default)]
pub struct FilterFlags {
    /// State filter, repeatable.
    #[arg(long = "state")]
    pub states: Vec<String>,
    /// Priority letter or `none`.
    #[arg(long)]
    pub priority: Option<String>,
    /// Page path, `*` as wildcard.
    #[arg(long)]
    pub page: Option<String>,
    /// Tag substring filter, repeatable.
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Property filter as `key=value`, repeatable.
    #[arg(long = "prop")]
    pub props: Vec<String>,
}

#[derive(Debug, Args)]
pub struct GroupArgs {
    /// `page`, `state`, or `property`.
    pub by: String,
    /// Property key used with `property` grouping.
    #[arg(long, default_value = "project")]
    pub key: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[arg(long, default_value_t = 2000)]
    pub interval_ms: u64,
    /// Run a single sweep and exit.
    #[arg(long)]
    pub once: bool,
}
