use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use taskvault_core::{
    GroupBy, PriorityFilter, PropertyList, QueryDefinition, TaskPriority, TaskState, TaskVault,
};

use crate::cli::{Commands, FilterFlags, QueryCommand};

pub(crate) fn run_from_root(root: &Path, command: Commands) -> Result<()> {
    let mut vault = TaskVault::open(root).context("failed to open vault")?;
    vault.initialize().context("initial scan failed")?;
    run(&mut vault, command)
}

fn run(vault: &mut TaskVault, command: Commands) -> Result<()> {
    match command {
        Commands::Scan => {
            print_json(&serde_json::json!({
                "pages": vault.pages().len(),
                "tasks": vault.task_count(),
            }))?;
        }
        Commands::List(args) => {
            let tasks = match args.page {
                Some(page) => vault.get_tasks_for_page(&page),
                None => vault.get_all_tasks(),
            };
            print_json(&tasks)?;
        }
        Commands::Show(args) => match vault.get_task_by_id(&args.id) {
            Some(task) => print_json(&task)?,
            None => anyhow::bail!("no task with id '{}'", args.id),
        },
        Commands::SetState(args) => {
            let state: TaskState = args.state.parse()?;
            vault.update_task_state(&args.id, state)?;
            print_json(&vault.get_task_by_id(&args.id))?;
        }
        Commands::SetPriority(args) => {
            let priority = parse_priority(&args.priority)?;
            vault.update_task_priority(&args.id, priority)?;
            print_json(&vault.get_task_by_id(&args.id))?;
        }
        Commands::SetProp(args) => {
            vault.update_task_property(&args.id, &args.key, args.value.as_deref())?;
            print_json(&vault.get_task_by_id(&args.id))?;
        }
        Commands::Cycle(args) => {
            if args.priority {
                vault.cycle_task_priority(&args.id)?;
            } else {
                vault.cycle_task_state(&args.id)?;
            }
            print_json(&vault.get_task_by_id(&args.id))?;
        }
        Commands::Query(args) => run_query_command(vault, args.command)?,
        Commands::Group(args) => {
            let group_by: GroupBy = args.by.parse()?;
            print_json(&vault.group_all(group_by, &args.key))?;
        }
        Commands::Watch(args) => {
            loop {
                let events = vault.sweep().context("sweep failed")?;
                if !events.is_empty() {
                    print_json(&events)?;
                }
                if args.once {
                    break;
                }
                thread::sleep(Duration::from_millis(args.interval_ms));
            }
        }
    }
    Ok(())
}

fn run_query_command(vault: &mut TaskVault, command: QueryCommand) -> Result<()> {
    match command {
        QueryCommand::Run(args) => {
            let query = match args.id {
                Some(id) => vault
                    .settings()
                    .find_query(&id)
                    .with_context(|| format!("no saved query '{id}'"))?
                    .query
                    .clone(),
                None => build_query(String::new(), String::new(), &args.filter)?,
            };
            print_json(&vault.run_query(&query))?;
        }
        QueryCommand::List => {
            print_json(&vault.settings().queries)?;
        }
        QueryCommand::Save(args) => {
            let name = args.name.unwrap_or_else(|| args.id.clone());
            let query = build_query(args.id, name, &args.filter)?;
            vault.save_query(query)?;
            print_json(&vault.settings().queries)?;
        }
        QueryCommand::Rm(args) => {
            let removed = vault.remove_saved_query(&args.id)?;
            print_json(&serde_json::json!({
                "id": args.id,
                "removed": removed,
            }))?;
        }
    }
    Ok(())
}

fn build_query(id: String, name: String, flags: &FilterFlags) -> Result<QueryDefinition> {
    let states = if flags.states.is_empty() {
        None
    } else {
        let mut parsed = Vec::with_capacity(flags.states.len());
        for raw in &flags.states {
            parsed.push(raw.parse::<TaskState>()?);
        }
        Some(parsed)
    };

    let priority = flags
        .priority
        .as_deref()
        .map(str::parse::<PriorityFilter>)
        .transpose()?;

    let properties = if flags.props.is_empty() {
        None
    } else {
        let mut list = PropertyList::new();
        for raw in &flags.props {
            let (key, value) = parse_prop_flag(raw)?;
            list.upsert(key, value);
        }
        Some(list)
    };

    Ok(QueryDefinition {
        id,
        name,
        states,
        priority,
        page: flags.page.clone(),
        tags: if flags.tags.is_empty() {
            None
        } else {
            Some(flags.tags.clone())
        },
        properties,
    })
}

fn parse_prop_flag(raw: &str) -> Result<(&str, &str)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("--prop expects key=value, got '{raw}'"))?;
    if key.is_empty() {
        anyhow::bail!("--prop key must not be empty: '{raw}'");
    }
    Ok((key, value))
}

fn parse_priority(raw: &str) -> Result<Option<TaskPriority>> {
    if raw.trim().eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    Ok(Some(raw.parse::<TaskPriority>()?))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::cli::IdArg;

    #[test]
    fn parse_prop_flag_splits_on_the_first_equals() {
        let (key, value) = parse_prop_flag("url=https://example.com?a=b").expect("parse");
        assert_eq!(key, "url");
        assert_eq!(value, "https://example.com?a=b");

        assert!(parse_prop_flag("no-equals").is_err());
        assert!(parse_prop_flag("=value").is_err());
    }

    #[test]
    fn parse_priority_accepts_letters_and_none() {
        assert_eq!(parse_priority("A").expect("parse"), Some(TaskPriority::A));
        assert_eq!(parse_priority("none").expect("parse"), None);
        assert!(parse_priority("Z").is_err());
    }

    #[test]
    fn build_query_maps_all_filter_flags() {
        let flags = FilterFlags {
            states: vec!["TODO".to_string()],
            priority: Some("none".to_string()),
            page: Some("work/*.md".to_string()),
            tags: vec!["#work".to_string()],
            props: vec!["project=Apollo".to_string()],
        };

        let query = build_query("q1".to_string(), "Q1".to_string(), &flags).expect("build");
        assert_eq!(query.states, Some(vec![TaskState::Todo]));
        assert_eq!(query.priority, Some(PriorityFilter::Unset));
        assert_eq!(query.page.as_deref(), Some("work/*.md"));
        assert_eq!(
            query.properties.as_ref().and_then(|p| p.get("project")),
            Some("Apollo")
        );
    }

    #[test]
    fn catalog_snapshots_serialize_for_json_output() {
        let temp = tempdir().expect("tempdir");
        fs::write(
            temp.path().join("page.md"),
            "TODO [#A] item #tag\nproject:: Apollo",
        )
        .expect("write");

        let mut vault = TaskVault::open(temp.path()).expect("open");
        vault.initialize().expect("initialize");

        // Shared-snapshot records must serialize as plain task objects.
        let json = serde_json::to_string(&vault.get_all_tasks()).expect("serialize");
        assert!(json.contains(r#""id":"page.md:1""#));
        assert!(json.contains(r#""state":"TODO""#));
        assert!(json.contains(r#""project":"Apollo""#));
    }

    #[test]
    fn commands_run_against_a_real_vault() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("page.md"), "- TODO buy milk").expect("write");

        let mut vault = TaskVault::open(temp.path()).expect("open");
        vault.initialize().expect("initialize");

        run(
            &mut vault,
            Commands::SetState(crate::cli::SetStateArgs {
                id: "page.md:1".to_string(),
                state: "done".to_string(),
            }),
        )
        .expect("set-state");
        assert_eq!(
            fs::read_to_string(temp.path().join("page.md")).expect("read"),
            "- DONE buy milk"
        );

        run(&mut vault, Commands::Show(IdArg { id: "page.md:1".to_string() })).expect("show");
        let err = run(&mut vault, Commands::Show(IdArg { id: "page.md:99".to_string() }))
            .expect_err("missing id must fail");
        assert!(err.to_string().contains("page.md:99"));
    }
}
