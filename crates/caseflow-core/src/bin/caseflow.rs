use anyhow::{anyhow, Context, Result};
use caseflow_core::prelude::*;
use caseflow_core::ContextEvent;
use caseflow_realtime::{FileTokenStore, MemoryTokenStore, TokenStore};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let case_arg = || {
        Arg::new("case")
            .long("case")
            .required(true)
            .value_parser(value_parser!(i64))
            .help("Case id")
    };

    Command::new("caseflow")
        .version(caseflow_core::VERSION)
        .about("Case and task assignment sync client")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .global(true)
                .env("CASEFLOW_TOKEN")
                .hide_env_values(true)
                .help("Bearer token (overrides api.token_file)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("summary")
                .about("Print task and team summaries for a case")
                .arg(case_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("watch")
                .about("Follow a case's realtime updates until interrupted")
                .arg(case_arg()),
        )
        .subcommand(
            Command::new("assign-task")
                .about("Assign a task to a user")
                .arg(case_arg())
                .arg(
                    Arg::new("task")
                        .long("task")
                        .required(true)
                        .value_parser(value_parser!(i64))
                        .help("Task id"),
                )
                .arg(
                    Arg::new("user")
                        .long("user")
                        .required(true)
                        .value_parser(value_parser!(i64))
                        .help("Assignee user id"),
                ),
        )
        .subcommand(
            Command::new("set-status")
                .about("Change a task's status")
                .arg(case_arg())
                .arg(
                    Arg::new("task")
                        .long("task")
                        .required(true)
                        .value_parser(value_parser!(i64))
                        .help("Task id"),
                )
                .arg(
                    Arg::new("status")
                        .long("status")
                        .required(true)
                        .help("TODO, IN_PROGRESS, REVIEW, COMPLETED or CANCELLED"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<CaseflowConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => CaseflowConfig::load(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(CaseflowConfig::default()),
    }
}

fn token_store(matches: &ArgMatches, config: &CaseflowConfig) -> Arc<dyn TokenStore> {
    if let Some(token) = matches.get_one::<String>("token") {
        return Arc::new(MemoryTokenStore::new(Some(token.clone())));
    }
    match &config.api.token_file {
        Some(path) => Arc::new(FileTokenStore::new(path.clone())),
        None => Arc::new(MemoryTokenStore::new(None)),
    }
}

fn required_id(args: &ArgMatches, name: &str) -> Result<i64> {
    args.get_one::<i64>(name)
        .copied()
        .ok_or_else(|| anyhow!("missing --{name}"))
}

async fn open(session: &CaseSession, case_id: i64, realtime: bool) -> Result<()> {
    session.start();
    if realtime {
        if let Err(e) = session.connect().await {
            tracing::warn!("realtime unavailable, continuing without peers: {}", e);
        }
    }
    let case = session
        .open_case(CaseId(case_id))
        .await
        .with_context(|| format!("opening case {case_id}"))?;
    tracing::info!("opened case {} ({})", case.id, case.title);
    Ok(())
}

fn print_result(result: &SyncResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    if result.success {
        Ok(())
    } else {
        Err(anyhow!(result.error.clone().unwrap_or_default()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config = load_config(&matches)?;
    let tokens = token_store(&matches, &config);
    let session = CaseSession::new(&config, Collaborators::http(&config, tokens)?);

    match matches.subcommand() {
        Some(("summary", args)) => {
            open(&session, required_id(args, "case")?, false).await?;
            let store = session.store();
            let tasks = store.task_summary();
            let team = store.team_summary();

            if args.get_flag("json") {
                let report = serde_json::json!({ "tasks": tasks, "team": team });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Tasks: {} ({:.0}% complete)", tasks.total, tasks.completion_rate);
                for (status, count) in &tasks.by_status {
                    println!("  {status:?}: {count}");
                }
                println!(
                    "  Overdue: {}  Due today: {}  Due soon: {}",
                    tasks.overdue, tasks.due_today, tasks.due_soon
                );
                println!("Team: {} members, {} attorneys", team.total_members, team.attorneys);
                println!(
                    "  Light: {}  Moderate: {}  Heavy: {}",
                    team.light, team.moderate, team.heavy
                );
            }
        }
        Some(("watch", args)) => {
            open(&session, required_id(args, "case")?, true).await?;
            let store = Arc::clone(session.store());
            let mut events = store.events();

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.recv() => match event {
                        Ok(ContextEvent::TasksChanged(_)) => {
                            let summary = store.task_summary();
                            println!("tasks: {} total, {} overdue", summary.total, summary.overdue);
                        }
                        Ok(ContextEvent::TeamChanged(_)) => {
                            println!("team: {} members", store.team_summary().total_members);
                        }
                        Ok(other) => println!("{other:?}"),
                        Err(RecvError::Lagged(n)) => tracing::warn!("skipped {} events", n),
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            session.close();
        }
        Some(("assign-task", args)) => {
            let case_id = required_id(args, "case")?;
            open(&session, case_id, true).await?;
            let task_id = required_id(args, "task")?;
            let user_id = required_id(args, "user")?;
            let result = session
                .sync()
                .assign_task_to_user(task_id, user_id, case_id)
                .await;
            print_result(&result)?;
        }
        Some(("set-status", args)) => {
            let case_id = required_id(args, "case")?;
            let status: TaskStatus = args
                .get_one::<String>("status")
                .ok_or_else(|| anyhow!("missing --status"))?
                .parse()
                .map_err(|e: String| anyhow!(e))?;
            open(&session, case_id, true).await?;
            let result = session
                .sync()
                .update_task_status(required_id(args, "task")?, status, case_id)
                .await;
            print_result(&result)?;
        }
        _ => return Err(anyhow!("no subcommand given")),
    }

    Ok(())
}
