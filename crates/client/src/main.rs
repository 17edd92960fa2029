//! Terminal front-end for a Tasklane server

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use tasklane_client::view::render_row;
use tasklane_client::{TaskClient, TaskView, ViewFilter};

#[derive(Parser)]
#[command(name = "tasklane", version, about = "Track tasks on a Tasklane server")]
struct Cli {
    /// Server root URL
    #[arg(long, env = "TASKLANE_URL", default_value = "http://localhost:5000")]
    url: String,

    /// Filter applied to the list printed after each command
    #[arg(long, short, default_value = "all")]
    filter: ViewFilter,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show the task list
    List,
    /// Add a task, optionally attaching a file
    Add {
        text: String,
        #[arg(long)]
        attach: Option<PathBuf>,
    },
    /// Mark a task completed
    Done { id: String },
    /// Mark a task not completed
    Undo { id: String },
    /// Replace a task's text
    Edit { id: String, text: String },
    /// Move a task to the trash
    Rm { id: String },
    /// Show the trash
    Trash,
    /// Bring a task back from the trash
    Restore { id: String },
    /// Delete a trashed task for good
    Purge { id: String },
    /// Download an attachment
    Fetch {
        name: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn print_list(lines: Vec<String>) {
    if lines.is_empty() {
        println!("(no tasks)");
    }
    for line in lines {
        println!("{}", line);
    }
}

/// Resolve an id or prefix against the active list, falling back to the trash
async fn resolve(view: &TaskView<TaskClient>, needle: &str) -> anyhow::Result<Uuid> {
    if let Ok(task) = view.find_row(needle) {
        return Ok(task.id);
    }
    let needle = needle.trim().to_ascii_lowercase();
    let trashed = view.trashed().await?;
    let mut matches = trashed
        .iter()
        .filter(|t| !needle.is_empty() && t.id.to_string().starts_with(&needle));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task.id),
        (Some(_), Some(_)) => anyhow::bail!("id prefix {} is ambiguous", needle),
        _ => anyhow::bail!("no task matching {}", needle),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut view = TaskView::new(TaskClient::new(cli.url.as_str()));
    view.set_filter(ViewFilter::All)
        .await
        .with_context(|| format!("failed to reach {}", cli.url))?;

    match cli.command.unwrap_or(Command::List) {
        Command::List => {}
        Command::Add { text, attach } => {
            let task = view.add(&text, attach.as_deref()).await?;
            println!("added {}", task.id);
        }
        Command::Done { id } => {
            let id = resolve(&view, &id).await?;
            view.set_completed(id, true).await?;
        }
        Command::Undo { id } => {
            let id = resolve(&view, &id).await?;
            view.set_completed(id, false).await?;
        }
        Command::Edit { id, text } => {
            let id = resolve(&view, &id).await?;
            view.begin_edit(id)?;
            view.update_draft(text)?;
            view.confirm_edit().await?;
        }
        Command::Rm { id } => {
            let id = resolve(&view, &id).await?;
            view.trash(id).await?;
        }
        Command::Trash => {
            let trashed = view.trashed().await?;
            print_list(trashed.iter().map(render_row).collect());
            return Ok(());
        }
        Command::Restore { id } => {
            let id = resolve(&view, &id).await?;
            view.restore(id).await?;
        }
        Command::Purge { id } => {
            let id = resolve(&view, &id).await?;
            view.purge(id).await?;
            println!("purged {}", id);
        }
        Command::Fetch { name, output } => {
            let output = output.unwrap_or_else(|| {
                PathBuf::from(name.rsplit('/').next().unwrap_or(name.as_str()))
            });
            let written = view.api().download(&name, &output).await?;
            println!("wrote {} bytes to {}", written, output.display());
            return Ok(());
        }
    }

    if view.filter() != cli.filter {
        view.set_filter(cli.filter).await?;
    }
    print_list(view.render());
    Ok(())
}
