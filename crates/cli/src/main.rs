//! taskq CLI - Operator interface for admission queues
//! Works directly on the queue database the daemon uses.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tabled::{Table, Tabled};

use taskq_core::application::{AdmissionController, CreateQueueRequest};
use taskq_core::domain::{Discipline, Queue, QueueId, StartParams, TaskStatus};
use taskq_core::port::id_provider::UuidProvider;
use taskq_core::port::time_provider::SystemTimeProvider;
use taskq_core::port::QueueFilter;
use taskq_infra_sqlite::{create_pool, run_migrations, SqliteQueueStore};
use taskq_infra_system::SubprocessLauncher;

const DEFAULT_DB_PATH: &str = "~/.taskq/queues.db";
const DEFAULT_OWNER: &str = "taskq-daemon";
const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api/v1";

#[derive(Parser)]
#[command(name = "taskq")]
#[command(about = "Bounded-concurrency admission queues", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Queue database path
    #[arg(long, env = "TASKQ_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db: String,

    /// Identity queues are created and looked up under
    #[arg(long, env = "TASKQ_OWNER", default_value = DEFAULT_OWNER)]
    owner: String,

    /// Callback URL handed to launched workflows
    #[arg(long, env = "TASKQ_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a queue
    Create {
        /// Queue name, unique per owner
        name: String,

        /// fifo or lifo
        #[arg(short, long, default_value = "fifo")]
        discipline: Discipline,

        /// Running-task cap (0 = unbounded)
        #[arg(short = 'c', long, default_value = "0")]
        max_concurrent: u32,

        /// Pending-list cap (0 = unbounded)
        #[arg(short = 'p', long, default_value = "0")]
        max_pending: u32,
    },

    /// List queues
    List {
        /// Only queues with this name
        #[arg(long)]
        name: Option<String>,

        /// Include queues of every owner
        #[arg(long)]
        all: bool,
    },

    /// Show a queue and its tasks
    Show {
        /// Queue id or name
        queue: String,
    },

    /// Enqueue a task
    Add {
        /// Queue id or name
        queue: String,

        /// Task id
        task_id: String,

        /// Start params as JSON string
        #[arg(long)]
        params: Option<String>,
    },

    /// Admit and launch pending tasks
    Drain {
        /// Queue id or name
        queue: String,

        /// Maximum admissions
        #[arg(short, long, default_value = "1")]
        limit: usize,
    },

    /// Release a running task's slot
    Complete {
        /// Queue id or name
        queue: String,

        /// Task id
        task_id: String,
    },
}

#[derive(Tabled)]
struct QueueRow {
    id: String,
    name: String,
    owner: String,
    discipline: Discipline,
    running: String,
    pending: usize,
}

impl From<&Queue> for QueueRow {
    fn from(queue: &Queue) -> Self {
        let cap = match queue.max_concurrent {
            0 => "∞".to_string(),
            n => n.to_string(),
        };
        Self {
            id: queue.id.clone(),
            name: queue.name.clone(),
            owner: queue.owner.clone(),
            discipline: queue.discipline,
            running: format!("{}/{}", queue.running_count, cap),
            pending: queue.pending.len(),
        }
    }
}

#[derive(Tabled)]
struct TaskRow {
    position: String,
    task_id: String,
    status: TaskStatus,
}

async fn connect(db: &str, api_url: &str) -> Result<AdmissionController> {
    let db_path = shellexpand::tilde(db).into_owned();
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let pool = create_pool(&db_path)
        .await
        .with_context(|| format!("Failed to open {}", db_path))?;
    run_migrations(&pool).await.context("Migration failed")?;

    let id_provider = Arc::new(UuidProvider);
    let time_provider = Arc::new(SystemTimeProvider);
    let launcher = SubprocessLauncher::new(
        id_provider.clone(),
        time_provider.clone(),
        vec!["PATH".to_string(), "HOME".to_string(), "USER".to_string()],
        api_url,
    );

    Ok(AdmissionController::new(
        Arc::new(SqliteQueueStore::new(pool)),
        Arc::new(launcher),
        id_provider,
        time_provider,
    ))
}

/// Accept either a queue id or a name owned by `owner`
async fn resolve(controller: &AdmissionController, owner: &str, queue: &str) -> Result<QueueId> {
    match controller.load(&queue.to_string()).await {
        Ok(found) => Ok(found.id),
        Err(e) if e.is_not_found() => controller
            .find(&QueueFilter::by_owner_and_name(owner, queue))
            .await?
            .into_iter()
            .next()
            .map(|q| q.id)
            .ok_or_else(|| anyhow::anyhow!("No queue {:?} for owner {:?}", queue, owner)),
        Err(e) => Err(e.into()),
    }
}

fn print_queue(queue: &Queue) {
    println!("{}", Table::new(vec![QueueRow::from(queue)]));

    let running = queue.running_tasks().map(|id| TaskRow {
        position: "-".to_string(),
        task_id: id.clone(),
        status: TaskStatus::Running,
    });
    let pending = queue.pending_tasks().enumerate().map(|(i, id)| TaskRow {
        position: (i + 1).to_string(),
        task_id: id.clone(),
        status: TaskStatus::Pending,
    });
    let tasks: Vec<TaskRow> = running.chain(pending).collect();

    println!();
    if tasks.is_empty() {
        println!("{}", "No tasks".yellow());
    } else {
        println!("{}", Table::new(tasks));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let controller = connect(&cli.db, &cli.api_url).await?;

    match cli.command {
        Commands::Create {
            name,
            discipline,
            max_concurrent,
            max_pending,
        } => {
            let queue_id = controller
                .create(CreateQueueRequest {
                    name,
                    owner: cli.owner.clone(),
                    discipline,
                    max_concurrent,
                    max_pending,
                })
                .await?;

            println!("{}", "✓ Queue created".green().bold());
            println!();
            print_queue(&controller.load(&queue_id).await?);
        }

        Commands::List { name, all } => {
            let filter = QueueFilter {
                name,
                owner: if all { None } else { Some(cli.owner.clone()) },
                ..Default::default()
            };
            let queues = controller.find(&filter).await?;

            if queues.is_empty() {
                println!("{}", "No queues".yellow());
            } else {
                let rows: Vec<QueueRow> = queues.iter().map(QueueRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Show { queue } => {
            let queue_id = resolve(&controller, &cli.owner, &queue).await?;
            print_queue(&controller.load(&queue_id).await?);
        }

        Commands::Add {
            queue,
            task_id,
            params,
        } => {
            let start_params = match params {
                Some(raw) => StartParams::new(
                    serde_json::from_str(&raw).context("Invalid JSON start params")?,
                ),
                None => StartParams::empty(),
            };
            let queue_id = resolve(&controller, &cli.owner, &queue).await?;
            let updated = controller.add(&queue_id, task_id.clone(), start_params).await?;

            println!("{}", format!("✓ Task {} queued", task_id).green().bold());
            println!();
            print_queue(&updated);
        }

        Commands::Drain { queue, limit } => {
            let queue_id = resolve(&controller, &cli.owner, &queue).await?;
            let outcome = controller.drain(&queue_id, limit, &cli.owner).await?;

            if outcome.admitted.is_empty() {
                println!("{}", "○ Nothing admitted".yellow());
            } else {
                for entry in &outcome.admitted {
                    println!("  {} {} launched", "✓".green(), entry.task_id);
                }
            }
            println!();
            print_queue(&outcome.queue);
        }

        Commands::Complete { queue, task_id } => {
            let queue_id = resolve(&controller, &cli.owner, &queue).await?;
            let updated = controller.complete(&queue_id, &task_id).await?;

            println!("{}", format!("✓ Task {} completed", task_id).green().bold());
            println!();
            print_queue(&updated);
        }
    }

    Ok(())
}
