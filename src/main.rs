use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use dropzone::{
    Config,
    HttpRecordStore,
    InMemoryRecordStore,
    Priority,
    RecordStore,
    SelectedFile,
    Selection,
    TaskFilter,
    TaskManager,
    TaskStatus,
    UploadController,
    UploadEvent,
};

#[derive(Parser, Debug)]
#[command(name = "dropzone", version, about = "Upload files and manage tasks against a record store")]
struct Cli {
    /// 配置文件路径
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// 使用进程内存储，不访问远程服务
    #[arg(long)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 校验并上传文件
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// 列出任务
    Tasks {
        #[arg(long, default_value = "all")]
        status: Selection<TaskStatus>,
        #[arg(long, default_value = "all")]
        priority: Selection<Priority>,
        #[arg(long, default_value = "")]
        search: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dropzone=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let store: Arc<dyn RecordStore> = if cli.memory {
        Arc::new(InMemoryRecordStore::new())
    } else {
        Arc::new(HttpRecordStore::new(&config.store)?)
    };

    match cli.command {
        Command::Upload { files } => upload(store, config, files).await,
        Command::Tasks { status, priority, search } => {
            list_tasks(store, config, TaskFilter::new(status, priority, search)).await
        }
    }
}

async fn upload(store: Arc<dyn RecordStore>, config: Config, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let controller = UploadController::new(store, config.upload);
    let mut events = controller.subscribe();

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(UploadEvent::Progress { id, progress }) => println!("  [{}] {}%", id, progress),
                Ok(UploadEvent::Completed { id, url }) => println!("  [{}] done -> {}", id, url),
                Ok(UploadEvent::Failed { id, error }) => println!("  [{}] failed: {}", id, error),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        match SelectedFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(err) => eprintln!("skipping {}: {}", path.display(), err),
        }
    }

    let prepared = controller.enqueue(files).await;
    for failure in &prepared.failed {
        eprintln!("{}: {}", failure.name, failure.error);
    }

    let report = controller.start_transfer().await;
    let summary = controller.summary().await;
    drop(controller);
    printer.await.context("event printer stopped unexpectedly")?;

    println!(
        "{} completed, {} failed, {} cancelled ({} of {} bytes uploaded)",
        report.completed.len(),
        report.failed.len(),
        report.cancelled.len(),
        summary.completed_bytes,
        summary.total_bytes,
    );
    Ok(())
}

async fn list_tasks(store: Arc<dyn RecordStore>, config: Config, filter: TaskFilter) -> anyhow::Result<()> {
    let manager = TaskManager::new(store, config.upload.page_size);
    manager.load().await.context("failed to load tasks")?;

    for task in manager.filter(&filter).await {
        let due = task.due_date.map(|date| date.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{:>6}  {:<12} {:<7} {:<10} {}",
            task.id, task.status, task.priority, due, task.name
        );
    }
    Ok(())
}
