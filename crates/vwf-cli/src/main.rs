use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vwf_core::{abort_workflow, resume_workflow, run_workflow, ProcessStat};

mod logstore;
mod workflow;

use logstore::{file_log_writer, PersistedProcess};

#[derive(Parser, Debug)]
#[command(name = "vwf", version, about = "Workflow execution core CLI")]
struct Cli {
    /// Where durable process state and logs are written.
    #[arg(long, global = true, default_value = "./vwf-state")]
    state_dir: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Start a new order-fulfillment process.
    Start {
        process_id: String,
        /// Order data as a JSON object, e.g. '{"total_cents": 4200}'.
        #[arg(long, default_value = "{}")]
        input: String,
    },
    /// Resume a suspended or waiting process with new input.
    Resume {
        process_id: String,
        /// Additional state to merge in before resuming, as a JSON object.
        #[arg(long, default_value = "{}")]
        input: String,
    },
    /// Abort a process unconditionally.
    Abort { process_id: String },
    /// Print a process's last recorded state and remaining step count.
    Show { process_id: String },
}

fn parse_input_object(raw: &str) -> Result<vwf_core::State> {
    let value: serde_json::Value = serde_json::from_str(raw).context("parse --input as JSON")?;
    value
        .as_object()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("--input must be a JSON object"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Start { process_id, input } => {
            let initial_state = parse_input_object(&input)?;
            let pstat = ProcessStat::new(
                "order_fulfillment",
                process_id,
                workflow::order_fulfillment(),
                initial_state,
            );
            run_and_report(pstat, &cli.state_dir)
        }
        Cmd::Resume { process_id, input } => {
            let extra = parse_input_object(&input)?;
            let pstat = load(&cli.state_dir, &process_id)?;
            let (pstat, result) =
                resume_workflow(pstat, extra, file_log_writer(cli.state_dir.clone()));
            persist(&cli.state_dir, &pstat, &workflow::order_fulfillment())?;
            report(&result)
        }
        Cmd::Abort { process_id } => {
            let pstat = load(&cli.state_dir, &process_id)?;
            let (pstat, result) = abort_workflow(pstat, file_log_writer(cli.state_dir.clone()));
            persist(&cli.state_dir, &pstat, &workflow::order_fulfillment())?;
            report(&result)
        }
        Cmd::Show { process_id } => {
            let persisted = PersistedProcess::load(&cli.state_dir, &process_id)?;
            println!("{}", serde_json::to_string_pretty(&persisted)?);
            Ok(())
        }
    }
}

fn run_and_report(pstat: ProcessStat, state_dir: &std::path::Path) -> Result<()> {
    let (pstat, result) = run_workflow(pstat, file_log_writer(state_dir.to_path_buf()));
    persist(state_dir, &pstat, &workflow::order_fulfillment())?;
    report(&result)
}

fn load(state_dir: &std::path::Path, process_id: &str) -> Result<ProcessStat> {
    let persisted = PersistedProcess::load(state_dir, process_id)?;
    let workflow = workflow::order_fulfillment().drop_front(persisted.consumed_steps);
    Ok(ProcessStat {
        process_id: persisted.process_id,
        workflow_name: persisted.workflow_name,
        steps: workflow,
        process: vwf_core::Process::from_status(persisted.status, persisted.state),
    })
}

fn persist(
    state_dir: &std::path::Path,
    pstat: &ProcessStat,
    full_workflow: &vwf_core::Workflow,
) -> Result<()> {
    let consumed_steps = full_workflow.len().saturating_sub(pstat.steps.len());
    let persisted = PersistedProcess {
        process_id: pstat.process_id.clone(),
        workflow_name: pstat.workflow_name.clone(),
        consumed_steps,
        status: pstat.process.status(),
        state: pstat.process.state().clone(),
    };
    persisted.save(state_dir)
}

fn report(result: &vwf_core::Process<vwf_core::State>) -> Result<()> {
    println!("status: {}", result.status());
    println!("{}", serde_json::to_string_pretty(result.state())?);
    Ok(())
}
