use anyhow::Context;
use colored::Colorize;
use serde_json::json;

use quorum_feed::{run_all, MergeService, PipelineConfig, ServiceParts, Session, SourceReport};
use quorum_merge::{MergeEngine, MergedRecord};

use crate::cli::*;

/// Resident ids listed in the text summary before eliding the rest.
const PENDING_SHOWN: usize = 20;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args, cli.format),
        Command::Check(args) => cmd_check(args, cli.format),
    }
}

fn load(path: &std::path::Path) -> anyhow::Result<PipelineConfig> {
    PipelineConfig::load(path).with_context(|| format!("loading pipeline {}", path.display()))
}

fn cmd_check(args: CheckArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load(&args.config)?;
    let registry = config.registry()?;

    match format {
        OutputFormat::Json => {
            let sources: Vec<_> = registry
                .priority_order()
                .map(|(id, kind)| json!({ "name": id, "kind": kind }))
                .collect();
            println!("{}", json!({ "valid": true, "sources": sources }));
        }
        OutputFormat::Text => {
            println!("{} {}", "✓".green().bold(), args.config.display());
            for (rank, (id, kind)) in registry.priority_order().enumerate() {
                let kind = match kind {
                    quorum_types::SourceKind::Required => kind.to_string().cyan(),
                    quorum_types::SourceKind::Optional => kind.to_string().dimmed(),
                };
                println!("  {}. {} ({})", rank + 1, id.as_str().bold(), kind);
            }
        }
    }
    Ok(())
}

fn cmd_run(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load(&args.config)?;
    let session = match (args.principal, args.token) {
        (Some(principal), Some(token)) => Session::authenticated(principal, token),
        _ => Session::anonymous(),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_pipeline(config, session, format))
}

async fn run_pipeline(
    config: PipelineConfig,
    session: Session,
    format: OutputFormat,
) -> anyhow::Result<()> {
    tracing::info!(session = %session.id(), sources = config.sources.len(), "pipeline starting");

    let engine = MergeEngine::new(config.registry()?);
    let producers = config.producers()?;
    let ServiceParts {
        handle,
        mut merged,
        task,
    } = MergeService::spawn(engine, config.channel_capacity);

    let printer = tokio::spawn(async move {
        while let Some(record) = merged.recv().await {
            print_record(&record, format)?;
        }
        anyhow::Ok(())
    });

    let reports = run_all(producers, session, handle).await;
    let engine = task.await.context("merge service panicked")?;
    printer.await??;

    let pending = engine.pending();
    let failed = reports.iter().filter(|r| r.result.is_err()).count();

    match format {
        OutputFormat::Json => {
            let sources: Vec<_> = reports.iter().map(report_json).collect();
            let pending: Vec<_> = pending
                .iter()
                .map(|(id, completion)| json!({ "entity": id, "state": format!("{completion:?}") }))
                .collect();
            println!(
                "{}",
                json!({
                    "summary": {
                        "merged": engine.merged_count(),
                        "resident": engine.resident_count(),
                        "sources": sources,
                        "pending": pending,
                    }
                })
            );
        }
        OutputFormat::Text => {
            println!();
            for report in &reports {
                print_report(report);
            }
            println!(
                "{} merged, {} resident",
                engine.merged_count().to_string().green().bold(),
                engine.resident_count().to_string().yellow().bold()
            );
            for (id, completion) in pending.iter().take(PENDING_SHOWN) {
                println!("  {} {:?}", id.as_str().yellow(), completion);
            }
            if pending.len() > PENDING_SHOWN {
                println!("  ... and {} more", pending.len() - PENDING_SHOWN);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} source(s) failed");
    }
    Ok(())
}

fn print_record(record: &MergedRecord, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(record)?),
        OutputFormat::Text => {
            println!("{}", record.entity.as_str().yellow().bold());
            for (name, value) in &record.fields {
                println!("  {}: {}", name.dimmed(), value);
            }
        }
    }
    Ok(())
}

fn print_report(report: &SourceReport) {
    match &report.result {
        Ok(stats) => println!(
            "{} {}  emitted {}, filtered {}, skipped {}",
            "✓".green(),
            report.source.as_str().bold(),
            stats.emitted,
            stats.filtered,
            stats.skipped
        ),
        Err(e) => println!("{} {}  {}", "✗".red(), report.source.as_str().bold(), e),
    }
}

fn report_json(report: &SourceReport) -> serde_json::Value {
    match &report.result {
        Ok(stats) => json!({ "source": report.source, "ok": true, "stats": stats }),
        Err(e) => json!({ "source": report.source, "ok": false, "error": e.to_string() }),
    }
}
