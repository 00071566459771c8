//! CLI `chat` command: interactive conversation with one agent.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};

use tagmem::agent::MemoryAgent;
use tagmem::config::TagmemConfig;
use tagmem::llm::{ObservedBackend, OllamaBackend};

/// Spinner of the turn in flight, if any.
type ActiveSpinner = Arc<Mutex<Option<ProgressBar>>>;

/// Read lines from stdin and answer each one until `exit`, `quit`, or EOF.
///
/// Ctrl-C while a turn is running cancels that turn only; at the prompt it
/// leaves the loop.
pub async fn chat(config: &TagmemConfig) -> Result<()> {
    let active: ActiveSpinner = Arc::new(Mutex::new(None));
    let backend =
        OllamaBackend::new(&config.backend).context("failed to build backend client")?;
    let sink = active.clone();
    let backend = ObservedBackend::new(
        Arc::new(backend),
        Arc::new(move |fragment: &str| {
            let spinner = sink.lock().ok().and_then(|slot| slot.clone());
            if let Some(spinner) = spinner {
                spinner.inc(fragment.chars().count() as u64);
            }
        }),
    );
    let mut agent = MemoryAgent::from_config_with_backend(config, Arc::new(backend))?;
    let style = ProgressStyle::with_template("{spinner} {msg} ({pos} chars received)")?;

    println!(
        "Chatting with {} on {} (database: {}). Type `exit` to leave.",
        config.agent.name,
        agent.expert_model(),
        config.resolved_db_path().display()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;

        let interrupt = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        let Some(line) = next_input(&mut lines, interrupt).await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style.clone());
        spinner.set_message("thinking...");
        spinner.enable_steady_tick(Duration::from_millis(120));
        set_active(&active, Some(spinner.clone()));

        tokio::select! {
            outcome = agent.chat(input) => {
                spinner.finish_and_clear();
                match outcome {
                    Ok(reply) => println!("\n{}: {reply}", config.agent.name),
                    Err(e) => eprintln!("\nerror: {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                spinner.finish_and_clear();
                eprintln!("\nturn cancelled");
            }
        }
        set_active(&active, None);
        tracing::debug!(tags = ?agent.context_tags(), "context after turn");
    }

    Ok(())
}

/// Next line from `lines`, or `None` at EOF or once `interrupt` completes.
async fn next_input<R>(
    lines: &mut Lines<R>,
    interrupt: impl Future<Output = ()>,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        line = lines.next_line() => line,
        _ = interrupt => Ok(None),
    }
}

fn set_active(active: &ActiveSpinner, spinner: Option<ProgressBar>) {
    if let Ok(mut slot) = active.lock() {
        *slot = spinner;
    }
}
