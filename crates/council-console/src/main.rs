mod view;

use anyhow::{bail, Context};
use clap::Parser;
use council_client::{spawn_poller, ApiClient, Connection, ConnectionConfig, TELEMETRY_INTERVAL};
use council_core::{GenerationSettings, RubricWeights};
use council_session::SessionMachine;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use url::Url;
use view::ConsoleRenderer;

const SESSION_PATH: &str = "/ws/council";
const CLOCK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(
    name = "council-console",
    about = "Line console for a local agent-council server"
)]
struct Args {
    /// Base URL of the council server.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server: String,
    /// Council preset to start on; defaults to the server's default.
    #[arg(long, default_value = "")]
    council: String,
    /// Sampling temperature override.
    #[arg(long)]
    temperature: Option<f32>,
    /// Max tokens per agent response.
    #[arg(long)]
    max_tokens: Option<u32>,
    /// Debate rounds override.
    #[arg(long)]
    debate_rounds: Option<u32>,
    /// Rubric weights as accuracy,completeness,conciseness,tone.
    #[arg(long, value_delimiter = ',')]
    weights: Option<Vec<f64>>,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let base: Url = Url::parse(&args.server).context("invalid --server url")?;
    let api = ApiClient::new(base.clone()).context("build api client")?;
    let catalog = api
        .fetch_catalog()
        .await
        .context("fetch council catalog from the server")?;

    let mut machine = SessionMachine::new(catalog);
    if !args.council.is_empty() && !machine.select_council(&args.council) {
        warn!("unknown_council_arg: {}", args.council);
    }
    machine.set_generation_settings(GenerationSettings {
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        debate_rounds: args.debate_rounds,
    });
    if let Some(values) = &args.weights {
        if let [accuracy, completeness, conciseness, tone] = values.as_slice() {
            let _ = machine.set_weights(RubricWeights::new(
                *accuracy,
                *completeness,
                *conciseness,
                *tone,
            ));
        } else {
            warn!("weights_arg_ignored: expected four values, got {}", values.len());
        }
    }

    let endpoint = session_endpoint(&base)?;
    let (link, mut events, _link_task) = Connection::spawn(ConnectionConfig::new(endpoint));
    let (mut telemetry, _poll_task) = spawn_poller(api, link.status(), TELEMETRY_INTERVAL);
    let mut status = link.status();

    let mut renderer = ConsoleRenderer::new(std::io::stdout());
    greet(&mut renderer, &machine)?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut clock = tokio::time::interval(CLOCK_INTERVAL);
    let mut telemetry_open = true;

    loop {
        tokio::select! {
            line = input.next_line() => {
                match line.context("read stdin")? {
                    None => break,
                    Some(text) => {
                        if handle_line(&text, &mut machine, &link, &mut renderer).await?
                            == Flow::Quit
                        {
                            break;
                        }
                    }
                }
            }
            Some(event) = events.recv() => {
                for op in machine.handle_event(event) {
                    renderer.render(&op)?;
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                renderer.connection(*status.borrow_and_update())?;
            }
            changed = telemetry.changed(), if telemetry_open => {
                if changed.is_err() {
                    telemetry_open = false;
                } else {
                    let state = telemetry.borrow_and_update().clone();
                    renderer.telemetry(&state)?;
                }
            }
            _ = clock.tick(), if machine.is_running() => {
                if let Some(elapsed) = machine.elapsed() {
                    renderer.clock(elapsed)?;
                }
            }
        }
    }

    Ok(())
}

async fn handle_line<W: Write>(
    line: &str,
    machine: &mut SessionMachine,
    link: &Connection,
    renderer: &mut ConsoleRenderer<W>,
) -> anyhow::Result<Flow> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Flow::Continue);
    }

    if let Some(command) = line.strip_prefix('/') {
        let mut parts = command.split_whitespace();
        match parts.next().unwrap_or_default() {
            "quit" | "exit" => return Ok(Flow::Quit),
            "councils" => {
                for key in machine.catalog().keys() {
                    let marker = if key == machine.selected_council() {
                        "*"
                    } else {
                        " "
                    };
                    if let Some(info) = machine.catalog().get(key) {
                        renderer.notice(&format!(
                            "{marker} {key} — {} ({}, {} agents)",
                            info.name,
                            info.strategy,
                            info.agents.len()
                        ))?;
                    }
                }
            }
            "council" => match parts.next() {
                Some(key) if machine.select_council(key) => {
                    renderer.notice(&format!("council set to {key}"))?;
                }
                Some(key) => renderer.notice(&format!("unknown council: {key}"))?,
                None => renderer.notice("usage: /council <key>")?,
            },
            "weights" => {
                let values: Vec<f64> = parts.filter_map(|part| part.parse().ok()).collect();
                if let [accuracy, completeness, conciseness, tone] = values.as_slice() {
                    let op = machine.set_weights(RubricWeights::new(
                        *accuracy,
                        *completeness,
                        *conciseness,
                        *tone,
                    ));
                    match op {
                        Some(op) => renderer.render(&op)?,
                        None => renderer.notice("weights updated; no scores yet")?,
                    }
                } else {
                    renderer.notice("usage: /weights <accuracy> <completeness> <conciseness> <tone>")?;
                }
            }
            "rank" => match machine.leaderboard() {
                Some(op) => renderer.render(&op)?,
                None => renderer.notice("no scores yet")?,
            },
            "clear" => {
                if machine.clear_session() {
                    renderer.notice("session cleared")?;
                } else {
                    renderer.notice("cannot clear while a session is running")?;
                }
            }
            other => renderer.notice(&format!("unknown command: /{other}"))?,
        }
        return Ok(Flow::Continue);
    }

    match machine.submit_task(line, link.is_connected()) {
        Ok(submission) => {
            link.send_task(&submission.message).await;
            for op in submission.ops {
                renderer.render(&op)?;
            }
        }
        Err(err) => renderer.notice(&err.to_string())?,
    }
    Ok(Flow::Continue)
}

fn greet<W: Write>(
    renderer: &mut ConsoleRenderer<W>,
    machine: &SessionMachine,
) -> anyhow::Result<()> {
    renderer.notice(&format!(
        "council console — {} councils loaded, starting on '{}'",
        machine.catalog().councils.len(),
        machine.selected_council()
    ))?;
    renderer.notice(
        "type a task to run it; /councils /council /weights /rank /clear /quit",
    )?;
    Ok(())
}

fn session_endpoint(base: &Url) -> anyhow::Result<Url> {
    let mut endpoint = base.clone();
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => bail!("unsupported server scheme: {other}"),
    };
    if endpoint.set_scheme(scheme).is_err() {
        bail!("cannot derive session endpoint from {base}");
    }
    endpoint.set_path(SESSION_PATH);
    Ok(endpoint)
}

fn init_logging() {
    let level = std::env::var("COUNCIL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
