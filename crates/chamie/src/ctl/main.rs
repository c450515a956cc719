//! chamiectl - Terminal chat client for the Chamie server.
//!
//! A small REPL over the client crate: streams answers token by token,
//! uploads a `.txt` file as grounding context, and drives the user-gated
//! continue flow for answers that look cut off.

use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chamie_client::{ChatSession, ClientError, HttpTransport, StreamOutcome, TruncationPolicy};

mod prefs;

use prefs::Prefs;

const DEFAULT_SERVER_URL: &str = "http://localhost:8035";

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "Error: {err:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let transport = HttpTransport::new(&cli.server)?;
    let policy = if cli.strict {
        TruncationPolicy::Strict
    } else {
        TruncationPolicy::Lenient
    };
    let mut session = ChatSession::new(transport).with_policy(policy);
    session.set_fragment_hook(|fragment| {
        print!("{fragment}");
        let _ = io::stdout().flush();
    });

    run_repl(&mut session).await
}

#[derive(Debug, Parser)]
#[command(
    name = "chamiectl",
    author,
    version,
    about = "Terminal chat client for the Chamie server."
)]
struct Cli {
    /// Chamie server URL
    #[arg(long, short = 's', default_value = DEFAULT_SERVER_URL, env = "CHAMIE_SERVER_URL")]
    server: String,

    /// Flag answers more aggressively as truncated
    #[arg(long)]
    strict: bool,
}

async fn run_repl(session: &mut ChatSession<HttpTransport>) -> Result<()> {
    let mut prefs = Prefs::load();
    let interactive = io::stdin().is_terminal();

    if interactive {
        println!("chamie {} - /help for commands, /quit to leave", env!("CARGO_PKG_VERSION"));
        if !prefs.continue_hint_dismissed {
            println!(
                "hint: answers that look cut off can be resumed with /continue \
                 (/dismiss-hint to stop seeing this)"
            );
        }
    }

    // Id of the most recent assistant answer, the target of /continue.
    let mut last_message_id: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if interactive {
            print!("> ");
            io::stdout().flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit" | "/exit", _) => break,
            ("/help", _) => print_help(),
            ("/file", path) if !path.is_empty() => {
                if let Err(err) = upload_file(session, path).await {
                    eprintln!("{err:#}");
                }
            }
            ("/file", _) => eprintln!("usage: /file <path to .txt>"),
            ("/drop", _) => {
                session.remove_file();
                println!("file context removed");
            }
            ("/dismiss-hint", _) => {
                prefs.continue_hint_dismissed = true;
                if let Err(err) = prefs.save() {
                    eprintln!("could not save preferences: {err:#}");
                }
            }
            ("/stop", _) => eprintln!("nothing is streaming"),
            ("/continue", _) => match last_message_id.clone() {
                Some(id) => {
                    match stream_answer(session, &mut lines, Action::Continue(&id)).await {
                        Ok(outcome) => report_outcome(&outcome, &prefs),
                        Err(err) => report_error(err),
                    }
                }
                None => eprintln!("nothing to continue yet"),
            },
            (command, _) if command.starts_with('/') => {
                eprintln!("unknown command {command}, /help lists them");
            }
            _ => match stream_answer(session, &mut lines, Action::Send(line)).await {
                Ok(outcome) => {
                    last_message_id = Some(outcome.message_id.clone());
                    report_outcome(&outcome, &prefs);
                }
                Err(err) => report_error(err),
            },
        }
    }
    Ok(())
}

enum Action<'a> {
    Send(&'a str),
    Continue(&'a str),
}

/// Run one generation while keeping the input line open, so `/stop` (or
/// Ctrl-C) cancels mid-stream and keeps the partial answer instead of
/// killing the process.
async fn stream_answer(
    session: &mut ChatSession<HttpTransport>,
    lines: &mut Lines<BufReader<Stdin>>,
    action: Action<'_>,
) -> Result<StreamOutcome, ClientError> {
    let abort = CancellationToken::new();
    let watcher = {
        let abort = abort.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                abort.cancel();
            }
        })
    };

    let generation = async {
        match action {
            Action::Send(text) => session.send_with_abort(text, abort.clone()).await,
            Action::Continue(id) => session.continue_with_abort(id, abort.clone()).await,
        }
    };
    tokio::pin!(generation);

    let mut stdin_open = true;
    let outcome = loop {
        if !stdin_open {
            break (&mut generation).await;
        }
        tokio::select! {
            outcome = &mut generation => break outcome,
            line = lines.next_line() => match line {
                Ok(Some(input)) if input.trim() == "/stop" => abort.cancel(),
                Ok(Some(input)) if !input.trim().is_empty() => {
                    eprintln!("(still streaming; /stop to stop)");
                }
                Ok(Some(_)) => {}
                // Stdin closed; finish the stream on its own.
                Ok(None) | Err(_) => stdin_open = false,
            },
        }
    };
    watcher.abort();
    outcome
}

async fn upload_file(session: &mut ChatSession<HttpTransport>, path: &str) -> Result<()> {
    let path = Path::new(path);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("path has no file name")?;
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    session
        .upload_file(&name, content)
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    println!("file context set to {name} (questions are now answered from it; /drop to clear)");
    Ok(())
}

fn report_outcome(outcome: &StreamOutcome, prefs: &Prefs) {
    println!();
    if outcome.aborted {
        println!("[stopped - the partial answer above is kept]");
    } else if let Some(error) = &outcome.error {
        eprintln!("[stream failed: {error}]");
    } else if outcome.truncated {
        if prefs.continue_hint_dismissed {
            println!("[answer may be cut off]");
        } else {
            println!("[answer may be cut off - /continue resumes it]");
        }
    }
}

fn report_error(err: ClientError) {
    match err {
        ClientError::EmptyMessage => eprintln!("type a message first"),
        ClientError::Api { status, message } => eprintln!("server refused ({status}): {message}"),
        other => eprintln!("{other}"),
    }
}

fn print_help() {
    println!(
        "commands:\n  \
         /file <path>   use a .txt file as grounding context for questions\n  \
         /drop          remove the file context\n  \
         /continue      resume the last answer if it was cut off\n  \
         /stop          stop a streaming answer, keeping the partial text\n  \
         /dismiss-hint  stop showing the continue hint\n  \
         /quit          leave\n\
         anything else is sent as a chat message; Ctrl-C also stops a stream"
    );
}
