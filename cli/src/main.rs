mod demo;

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use callwire_media::{IceCandidate, SessionDescription};
use callwire_signal::note::{NoteMeaning, classify_note};
use callwire_signal::{RecordKind, SignalRecord};
use clap::{Parser, Subcommand};
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "callwire")]
#[command(about = "Call signaling over a shared chat log: demo runs and record inspection")]
struct Cli {
    /// State directory (per-identity data dirs and config live here)
    #[arg(long, default_value = ".callwire", env = "CALLWIRE_STATE_DIR")]
    state_dir: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a complete call between two in-process parties and print the transcript
    Demo {
        /// Place a video call instead of a voice call
        #[arg(long)]
        video: bool,

        /// Call an automated contact that never answers
        #[arg(long)]
        automated: bool,

        /// Hang up this long after the call connects
        #[arg(long, default_value_t = 1500)]
        hangup_after_ms: u64,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 15)]
        timeout: u64,
    },

    /// Print the default config, or write it into the state dir
    Config {
        /// Write callwire_config.json instead of printing it
        #[arg(long)]
        write: bool,
    },

    /// Decode a signal record from its wire JSON form
    Decode {
        /// Record JSON (as produced by the channel)
        json: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.state_dir)
        .with_context(|| format!("create state dir {}", cli.state_dir.display()))?;

    match &cli.cmd {
        Command::Demo {
            video,
            automated,
            hangup_after_ms,
            timeout,
        } => demo::run(
            &cli.state_dir,
            demo::DemoOptions {
                video: *video,
                automated: *automated,
                hangup_after_ms: *hangup_after_ms,
                timeout_secs: *timeout,
            },
        )
        .and_then(print),
        Command::Config { write } => cmd_config(&cli, *write),
        Command::Decode { json } => cmd_decode(json),
    }
}

pub(crate) fn print(v: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&v).context("json encode")?);
    Ok(())
}

// ── Commands ────────────────────────────────────────────────────────────────

fn cmd_config(cli: &Cli, write: bool) -> anyhow::Result<()> {
    let body = callwire_core::default_config_json();
    if !write {
        println!("{body}");
        return Ok(());
    }
    let path = cli.state_dir.join("callwire_config.json");
    if path.exists() {
        return Err(anyhow!("{} already exists", path.display()));
    }
    std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    print(json!({ "written": path.display().to_string() }))
}

fn cmd_decode(raw: &str) -> anyhow::Result<()> {
    let record = SignalRecord::from_json(raw).context("parse signal record")?;
    let decoded = match record.kind {
        RecordKind::Offer | RecordKind::Answer => {
            let desc = SessionDescription::from_json(&record.payload)
                .context("parse session description")?;
            json!({
                "type": desc.sdp_type,
                "media": desc.media_sections(),
            })
        }
        RecordKind::IceCandidate => {
            let candidate =
                IceCandidate::from_json(&record.payload).context("parse ice candidate")?;
            json!({
                "candidate": candidate.candidate,
                "sdp_mid": candidate.sdp_mid,
                "sdp_m_line_index": candidate.sdp_m_line_index,
                "valid": candidate.validate().is_ok(),
            })
        }
        RecordKind::TextNote => json!({
            "text": record.payload,
            "meaning": note_meaning(&record.payload),
        }),
    };
    print(json!({
        "id": record.id,
        "channel_id": record.channel_id,
        "kind": record.kind.as_str(),
        "sender": record.sender,
        "produced_at_ms": record.produced_at_ms,
        "decoded": decoded,
    }))
}

pub(crate) fn note_meaning(text: &str) -> String {
    match classify_note(text) {
        NoteMeaning::Invitation(kind) => format!("invitation ({})", kind.note_text()),
        NoteMeaning::Accepted => "accepted".to_string(),
        NoteMeaning::Ended => "ended".to_string(),
        NoteMeaning::Plain => "chat".to_string(),
    }
}
