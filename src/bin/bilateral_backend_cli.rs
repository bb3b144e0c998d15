use bilateral_backend::audio_io::{open_output, OutputStream};
use bilateral_backend::config::{BackendConfig, CONFIG};
use bilateral_backend::models::format_elapsed;
use bilateral_backend::profiles::PROFILES;
use bilateral_backend::render::render_to_wav;
use bilateral_backend::{
    validate_bpm, CueEmitter, CueId, Journal, NullEmitter, SessionEngine, SessionEvent,
    SessionHandle,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use crossbeam::channel::{after, bounded, never, select};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Bilateral stimulation sessions from the command line
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Config file (defaults to ./bilateral.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a live session until Ctrl+C or the time limit
    Run(RunArgs),
    /// Render a session's cue track to a WAV file
    Render(RenderArgs),
    /// List the built-in cue sounds
    Cues,
    /// Generate a default config file and exit
    GenerateConfig(ConfigArgs),
}

#[derive(ClapArgs)]
struct RunArgs {
    /// Beats per minute (60-200, step 5)
    #[arg(long)]
    bpm: Option<u32>,
    /// Cue sound name
    #[arg(long)]
    cue: Option<CueId>,
    /// Stop automatically after this many seconds
    #[arg(long)]
    seconds: Option<u64>,
    /// How you feel before the session
    #[arg(long)]
    before: Option<String>,
    /// How you feel after the session; saved to the journal with --before
    #[arg(long)]
    after: Option<String>,
    /// Write the session history as JSON here when done
    #[arg(long)]
    history: Option<PathBuf>,
}

#[derive(ClapArgs)]
struct RenderArgs {
    /// Output WAV path
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    bpm: Option<u32>,
    #[arg(long)]
    cue: Option<CueId>,
    /// Length of the rendered session in seconds
    #[arg(long, default_value_t = 60.0)]
    seconds: f64,
    #[arg(long)]
    sample_rate: Option<u32>,
}

#[derive(ClapArgs)]
struct ConfigArgs {
    /// Output path for the generated configuration
    #[arg(long, default_value = "bilateral.toml")]
    out: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Run(args) => run_command(args, &cfg)?,
        Commands::Render(args) => render_command(args, &cfg)?,
        Commands::Cues => {
            for p in PROFILES.iter() {
                println!(
                    "{:<8} {:<20} {:>7.1} Hz {:>4} ms  {:?}",
                    p.name, p.description, p.frequency_hz, p.duration_ms, p.waveform
                );
            }
        }
        Commands::GenerateConfig(out) => {
            BackendConfig::generate_default(&out.out)?;
            println!("Generated default config at {}", out.out);
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BackendConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(p) => BackendConfig::load(p)?,
        None => CONFIG.clone(),
    })
}

fn run_command(args: RunArgs, cfg: &BackendConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bpm = validate_bpm(args.bpm.unwrap_or(cfg.bpm))?;
    let cue = args.cue.unwrap_or(cfg.cue);

    let (output, emitter): (Option<OutputStream>, Arc<dyn CueEmitter>) =
        match open_output(cfg.cue_queue_capacity, cfg.master_gain) {
            Ok((output, emitter)) => (Some(output), Arc::new(emitter)),
            Err(e) => {
                warn!("audio unavailable, running silent: {e}");
                (None, Arc::new(NullEmitter))
            }
        };

    let journal = Journal::new();
    let engine = SessionEngine::new(bpm, cue, emitter, Box::new(journal.clone()));
    let handle = SessionHandle::spawn(engine)?;
    handle.set_before_note(args.before.clone())?;
    let events = handle.subscribe()?;

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;
    let deadline = match args.seconds {
        Some(s) => after(Duration::from_secs(s)),
        None => never(),
    };

    handle.start()?;
    println!("Session running at {bpm} bpm with the {cue} cue... press Ctrl+C to stop");
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(deadline) -> _ => break,
            recv(events) -> ev => match ev {
                Ok(SessionEvent::Elapsed(secs)) => {
                    print!("\r{}", format_elapsed(secs));
                    std::io::stdout().flush()?;
                }
                Ok(_) => {}
                Err(_) => break,
            },
        }
    }
    println!();

    match handle.stop()? {
        Some(record) => {
            println!(
                "Session complete: {} at {} bpm",
                format_elapsed(record.duration_seconds),
                record.bpm
            );
            let before = args.before.as_deref().unwrap_or("");
            let after_text = args.after.as_deref().unwrap_or("");
            match journal.save_entry(before, after_text) {
                Some(entry) => {
                    handle.clear_before_note()?;
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                }
                None => {
                    journal.skip();
                }
            }
        }
        None => println!("Session too short to record"),
    }

    if let Some(path) = &args.history {
        let history = handle.history()?;
        std::fs::write(path, serde_json::to_string_pretty(&history)?)?;
        println!("Wrote {} history records to {}", history.len(), path.display());
    }

    handle.shutdown()?;
    drop(output);
    Ok(())
}

fn render_command(args: RenderArgs, cfg: &BackendConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bpm = validate_bpm(args.bpm.unwrap_or(cfg.bpm))?;
    let cue = args.cue.unwrap_or(cfg.cue);
    let sample_rate = args.sample_rate.unwrap_or(cfg.render_sample_rate);
    render_to_wav(&args.out, bpm, cue, args.seconds, sample_rate, cfg.master_gain)?;
    println!("Generated {} at {} bpm to {}", cue, bpm, args.out.display());
    Ok(())
}
