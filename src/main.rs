use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use persona_voice::voice::{PruneReport, SpeakRequest, Style, VoicePipeline};
use persona_voice::{Config, PersonaConfig};

/// Persona Voice - stylized voice output for persona-driven assistants
#[derive(Parser)]
#[command(name = "persona-voice", version, about)]
struct Cli {
    /// Persona directory name under the personas dir (e.g. "droid")
    #[arg(short, long, env = "PERSONA_VOICE_PERSONA")]
    persona: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that external engines and the voice model are available
    Check,
    /// List voice styles
    Styles,
    #[command(flatten)]
    Pipeline(PipelineCommand),
}

/// Subcommands that drive the voice pipeline
#[derive(Subcommand)]
enum PipelineCommand {
    /// Speak text through the full pipeline
    Say {
        /// Text to speak
        text: String,
        /// Voice style (clean, droid, radio, pa_system)
        #[arg(short, long)]
        style: Option<String>,
        /// Request the signature phrase
        #[arg(long, conflicts_with = "no_signature")]
        signature: bool,
        /// Suppress the signature phrase
        #[arg(long)]
        no_signature: bool,
    },
    /// Speak text with the signature requested
    Announce {
        /// Text to speak
        text: String,
    },
    /// Render text into the cache and print the file path
    Generate {
        /// Text to render
        text: String,
        /// Voice style (clean, droid, radio, pa_system)
        #[arg(short, long)]
        style: Option<String>,
        /// Render again even if cached
        #[arg(short, long)]
        force: bool,
    },
    /// Warm the cache with common phrases
    Preload {
        /// Phrases to render
        #[arg(required = true)]
        phrases: Vec<String>,
    },
    /// Prune the cache now, ignoring the throttle
    Prune,
    /// Delete every cached waveform
    ClearCache,
    /// Validate a persona directory and clear audio cached for the previous one
    ///
    /// The selection is not saved; pass --persona or set `persona` in the
    /// config file to speak with it.
    UsePersona {
        /// Path to a persona directory containing skin.yaml
        dir: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,persona_voice=info",
        1 => "info,persona_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load();
    if let Some(persona) = cli.persona.filter(|p| !p.trim().is_empty()) {
        config.persona = Some(persona);
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Styles => {
            for style in Style::ALL {
                println!("{style}");
            }
            Ok(())
        }
        Command::Check => cmd_check(&config),
        Command::Pipeline(command) => {
            let pipeline = VoicePipeline::from_config(&config)?;
            run_pipeline_command(&pipeline, command).await
        }
    }
}

async fn run_pipeline_command(
    pipeline: &VoicePipeline,
    command: PipelineCommand,
) -> anyhow::Result<()> {
    match command {
        PipelineCommand::Say {
            text,
            style,
            signature,
            no_signature,
        } => {
            let signature = match (signature, no_signature) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };

            let utterance = pipeline
                .speak(SpeakRequest {
                    text,
                    style: style.as_deref().map(Style::resolve),
                    overrides: None,
                    signature,
                    // A detached player would be killed when the process exits
                    blocking: true,
                })
                .await?;
            println!("{}", utterance.path.display());
        }
        PipelineCommand::Announce { text } => {
            let utterance = pipeline
                .speak(SpeakRequest {
                    signature: Some(true),
                    blocking: true,
                    ..SpeakRequest::new(text)
                })
                .await?;
            println!("{}", utterance.path.display());
        }
        PipelineCommand::Generate { text, style, force } => {
            let path = pipeline
                .generate(&text, style.as_deref().map(Style::resolve), force)
                .await?;
            println!("{}", path.display());
        }
        PipelineCommand::Preload { phrases } => {
            let rendered = pipeline.preload(&phrases).await;
            println!("rendered {rendered} of {} phrase(s)", phrases.len() * 2);
        }
        PipelineCommand::Prune => {
            let cache = std::sync::Arc::clone(pipeline.cache());
            let PruneReport {
                expired,
                evicted,
                remaining_bytes,
            } = tokio::task::spawn_blocking(move || cache.prune()).await?;
            println!("expired {expired}, evicted {evicted}, {remaining_bytes} bytes remaining");
        }
        PipelineCommand::ClearCache => {
            let removed = pipeline.clear_cache().await;
            println!("removed {removed} cached file(s)");
        }
        PipelineCommand::UsePersona { dir } => {
            let persona = PersonaConfig::load_dir(&dir)?;
            pipeline.apply_persona_update(&persona).await?;
            let profile = pipeline.persona().snapshot();
            println!("{} ({})", profile.name, profile.style);
        }
    }

    Ok(())
}

fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let mut missing = 0;

    for dep in config.check_dependencies() {
        match &dep.resolved {
            Some(path) => println!("  ok       {:<8} {}", dep.name, path.display()),
            None => {
                missing += 1;
                println!("  missing  {:<8} {}", dep.name, dep.binary.display());
            }
        }
    }

    match &config.model {
        Some(model) if model.is_file() => println!("  ok       {:<8} {}", "model", model.display()),
        Some(model) => {
            missing += 1;
            println!("  missing  {:<8} {}", "model", model.display());
        }
        None => {
            missing += 1;
            println!("  missing  {:<8} (set PERSONA_VOICE_MODEL or voice.model)", "model");
        }
    }

    println!("  cache    {}", config.cache_dir.display());
    if let Some(dir) = config.persona_dir() {
        println!("  persona  {}", dir.display());
    }

    if missing > 0 {
        anyhow::bail!("{missing} requirement(s) missing");
    }
    Ok(())
}
