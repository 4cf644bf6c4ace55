//! Command-line interface for cidlens.
//!
//! Provides commands for analyzing a clinical note, locating evidence
//! phrases offline, serving the HTTP API, and recording clinician feedback.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::warn;

use crate::config::{self, ProviderSettings, ResolvedConfig};
use crate::core::{FeedbackLog, SafetyLimits};
use crate::domain::{AnalysisSession, FeedbackRecord, Prediction, Verdict};
use crate::evidence::{
    extract_anchor_text, locate, merge_overlapping, offset_to_line_col, render, to_html,
    to_terminal, HighlightSegment, Span,
};
use crate::server::{self, AppState};

/// Context shown around each evidence span
const ANCHOR_WINDOW: usize = 60;

/// cidlens - ICD-10 code suggestion with evidence highlighting
#[derive(Parser, Debug)]
#[command(name = "cidlens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Predict ICD-10 codes for a clinical note
    Analyze {
        /// Note file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Render the note with this code's evidence highlighted
        #[arg(long)]
        highlight: Option<String>,
    },

    /// Find evidence phrases in a note without calling a model
    Locate {
        /// Phrase to locate (repeatable)
        #[arg(short, long = "term", required = true)]
        terms: Vec<String>,

        /// Note file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Start the HTTP API
    Serve {
        /// Address to bind to (defaults to server.address from config)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Record a clinician verdict on a predicted code
    Feedback {
        /// ICD-10 code, e.g. O24.4
        code: String,

        /// Whether the code is right for the note
        #[arg(long, value_enum)]
        verdict: VerdictArg,

        /// Note the code was predicted for (only its hash is stored)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing
    Text,

    /// Machine-readable JSON
    Json,

    /// Note rendered as an HTML fragment
    Html,
}

/// Verdict for CLI (maps to Verdict)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VerdictArg {
    Correct,
    Incorrect,
}

impl From<VerdictArg> for Verdict {
    fn from(v: VerdictArg) -> Self {
        match v {
            VerdictArg::Correct => Verdict::Correct,
            VerdictArg::Incorrect => Verdict::Incorrect,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Analyze {
                input,
                format,
                highlight,
            } => analyze(input, format, highlight).await,
            Commands::Locate {
                terms,
                input,
                format,
            } => locate_terms(&terms, input, format),
            Commands::Serve { address } => serve(address).await,
            Commands::Feedback {
                code,
                verdict,
                input,
            } => record_feedback(&code, verdict.into(), input),
            Commands::Config => show_config(),
        }
    }
}

/// Read the note from a file or piped stdin
fn read_note(input_file: Option<&Path>, limits: &SafetyLimits) -> Result<String> {
    let note = if let Some(path) = input_file {
        limits.check_source(path)?;
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No input provided. Use --input <file> or pipe to stdin");
    };

    Ok(note)
}

/// Predict, ground and print
async fn analyze(
    input_file: Option<PathBuf>,
    format: OutputFormat,
    highlight: Option<String>,
) -> Result<()> {
    let cfg = config::config()?;
    let note = read_note(input_file.as_deref(), &cfg.safety)?;

    let state = AppState::from_config(cfg).await?;
    let mut session = AnalysisSession::new(note);
    state.analyzer.analyze_session(&mut session).await?;

    let segments = match highlight.as_deref() {
        Some(code) => Some(session.hover(code)?),
        None => None,
    };

    match format {
        OutputFormat::Json => {
            let mut payload = json!({ "predictions": session.predictions() });
            if let Some(ref segments) = segments {
                payload["segments"] = serde_json::to_value(segments)?;
            }
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Html => {
            let segments = match segments {
                Some(segments) => segments,
                None => all_evidence_segments(session.note(), session.predictions())?,
            };
            println!("{}", to_html(&segments));
        }
        OutputFormat::Text => {
            print_predictions(session.note(), session.predictions());
            if let Some(segments) = segments {
                println!();
                print_segments(&segments);
            }
        }
    }

    Ok(())
}

/// Note with the evidence of every prediction highlighted
fn all_evidence_segments(note: &str, predictions: &[Prediction]) -> Result<Vec<HighlightSegment>> {
    let spans: Vec<Span> = predictions
        .iter()
        .flat_map(|p| p.resolved_spans.iter().cloned())
        .collect();
    Ok(render(note, &merge_overlapping(note, &spans))?)
}

fn print_predictions(note: &str, predictions: &[Prediction]) {
    if predictions.is_empty() {
        println!("No codes predicted");
        return;
    }

    for prediction in predictions {
        println!("{}  ({})  {}", prediction.code, prediction.kind, prediction.label);

        for span in &prediction.resolved_spans {
            print_span(note, span);
        }
        for phrase in prediction.unresolved_phrases(note) {
            println!("    - \"{}\" (not found in note)", phrase);
        }
        println!();
    }
}

fn print_span(note: &str, span: &Span) {
    let pos = offset_to_line_col(note, span.start);
    println!(
        "    {}:{}  \"{}\"  {}",
        pos.line,
        pos.col,
        span.text,
        extract_anchor_text(note, span.start, span.end, ANCHOR_WINDOW)
    );
}

fn print_segments(segments: &[HighlightSegment]) {
    if io::stdout().is_terminal() {
        println!("{}", to_terminal(segments));
    } else {
        let marked: String = segments
            .iter()
            .map(|s| {
                if s.highlighted {
                    format!("[[{}]]", s.text)
                } else {
                    s.text.clone()
                }
            })
            .collect();
        println!("{}", marked);
    }
}

/// Offline commands still run on a broken config, with the built-in limits
fn limits_or_default(loaded: Result<&ResolvedConfig>) -> SafetyLimits {
    match loaded {
        Ok(cfg) => cfg.safety.clone(),
        Err(e) => {
            warn!(error = %e, "Configuration failed to load, using default safety limits");
            SafetyLimits::default()
        }
    }
}

/// Locate phrases offline and print the spans
fn locate_terms(terms: &[String], input_file: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let limits = limits_or_default(config::config());
    let note = read_note(input_file.as_deref(), &limits)?;
    let spans = locate(&note, terms);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "spans": spans }))?);
        }
        OutputFormat::Html => {
            let segments = render(&note, &merge_overlapping(&note, &spans))?;
            println!("{}", to_html(&segments));
        }
        OutputFormat::Text => {
            if spans.is_empty() {
                println!("No matches");
                return Ok(());
            }
            for span in &spans {
                print_span(&note, span);
            }
            eprintln!("\n[{} span(s)]", spans.len());
        }
    }

    Ok(())
}

/// Start HTTP server
async fn serve(address: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let address = address.unwrap_or_else(|| cfg.server_address.clone());
    let state = AppState::from_config(cfg).await?;
    server::serve(&address, state).await
}

/// Append a feedback record to the log
fn record_feedback(code: &str, verdict: Verdict, input_file: Option<PathBuf>) -> Result<()> {
    if code.trim().is_empty() {
        anyhow::bail!("Code must not be empty");
    }

    let cfg = config::config()?;
    let note = match input_file.as_deref() {
        Some(path) => Some(read_note(Some(path), &cfg.safety)?),
        None => None,
    };

    let record = FeedbackRecord::new(code, verdict, note.as_deref());
    let log = FeedbackLog::new(cfg.feedback_path());
    log.append(&record)?;

    println!("Recorded: {} {} ({})", record.code, verdict.as_str(), record.id);
    eprintln!("Feedback log: {}", log.path().display());
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;
    print!("{}", format_config(cfg));
    Ok(())
}

fn format_config(cfg: &ResolvedConfig) -> String {
    let provider = &cfg.provider;
    let secret = ProviderSettings::secret_env_var(provider.kind);
    let secret_state = if provider.api_key.is_some() {
        "set (redacted)"
    } else {
        "not set"
    };

    let mut out = String::new();
    out.push_str("cidlens configuration\n\n");
    out.push_str(&format!(
        "Config file: {}\n\n",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    ));
    out.push_str("Paths:\n");
    out.push_str(&format!("  Home:     {}\n", cfg.home.display()));
    out.push_str(&format!("  Catalog:  {}\n", cfg.catalog.display()));
    out.push_str(&format!("  Feedback: {}\n\n", cfg.feedback_path().display()));
    out.push_str("Provider:\n");
    out.push_str(&format!("  Kind:        {}\n", provider.kind));
    out.push_str(&format!("  Model:       {}\n", provider.model_or_default()));
    if let Some(ref url) = provider.endpoint_url {
        out.push_str(&format!("  Endpoint:    {}\n", url));
    }
    if let Some(ref url) = provider.base_url {
        out.push_str(&format!("  Base URL:    {}\n", url));
    }
    out.push_str(&format!("  Temperature: {}\n", provider.temperature_or_default()));
    out.push_str(&format!("  Max tokens:  {}\n", provider.max_new_tokens));
    out.push_str(&format!("  {}: {}\n\n", secret, secret_state));
    out.push_str("Safety limits:\n");
    out.push_str(&format!("  Max note size: {} bytes\n", cfg.safety.max_note_bytes));
    out.push_str(&format!("  Timeout:       {}s\n", cfg.safety.request_timeout_seconds));
    out.push_str(&format!("  Max retries:   {}\n\n", cfg.safety.max_retries));
    out.push_str(&format!("Server address: {}\n", cfg.server_address));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ProviderKind;
    use crate::core::SafetyViolation;

    #[test]
    fn test_parse_locate_terms() {
        let cli = Cli::try_parse_from([
            "cidlens", "locate", "--term", "febre", "-t", "tosse", "--format", "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Locate { terms, format, .. } => {
                assert_eq!(terms, vec!["febre", "tosse"]);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_locate_requires_term() {
        assert!(Cli::try_parse_from(["cidlens", "locate"]).is_err());
    }

    #[test]
    fn test_parse_feedback() {
        let cli =
            Cli::try_parse_from(["cidlens", "feedback", "O24.4", "--verdict", "incorrect"]).unwrap();

        match cli.command {
            Commands::Feedback { code, verdict, .. } => {
                assert_eq!(code, "O24.4");
                assert_eq!(Verdict::from(verdict), Verdict::Incorrect);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_read_note_refuses_denylisted_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let secret = dir.path().join(".env");
        std::fs::write(&secret, "HF_TOKEN=hf_secret\n").unwrap();
        let note = dir.path().join("nota.txt");
        std::fs::write(&note, "Paciente com febre.").unwrap();

        let limits = SafetyLimits::default();
        let err = read_note(Some(&secret), &limits).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SafetyViolation>(),
            Some(SafetyViolation::DenylistMatch { .. })
        ));
        assert!(!format!("{:#}", err).contains("hf_secret"));

        assert_eq!(read_note(Some(&note), &limits).unwrap(), "Paciente com febre.");
    }

    #[test]
    fn test_broken_config_falls_back_to_default_limits() {
        let broken: Result<&ResolvedConfig> = Err(anyhow::anyhow!("invalid YAML in config.yaml"));
        assert_eq!(limits_or_default(broken), SafetyLimits::default());

        let cfg = ResolvedConfig {
            home: PathBuf::from("/tmp/cidlens"),
            catalog: PathBuf::from("/tmp/cidlens/cids.json"),
            config_file: None,
            provider: ProviderSettings::default(),
            safety: SafetyLimits {
                max_note_bytes: 1024,
                ..Default::default()
            },
            server_address: config::DEFAULT_SERVER_ADDRESS.to_string(),
        };
        assert_eq!(limits_or_default(Ok(&cfg)).max_note_bytes, 1024);
    }

    #[test]
    fn test_config_output_redacts_secret() {
        let cfg = ResolvedConfig {
            home: PathBuf::from("/tmp/cidlens"),
            catalog: PathBuf::from("/tmp/cidlens/cids.json"),
            config_file: None,
            provider: ProviderSettings {
                kind: ProviderKind::OpenAi,
                api_key: Some("sk-very-secret".to_string()),
                ..Default::default()
            },
            safety: SafetyLimits::default(),
            server_address: config::DEFAULT_SERVER_ADDRESS.to_string(),
        };

        let out = format_config(&cfg);
        assert!(out.contains("OPENAI_API_KEY: set (redacted)"));
        assert!(!out.contains("sk-very-secret"));
        assert!(out.contains("feedback.jsonl"));
    }

    #[test]
    fn test_all_evidence_segments_merges_codes() {
        let note = "dor abdominal e febre";
        let predictions = vec![
            Prediction {
                code: "R10.4".to_string(),
                kind: Default::default(),
                label: "Dor abdominal".to_string(),
                evidence_phrases: vec!["dor abdominal".to_string()],
                resolved_spans: locate(note, &["dor abdominal"]),
            },
            Prediction {
                code: "R50.9".to_string(),
                kind: Default::default(),
                label: "Febre".to_string(),
                evidence_phrases: vec!["febre".to_string(), "abdominal".to_string()],
                resolved_spans: locate(note, &["febre", "abdominal"]),
            },
        ];

        let segments = all_evidence_segments(note, &predictions).unwrap();
        let highlighted: Vec<&str> = segments
            .iter()
            .filter(|s| s.highlighted)
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(highlighted, vec!["dor abdominal", "febre"]);
    }
}
