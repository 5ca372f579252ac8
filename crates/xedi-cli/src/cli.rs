//! Command definitions and their execution

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use xedi_grammar::Direction;
use xedi_pipeline::{
    ConversionContext, ConversionReport, ConverterConfig, EdiToXmlConverter, MarkBadProcessor,
    XmlToEdiConverter,
};

/// Exit code when `--strict` is set and the conversion produced diagnostics
const STRICT_FAILURE: u8 = 2;

/// X12 to XEDI XML converter
#[derive(Parser, Debug)]
#[command(name = "xedi")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Exit with status 2 when any diagnostic was produced
    #[arg(long, global = true)]
    pub strict: bool,

    /// Write a JSON conversion report to this file (`-` for stderr)
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert an X12 interchange to XEDI XML
    ToXml {
        /// X12 input file (`-` for stdin)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Grammar direction: request or response
        #[arg(short, long)]
        direction: Option<Direction>,

        /// Write XML without indentation
        #[arg(long)]
        compact: bool,
    },

    /// Convert XEDI XML back to an X12 interchange
    ToEdi {
        /// XEDI input file (`-` for stdin)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Segment separator; `\n`, `\r` and `\r\n` are decoded
        #[arg(long)]
        segment_separator: Option<String>,

        #[arg(long)]
        element_separator: Option<String>,

        #[arg(long)]
        composite_separator: Option<String>,
    },

    /// Mark the transaction sets named in a rule-error collection as bad
    MarkBad {
        /// XEDI input file (`-` for stdin)
        input: PathBuf,

        /// Rule-error XML (default: the configured rule_error_location)
        #[arg(short, long)]
        rule_errors: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print envelope counts and diagnostics of an X12 interchange as JSON
    Inspect {
        /// X12 input file (`-` for stdin)
        input: PathBuf,

        #[arg(short, long)]
        direction: Option<Direction>,
    },
}

impl Cli {
    /// Default log filter for the `-v` count
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

/// Execute the parsed command line
///
/// Conversion diagnostics never fail the command on their own; with
/// `--strict` they turn the exit status into 2 after the output is written.
pub fn run(cli: &Cli) -> Result<ExitCode> {
    let mut config = load_config(cli.config.as_deref())?;

    let report = match &cli.command {
        Commands::ToXml {
            input,
            output,
            direction,
            compact,
        } => {
            if let Some(direction) = direction {
                config.direction = *direction;
            }
            let pretty = config.pretty_xml && !compact;
            to_xml(&config, input, output.as_deref(), pretty)?
        }
        Commands::ToEdi {
            input,
            output,
            segment_separator,
            element_separator,
            composite_separator,
        } => {
            if let Some(value) = segment_separator {
                config.output.segment_separator.clone_from(value);
            }
            if let Some(value) = element_separator {
                config.output.element_separator.clone_from(value);
            }
            if let Some(value) = composite_separator {
                config.output.composite_separator.clone_from(value);
            }
            to_edi(&config, input, output.as_deref())?
        }
        Commands::MarkBad {
            input,
            rule_errors,
            output,
        } => mark_bad(&config, input, rule_errors.as_deref(), output.as_deref())?,
        Commands::Inspect { input, direction } => {
            if let Some(direction) = direction {
                config.direction = *direction;
            }
            inspect(&config, input)?
        }
    };

    if let Some(target) = &cli.report {
        write_report(&report, target)?;
    }

    if cli.strict && !report.diagnostics.is_empty() {
        info!(
            diagnostics = report.diagnostics.len(),
            "strict mode: failing on diagnostics"
        );
        return Ok(ExitCode::from(STRICT_FAILURE));
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> Result<ConverterConfig> {
    match path {
        Some(path) => ConverterConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ConverterConfig::default()),
    }
}

fn to_xml(
    config: &ConverterConfig,
    input: &Path,
    output: Option<&Path>,
    pretty: bool,
) -> Result<ConversionReport> {
    let raw = read_input(input)?;
    let conversion = EdiToXmlConverter::new(config)
        .convert(&raw)
        .with_context(|| format!("failed to convert {}", input.display()))?;
    write_output(output, &conversion.to_xml(pretty))?;
    Ok(conversion.report())
}

fn to_edi(config: &ConverterConfig, input: &Path, output: Option<&Path>) -> Result<ConversionReport> {
    let converter = XmlToEdiConverter::from_config(config)?;
    let document = read_document(input)?;
    let (text, diagnostics) = converter.convert_document(&document);
    write_output(output, &text)?;
    Ok(ConversionReport::from_document("to-edi", &document, &diagnostics))
}

fn mark_bad(
    config: &ConverterConfig,
    input: &Path,
    rule_errors: Option<&Path>,
    output: Option<&Path>,
) -> Result<ConversionReport> {
    let document = read_document(input)?;
    let processor = MarkBadProcessor::from_config(config);

    let mut context = ConversionContext::new();
    if let Some(path) = rule_errors {
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rule errors {}", path.display()))?;
        context.insert(processor.location(), xml);
    }
    let (marked, diagnostics) = processor
        .process(&document, &context)
        .context("failed to apply rule errors")?;

    write_output(output, &xedi_ir::xml::to_xml(&marked, config.pretty_xml))?;
    Ok(ConversionReport::from_document("mark-bad", &marked, &diagnostics))
}

fn inspect(config: &ConverterConfig, input: &Path) -> Result<ConversionReport> {
    let raw = read_input(input)?;
    let conversion = EdiToXmlConverter::new(config)
        .convert(&raw)
        .with_context(|| format!("failed to convert {}", input.display()))?;
    let report = ConversionReport::from_document("inspect", &conversion.document, &conversion.diagnostics);
    write_output(None, &format!("{}\n", report.to_json()?))?;
    Ok(report)
}

fn read_document(input: &Path) -> Result<xedi_ir::XediDocument> {
    let xml = read_input(input)?;
    xedi_ir::xml::from_xml(&xml).with_context(|| format!("{} is not an XEDI document", input.display()))
}

fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    debug!(path = %input.display(), "reading input");
    std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes()).context("failed to write stdout")?;
            stdout.flush().context("failed to write stdout")
        }
    }
}

fn write_report(report: &ConversionReport, target: &Path) -> Result<()> {
    let json = report.to_json()?;
    if target.as_os_str() == "-" {
        eprintln!("{json}");
        return Ok(());
    }
    std::fs::write(target, format!("{json}\n"))
        .with_context(|| format!("failed to write report {}", target.display()))
}
