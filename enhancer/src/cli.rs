//! CLI command definitions.

use crate::inference::types::{EnhancementOptions, EnhancementRequest, EnhancementStyle};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Prompt Enhancer - turns draft instructions into enhanced instructions
#[derive(Parser, Debug)]
#[command(name = "prompt-enhancer")]
#[command(about = "Turns draft instructions into enhanced instructions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Override the configured model
    #[arg(long, global = true, env = "ENHANCER_MODEL")]
    pub model: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enhance a draft read from a file or stdin and print the result as JSON
    Enhance {
        /// File holding the draft; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,

        /// Enhancement style
        #[arg(long, default_value = "detailed")]
        style: StyleArg,

        /// Aspect to focus on; repeatable
        #[arg(long = "focus")]
        focus_areas: Vec<String>,

        /// Soft cap on the enhanced text, in characters
        #[arg(long)]
        max_length: Option<usize>,

        /// Ask for illustrative examples
        #[arg(long)]
        examples: bool,

        /// Extra free-form instructions
        #[arg(long)]
        instructions: Option<String>,
    },

    /// Probe the remote API and print the health report as JSON
    Health,

    /// Run the control plane until interrupted
    Serve,
}

/// Enhancement style options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleArg {
    /// Expand with specifics
    Detailed,
    /// Tighten
    Concise,
    /// Precise engineering language
    Technical,
    /// Open-ended phrasing
    Creative,
    /// Sectioned layout
    Structured,
}

impl From<StyleArg> for EnhancementStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Detailed => Self::Detailed,
            StyleArg::Concise => Self::Concise,
            StyleArg::Technical => Self::Technical,
            StyleArg::Creative => Self::Creative,
            StyleArg::Structured => Self::Structured,
        }
    }
}

/// Builds the request for `enhance`, reading the draft from `file` or `stdin`.
///
/// # Errors
///
/// Returns an error if the draft cannot be read.
pub fn enhancement_request(
    file: Option<&Path>,
    style: StyleArg,
    focus_areas: Vec<String>,
    max_length: Option<usize>,
    examples: bool,
    instructions: Option<String>,
    mut stdin: impl Read,
) -> anyhow::Result<EnhancementRequest> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read draft from {}", path.display()))?,
        None => {
            let mut text = String::new();
            stdin
                .read_to_string(&mut text)
                .context("Failed to read draft from stdin")?;
            text
        }
    };

    Ok(EnhancementRequest::new(text.trim_end()).with_options(EnhancementOptions {
        style: style.into(),
        focus_areas,
        max_length,
        include_examples: examples.then_some(true),
        custom_instructions: instructions,
    }))
}
