//! CLI argument parsing and command handlers
//!
//! `rfq` inspects queries stored as wire JSON: it renders them, normalizes
//! them, lists their atoms, and converts them to and from cache frames.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::cache;
use crate::config::{self, CodecConfig};
use crate::output;
use crate::query::Q;
use crate::simplify::simplify;
use crate::tree;
use crate::wire;

/// rfq: inspect and convert code search queries
#[derive(Parser, Debug)]
#[command(
    name = "rfq",
    version,
    about = "Inspect, normalize and convert code search queries",
    long_about = "rfq reads queries in their wire JSON form and prints their debug \
                  rendering, normal form or atoms, or converts them to and from the \
                  cache byte encoding.\n\n\
                  Use '-' as the input path to read from stdin."
)]
pub struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file with a [codec] section
    #[arg(long, value_name = "PATH", default_value = "rfq.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the debug rendering of a wire JSON query
    Show {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Print the normal form of a wire JSON query
    Simplify {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print wire JSON instead of the debug rendering
        #[arg(long)]
        json: bool,
    },

    /// Split unscoped substring/regex atoms into file-name and content halves, then normalize
    Expand {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print wire JSON instead of the debug rendering
        #[arg(long)]
        json: bool,
    },

    /// List every atom of a wire JSON query, one per line
    Atoms {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Write the cache frame of a wire JSON query
    Encode {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file for the frame
        #[arg(short, long, value_name = "OUT")]
        output: PathBuf,
    },

    /// Read a cache frame and print the query it holds
    Decode {
        #[arg(value_name = "FRAME")]
        input: PathBuf,

        /// Print wire JSON instead of the debug rendering
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let log_level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
            .init();

        let config = config::load_config(&self.config)?;

        match self.command {
            Command::Show { input } => {
                let q = read_wire_query(&input, &config)?;
                println!("{}", q);
                Ok(())
            }
            Command::Simplify { input, json } => {
                let q = simplify(read_wire_query(&input, &config)?);
                if q.as_const().is_some() {
                    output::warn(&format!("Query simplifies to the constant {}", q));
                }
                print_query(&q, json, &config)
            }
            Command::Expand { input, json } => {
                let q = read_wire_query(&input, &config)?;
                let q = simplify(tree::map(q, tree::expand_file_content));
                print_query(&q, json, &config)
            }
            Command::Atoms { input } => {
                let q = read_wire_query(&input, &config)?;
                let mut count = 0;
                tree::visit_atoms(&q, |atom| {
                    count += 1;
                    println!("{}", atom);
                });
                log::info!("Listed {} atoms", count);
                Ok(())
            }
            Command::Encode { input, output } => {
                let q = read_wire_query(&input, &config)?;
                let frame = cache::encode(&q).context("Failed to encode query")?;
                std::fs::write(&output, &frame)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                log::info!("Wrote {} byte cache frame to {}", frame.len(), output.display());
                Ok(())
            }
            Command::Decode { input, json } => {
                let bytes = read_input(&input)?;
                let q = cache::decode_with_config(&bytes, &config)
                    .with_context(|| format!("Failed to decode cache frame {}", input.display()))?;
                print_query(&q, json, &config)
            }
        }
    }
}

/// Read a file, or stdin for `-`
fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_wire_query(path: &Path, config: &CodecConfig) -> Result<Q> {
    let bytes = read_input(path)?;
    let q = wire::decode_with_config(&bytes, config)
        .with_context(|| format!("Failed to decode wire query {}", path.display()))?;
    log::debug!("Decoded query: {}", q);
    Ok(q)
}

fn print_query(q: &Q, json: bool, config: &CodecConfig) -> Result<()> {
    if !json {
        println!("{}", q);
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    if config.pretty_wire {
        writeln!(stdout, "{}", wire::encode_pretty(q)?)?;
    } else {
        stdout.write_all(&wire::encode(q)?)?;
        writeln!(stdout)?;
    }
    Ok(())
}
