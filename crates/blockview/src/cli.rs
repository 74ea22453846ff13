//! Command-line interface for inspecting large files
//!
//! Configuration is layered: defaults, then an optional JSON file
//! (`--config`), then flags and `BLOCKVIEW_*` environment variables.
//!
//! ```text
//! blockview --block-size 8192 info big.log --json
//! blockview --terminator crlf lines big.log --start 1000 --count 20
//! blockview block big.bin 3
//! ```

use crate::{
    block_cache::BlockCache, config::LineIndexConfig, line_index::LineIndex,
    terminator::Terminator,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Bytes per hex dump row
const DUMP_WIDTH: usize = 16;

/// Command-line arguments
#[derive(Debug, Clone, Parser)]
#[command(
    name = "blockview",
    about = "Bounded-memory byte and line access to large files",
    version
)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, env = "BLOCKVIEW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Bytes per cached block (256 to 65535)
    #[arg(long, env = "BLOCKVIEW_BLOCK_SIZE", global = true)]
    pub block_size: Option<usize>,

    /// Number of blocks held in memory
    #[arg(long, env = "BLOCKVIEW_MAX_BLOCKS", global = true)]
    pub max_blocks: Option<usize>,

    /// Number of materialized lines kept
    #[arg(long, env = "BLOCKVIEW_MAX_LINES", global = true)]
    pub max_lines: Option<usize>,

    /// Line terminator: lf, cr or crlf
    #[arg(long, env = "BLOCKVIEW_TERMINATOR", global = true)]
    pub terminator: Option<Terminator>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show size, block geometry and line count
    Info {
        /// File to inspect
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the byte at a position
    Byte {
        /// File to read
        path: PathBuf,

        /// Absolute byte position
        pos: u64,
    },

    /// Print one line
    Line {
        /// File to read
        path: PathBuf,

        /// Zero-based line number
        line: u64,
    },

    /// Print a run of lines
    Lines {
        /// File to read
        path: PathBuf,

        /// First line to print
        #[arg(long, default_value_t = 0)]
        start: u64,

        /// Number of lines to print (all remaining if omitted)
        #[arg(long)]
        count: Option<u64>,
    },

    /// Hex dump one block
    Block {
        /// File to read
        path: PathBuf,

        /// Block number
        block: u64,
    },
}

/// File summary printed by `info`
#[derive(Debug, Serialize)]
struct FileInfo {
    path: PathBuf,
    size: u64,
    block_size: usize,
    block_count: u64,
    last_block_size: usize,
    line_count: u64,
    last_is_terminator: bool,
    terminator: Terminator,
}

impl Cli {
    /// Resolve the effective configuration
    pub fn line_index_config(&self) -> Result<LineIndexConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => LineIndexConfig::default(),
        };

        if let Some(block_size) = self.block_size {
            config.cache.block_size = block_size;
        }
        if let Some(max_blocks) = self.max_blocks {
            config.cache.max_blocks = max_blocks;
        }
        if let Some(max_lines) = self.max_lines {
            config.max_lines_held = max_lines;
        }
        if let Some(terminator) = self.terminator {
            config.terminator = terminator;
        }

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<LineIndexConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn open_index(path: &Path, config: LineIndexConfig) -> Result<LineIndex> {
    LineIndex::open(path, config).with_context(|| format!("indexing {}", path.display()))
}

fn open_cache(path: &Path, config: &LineIndexConfig) -> Result<BlockCache> {
    BlockCache::open(path, config.cache.clone())
        .with_context(|| format!("opening {}", path.display()))
}

/// Execute a parsed command, writing its output to `out`
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    let config = cli.line_index_config()?;

    match &cli.command {
        Command::Info { path, json } => {
            let index = open_index(path, config)?;
            let cache = index.cache();
            let info = FileInfo {
                path: path.clone(),
                size: cache.size(),
                block_size: cache.block_size(),
                block_count: cache.block_count(),
                last_block_size: cache.last_block_size(),
                line_count: index.line_count(),
                last_is_terminator: index.last_is_terminator(),
                terminator: index.terminator(),
            };

            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(&info)?)?;
            } else {
                writeln!(out, "path:               {}", info.path.display())?;
                writeln!(out, "size:               {}", info.size)?;
                writeln!(out, "block size:         {}", info.block_size)?;
                writeln!(out, "block count:        {}", info.block_count)?;
                writeln!(out, "last block size:    {}", info.last_block_size)?;
                writeln!(out, "lines ({}):         {}", info.terminator, info.line_count)?;
                writeln!(out, "ends in terminator: {}", info.last_is_terminator)?;
            }
        }
        Command::Byte { path, pos } => {
            let mut cache = open_cache(path, &config)?;
            let byte = cache.byte_at(*pos)?;
            writeln!(out, "{pos}: {byte} (0x{byte:02x})")?;
        }
        Command::Line { path, line } => {
            let mut index = open_index(path, config)?;
            writeln!(out, "{}", index.get(*line)?)?;
        }
        Command::Lines { path, start, count } => {
            let mut index = open_index(path, config)?;
            let total = index.line_count();
            let end = count.map_or(total, |count| start.saturating_add(count).min(total));
            for line in *start..end {
                writeln!(out, "{}", index.get(line)?)?;
            }
        }
        Command::Block { path, block } => {
            let mut cache = open_cache(path, &config)?;
            let bytes = cache.copy_block(*block)?;
            let valid = cache.valid_len(*block);
            let base = block * cache.block_size() as u64;
            for (row, chunk) in bytes[..valid].chunks(DUMP_WIDTH).enumerate() {
                let offset = base + (row * DUMP_WIDTH) as u64;
                writeln!(out, "{offset:08x}  {}", hex::encode(chunk))?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn temp_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content).expect("write");
        file.flush().expect("flush");
        file
    }

    fn run_args(args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(args)?;
        let mut out = Vec::new();
        run(&cli, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_flags_override_config_file() {
        let config = temp_file(br#"{"cache":{"block_size":1024,"max_blocks":4},"max_lines_held":9}"#);
        let cli = Cli::try_parse_from([
            "blockview",
            "--config",
            config.path().to_str().unwrap(),
            "--max-blocks",
            "2",
            "--terminator",
            "crlf",
            "info",
            "x",
        ])
        .unwrap();

        let resolved = cli.line_index_config().unwrap();
        assert_eq!(resolved.cache.block_size, 1024);
        assert_eq!(resolved.cache.max_blocks, 2);
        assert_eq!(resolved.max_lines_held, 9);
        assert_eq!(resolved.terminator, Terminator::CrLf);
    }

    #[test]
    fn test_invalid_flag_values_are_rejected() {
        let cli =
            Cli::try_parse_from(["blockview", "--block-size", "10", "info", "x"]).unwrap();
        let err = cli.line_index_config().unwrap_err();
        assert!(err.to_string().contains("block_size"));

        assert!(Cli::try_parse_from(["blockview", "--terminator", "nl", "info", "x"]).is_err());
    }

    #[test]
    fn test_byte_command() {
        let file = temp_file(b"ABC");
        let output = run_args(&["blockview", "byte", file.path().to_str().unwrap(), "1"]).unwrap();
        assert_eq!(output, "1: 66 (0x42)\n");

        assert!(run_args(&["blockview", "byte", file.path().to_str().unwrap(), "3"]).is_err());
    }

    #[test]
    fn test_line_commands() {
        let file = temp_file(b"zero\none\ntwo\nthree");
        let path = file.path().to_str().unwrap();

        assert_eq!(run_args(&["blockview", "line", path, "2"]).unwrap(), "two\n");
        assert_eq!(
            run_args(&["blockview", "lines", path, "--start", "1", "--count", "2"]).unwrap(),
            "one\ntwo\n"
        );
        assert_eq!(
            run_args(&["blockview", "lines", path, "--start", "3"]).unwrap(),
            "three\n"
        );
        assert_eq!(
            run_args(&["blockview", "lines", path, "--start", "9"]).unwrap(),
            ""
        );
    }

    #[test]
    fn test_info_json() {
        let file = temp_file(&vec![b'x'; 300]);
        let output = run_args(&[
            "blockview",
            "--block-size",
            "256",
            "info",
            file.path().to_str().unwrap(),
            "--json",
        ])
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["size"], 300);
        assert_eq!(value["block_count"], 2);
        assert_eq!(value["last_block_size"], 44);
        assert_eq!(value["line_count"], 1);
        assert_eq!(value["terminator"], "lf");
    }

    #[test]
    fn test_block_dump() {
        let file = temp_file(&[0xABu8; 260]);
        let output = run_args(&[
            "blockview",
            "--block-size",
            "256",
            "block",
            file.path().to_str().unwrap(),
            "1",
        ])
        .unwrap();
        assert_eq!(output, "00000100  abababab\n");
    }
}
