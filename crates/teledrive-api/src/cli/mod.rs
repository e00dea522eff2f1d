//! CLI command definitions for the `tdrive` binary.
//!
//! Transfers take and emit the upload manifest as JSON, since persisting it
//! is the caller's job.

pub mod status;
pub mod transfer;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Store files through a pool of Telegram bots.
#[derive(Parser, Debug)]
#[command(name = "tdrive", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a config.toml (default: ~/.teledrive/config.toml).
    #[arg(long, global = true, env = "TELEDRIVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter override implied by the verbosity flags, if any.
    pub fn log_level(&self) -> Option<&'static str> {
        match self.verbose {
            0 if self.quiet => Some("error"),
            0 => None,
            1 => Some("info,teledrive=debug"),
            _ => Some("trace"),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file and print its manifest.
    Upload {
        /// File to upload.
        path: PathBuf,

        /// Name stored with the file (default: the file's own name).
        #[arg(long)]
        name: Option<String>,

        /// Also write the manifest JSON to this path.
        #[arg(long)]
        manifest_out: Option<PathBuf>,
    },

    /// Download a file described by a manifest.
    Download {
        /// Manifest JSON produced by `upload`.
        #[arg(long)]
        manifest: PathBuf,

        /// Destination path.
        #[arg(long, short)]
        out: PathBuf,
    },

    /// Print a direct download URL for a single-chunk file.
    Url {
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Delete a file described by a manifest.
    #[command(alias = "rm")]
    Delete {
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Show provider availability.
    Status,

    /// Show per-bot health.
    Bots,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload() {
        let cli = Cli::try_parse_from([
            "tdrive",
            "upload",
            "video.mp4",
            "--name",
            "clip.mp4",
            "--manifest-out",
            "clip.json",
        ])
        .unwrap();

        match cli.command {
            Commands::Upload {
                path,
                name,
                manifest_out,
            } => {
                assert_eq!(path, PathBuf::from("video.mp4"));
                assert_eq!(name.as_deref(), Some("clip.mp4"));
                assert_eq!(manifest_out, Some(PathBuf::from("clip.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tdrive", "bots", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_level(), Some("trace"));
        assert!(matches!(cli.command, Commands::Bots));
    }

    #[test]
    fn test_download_requires_manifest() {
        assert!(Cli::try_parse_from(["tdrive", "download", "--out", "x"]).is_err());

        let cli = Cli::try_parse_from(["tdrive", "download", "--manifest", "m.json", "-o", "x"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Download { .. }));
    }

    #[test]
    fn test_log_level_defaults() {
        let cli = Cli::try_parse_from(["tdrive", "status"]).unwrap();
        assert_eq!(cli.log_level(), None);

        let cli = Cli::try_parse_from(["tdrive", "status", "--quiet"]).unwrap();
        assert_eq!(cli.log_level(), Some("error"));
    }

    #[test]
    fn test_delete_alias() {
        let cli = Cli::try_parse_from(["tdrive", "rm", "--manifest", "m.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Delete { .. }));
    }
}
