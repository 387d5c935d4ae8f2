use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "igor")]
#[command(about = "Reserve cluster nodes for a span of time")]
pub struct Cli {
    /// Scheduler configuration file.
    #[arg(long, global = true, default_value = "scheduler.json")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a reservation.
    Sub(SubArgs),

    /// Delete a reservation.
    Del {
        /// Reservation name.
        name: String,
    },

    /// Lengthen a reservation.
    Extend {
        #[arg(short = 'r', long = "reservation")]
        name: String,

        /// Extra time, e.g. 30m or 1d.
        #[arg(short = 't', long = "time", default_value = "60m")]
        duration: String,
    },

    /// List reservations.
    Show,
}

#[derive(Args)]
pub struct SubArgs {
    #[arg(short = 'r', long = "reservation")]
    pub name: String,

    #[arg(short = 'k', long = "kernel")]
    pub kernel: Option<PathBuf>,

    #[arg(short = 'i', long = "initrd")]
    pub initrd: Option<PathBuf>,

    /// Cobbler profile to boot instead of a kernel/initrd pair.
    #[arg(long = "profile")]
    pub profile: Option<String>,

    /// Number of nodes.
    #[arg(short = 'n', long = "nodes")]
    pub count: Option<usize>,

    /// Specific nodes, e.g. host[1-4,7].
    #[arg(short = 'w', long = "with")]
    pub nodes: Option<String>,

    /// Kernel command line.
    #[arg(short = 'c', long = "cmdline", default_value = "")]
    pub kernel_args: String,

    /// Reservation length, e.g. 4d6h30m.
    #[arg(short = 't', long = "time", default_value = "60m")]
    pub duration: String,

    /// Only show when the reservation could start.
    #[arg(short = 's', long = "speculative")]
    pub speculative: bool,

    /// Earliest start, e.g. 2017-Jan-2-15:04.
    #[arg(short = 'a', long = "after")]
    pub after: Option<String>,
}
