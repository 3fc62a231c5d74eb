use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use haulboard_core::ResourceAxis;

#[derive(Parser)]
#[command(name = "haulboard")]
#[command(about = "Plan, check and move delivery schedules from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to a JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new schedule
    #[command(alias = "new")]
    Add(AddArgs),
    /// List schedules, optionally only those drawn on a date range
    List {
        /// First day to show (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Number of days to show from --date
        #[arg(long, default_value = "1")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one schedule and its per-day segments
    Show {
        /// Schedule ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a proposed placement for driver or vehicle double-booking
    Conflicts {
        /// Schedule ID or unique ID prefix
        id: String,
        /// Day to check (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Proposed start (HH:MM)
        #[arg(long)]
        start: String,
        /// Proposed end (HH:MM)
        #[arg(long)]
        end: String,
        /// Resource axis to check
        #[arg(long, value_enum, default_value_t = AxisArg::All)]
        axis: AxisArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show side-by-side lanes for one day
    Layout {
        /// Day to lay out (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Only schedules of this driver
        #[arg(long, conflicts_with = "vehicle")]
        driver: Option<String>,
        /// Only schedules of this vehicle
        #[arg(long)]
        vehicle: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a schedule to a new placement
    Move(MoveArgs),
    /// Delete an existing schedule
    Delete {
        /// Schedule ID or unique ID prefix
        id: String,
    },
    /// Export schedules
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Print the change feed after a sequence number
    Changes {
        /// Last sequence number already seen
        #[arg(long, default_value = "0")]
        since: i64,
        /// Maximum number of changes to print
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct AddArgs {
    /// Loading start (YYYY-MM-DD HH:MM)
    #[arg(long)]
    pub loading: String,
    /// Delivery end (YYYY-MM-DD HH:MM)
    #[arg(long)]
    pub delivery: String,
    /// Explicit schedule ID (generated when omitted)
    #[arg(long)]
    pub id: Option<String>,
    #[arg(long)]
    pub driver: Option<String>,
    #[arg(long)]
    pub vehicle: Option<String>,
    #[arg(long)]
    pub client: Option<String>,
    /// Route name
    #[arg(long)]
    pub route: Option<String>,
    #[arg(long)]
    pub cargo: Option<String>,
    /// Fare in the smallest currency unit
    #[arg(long)]
    pub fare: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MoveArgs {
    /// Schedule ID or unique ID prefix
    pub id: String,
    /// Target loading day (YYYY-MM-DD)
    #[arg(long)]
    pub date: String,
    /// Target loading start (HH:MM)
    #[arg(long)]
    pub start: String,
    /// Target delivery end (HH:MM); keeps the current duration when omitted
    #[arg(long)]
    pub end: Option<String>,
    /// Keep the move even if it double-books a driver or vehicle
    #[arg(long)]
    pub force: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum AxisArg {
    Driver,
    Vehicle,
    All,
}

impl AxisArg {
    pub const fn axes(self) -> &'static [ResourceAxis] {
        match self {
            Self::Driver => &[ResourceAxis::Driver],
            Self::Vehicle => &[ResourceAxis::Vehicle],
            Self::All => &ResourceAxis::ALL,
        }
    }
}
