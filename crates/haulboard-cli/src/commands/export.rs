use std::path::Path;

use haulboard_core::db::ScheduleRepository;
use haulboard_core::export::{self, render_schedules_export};

use crate::cli::ExportFormat;
use crate::commands::common::open_database;
use crate::error::CliError;

impl From<ExportFormat> for export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Csv => Self::Csv,
        }
    }
}

pub fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let schedules = db.schedules().list()?;
    let rendered = render_schedules_export(&schedules, format.into())?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
