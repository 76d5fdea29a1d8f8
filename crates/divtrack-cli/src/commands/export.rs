use std::path::Path;

use divtrack_core::export::{render_export, ExportFormat};

use crate::commands::common::Session;
use crate::error::CliError;

pub fn run_export(
    session: &Session,
    format: ExportFormat,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let rendered = render_export(&session.dividends(), format)?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
