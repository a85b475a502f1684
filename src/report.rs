//! Human-readable output: the pre-run pipeline summary and the `success.txt`
//! report written after a completed run.

use crate::config::ConfigDocument;
use crate::pipeline::RunStatus;
use crate::Result;

use anyhow::Context;
use chrono::{DateTime, Local, TimeDelta};
use std::fs;
use std::path::{Path, PathBuf};

const RULE: &str = "=================================================";
const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p %Z";

/// `HHHhr MMm SSs`. Negative spans render as zero.
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let total = elapsed.num_seconds().max(0);
    let (hours, rest) = (total / 3600, total % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    format!("{:03}hr {:02}m {:02}s", hours, minutes, seconds)
}

/// Table of stages with their `use` and `required` flags.
pub fn pipeline_summary(document: &ConfigDocument) -> String {
    let names = document.stage_names();
    let width = names.iter().map(String::len).max().unwrap_or(4);

    let mut out = format!("{RULE}\nPIPE{}USE\tREQ\n", " ".repeat(width.saturating_sub(1)));
    for name in &names {
        // Skip entries that fail to deserialize; the executor reports them.
        if let Ok(Some(stage)) = document.stage(name) {
            let pad = " ".repeat(width + 3 - name.len());
            out.push_str(&format!("{name}{pad}{}\t{}\n", stage.use_stage, stage.required));
        }
    }
    out.push_str(RULE);
    out.push('\n');
    out
}

pub fn print_pipeline_summary(document: &ConfigDocument) {
    print!("{}", pipeline_summary(document));
}

/// Body of `success.txt` (CRLF line endings).
///
/// Module times are measured from the previous module's completion (the run
/// start for the first module); skipped stages do not advance the clock.
pub fn success_report(status: &RunStatus, start: DateTime<Local>, end: DateTime<Local>) -> String {
    let mut out = format!(
        "mzkit pipeline completed successfully!\r\n\r\n\
         Pipeline Performance:\r\n\
         Run started at:\r\n{}\r\n\r\n\
         Run completed at:\r\n{}\r\n\r\n\
         Total elapsed time:\r\n{}\r\n\r\n",
        start.format(TIMESTAMP_FORMAT),
        end.format(TIMESTAMP_FORMAT),
        format_elapsed(end - start),
    );

    let mut step_start = start;
    for stage in status.stages() {
        out.push_str(&format!("\r\n{} step: ", stage.stage));
        if !stage.ran {
            out.push_str("SKIPPED\r\n");
            continue;
        } else if stage.fail {
            out.push_str("FAILED :( check output\r\n");
        } else {
            out.push_str("SUCCEEDED\r\n");
        }

        for module in &stage.modules {
            let elapsed = format_elapsed(module.completion_time - step_start);
            step_start = module.completion_time;
            out.push_str(&format!("{}: {} - {}\r\n", module.module, elapsed, module.message));
        }
    }
    out.push_str("\r\n\r\n");
    out
}

/// Write `success.txt` into `output_folder` and print the completion banner.
pub fn write_success_file(
    status: &RunStatus,
    output_folder: &Path,
    start: DateTime<Local>,
) -> Result<PathBuf> {
    let end = Local::now();
    let path = output_folder.join("success.txt");
    fs::write(&path, success_report(status, start, end))
        .with_context(|| format!("write run report {}", path.display()))?;

    println!("{}", RULE);
    println!("{}", RULE);
    println!("# Completed pipeline in {}", format_elapsed(end - start));
    println!("{}", RULE);
    println!("{}\n", RULE);
    Ok(path)
}
