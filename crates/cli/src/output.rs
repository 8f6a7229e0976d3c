// Human and JSON rendering of job records

use colored::{ColoredString, Colorize};
use mirrorcheck_core::domain::{JobRecord, VerifyState};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct FieldRow {
    field: &'static str,
    value: String,
}

#[derive(Tabled)]
struct DiffRow {
    kind: &'static str,
    path: String,
}

pub fn colored_state(state: Option<VerifyState>) -> ColoredString {
    match state {
        Some(VerifyState::Success) => "success".green().bold(),
        Some(VerifyState::Failed) => "failed".yellow().bold(),
        Some(VerifyState::Error) => "error".red().bold(),
        Some(other) => other.as_str().cyan(),
        None => "unknown".dimmed(),
    }
}

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_DIFFERENCES: u8 = 1;
pub const EXIT_ERROR: u8 = 2;

/// Exit status for a finished `verify`
pub fn exit_code_for(record: &JobRecord) -> u8 {
    match record.state {
        Some(VerifyState::Success) => EXIT_SUCCESS,
        Some(VerifyState::Failed) => EXIT_DIFFERENCES,
        _ => EXIT_ERROR,
    }
}

pub fn print_json(record: &JobRecord) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

pub fn print_record(job_id: &str, record: &JobRecord) {
    if record.is_unknown() {
        println!("{} {}", "Job".bold(), job_id);
        println!("  {} {}", "State:".bold(), colored_state(None));
        return;
    }

    println!("{} {}  {}", "Job".bold(), job_id, colored_state(record.state));
    println!();

    let rows: Vec<FieldRow> = record
        .to_field_map()
        .into_iter()
        .filter(|(field, value)| *field != "diff_json" && !value.is_empty())
        .map(|(field, value)| FieldRow { field, value })
        .collect();
    println!("{}", Table::new(rows));

    if let Some(diff) = record.diff.as_ref().filter(|d| !d.is_empty()) {
        let rows: Vec<DiffRow> = diff
            .missing
            .iter()
            .map(|p| DiffRow {
                kind: "missing",
                path: p.clone(),
            })
            .chain(diff.mismatch.iter().map(|p| DiffRow {
                kind: "mismatch",
                path: p.clone(),
            }))
            .collect();
        println!();
        println!("{}", "Differences".yellow().bold());
        println!("{}", Table::new(rows));
    }
}
