//! The `lessonkit report` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use lessonkit_core::report::LessonReport;

pub fn execute(path: PathBuf, format: String) -> Result<()> {
    let report = LessonReport::load_json(&path)?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_text(&report),
        other => anyhow::bail!("unknown format: {other} (expected text or json)"),
    }

    Ok(())
}

fn print_text(report: &LessonReport) {
    println!("Lesson: {} [{}]", report.lesson_title, report.lesson_id);
    println!(
        "Played: {} ({})",
        report.started_at.format("%Y-%m-%d %H:%M UTC"),
        report.status.label()
    );

    let mut table = Table::new();
    table.set_header(vec!["#", "Type", "Result"]);
    for outcome in &report.outcomes {
        table.add_row(vec![
            Cell::new(outcome.number),
            Cell::new(outcome.question_type.label()),
            Cell::new(if outcome.correct { "correct" } else { "missed" }),
        ]);
    }
    println!("{table}");

    let s = &report.summary;
    println!("\nScore: {}/{} ({}%)", s.correct, s.total, s.percentage);
    println!("{}", s.tier.message());

    let missed: Vec<String> = report.missed().map(|o| o.number.to_string()).collect();
    if !missed.is_empty() {
        println!("Review questions: {}", missed.join(", "));
    }
}
