//! The `lessonkit validate` command.

use std::path::PathBuf;

use anyhow::Result;

use lessonkit_core::parser;

pub fn execute(path: PathBuf) -> Result<()> {
    let lessons = if path.is_dir() {
        parser::load_lesson_directory(&path)?
    } else {
        vec![parser::parse_lesson(&path)?]
    };

    for lesson in &lessons {
        println!(
            "Lesson: {} [{}] ({} questions)",
            lesson.title,
            lesson.id,
            lesson.questions.len()
        );
    }

    let warnings = parser::validate_lessons(&lessons);
    for w in &warnings {
        println!("  WARNING: {w}");
    }

    if warnings.is_empty() {
        println!("All lessons valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
