//! The `lessonkit init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("lessonkit.toml").exists() {
        println!("lessonkit.toml already exists, skipping.");
    } else {
        std::fs::write("lessonkit.toml", SAMPLE_CONFIG)?;
        println!("Created lessonkit.toml");
    }

    std::fs::create_dir_all("lessons")?;
    let example_path = std::path::Path::new("lessons/example.toml");
    if example_path.exists() {
        println!("lessons/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_LESSON)?;
        println!("Created lessons/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Point lessonkit.toml at your backend");
    println!("  2. Run: lessonkit token set <token>");
    println!("  3. Run: lessonkit validate lessons/example.toml");
    println!("  4. Run: lessonkit play lessons/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# lessonkit configuration

[backend]
base_url = "http://localhost:8000"
timeout_secs = 30
# token = "${LESSONKIT_TOKEN}"
# token_file = "~/.config/lessonkit/token"

[endpoints]
free_text = "/api/ai/validate-answer/free-text"
translation = "/api/ai/validate-answer/translation"
voice_answer = "/api/ai/validate-answer/voice-answer"
lesson = "/api/lessons/{id}"
"#;

const EXAMPLE_LESSON: &str = r#"id = "example"
title = "Getting started"
description = "A short tour of question types"

[[questions]]
type = "analogy_card"
concept = "Spaced repetition"
analogy = "Watering a plant a little every few days"
explanation = "Short reviews at growing intervals keep memories fresh."

[[questions]]
type = "mcq"
question = "Which planet is closest to the sun?"
answer = "A"

[questions.options]
A = "Mercury"
B = "Venus"
C = "Mars"

[[questions]]
type = "fib"
question = "Water boils at {BLANK_1} degrees Celsius at sea level."
correct_answers = ["100"]

[[questions]]
type = "swipe_cards"
statement = "The Pacific is the largest ocean."
answer = true

[[questions]]
type = "reorder_list"
question = "Put the planets in order from the sun."
steps = ["Mercury", "Venus", "Earth", "Mars"]

[[questions]]
type = "free_text"
question = "In one sentence, why is the sky blue?"
"#;
