//! The `lessonkit play` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use lessonkit_client::config::load_config_from;
use lessonkit_client::{create_api_client, ContentClient, HttpValidator};
use lessonkit_core::error::InteractionError;
use lessonkit_core::model::{Lesson, QuestionType};
use lessonkit_core::parser;
use lessonkit_core::report::LessonReport;
use lessonkit_core::runner::{HostInput, LessonHost, LessonObserver, LessonRunner};
use lessonkit_core::traits::Recording;
use lessonkit_core::view::{BlankSegment, Body, Dispatcher, Interaction, RenderedQuestion};

/// Swipe commands are sent as a full-width drag on a nominal screen.
const SCREEN_WIDTH: f64 = 400.0;

const HELP: &str = "\
Commands:
  <enter>              submit, or continue once answered
  pick <key>           choose an option (or just type the key)
  blank <n> <text>     fill blank n
  word <n>             toggle word n
  match <left> = <right>
  unmatch <left>
  move <from> <to>     move a step
  slide <value>        set the slider
  left | right         swipe the card
  record <file.wav>    attach a recording
  submit | next | retry | quit | help
Any other text answers a text question.";

/// Console progress observer.
struct ConsoleObserver;

impl LessonObserver for ConsoleObserver {
    fn on_question_mounted(&self, number: usize, question_type: Option<QuestionType>) {
        tracing::debug!(question = number, kind = ?question_type, "question mounted");
    }

    fn on_answer_recorded(&self, number: usize, correct: bool) {
        tracing::debug!(question = number, correct, "answer recorded");
    }

    fn on_item_unsupported(&self, number: usize, reason: &str) {
        eprintln!("  Question {number} cannot be shown: {reason}");
    }

    fn on_lesson_finished(&self, report: &LessonReport) {
        eprintln!(
            "\nFinished {} ({}) in {:.1}s",
            report.lesson_title,
            report.status.label(),
            report.duration().num_milliseconds() as f64 / 1000.0
        );
    }
}

/// Draws questions on stdout and reads commands from stdin.
struct TerminalHost {
    lines: Lines<BufReader<Stdin>>,
}

impl TerminalHost {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl LessonHost for TerminalHost {
    async fn next_input(&mut self, view: &RenderedQuestion) -> Result<HostInput> {
        print_view(view);
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .context("failed to read from stdin")?
            else {
                return Ok(HostInput::Exit);
            };
            match parse_command(line.trim(), view) {
                Ok(Command::Input(input)) => return Ok(input),
                Ok(Command::Help) => println!("{HELP}"),
                Err(e) => println!("  {e:#} (type `help` for commands)"),
            }
        }
    }

    fn interaction_rejected(&mut self, _view: &RenderedQuestion, error: &InteractionError) {
        println!("  Not now: {error}");
    }

    fn validating(&mut self, view: &RenderedQuestion) {
        if let Some(feedback) = &view.feedback {
            println!("  {feedback}");
        }
    }

    fn blocked(&mut self, view: &RenderedQuestion) {
        print_view(view);
    }
}

enum Command {
    Input(HostInput),
    Help,
}

fn parse_command(line: &str, view: &RenderedQuestion) -> Result<Command> {
    let interact = |i: Interaction| -> Result<Command> { Ok(Command::Input(HostInput::Interact(i))) };
    if let Body::Choices { options } = &view.body {
        if let Some(option) = options.iter().find(|o| o.key.eq_ignore_ascii_case(line)) {
            return interact(Interaction::SelectOption(option.key.clone()));
        }
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    match word.to_lowercase().as_str() {
        "" => {
            if view.shows_continue() {
                interact(Interaction::Continue)
            } else {
                interact(Interaction::Submit)
            }
        }
        "help" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Input(HostInput::Exit)),
        "submit" | "s" if rest.is_empty() => interact(Interaction::Submit),
        "next" | "continue" | "c" if rest.is_empty() => interact(Interaction::Continue),
        "retry" | "r" if rest.is_empty() => interact(Interaction::TryAgain),
        "pick" => interact(Interaction::SelectOption(rest.to_string())),
        "blank" => {
            let (n, text) = rest
                .split_once(char::is_whitespace)
                .unwrap_or((rest, ""));
            interact(Interaction::SetBlank {
                index: one_based(n)?,
                text: text.trim().to_string(),
            })
        }
        "word" => interact(Interaction::ToggleWord(one_based(rest)?)),
        "match" => {
            let (left, right) = rest
                .split_once('=')
                .context("usage: match <left> = <right>")?;
            interact(Interaction::MatchPair {
                left: left.trim().to_string(),
                right: right.trim().to_string(),
            })
        }
        "unmatch" => interact(Interaction::ClearMatch(rest.to_string())),
        "move" => {
            let mut parts = rest.split_whitespace();
            let (Some(from), Some(to), None) = (parts.next(), parts.next(), parts.next()) else {
                anyhow::bail!("usage: move <from> <to>");
            };
            interact(Interaction::MoveStep {
                from: one_based(from)?,
                to: one_based(to)?,
            })
        }
        "slide" => {
            let value: f64 = rest
                .parse()
                .with_context(|| format!("not a number: {rest:?}"))?;
            interact(Interaction::SetSlider(value))
        }
        "left" | "right" if rest.is_empty() => {
            let sign = if word.eq_ignore_ascii_case("left") { -1.0 } else { 1.0 };
            interact(Interaction::Swipe {
                dx: sign * SCREEN_WIDTH,
                velocity_x: 0.0,
                screen_width: SCREEN_WIDTH,
            })
        }
        "record" => {
            let bytes = std::fs::read(rest)
                .with_context(|| format!("failed to read recording {rest}"))?;
            interact(Interaction::AttachRecording(Recording::wav(bytes)))
        }
        _ => match &view.body {
            Body::Choices { .. } if rest.is_empty() => {
                interact(Interaction::SelectOption(line.to_string()))
            }
            Body::TextInput { .. } | Body::Listen { .. } => {
                interact(Interaction::SetText(line.to_string()))
            }
            _ => anyhow::bail!("unknown command {word:?}"),
        },
    }
}

/// Parse a 1-based position typed by the learner into an index.
fn one_based(s: &str) -> Result<usize> {
    let n: usize = s
        .trim()
        .parse()
        .with_context(|| format!("not a position: {s:?}"))?;
    anyhow::ensure!(n >= 1, "positions start at 1");
    Ok(n - 1)
}

fn print_view(view: &RenderedQuestion) {
    println!("\n[{}] {}", view.number, view.header);

    match &view.body {
        Body::Choices { options } => {
            for o in options {
                let mark = if o.selected { '>' } else { ' ' };
                println!("  {mark} {}. {}", o.key, o.text);
            }
        }
        Body::Blanks { segments } => {
            let line: String = segments
                .iter()
                .map(|s| match s {
                    BlankSegment::Text { text } => text.clone(),
                    BlankSegment::Input { index, value } if value.is_empty() => {
                        format!("[{}: ____]", index + 1)
                    }
                    BlankSegment::Input { index, value } => format!("[{}: {value}]", index + 1),
                })
                .collect();
            println!("  {line}");
        }
        Body::Words { words } => {
            let line: Vec<String> = words
                .iter()
                .map(|w| {
                    if w.selected {
                        format!("*{}*({})", w.text, w.word_index + 1)
                    } else {
                        format!("{}({})", w.text, w.word_index + 1)
                    }
                })
                .collect();
            println!("  {}", line.join(" "));
        }
        Body::Pairs { rows, choices } => {
            for row in rows {
                println!("  {} = {}", row.left, row.matched.as_deref().unwrap_or("?"));
            }
            println!("  choices: {}", choices.join(", "));
        }
        Body::Steps { order } => {
            for (i, step) in order.iter().enumerate() {
                println!("  {}. {step}", i + 1);
            }
        }
        Body::Slider {
            min,
            max,
            value,
            unit,
            ..
        } => println!("  {min} .. {max}: {value} {unit}"),
        Body::Card { statement, swiped } => match swiped {
            Some(direction) => println!("  \"{statement}\" (swiped {direction:?})"),
            None => println!("  \"{statement}\" (left = false, right = true)"),
        },
        Body::TextInput { source, value } => {
            if let Some(source) = source {
                println!(
                    "  {} ({} -> {})",
                    source.text, source.from_language, source.to_language
                );
            }
            if !value.is_empty() {
                println!("  answer: {value}");
            }
        }
        Body::Recorder { has_recording } => {
            let state = if *has_recording { "attached" } else { "none" };
            println!("  recording: {state}");
        }
        Body::Listen { speech, value } => {
            println!("  (listen) {}", speech.text);
            if !value.is_empty() {
                println!("  answer: {value}");
            }
        }
        Body::Repeat { speech } => println!("  (say) {}", speech.text),
        Body::Explanation { sections } => {
            for section in sections {
                if let Some(heading) = &section.heading {
                    println!("  {heading}:");
                }
                for line in &section.lines {
                    println!("    {line}");
                }
            }
        }
        Body::Unsupported { reason, .. } => println!("  {reason}"),
    }

    if let Some(feedback) = &view.feedback {
        println!("  {feedback}");
    }
    if let Some(answer) = &view.correct_answer {
        println!("  Answer: {answer}");
    }

    let mut hints = Vec::new();
    if view.submit_enabled() == Some(true) {
        hints.push("submit");
    }
    if view.shows_try_again() {
        hints.push("retry");
    }
    if view.shows_continue() {
        hints.push("next");
    }
    if !hints.is_empty() {
        println!("  ({})", hints.join(" / "));
    }
}

async fn load_lesson(
    lesson_path: Option<PathBuf>,
    lesson_id: Option<String>,
    config_path: Option<&std::path::Path>,
) -> Result<Lesson> {
    match (lesson_path, lesson_id) {
        (Some(path), _) => parser::parse_lesson(&path),
        (None, Some(id)) => {
            let config = load_config_from(config_path)?;
            ContentClient::new(create_api_client(&config)?)
                .fetch_lesson(&id)
                .await
        }
        (None, None) => anyhow::bail!("pass a lesson file or --lesson-id"),
    }
}

pub async fn execute(
    lesson_path: Option<PathBuf>,
    lesson_id: Option<String>,
    reveal: bool,
    offline: bool,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(
        !(offline && lesson_id.is_some()),
        "--offline cannot be combined with --lesson-id"
    );

    let lesson = load_lesson(lesson_path, lesson_id, config_path.as_deref()).await?;
    for w in parser::validate_lesson(&lesson) {
        tracing::warn!("{w}");
    }

    let dispatcher = if offline {
        Dispatcher::offline()
    } else {
        let config = load_config_from(config_path.as_deref())?;
        Dispatcher::new(Arc::new(HttpValidator::new(create_api_client(&config)?)))
    };

    println!("{}", lesson.title);
    if !lesson.description.is_empty() {
        println!("{}", lesson.description);
    }

    let runner = LessonRunner::new(dispatcher).with_show_answer(reveal);
    let mut host = TerminalHost::new();
    let report = runner.run(&lesson, &mut host, &ConsoleObserver).await?;

    if !reveal {
        println!(
            "\nScore: {}/{} ({}%)",
            report.summary.correct, report.summary.total, report.summary.percentage
        );
        println!("{}", report.summary.tier.message());
    }

    if let Some(path) = output {
        report.save_json(&path)?;
        println!("Report saved to {}", path.display());
    }

    Ok(())
}
