//! 端末表示
//!
//! The core hands back plain [`ProjectOutcome`] values; every colour and
//! layout decision is made here.

use colored::Colorize;
use console::{pad_str, Alignment};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use crate::application::operation::{OutcomeData, OutcomeKind, ProjectOutcome, ProjectStatus};
use crate::application::services::parallel_runner::{ProgressEvent, ProgressReporter};
use crate::common::error::DroverError;
use crate::common::result::DroverResult;

/// Output format for machine-readable commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

pub fn header(message: &str) {
    println!("{} {}", "::".blue().bold(), message);
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// One-line diagnostic for a failed invocation.
pub fn error(err: &DroverError) {
    eprintln!("{} {}", "Error:".red().bold(), err);
}

fn kind_label(kind: OutcomeKind) -> colored::ColoredString {
    match kind {
        OutcomeKind::Cloned => "cloned".green(),
        OutcomeKind::Updated => "updated".cyan(),
        OutcomeKind::Skipped => "skipped".yellow(),
        OutcomeKind::Done => "done".green(),
    }
}

/// プロジェクトごとの結果を表示
pub fn print_outcome(outcome: &ProjectOutcome) {
    println!("{} {} {}", "=>".blue(), outcome.project.bold(), kind_label(outcome.kind));
    for message in &outcome.messages {
        println!("   {}", message.dimmed());
    }

    match &outcome.data {
        Some(OutcomeData::Branches { current, branches }) => print_branches(current.as_deref(), branches),
        Some(OutcomeData::Output { stdout, stderr, .. }) => {
            if !stdout.is_empty() {
                print!("{}", stdout);
                if !stdout.ends_with('\n') {
                    println!();
                }
            }
            if !stderr.is_empty() {
                eprint!("{}", stderr);
                if !stderr.ends_with('\n') {
                    eprintln!();
                }
            }
        }
        Some(OutcomeData::Status(status)) => println!("   {}", status_line(status, 0)),
        None => {}
    }
}

pub fn print_outcomes(outcomes: &[ProjectOutcome]) {
    for outcome in outcomes {
        print_outcome(outcome);
    }
}

fn print_branches(current: Option<&str>, branches: &[String]) {
    for branch in branches {
        if Some(branch.as_str()) == current {
            println!("   {} {}", "*".green().bold(), branch.green());
        } else {
            println!("     {}", branch);
        }
    }
}

/// `cloned 2, updated 3, skipped 1`
pub fn summary(outcomes: &[ProjectOutcome]) -> String {
    let count = |kind: OutcomeKind| outcomes.iter().filter(|o| o.kind == kind).count();
    let parts: Vec<String> = [
        (OutcomeKind::Cloned, "cloned"),
        (OutcomeKind::Updated, "updated"),
        (OutcomeKind::Done, "done"),
        (OutcomeKind::Skipped, "skipped"),
    ]
    .into_iter()
    .filter_map(|(kind, label)| match count(kind) {
        0 => None,
        n => Some(format!("{} {}", label, n)),
    })
    .collect();

    if parts.is_empty() {
        "nothing to do".to_string()
    } else {
        parts.join(", ")
    }
}

fn status_line(status: &ProjectStatus, width: usize) -> String {
    let name = pad_str(&status.name, width, Alignment::Left, None);
    if status.missing {
        return format!("{} {} {}", "?".red(), name, "missing".red());
    }

    let reference = match (&status.current_ref, status.detached) {
        (Some(r), true) => format!("({})", r).magenta().to_string(),
        (Some(r), false) => r.cyan().to_string(),
        (None, _) => "unknown".red().to_string(),
    };

    let mut line = format!(
        "{} {} {}",
        if status.dirty { "M".yellow() } else { "✓".green() },
        name,
        reference
    );
    if let Some(tracking) = &status.tracking {
        line.push_str(&format!(" {} {}", "→".dimmed(), tracking.dimmed()));
        if status.upstream_gone {
            line.push_str(&format!(" {}", "gone".red()));
        }
    }
    if status.ahead > 0 {
        line.push_str(&format!(" {}", format!("↑{}", status.ahead).green()));
    }
    if status.behind > 0 {
        line.push_str(&format!(" {}", format!("↓{}", status.behind).red()));
    }
    if status.dirty {
        line.push_str(&format!(" {}", "dirty".yellow()));
    }
    line
}

/// ステータス一覧を指定フォーマットで描画
pub fn render_statuses(statuses: &[&ProjectStatus], format: OutputFormat) -> DroverResult<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(statuses)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(statuses)?),
        OutputFormat::Text => {
            let width = statuses
                .iter()
                .map(|s| console::measure_text_width(&s.name))
                .max()
                .unwrap_or(0);
            Ok(statuses
                .iter()
                .map(|s| status_line(s, width))
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }
}

/// indicatifの進捗バー
///
/// Hidden unless stderr is a terminal.
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    pub fn new(total: usize, verb: &str) -> Self {
        let bar = if atty::is(atty::Stream::Stderr) {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::with_template("{spinner:.blue} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_prefix(verb.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub fn reporter(&self) -> ProgressReporter {
        let bar = self.bar.clone();
        Arc::new(move |event| match event {
            ProgressEvent::Started { project } => bar.set_message(project),
            ProgressEvent::Finished { project, completed, success, .. } => {
                bar.set_position(completed as u64);
                if !success {
                    bar.println(format!("{} {}", "✗".red().bold(), project));
                }
            }
        })
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
