//! Subcommand handlers. Each returns the text to print.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::Path;
use study_core::WordDraft;

use crate::app::App;
use crate::render::{self, render, OutputFormat};
use crate::{Command, WordFields};

pub fn run(app: &App, format: OutputFormat, command: Command, now: DateTime<Utc>) -> Result<String> {
    let svc = &app.service;
    let user = app.user.as_str();

    match command {
        Command::Add { term, definition, extra } => {
            let word = svc.add_word(user, draft(term, definition, extra), now)?;
            render(format, &word, render::word_detail)
        }
        Command::Import { file } => {
            let drafts = read_drafts(&file)?;
            let summary = svc.import_words(user, drafts, now)?;
            render(format, &summary, render::import)
        }
        Command::Edit { id, term, definition, extra } => {
            let word = svc.edit_word(user, id, draft(term, definition, extra), now)?;
            render(format, &word, render::word_detail)
        }
        Command::Delete { id } => {
            svc.delete_word(user, id)?;
            render(format, &serde_json::json!({ "deleted": id }), |_| {
                format!("Deleted {id}")
            })
        }
        Command::List { query } => {
            let words = svc.list_words(user, query.as_deref())?;
            render(format, &words, render::words)
        }
        Command::Show { id } => {
            let word = svc.get_word(user, id)?;
            render(format, &word, render::word_detail)
        }
        Command::Due => {
            let words = svc.due_words(user, now)?;
            render(format, &words, render::words)
        }
        Command::Incorrect => {
            let words = svc.incorrect_words(user)?;
            render(format, &words, render::words)
        }
        Command::Review { id, correct, wrong } => {
            let correct = correct && !wrong;
            let word = svc.apply_outcome(user, id, correct, now)?;
            render(format, &word, render::word_detail)
        }
        Command::Plan { target, ratio, imported_after } => {
            let mut request = app.plan_request(target, ratio);
            if let Some(cutoff) = imported_after {
                request = request.imported_after(parse_time(&cutoff)?);
            }
            let plan = svc.today_plan(user, &request, now)?;
            render(format, &plan, render::plan)
        }
        Command::Overview => {
            let overview = svc.overview(user, now)?;
            render(format, &overview, render::overview)
        }
        Command::Stats => {
            let stats = svc.stats(user, now)?;
            render(format, &stats, render::stats)
        }
        Command::RecordStudy => {
            let stats = svc.record_study(user, now)?;
            render(format, &stats, render::stats)
        }
        Command::Behavior => {
            let behavior = svc.behavior(user, now)?;
            render(format, &behavior, render::behavior)
        }
        Command::Session { started_at, seconds } => {
            let ack = svc.record_session(user, parse_time(&started_at)?, seconds);
            render(format, &ack, render::session)
        }
    }
}

fn draft(term: String, definition: String, extra: WordFields) -> WordDraft {
    WordDraft {
        term,
        definition,
        meanings: extra.meanings,
        examples: extra.examples,
        word_root: extra.root,
        similar_words: extra.similar,
        exam_tag: extra.exam,
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid RFC 3339 time '{s}'"))
}

/// A JSON array of drafts from a file, or stdin for "-".
fn read_drafts(path: &Path) -> Result<Vec<WordDraft>> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&content).context("Expected a JSON array of words")
}
