//! Draft maintenance subcommands (`pillars draft ...`).
//!
//! Every command works on the drafts of the `--owner` given globally. With
//! `--json` the raw records are printed instead of styled text.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use serde_json::Value;

use pillars_core::draft::form::FormState;
use pillars_types::assessment::{DraftStatus, DraftView};

use crate::state::AppState;

/// Draft subcommands.
#[derive(Subcommand)]
pub enum DraftCommand {
    /// Show the state of an assessment (draft, completion, recovery).
    Show {
        /// Assessment key.
        key: String,
    },

    /// List active drafts.
    #[command(alias = "ls")]
    List,

    /// Save answers into the draft (merged over the saved ones).
    Save {
        /// Assessment key.
        key: String,

        /// Assessment type recorded on a new draft (defaults to the key).
        #[arg(long = "type")]
        assessment_type: Option<String>,

        /// Progress marker to record.
        #[arg(long)]
        step: Option<String>,

        /// Answer as `question=value`. Values are parsed as JSON, else kept as text.
        #[arg(short, long = "answer", value_name = "QUESTION=VALUE")]
        answers: Vec<String>,
    },

    /// Finalize the active draft.
    Finalize {
        /// Assessment key.
        key: String,
    },

    /// Discard the active draft and start over.
    Clear {
        /// Assessment key.
        key: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Look for answers lost outside the draft table.
    Recover {
        /// Assessment key.
        key: String,

        /// Save the recovered answers as a new draft.
        #[arg(long)]
        apply: bool,

        /// Assessment type recorded when applying (defaults to the key).
        #[arg(long = "type")]
        assessment_type: Option<String>,
    },
}

/// Handle a draft subcommand.
pub async fn handle_draft_command(
    cmd: DraftCommand,
    state: &AppState,
    owner: &str,
    json: bool,
) -> Result<()> {
    match cmd {
        DraftCommand::Show { key } => show_draft(state, owner, &key, json).await,
        DraftCommand::List => list_drafts(state, owner, json).await,
        DraftCommand::Save {
            key,
            assessment_type,
            step,
            answers,
        } => {
            let assessment_type = assessment_type.unwrap_or_else(|| key.clone());
            save_draft(state, owner, &key, &assessment_type, step, &answers, json).await
        }
        DraftCommand::Finalize { key } => finalize_draft(state, owner, &key, json).await,
        DraftCommand::Clear { key, force } => clear_draft(state, owner, &key, force, json).await,
        DraftCommand::Recover {
            key,
            apply,
            assessment_type,
        } => {
            let assessment_type = assessment_type.unwrap_or_else(|| key.clone());
            recover_draft(state, owner, &key, &assessment_type, apply, json).await
        }
    }
}

/// Parse `question=value`. The value is JSON when it parses, a string otherwise.
pub fn parse_answer(raw: &str) -> Result<(String, Value)> {
    let (question, value) = raw
        .split_once('=')
        .with_context(|| format!("Answer '{raw}' must look like question=value"))?;
    let question = question.trim();
    if question.is_empty() {
        bail!("Answer '{raw}' has an empty question key");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((question.to_string(), value))
}

pub fn status_label(status: DraftStatus) -> console::StyledObject<&'static str> {
    match status {
        DraftStatus::NotStarted => style("not started").dim(),
        DraftStatus::InProgress => style("in progress").green(),
        DraftStatus::Expired => style("expired").yellow(),
        DraftStatus::Completed => style("completed").cyan(),
        DraftStatus::Error => style("error").red(),
    }
}

/// Print the styled summary of a draft view.
pub fn print_view(view: &DraftView, idle_notice_hours: i64) {
    println!();
    println!(
        "  {} {}  {}",
        style("Assessment").bold(),
        style(&view.assessment_key).cyan(),
        status_label(view.status),
    );

    if let Some(error) = &view.error {
        println!("  {} {}", style("Could not load draft:").red(), error);
    }

    if let Some(draft) = &view.draft {
        println!("  {:<14} {}", style("Type").dim(), draft.assessment_type);
        println!("  {:<14} {}", style("Step").dim(), draft.current_step);
        println!("  {:<14} {}", style("Answered").dim(), draft.answered_count());
        println!(
            "  {:<14} {} ({} automatic)",
            style("Saves").dim(),
            draft.version,
            draft.auto_save_count
        );
        if let Some(saved) = draft.last_saved_at {
            println!(
                "  {:<14} {}",
                style("Last saved").dim(),
                saved.format("%Y-%m-%d %H:%M UTC")
            );
        }
        if let Some(hours) = view.idle_hours.filter(|h| *h >= idle_notice_hours) {
            println!(
                "  {}",
                style(format!("Last active {hours} hours ago")).yellow()
            );
        }
    }

    if let Some(completed) = &view.completed {
        if let Some(at) = completed.completed_at {
            println!(
                "  {:<14} {}",
                style("Completed").dim(),
                at.format("%Y-%m-%d %H:%M UTC")
            );
        }
    }

    if let Some(recovered) = &view.recovered {
        println!(
            "  {} {} answers can be recovered (run `pillars draft recover {} --apply`)",
            style("!").yellow().bold(),
            recovered.form_data.len(),
            view.assessment_key,
        );
    }
    println!();
}

async fn show_draft(state: &AppState, owner: &str, key: &str, json: bool) -> Result<()> {
    let view = state.assessment_service.open(owner, key).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&view, state.config.idle_notice_hours);
    }
    Ok(())
}

async fn list_drafts(state: &AppState, owner: &str, json: bool) -> Result<()> {
    let drafts = state.assessment_service.list(owner).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&drafts)?);
        return Ok(());
    }

    if drafts.is_empty() {
        println!();
        println!("  No drafts in progress for '{}'.", style(owner).cyan());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Key").fg(Color::Cyan),
            Cell::new("Type").fg(Color::Cyan),
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Answered").fg(Color::Cyan),
            Cell::new("Version").fg(Color::Cyan),
            Cell::new("Last saved").fg(Color::Cyan),
        ]);

    for draft in &drafts {
        let last_saved = draft
            .last_saved_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&draft.assessment_key),
            Cell::new(&draft.assessment_type),
            Cell::new(&draft.current_step),
            Cell::new(draft.answered),
            Cell::new(draft.version),
            Cell::new(last_saved),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn save_draft(
    state: &AppState,
    owner: &str,
    key: &str,
    assessment_type: &str,
    step: Option<String>,
    raw_answers: &[String],
    json: bool,
) -> Result<()> {
    let service = &state.assessment_service;

    let form = match service.store().load(owner, key).await? {
        Some(existing) => FormState::from_draft(&existing),
        None => FormState::new(),
    };
    for raw in raw_answers {
        let (question, value) = parse_answer(raw)?;
        form.set_answer(question, value);
    }
    if let Some(step) = step {
        form.set_step(step);
    }

    let context = state.save_context(owner, assessment_type, key);
    let draft = service
        .save_form(&context, &form)
        .await
        .context("Could not save draft")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
    } else {
        println!();
        println!(
            "  {} Saved '{}' (version {}, {} answered)",
            style("ok").green(),
            style(key).cyan(),
            draft.version,
            draft.answered_count(),
        );
        println!();
    }
    Ok(())
}

async fn finalize_draft(state: &AppState, owner: &str, key: &str, json: bool) -> Result<()> {
    let draft = state
        .assessment_service
        .finalize(owner, key)
        .await
        .with_context(|| format!("Could not finalize '{key}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
    } else {
        println!();
        println!(
            "  {} Finalized '{}' with {} answers",
            style("ok").green(),
            style(key).cyan(),
            draft.answered_count(),
        );
        println!();
    }
    Ok(())
}

async fn clear_draft(state: &AppState, owner: &str, key: &str, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!("Discard the draft for '{key}' and start over?"))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let deleted = state.assessment_service.clear(owner, key).await?;

    if json {
        println!("{}", serde_json::json!({ "key": key, "deleted": deleted }));
    } else if deleted {
        println!();
        println!("  {} Draft for '{}' discarded", style("ok").green(), style(key).cyan());
        println!();
    } else {
        println!();
        println!("  No draft for '{}'.", style(key).cyan());
        println!();
    }
    Ok(())
}

async fn recover_draft(
    state: &AppState,
    owner: &str,
    key: &str,
    assessment_type: &str,
    apply: bool,
    json: bool,
) -> Result<()> {
    let service = &state.assessment_service;
    let view = service.open(owner, key).await;

    if view.status == DraftStatus::Error {
        bail!(
            "Could not load draft for '{key}': {}",
            view.error.unwrap_or_default()
        );
    }

    let Some(recovered) = view.recovered else {
        if json {
            println!("{}", serde_json::json!({ "key": key, "recovered": false }));
        } else {
            println!();
            println!("  Nothing to recover for '{}'.", style(key).cyan());
            println!();
        }
        return Ok(());
    };

    if !apply {
        if json {
            println!("{}", serde_json::to_string_pretty(&recovered)?);
        } else {
            println!();
            println!(
                "  {} {} answers found for '{}':",
                style("!").yellow().bold(),
                recovered.form_data.len(),
                style(key).cyan(),
            );
            for (question, answer) in &recovered.form_data {
                println!("    {} = {}", style(question).dim(), answer);
            }
            println!();
            println!("  Run with {} to save them as a draft.", style("--apply").bold());
            println!();
        }
        return Ok(());
    }

    let form = FormState::new();
    form.populate_recovered(&recovered);

    let context = state.save_context(owner, assessment_type, key);
    let draft = service
        .save_form(&context, &form)
        .await
        .context("Could not save recovered answers")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
    } else {
        println!();
        println!(
            "  {} Recovered {} answers into a new draft for '{}'",
            style("ok").green(),
            draft.answered_count(),
            style(key).cyan(),
        );
        println!();
    }
    Ok(())
}
