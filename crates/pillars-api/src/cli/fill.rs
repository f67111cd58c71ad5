//! Interactive assessment session (`pillars fill <key>`).
//!
//! Mounts the form from the stored draft (or recovered answers), runs the
//! auto-save timer in the background and asks before leaving with unsaved
//! changes. Manual saves surface failures; auto-save failures only show up
//! as a still-dirty form.

use anyhow::{Result, bail};
use console::style;
use dialoguer::{Confirm, Input, Select};

use pillars_core::draft::form::FormState;
use pillars_core::draft::unsaved::{UnloadDecision, UnloadPrompt, UnsavedChangesGuard};
use pillars_core::service::assessment::SaveContext;
use pillars_infra::config::resolve_autosave_interval;
use pillars_types::assessment::{DraftStatus, DraftView};

use crate::cli::draft::{parse_answer, print_view};
use crate::state::AppState;

/// Confirmation shown when leaving with unsaved changes.
struct TerminalPrompt;

impl UnloadPrompt for TerminalPrompt {
    async fn confirm_leave(&self) -> bool {
        Confirm::new()
            .with_prompt("You have unsaved changes. Leave anyway?")
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// How the session starts, decided from the draft view.
enum Mount {
    Resume,
    Recovered,
    Fresh,
}

const ACTIONS: &[&str] = &[
    "Answer a question",
    "Remove an answer",
    "Change step",
    "Save now",
    "Finish and submit",
    "Leave",
];

/// Run the interactive session for one assessment.
pub async fn run_fill(
    state: &AppState,
    owner: &str,
    key: &str,
    assessment_type: &str,
) -> Result<()> {
    let service = &state.assessment_service;
    let view = service.open(owner, key).await;
    print_view(&view, state.config.idle_notice_hours);

    let Some(mount) = choose_mount(state, owner, key, &view).await? else {
        return Ok(());
    };

    let form = match (mount, &view.draft, &view.recovered) {
        (Mount::Resume, Some(draft), _) => FormState::from_draft(draft),
        (Mount::Recovered, _, Some(recovered)) => {
            let form = FormState::new();
            form.populate_recovered(recovered);
            form
        }
        _ => FormState::new(),
    };

    let context = state.save_context(owner, assessment_type, key);
    let interval = resolve_autosave_interval(&state.config);
    let mut scheduler = service.scheduler(context.clone(), interval);
    scheduler.start(form.clone());
    let guard = UnsavedChangesGuard::register(&form);

    println!(
        "  {}",
        style(format!("Auto-saving every {}s.", interval.as_secs())).dim()
    );

    loop {
        print_progress(&form);
        let Some(choice) = Select::new()
            .with_prompt("What next?")
            .items(ACTIONS)
            .default(0)
            .interact_opt()?
        else {
            // Esc counts as an attempt to leave.
            if guard.intercept(&TerminalPrompt).await == UnloadDecision::Leave {
                break;
            }
            continue;
        };

        match choice {
            0 => {
                let question: String = Input::new().with_prompt("Question").interact_text()?;
                let value: String = Input::new().with_prompt("Answer").interact_text()?;
                match parse_answer(&format!("{question}={value}")) {
                    Ok((question, value)) => form.set_answer(question, value),
                    Err(e) => println!("  {} {e}", style("!").yellow()),
                }
            }
            1 => {
                let answered: Vec<String> = form.answers().keys().cloned().collect();
                if answered.is_empty() {
                    println!("  Nothing answered yet.");
                    continue;
                }
                if let Some(idx) = Select::new()
                    .with_prompt("Remove which answer?")
                    .items(&answered)
                    .interact_opt()?
                {
                    form.remove_answer(&answered[idx]);
                }
            }
            2 => {
                let step: String = Input::new()
                    .with_prompt("Step")
                    .with_initial_text(form.current_step())
                    .interact_text()?;
                form.set_step(step.trim());
            }
            3 => match service.save_form(&context, &form).await {
                Ok(draft) => println!(
                    "  {} Saved (version {})",
                    style("ok").green(),
                    draft.version
                ),
                Err(e) => println!("  {} {e}", style("Could not save:").red()),
            },
            4 => {
                // No timer flush may land on a finalized draft.
                scheduler.stop();
                if submit(state, owner, key, &context, &form).await {
                    break;
                }
                scheduler.start(form.clone());
            }
            _ => {
                if guard.intercept(&TerminalPrompt).await == UnloadDecision::Leave {
                    break;
                }
            }
        }
    }

    scheduler.stop();
    Ok(())
}

/// Decide how to mount the form. `None` means the user backed out.
async fn choose_mount(
    state: &AppState,
    owner: &str,
    key: &str,
    view: &DraftView,
) -> Result<Option<Mount>> {
    match view.status {
        DraftStatus::Error => {
            bail!(
                "Could not load the draft for '{key}': {}",
                view.error.as_deref().unwrap_or("unknown error")
            );
        }
        DraftStatus::Completed => {
            let retake = Confirm::new()
                .with_prompt("This assessment is already completed. Start a retake?")
                .default(false)
                .interact()?;
            Ok(retake.then_some(Mount::Fresh))
        }
        DraftStatus::InProgress | DraftStatus::Expired => {
            let prompt = if view.status == DraftStatus::Expired {
                "This draft is older than the expiry threshold."
            } else {
                "A draft is in progress."
            };
            let choice = Select::new()
                .with_prompt(prompt)
                .items(&["Resume", "Start over"])
                .default(0)
                .interact_opt()?;
            match choice {
                Some(0) => Ok(Some(Mount::Resume)),
                Some(_) => {
                    state.assessment_service.clear(owner, key).await?;
                    println!("  {} Previous draft discarded", style("ok").green());
                    Ok(Some(Mount::Fresh))
                }
                None => Ok(None),
            }
        }
        DraftStatus::NotStarted => {
            if view.recovered.is_none() {
                return Ok(Some(Mount::Fresh));
            }
            let restore = Confirm::new()
                .with_prompt("Restore the recovered answers? (they are saved only when you save)")
                .default(true)
                .interact()?;
            Ok(Some(if restore { Mount::Recovered } else { Mount::Fresh }))
        }
    }
}

/// Save then finalize. Returns `true` when the assessment was submitted.
async fn submit(
    state: &AppState,
    owner: &str,
    key: &str,
    context: &SaveContext,
    form: &FormState,
) -> bool {
    let service = &state.assessment_service;
    if let Err(e) = service.save_form(context, form).await {
        println!("  {} {e}", style("Could not save:").red());
        return false;
    }
    match service.finalize(owner, key).await {
        Ok(draft) => {
            println!(
                "  {} Submitted '{}' with {} answers",
                style("ok").green(),
                style(key).cyan(),
                draft.answered_count()
            );
            true
        }
        Err(e) => {
            println!("  {} {e}", style("Could not submit:").red());
            false
        }
    }
}

fn print_progress(form: &FormState) {
    let unsaved = if form.has_unsaved_changes() {
        style("unsaved changes").yellow()
    } else {
        style("all changes saved").green()
    };
    let step = form.current_step();
    println!();
    println!(
        "  {} answered, step {}, {}",
        form.answers().values().filter(|v| !v.is_null()).count(),
        if step.is_empty() { "-" } else { step.as_str() },
        unsaved,
    );
}
