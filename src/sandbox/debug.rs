use super::DebugAction;
use crate::ai::{CodeGenerator, DebugRequest};
use crate::interaction::UserInteraction;
use anyhow::Result;
use tracing::warn;

/// Options offered after a failed run, in menu order
pub const DEBUG_MENU: [&str; 6] = [
    "Let Claude fix the code",
    "Tell Claude what to change",
    "Auto-debug until it passes",
    "Fix the code myself",
    "I fixed it in the IDE, run again",
    "Abort",
];

/// Ask the user how to handle a failed run.
///
/// Choices that need no further input map straight to their action; the
/// one-shot fix request is resolved here so the caller only ever sees a
/// concrete outcome for it.
pub(crate) async fn prompt_action(
    ui: &dyn UserInteraction,
    generator: &dyn CodeGenerator,
    request: DebugRequest,
) -> Result<DebugAction> {
    let choices: Vec<String> = DEBUG_MENU.iter().map(|c| c.to_string()).collect();
    let action = match ui.prompt_choice("How do you want to proceed?", &choices).await? {
        0 => request_fix(ui, generator, request).await,
        1 => {
            let feedback = ui
                .prompt_text("What should Claude change?", None)
                .await?;
            DebugAction::ManualFeedback(feedback.trim().to_string())
        }
        2 => DebugAction::AutoDebug,
        3 => DebugAction::ManualFix,
        4 => DebugAction::FixedInIde,
        _ => DebugAction::Abort,
    };
    Ok(action)
}

/// Ask the generator for a fix
pub(crate) async fn request_fix(
    ui: &dyn UserInteraction,
    generator: &dyn CodeGenerator,
    request: DebugRequest,
) -> DebugAction {
    let mut spinner = ui.start_spinner("Asking Claude for a fix...");
    match generator.debug(&request).await {
        Ok(code) => {
            spinner.success("Claude proposed a fix");
            DebugAction::ClaudeFixed(code)
        }
        Err(e) => {
            spinner.fail("Claude could not produce a fix");
            warn!("Debug request failed: {}", e);
            ui.display_error(&e.user_message());
            DebugAction::AutoDebugFailed
        }
    }
}
