//! Command recognition and the bounded splice loop.

pub mod handlers;
pub mod parser;
pub mod registry;

pub use parser::{apply_audio_triggers, find_invocation, CommandInvocation};
pub use registry::{all_commands, find_command, OutcomeKind};

use tracing::{debug, warn};

use crate::core::kernel::Kernel;

/// Upper bound on substitutions per turn, against runaway expansion.
pub const MAX_SPLICES: usize = 16;

/// What a single handler invocation produced.
pub enum HandlerOutcome {
    /// Splice this text over the token and keep scanning.
    Replace(String),
    /// Turn ends here; nothing goes to the model.
    Done,
    /// Persist and leave the run loop.
    Quit,
}

/// Result of processing one line of user input.
#[derive(Debug, PartialEq)]
pub enum TurnAction {
    /// Send this (possibly spliced) prompt to the model.
    Send(String),
    /// The turn is complete without a model call.
    Done,
    Quit,
}

/// Scan the input for command tokens and dispatch them leftmost-first,
/// splicing handler output back in until no token remains or the bound is
/// hit.
pub async fn process_input(kernel: &mut Kernel, input: &str) -> TurnAction {
    let mut text = apply_audio_triggers(input);
    let names = registry::command_names();
    let mut splices = 0usize;

    loop {
        let Some(invocation) = find_invocation(&text, &names) else {
            break;
        };
        let (start, end) = invocation.span;
        let standalone =
            text[..start].trim().is_empty() && text[end..].trim().is_empty();
        debug!(name = %invocation.name, standalone, "dispatching command");

        match handlers::dispatch(kernel, &invocation, standalone).await {
            Ok(HandlerOutcome::Replace(replacement)) => {
                if splices >= MAX_SPLICES {
                    kernel.renderer.error(&format!(
                        "Stopped after {MAX_SPLICES} substitutions; dropping this turn."
                    ));
                    return TurnAction::Done;
                }
                splices += 1;
                text = parser::splice(&text, invocation.span, &replacement);
            }
            Ok(HandlerOutcome::Done) => return TurnAction::Done,
            Ok(HandlerOutcome::Quit) => return TurnAction::Quit,
            Err(e) => {
                warn!(command = %invocation.name, error = %e, "command failed");
                kernel
                    .renderer
                    .error(&format!("{}: {}", invocation.name, e));
                return TurnAction::Done;
            }
        }
    }

    if text.trim().is_empty() {
        TurnAction::Done
    } else {
        TurnAction::Send(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::test_kernel;

    #[tokio::test]
    async fn plain_text_passes_through_unchanged() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "what is the capital of France?").await;
        assert_eq!(
            action,
            TurnAction::Send("what is the capital of France?".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_command_shape_is_left_alone() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "ratio 4:3 is fine").await;
        assert_eq!(action, TurnAction::Send("ratio 4:3 is fine".to_string()));
    }

    #[tokio::test]
    async fn standalone_side_effect_ends_the_turn() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "help::").await;
        assert_eq!(action, TurnAction::Done);
    }

    #[tokio::test]
    async fn exit_quits() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "exit::").await;
        assert_eq!(action, TurnAction::Quit);
    }

    #[tokio::test]
    async fn memget_splices_into_surrounding_text() {
        let mut kernel = test_kernel();
        kernel
            .memory
            .create("snippet", serde_json::json!("stored text"));
        let action = process_input(&mut kernel, "explain memget:snippet: please").await;
        assert_eq!(
            action,
            TurnAction::Send("explain stored text please".to_string())
        );
    }

    #[tokio::test]
    async fn audio_trigger_rewrites_before_parsing() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "keyword get help").await;
        // "keyword get help" becomes help::, a side effect
        assert_eq!(action, TurnAction::Done);
    }

    #[tokio::test]
    async fn splice_bound_reports_and_drops_turn() {
        let mut kernel = test_kernel();
        // memget output that itself contains a memget token expands forever
        kernel
            .memory
            .create("loop", serde_json::json!("again memget:loop: again"));
        let action = process_input(&mut kernel, "memget:loop:").await;
        assert_eq!(action, TurnAction::Done);
    }
}
