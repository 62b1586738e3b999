//! Handler dispatch. Each arm routes a recognized token to its handler;
//! the shared helpers at the bottom implement the hybrid outcome rules.

mod core;
mod io;
mod web;

use crate::commands::{CommandInvocation, HandlerOutcome};
use crate::core::conversation::Role;
use crate::core::kernel::Kernel;
use crate::BoxError;

pub async fn dispatch(
    kernel: &mut Kernel,
    invocation: &CommandInvocation,
    standalone: bool,
) -> Result<HandlerOutcome, BoxError> {
    let arg = invocation.arg.as_deref();
    match invocation.name.as_str() {
        "help" => core::help(kernel),
        "exit" => core::exit(kernel),
        "clear" => core::clear(kernel),
        "save" => core::save(kernel),
        "settings" => core::settings(kernel, arg),
        "model" => core::model(kernel, arg).await,
        "role" => core::role(kernel, arg),
        "theme" => core::theme(kernel, arg),
        "convo" => core::convo(kernel, arg),
        "cd" => core::cd(kernel, arg),
        "flush" => core::flush(kernel),
        "history" => core::history(kernel),
        "keywords" => core::keywords(kernel),
        "inspect" => core::inspect(kernel, arg),
        "search" => core::search(kernel, arg),
        "memget" => core::memget(kernel, arg),
        "memory" => core::memory(kernel, arg),
        "reload" => core::reload(kernel),
        "shell" => core::shell(kernel),
        "file" => io::file(kernel, standalone),
        "view" => io::view(kernel, arg),
        "scroll" => io::scroll(kernel, arg),
        "find" => io::find(kernel, arg, standalone),
        "note" => io::note(kernel, arg),
        "code" => io::code(kernel, standalone),
        "clipboard" => io::clipboard(kernel, arg),
        "extract" => io::extract(kernel, arg, standalone).await,
        "$" => io::shell_exec(kernel, arg, standalone).await,
        "qr" => io::qr(kernel, arg).await,
        "get" => web::get(kernel, arg, standalone).await,
        "crawl" => web::crawl(kernel, arg, standalone).await,
        "w3m" | "browser" => web::w3m(kernel, arg).await,
        "weather" => web::weather(kernel, arg, standalone).await,
        "getip" => web::getip(kernel, standalone).await,
        "google" => web::google(kernel, arg, standalone).await,
        "wiki" => web::wiki(kernel, arg, standalone).await,
        "news" | "headlines" => web::news(kernel, arg, standalone).await,
        "define" => web::define(kernel, arg, standalone).await,
        "mail" => web::mail(kernel, standalone).await,
        "yt_transcript" => web::yt_transcript(kernel, arg, standalone).await,
        "fake_news" => web::fake_news(kernel, arg, standalone).await,
        "deception" => web::deception(kernel, arg, standalone).await,
        "vscan" => web::vscan(kernel, arg, standalone).await,
        "image_extract" => web::image_extract(kernel, arg, standalone).await,
        "analyze_image" => web::analyze_image(kernel, arg, standalone).await,
        "image" => web::image(kernel, arg).await,
        other => {
            kernel.renderer.error(&format!("unknown command '{other}'"));
            Ok(HandlerOutcome::Done)
        }
    }
}

/// Close out a hybrid handler. Standalone invocations surface the result
/// directly (panel plus transcript entry) and end the turn; embedded ones
/// splice the substitution text into the prompt.
pub(crate) fn finish_hybrid(
    kernel: &mut Kernel,
    standalone: bool,
    panel_title: &str,
    display: &str,
    substitution: String,
) -> Result<HandlerOutcome, BoxError> {
    if standalone {
        kernel.renderer.panel(panel_title, display);
        kernel.conversation.push(Role::User, substitution);
        Ok(HandlerOutcome::Done)
    } else {
        Ok(HandlerOutcome::Replace(substitution))
    }
}

/// Report a user error (kind 1): shown, turn ends, no transcript change.
pub(crate) fn user_error(kernel: &mut Kernel, message: &str) -> Result<HandlerOutcome, BoxError> {
    kernel.renderer.error(message);
    Ok(HandlerOutcome::Done)
}

/// Missing-argument shorthand for unary-only commands.
pub(crate) fn require_arg<'a>(arg: Option<&'a str>, usage: &str) -> Result<&'a str, BoxError> {
    arg.ok_or_else(|| format!("usage: {usage}").into())
}

/// Consult an environment key lazily so a missing key only disables the
/// command that needs it.
pub(crate) fn require_env(name: &str) -> Result<String, BoxError> {
    std::env::var(name).map_err(|_| format!("{name} is not set; this command is disabled").into())
}
