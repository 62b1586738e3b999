//! The command table. Every entry declares its outcome kind up front;
//! dispatch lives in `commands::handlers`.

/// What a handler's return means for the rest of the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Returns replacement text spliced over the token; the prompt
    /// continues to the model.
    Substitution,
    /// Returns nothing; the turn ends without a model call.
    SideEffect,
    /// Writes memory records, then either surfaces them as transcript
    /// entries (standalone) or substitutes text (embedded).
    Hybrid,
}

pub struct Command {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: OutcomeKind,
}

pub const COMMANDS: &[Command] = &[
    Command { name: "help", help: "List every command with its description.", kind: OutcomeKind::SideEffect },
    Command { name: "exit", help: "Persist settings and quit.", kind: OutcomeKind::SideEffect },
    Command { name: "clear", help: "Clear the terminal screen.", kind: OutcomeKind::SideEffect },
    Command { name: "save", help: "Persist settings and the current conversation.", kind: OutcomeKind::SideEffect },
    Command { name: "settings", help: "Show settings, or set one with settings:key:value:.", kind: OutcomeKind::SideEffect },
    Command { name: "model", help: "List available models, or select one with model:id:.", kind: OutcomeKind::SideEffect },
    Command { name: "role", help: "List roles, or select one with role:name:.", kind: OutcomeKind::SideEffect },
    Command { name: "theme", help: "List themes, or select one with theme:name:.", kind: OutcomeKind::SideEffect },
    Command { name: "convo", help: "List conversation files, or switch with convo:name:.", kind: OutcomeKind::SideEffect },
    Command { name: "cd", help: "Change the working directory.", kind: OutcomeKind::SideEffect },
    Command { name: "flush", help: "Empty the conversation buffer.", kind: OutcomeKind::SideEffect },
    Command { name: "history", help: "Page through the transcript.", kind: OutcomeKind::SideEffect },
    Command { name: "keywords", help: "List the audio trigger phrases.", kind: OutcomeKind::SideEffect },
    Command { name: "file", help: "Pick a file in the browser and splice its contents.", kind: OutcomeKind::Hybrid },
    Command { name: "view", help: "Page through a file: view:path:.", kind: OutcomeKind::SideEffect },
    Command { name: "scroll", help: "Page through a memory key or file: scroll:target:.", kind: OutcomeKind::SideEffect },
    Command { name: "find", help: "Find files by name under the working directory.", kind: OutcomeKind::Hybrid },
    Command { name: "get", help: "Fetch a URL as text: get:url:.", kind: OutcomeKind::Hybrid },
    Command { name: "crawl", help: "Fetch a URL plus the pages it links to.", kind: OutcomeKind::Hybrid },
    Command { name: "image_extract", help: "OCR an image file or URL.", kind: OutcomeKind::Hybrid },
    Command { name: "analyze_image", help: "Describe an image with a vision model.", kind: OutcomeKind::Hybrid },
    Command { name: "qr", help: "Render text as a QR code image: qr:text:.", kind: OutcomeKind::SideEffect },
    Command { name: "weather", help: "Current conditions: weather:postal: or weather::.", kind: OutcomeKind::Hybrid },
    Command { name: "getip", help: "Public IP address.", kind: OutcomeKind::Hybrid },
    Command { name: "google", help: "Web search: google:query:.", kind: OutcomeKind::Hybrid },
    Command { name: "wiki", help: "Wikipedia summary: wiki:topic:.", kind: OutcomeKind::Hybrid },
    Command { name: "news", help: "Headlines: news:topic: or news::.", kind: OutcomeKind::Hybrid },
    Command { name: "headlines", help: "Alias of news.", kind: OutcomeKind::Hybrid },
    Command { name: "define", help: "Dictionary definition: define:word:.", kind: OutcomeKind::Hybrid },
    Command { name: "mail", help: "Recent inbox subjects over IMAP.", kind: OutcomeKind::Hybrid },
    Command { name: "yt_transcript", help: "Transcript of a YouTube video.", kind: OutcomeKind::Hybrid },
    Command { name: "fake_news", help: "Score text for fake-news likelihood.", kind: OutcomeKind::Hybrid },
    Command { name: "deception", help: "Score text for deceptive language.", kind: OutcomeKind::Hybrid },
    Command { name: "vscan", help: "Check a URL against VirusTotal.", kind: OutcomeKind::Hybrid },
    Command { name: "extract", help: "Extract readable text from a file or URL.", kind: OutcomeKind::Hybrid },
    Command { name: "code", help: "Collect code blocks from the last reply.", kind: OutcomeKind::Hybrid },
    Command { name: "note", help: "Append a note: note:text:.", kind: OutcomeKind::SideEffect },
    Command { name: "inspect", help: "Page through memory as JSON.", kind: OutcomeKind::SideEffect },
    Command { name: "search", help: "Search memory: search:needle: or search:/pattern/:.", kind: OutcomeKind::SideEffect },
    Command { name: "memget", help: "Splice a memory value into the prompt: memget:key:.", kind: OutcomeKind::Substitution },
    Command { name: "memory", help: "List memory keys; memory:clear: or memory:export:path:.", kind: OutcomeKind::SideEffect },
    Command { name: "clipboard", help: "Copy the last reply or a memory key to the clipboard.", kind: OutcomeKind::SideEffect },
    Command { name: "reload", help: "Reload settings from disk.", kind: OutcomeKind::SideEffect },
    Command { name: "$", help: "Run a shell command: $:command:.", kind: OutcomeKind::Hybrid },
    Command { name: "shell", help: "Toggle shell mode.", kind: OutcomeKind::SideEffect },
    Command { name: "image", help: "Generate an image: image:prompt:.", kind: OutcomeKind::SideEffect },
    Command { name: "w3m", help: "Fetch a URL and page through it: w3m:url:.", kind: OutcomeKind::SideEffect },
    Command { name: "browser", help: "Alias of w3m.", kind: OutcomeKind::SideEffect },
];

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

/// Case-sensitive lookup, matching the parser's grammar.
pub fn find_command(name: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|command| command.name == name)
}

pub fn command_names() -> Vec<&'static str> {
    COMMANDS.iter().map(|c| c.name).collect()
}

/// Completion words for the prompt session, with the token suffix.
pub fn completion_words() -> Vec<String> {
    COMMANDS.iter().map(|c| format!("{}::", c.name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_the_required_commands() {
        for required in [
            "help", "exit", "clear", "save", "settings", "model", "role", "theme", "convo",
            "cd", "flush", "history", "keywords", "file", "view", "scroll", "find", "get",
            "crawl", "image_extract", "analyze_image", "qr", "weather", "getip", "google",
            "wiki", "news", "headlines", "define", "mail", "yt_transcript", "fake_news",
            "deception", "vscan", "extract", "code", "note", "inspect", "search", "memget",
            "memory", "clipboard", "reload", "$", "shell", "image", "w3m", "browser",
        ] {
            assert!(find_command(required).is_some(), "missing command {required}");
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(find_command("help").is_some());
        assert!(find_command("Help").is_none());
    }

    #[test]
    fn names_are_unique() {
        let mut names = command_names();
        names.sort();
        let before = names.len();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn completion_words_carry_token_suffix() {
        assert!(completion_words().iter().all(|w| w.ends_with("::")));
    }
}
