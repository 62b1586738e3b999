use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use symbiote::backend::BackendRegistry;
use symbiote::core::kernel::{run_interactive, Kernel};
use symbiote::core::settings::{default_data_dir, Settings};
use symbiote::server;
use symbiote::session::toolbar::{ToolbarHandle, ToolbarStatus};
use symbiote::session::PromptSession;
use symbiote::ui::renderer::Renderer;

#[derive(Parser)]
#[command(name = "symbiote")]
#[command(about = "An interactive terminal assistant with inline analytic commands")]
#[command(long_about = "Symbiote multiplexes a language-model chat session with a catalog of \
inline commands you can splice into prompts, like `get:https://example/:` or `weather:33004:`.\n\n\
Commands use the form `name::` or `name:argument:`; type `help::` at the prompt for the full \
catalog. Model ids take the form `backend:model`, e.g. `openai:gpt-4o`, `ollama:llama3:latest`, \
or `groq:llama-3.1-70b-versatile`.\n\n\
Environment variables:\n\
  OPENAI_API_KEY        OpenAI-backed chat, image analysis, generation\n\
  GROQ_API_KEY          Groq-backed chat\n\
  OLLAMA_HOST           Ollama server (default http://localhost:11434)\n\
  HUGGINGFACE_API_KEY   OCR and text-scoring commands\n\
  GOOGLE_API_KEY        Web search (with GOOGLE_CSE_ID)")]
struct Args {
    /// Pre-populate the first prompt with this query
    query: Option<String>,

    /// Verbose logging to stderr
    #[arg(short, long)]
    debug: bool,

    /// Run the query, print the reply, and exit
    #[arg(short, long)]
    run: bool,

    /// Run the query, then drop to the interactive prompt
    #[arg(short, long)]
    enable: bool,

    /// Conversation file name to append to
    #[arg(short, long)]
    conversation: Option<String>,

    /// Start the keyword listener (listen mode)
    #[arg(short, long)]
    monitor: bool,

    /// Pre-seed the prompt with the contents of a file
    #[arg(short = 'f', long = "load")]
    load: Option<PathBuf>,

    /// Check external prerequisites and exit
    #[arg(long)]
    install: bool,

    /// Serve the HTTP /chat endpoint instead of the REPL
    #[arg(long)]
    api: bool,

    /// Address for --api
    #[arg(long, default_value = "127.0.0.1:8181")]
    bind: String,

    /// Suppress the startup splash
    #[arg(long)]
    prompt_only: bool,

    /// Settings file path
    #[arg(long)]
    config: Option<PathBuf>,
}

const SPLASH: &str = r#"
  ___ _  _ _ __ ___ | |__ (_) ___ | |_ ___
 / __| || | '_ ` _ \| '_ \| |/ _ \| __/ _ \
 \__ \ || | | | | | | |_) | | (_) | ||  __/
 |___/\_, |_| |_| |_|_.__/|_|\___/ \__\___|
      |__/
"#;

fn install_check(renderer: &Renderer) {
    let mut rows: Vec<(String, String)> = Vec::new();
    for (tool, why) in [
        ("sh", "shell mode and $:command:"),
        ("wl-copy", "clipboard (Wayland)"),
        ("xclip", "clipboard (X11)"),
    ] {
        let found = std::process::Command::new("sh")
            .arg("-c")
            .arg(format!("command -v {tool}"))
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        let status = if found { "ok" } else { "missing" };
        rows.push((tool.to_string(), format!("{status} ({why})")));
    }
    for key in [
        "OPENAI_API_KEY",
        "GROQ_API_KEY",
        "HUGGINGFACE_API_KEY",
        "GOOGLE_API_KEY",
    ] {
        let status = if std::env::var(key).is_ok() { "set" } else { "unset" };
        rows.push((key.to_string(), status.to_string()));
    }
    renderer.table("Prerequisites", &rows);
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| default_data_dir().join("config.json"));
    let mut settings = match Settings::load(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("failed to load settings from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };
    if args.debug {
        settings.debug = true;
    }
    if let Some(conversation) = &args.conversation {
        settings.conversation = conversation.clone();
    }
    if args.monitor {
        settings.listen = true;
    }

    let default_filter = if settings.debug {
        "symbiote=debug"
    } else {
        "symbiote=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let renderer = Renderer::new(&settings.theme, settings.markdown);
    if args.install {
        install_check(&renderer);
        return;
    }

    let backends = BackendRegistry::with_defaults(reqwest::Client::new());
    let mut kernel = Kernel::new(settings, backends, renderer);

    // Assemble the initial query from the positional argument and --load
    let mut query = args.query.clone().unwrap_or_default();
    if let Some(path) = &args.load {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                if !query.is_empty() {
                    query.push('\n');
                }
                query.push_str(&contents);
            }
            Err(e) => {
                eprintln!("failed to read {}: {e}", path.display());
                std::process::exit(1);
            }
        }
    }

    if args.api {
        if let Err(e) = server::serve(kernel, &args.bind).await {
            eprintln!("api server failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    if args.run {
        let reply = kernel.run_api_turn(&query).await;
        println!("{reply}");
        return;
    }

    if !args.prompt_only {
        kernel.renderer.line(SPLASH);
        kernel
            .renderer
            .info("Type help:: for commands, exit:: to quit.");
    }

    let toolbar = ToolbarHandle::spawn(
        ToolbarStatus {
            model: kernel.settings.model.clone(),
            role: kernel.settings.role.clone(),
            ..Default::default()
        },
        kernel.renderer.theme.clone(),
    );
    kernel.toolbar = Some(toolbar.clone());

    let history_path = kernel.settings.symbiote_path.join("history");
    let mut session = match PromptSession::new(history_path, kernel.settings.vi_mode) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("failed to start the prompt session: {e}");
            std::process::exit(1);
        }
    };

    if !query.trim().is_empty() && (args.enable || !args.run) {
        kernel.run_turn(&query).await;
    }

    let code = run_interactive(&mut kernel, &mut session).await;
    toolbar.stop();
    std::process::exit(code);
}
