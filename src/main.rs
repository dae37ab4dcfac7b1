use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thaydung::config::{ClassroomConfig, ConfigError};
use thaydung::console::{Console, ConsoleError, Theme, grade_menu, parse_grade_answer};
use thaydung::llm::types::LlmError;
use thaydung::llm::{LlmChat, LlmClient};
use thaydung::services::auth::{LoginError, login_student, login_teacher};
use thaydung::services::preferences::{FilePreferences, PreferenceError, Preferences};
use thaydung::services::tutor::ChatSession;
use thaydung::state::{GradeLevel, InvalidGrade, UserProfile};
use tracing::info;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("LLM client: {0}")]
    Llm(#[from] LlmError),
    #[error("preferences: {0}")]
    Preferences(#[from] PreferenceError),
    #[error("{0}")]
    Login(#[from] LoginError),
    #[error("{0}")]
    Console(#[from] ConsoleError),
    #[error("{0}")]
    Grade(#[from] InvalidGrade),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "thaydung", about = "Lớp học của Thầy Dũng: trợ lý học tập trên terminal")]
struct Cli {
    /// Log at INFO instead of WARN.
    #[arg(long, short)]
    verbose: bool,

    /// Overrides THAYDUNG_THEME.
    #[arg(long)]
    theme: Option<Theme>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chat as a student.
    Student {
        /// Full name; asked interactively when omitted.
        #[arg(long)]
        name: Option<String>,
        /// `Lớp 1` to `Lớp 12` (or just the number); asked interactively
        /// when omitted.
        #[arg(long)]
        grade: Option<GradeLevel>,
    },
    /// Chat as the teacher.
    Teacher {
        /// Read from the terminal when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// List recently used student names.
    Recent,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ClassroomConfig::from_env()?;
    let theme = cli.theme.unwrap_or(config.theme);
    let prefs = Preferences::new(Arc::new(FilePreferences::open(&config.data_dir)?));

    match cli.command {
        Command::Recent => {
            for name in prefs.recent_names() {
                println!("{name}");
            }
            Ok(())
        }
        Command::Student { name, grade } => {
            let name = match name {
                Some(name) => name,
                None => ask_name(&prefs)?,
            };
            let grade = match grade {
                Some(grade) => grade,
                None => parse_grade_answer(&ask_line(&format!(
                    "Khối lớp ({}) [{}]: ",
                    grade_menu(),
                    GradeLevel::default()
                ))?)?,
            };
            let user = login_student(&prefs, &name, grade)?;
            run_session(user, prefs, theme).await
        }
        Command::Teacher { password } => {
            let password = match password {
                Some(password) => password,
                None => ask_line("Mật khẩu giáo viên: ")?,
            };
            let user = login_teacher(&config.teacher_secret, &password)?;
            run_session(user, prefs, theme).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { tracing::Level::INFO } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();
}

async fn run_session(user: UserProfile, prefs: Preferences, theme: Theme) -> Result<(), CliError> {
    let client = LlmClient::from_env()?;
    info!(model = client.model(), "LLM client initialized");
    let llm: Arc<dyn LlmChat> = Arc::new(client);

    let mut session = ChatSession::start(user, prefs, llm);
    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock(), io::stdout(), theme);
    console.run(&mut session).await?;
    Ok(())
}

fn ask_name(prefs: &Preferences) -> Result<String, CliError> {
    let recent = prefs.recent_names();
    if !recent.is_empty() {
        println!("Tên gần đây: {}", recent.join(", "));
    }
    ask_line("Họ và tên của em: ")
}

/// One line from stdin without its line terminator; other whitespace is kept.
fn ask_line(prompt: &str) -> Result<String, CliError> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
