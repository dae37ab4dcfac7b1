//! Console presenter: a line-oriented chat over any reader and writer.
//!
//! DESIGN
//! ======
//! One presenter serves both looks; [`Theme`] only swaps the banner, labels
//! and prompt glyph. Each input line is parsed into a [`Command`]; plain text
//! becomes a turn on the [`ChatSession`]. After every command the presenter
//! prints whatever messages the conversation gained, so rendering never
//! depends on which branch the turn took.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::services::attachment;
use crate::services::tutor::{ChatSession, SendRejected};
use crate::state::{ChatMessage, GradeLevel, ImageAttachment, InvalidGrade, Sender};

// =============================================================================
// THEME
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Classic,
    Playful,
}

impl Theme {
    fn banner(self) -> &'static str {
        match self {
            Self::Classic => "=== Lớp học của Thầy Dũng ===",
            Self::Playful => "✨📚 Lớp học vui vẻ của Thầy Dũng 📚✨",
        }
    }

    fn tutor_label(self) -> &'static str {
        match self {
            Self::Classic => "Thầy Dũng",
            Self::Playful => "🧑‍🏫 Thầy Dũng",
        }
    }

    fn prompt(self) -> &'static str {
        match self {
            Self::Classic => "> ",
            Self::Playful => "✏️  ",
        }
    }

    fn thinking(self) -> &'static str {
        match self {
            Self::Classic => "(Thầy đang suy nghĩ...)",
            Self::Playful => "🤔 Thầy đang suy nghĩ...",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "playful" => Ok(Self::Playful),
            other => Err(format!("unknown theme '{other}' (expected classic or playful)")),
        }
    }
}

/// Grade choices for the login prompt, e.g. `Lớp 1, Lớp 2, ... Lớp 12`.
#[must_use]
pub fn grade_menu() -> String {
    GradeLevel::all().map(|g| g.to_string()).collect::<Vec<_>>().join(", ")
}

/// Parse a grade typed at the login prompt; a blank answer keeps the default.
///
/// # Errors
///
/// [`InvalidGrade`] when the answer is not `Lớp 1` through `Lớp 12`.
pub fn parse_grade_answer(answer: &str) -> Result<GradeLevel, InvalidGrade> {
    if answer.trim().is_empty() {
        return Ok(GradeLevel::default());
    }
    answer.parse()
}

// =============================================================================
// COMMANDS
// =============================================================================

pub const HELP_TEXT: &str = "Lệnh: /image <đường dẫn> đính kèm ảnh, /clear-image bỏ ảnh, \
    /training [nội dung] xem hoặc lưu dữ liệu huấn luyện, /training-edit soạn nhiều dòng, \
    /training-clear xóa dữ liệu huấn luyện (giáo viên), /logout hoặc /quit để thoát. \
    Bắt đầu bằng // để gửi một dòng có dấu / ở đầu.";

/// Terminates a `/training-edit` block.
pub const END_OF_BLOCK: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    AttachImage(PathBuf),
    ClearImage,
    ShowTraining,
    SaveTraining(String),
    EditTraining,
    ClearTraining,
    Help,
    Logout,
    Unknown(String),
}

/// Parse one input line. Commands are `/` followed by a letter; any other
/// line is chat text. A leading `//` sends the rest with a single `/`.
#[must_use]
pub fn parse_command(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim_start();
    if let Some(escaped) = trimmed.strip_prefix("//") {
        return Command::Send(format!("/{escaped}"));
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };
    if !rest.starts_with(|c: char| c.is_alphabetic()) {
        return Command::Send(line.to_string());
    }
    let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let arg = arg.trim();
    match name {
        "image" if !arg.is_empty() => Command::AttachImage(PathBuf::from(arg)),
        "clear-image" => Command::ClearImage,
        "training" if arg.is_empty() => Command::ShowTraining,
        "training" => Command::SaveTraining(arg.to_string()),
        "training-edit" => Command::EditTraining,
        "training-clear" => Command::ClearTraining,
        "help" => Command::Help,
        "logout" | "quit" => Command::Logout,
        _ => Command::Unknown(line.trim().to_string()),
    }
}

// =============================================================================
// PRESENTER
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("console I/O failed: {0}")]
    Io(#[from] io::Error),
}

pub struct Console<R, W> {
    input: R,
    output: W,
    theme: Theme,
    pending_image: Option<ImageAttachment>,
    shown: usize,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W, theme: Theme) -> Self {
        Self { input, output, theme, pending_image: None, shown: 0 }
    }

    /// Drive `session` until logout or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error only when reading input or writing output fails.
    pub async fn run(&mut self, session: &mut ChatSession) -> Result<(), ConsoleError> {
        self.print_banner(session)?;
        self.flush_new_messages(session)?;

        loop {
            write!(self.output, "{}", self.theme.prompt())?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                debug!("console: end of input");
                break;
            }

            let command = parse_command(&line);
            if command == Command::Logout {
                writeln!(self.output, "Tạm biệt {}!", session.user().name.trim())?;
                break;
            }
            if session.conversation().is_locked() {
                writeln!(self.output, "🔒 Đoạn chat đã bị khóa. Gõ /logout để thoát.")?;
                continue;
            }
            self.handle(session, command).await?;
            self.flush_new_messages(session)?;
        }
        Ok(())
    }

    /// Consume the presenter, returning the output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    async fn handle(&mut self, session: &mut ChatSession, command: Command) -> Result<(), ConsoleError> {
        match command {
            Command::Send(text) => {
                if text.trim().is_empty() && self.pending_image.is_none() {
                    return Ok(());
                }
                writeln!(self.output, "{}", self.theme.thinking())?;
                self.output.flush()?;
                let image = self.pending_image.take();
                match session.send_turn(&text, image).await {
                    Ok(outcome) => debug!(?outcome, "console: turn settled"),
                    Err(SendRejected::Empty) => {}
                    Err(rejected) => writeln!(self.output, "({rejected})")?,
                }
            }
            Command::AttachImage(path) => match attachment::from_path(&path) {
                Ok(image) => {
                    self.pending_image = Some(image);
                    writeln!(self.output, "📎 Đã đính kèm ảnh {}", path.display())?;
                }
                Err(e) => {
                    warn!(error = %e, "console: attachment rejected");
                    writeln!(self.output, "Không đính kèm được ảnh: {e}")?;
                }
            },
            Command::ClearImage => {
                self.pending_image = None;
                writeln!(self.output, "Đã bỏ ảnh đính kèm.")?;
            }
            Command::ShowTraining | Command::SaveTraining(_) | Command::EditTraining | Command::ClearTraining
                if !session.user().is_teacher() =>
            {
                writeln!(self.output, "Chỉ giáo viên mới dùng được lệnh này.")?;
            }
            Command::ShowTraining => {
                let training = session.training_text();
                if training.is_empty() {
                    writeln!(self.output, "(Chưa có dữ liệu huấn luyện.)")?;
                } else {
                    writeln!(self.output, "Dữ liệu huấn luyện hiện tại:\n{training}")?;
                }
            }
            Command::SaveTraining(text) => self.save_training(session, &text)?,
            Command::EditTraining => {
                writeln!(self.output, "Nhập dữ liệu huấn luyện, kết thúc bằng một dòng chỉ có dấu chấm (.):")?;
                self.output.flush()?;
                let text = self.read_block()?;
                self.save_training(session, &text)?;
            }
            Command::ClearTraining => self.save_training(session, "")?,
            Command::Help => writeln!(self.output, "{HELP_TEXT}")?,
            Command::Unknown(raw) => writeln!(self.output, "Lệnh không hợp lệ: {raw}. Gõ /help để xem các lệnh.")?,
            Command::Logout => {}
        }
        Ok(())
    }

    fn save_training(&mut self, session: &ChatSession, text: &str) -> Result<(), ConsoleError> {
        match session.save_training_text(text) {
            Ok(()) if text.is_empty() => writeln!(self.output, "Đã xóa dữ liệu huấn luyện.")?,
            Ok(()) => writeln!(self.output, "Đã lưu dữ liệu huấn luyện.")?,
            Err(e) => {
                warn!(error = %e, "console: training text not saved");
                writeln!(self.output, "Không lưu được dữ liệu huấn luyện: {e}")?;
            }
        }
        Ok(())
    }

    /// Lines up to [`END_OF_BLOCK`] or end of input, joined with `\n`.
    fn read_block(&mut self) -> Result<String, ConsoleError> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line == END_OF_BLOCK {
                break;
            }
            lines.push(line.to_string());
        }
        Ok(lines.join("\n"))
    }

    fn print_banner(&mut self, session: &ChatSession) -> Result<(), ConsoleError> {
        let user = session.user();
        writeln!(self.output, "{}", self.theme.banner())?;
        if user.is_teacher() {
            writeln!(self.output, "Chế độ giáo viên: {}", user.name)?;
        } else {
            writeln!(self.output, "Học sinh: {} · {}", user.name.trim(), user.grade_label())?;
        }
        writeln!(self.output, "{HELP_TEXT}")?;
        Ok(())
    }

    fn flush_new_messages(&mut self, session: &ChatSession) -> Result<(), ConsoleError> {
        let messages = session.conversation().messages();
        for message in &messages[self.shown.min(messages.len())..] {
            self.render(message, session.user().name.trim())?;
        }
        self.shown = messages.len();
        Ok(())
    }

    fn render(&mut self, message: &ChatMessage, user_label: &str) -> Result<(), ConsoleError> {
        let label = match message.sender {
            Sender::Model => self.theme.tutor_label(),
            Sender::User => user_label,
        };
        let marker = if message.is_error { " (!)" } else { "" };
        writeln!(self.output, "{label}{marker}:")?;
        if message.image.is_some() {
            writeln!(self.output, "  [ảnh đính kèm]")?;
        }
        for line in message.text.lines() {
            writeln!(self.output, "  {line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "console_test.rs"]
mod tests;
