use super::*;
use crate::llm::LlmChat;
use crate::llm::types::{ChatResponse, LlmError, Turn};
use crate::services::preferences::Preferences;
use crate::state::{GradeLevel, UserProfile};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

struct ScriptedLlm {
    replies: Mutex<Vec<String>>,
    calls: Mutex<usize>,
}

impl ScriptedLlm {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl LlmChat for ScriptedLlm {
    async fn generate(&self, _system: &str, _contents: &[Turn]) -> Result<ChatResponse, LlmError> {
        *self.calls.lock().unwrap() += 1;
        let mut replies = self.replies.lock().unwrap();
        let text = if replies.is_empty() { "ok".to_string() } else { replies.remove(0) };
        Ok(ChatResponse { text, model: "scripted".into(), finish_reason: "STOP".into(), input_tokens: 0, output_tokens: 0 })
    }
}

fn student_session(llm: &Arc<ScriptedLlm>) -> ChatSession {
    let llm: Arc<dyn LlmChat> = llm.clone();
    ChatSession::start(UserProfile::student("Lan", GradeLevel::new(9).unwrap()), Preferences::in_memory(), llm)
}

fn teacher_session(llm: &Arc<ScriptedLlm>) -> ChatSession {
    let llm: Arc<dyn LlmChat> = llm.clone();
    ChatSession::start(UserProfile::teacher("Thầy Dũng"), Preferences::in_memory(), llm)
}

async fn drive(session: &mut ChatSession, input: &str, theme: Theme) -> String {
    let mut console = Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new(), theme);
    console.run(session).await.unwrap();
    String::from_utf8(console.into_output()).unwrap()
}

// =============================================================================
// parse_command
// =============================================================================

#[test]
fn plain_text_is_sent_verbatim() {
    assert_eq!(parse_command("2+2=?\n"), Command::Send("2+2=?".into()));
    assert_eq!(parse_command("  cách giải?\r\n"), Command::Send("  cách giải?".into()));
}

#[test]
fn slash_commands() {
    assert_eq!(parse_command("/image bai.png"), Command::AttachImage(PathBuf::from("bai.png")));
    assert_eq!(parse_command("/clear-image"), Command::ClearImage);
    assert_eq!(parse_command("/training"), Command::ShowTraining);
    assert_eq!(parse_command("/training  Dùng ví dụ đời sống "), Command::SaveTraining("Dùng ví dụ đời sống".into()));
    assert_eq!(parse_command("/logout"), Command::Logout);
    assert_eq!(parse_command("/quit\n"), Command::Logout);
    assert_eq!(parse_command("/help"), Command::Help);
}

#[test]
fn bad_commands_are_unknown() {
    assert_eq!(parse_command("/image"), Command::Unknown("/image".into()));
    assert_eq!(parse_command("/dance now"), Command::Unknown("/dance now".into()));
}

#[test]
fn training_edit_and_clear_commands() {
    assert_eq!(parse_command("/training-edit\n"), Command::EditTraining);
    assert_eq!(parse_command("/training-clear"), Command::ClearTraining);
}

#[test]
fn slash_not_followed_by_a_letter_is_chat_text() {
    assert_eq!(parse_command("/2 + 1/2 = ?\n"), Command::Send("/2 + 1/2 = ?".into()));
    assert_eq!(parse_command("/ x"), Command::Send("/ x".into()));
}

#[test]
fn double_slash_escapes_a_command_word() {
    assert_eq!(parse_command("//image là gì?"), Command::Send("/image là gì?".into()));
}

#[test]
fn grade_menu_lists_every_grade_in_order() {
    let menu = grade_menu();
    assert!(menu.starts_with("Lớp 1, Lớp 2, "));
    assert!(menu.ends_with("Lớp 11, Lớp 12"));
    assert_eq!(menu.matches("Lớp").count(), 12);
}

#[test]
fn grade_answer_defaults_and_validates() {
    assert_eq!(parse_grade_answer("  ").unwrap(), GradeLevel::new(12).unwrap());
    assert_eq!(parse_grade_answer("9").unwrap(), GradeLevel::new(9).unwrap());
    assert_eq!(parse_grade_answer("Lớp 3").unwrap(), GradeLevel::new(3).unwrap());
    assert!(parse_grade_answer("13").is_err());
}

#[test]
fn theme_parses_case_insensitively() {
    assert_eq!("Playful".parse::<Theme>().unwrap(), Theme::Playful);
    assert_eq!(" classic ".parse::<Theme>().unwrap(), Theme::Classic);
    assert!("neon".parse::<Theme>().is_err());
}

// =============================================================================
// run
// =============================================================================

#[tokio::test]
async fn student_chat_prints_greeting_and_reply() {
    let llm = ScriptedLlm::new(&["Bằng 4 em nhé."]);
    let mut session = student_session(&llm);
    let out = drive(&mut session, "2+2=?\n/logout\n", Theme::Classic).await;

    assert!(out.contains("Học sinh: Lan · Lớp 9"));
    assert!(out.contains("Chào em, Lan!"));
    assert!(out.contains("Lan:\n  2+2=?"));
    assert!(out.contains("Thầy Dũng:\n  Bằng 4 em nhé."));
    assert!(out.contains("Tạm biệt Lan!"));
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn blank_lines_do_not_call_the_model() {
    let llm = ScriptedLlm::new(&[]);
    let mut session = student_session(&llm);
    drive(&mut session, "\n   \n", Theme::Classic).await;
    assert_eq!(llm.calls(), 0);
    assert_eq!(session.conversation().messages().len(), 1);
}

#[tokio::test]
async fn locked_conversation_refuses_input_until_logout() {
    let llm = ScriptedLlm::new(&["[[BLOCK]]"]);
    let mut session = student_session(&llm);
    let out = drive(&mut session, "game?\nxin lỗi thầy\n/training\n/logout\n", Theme::Classic).await;

    assert!(out.contains("Đoạn chat đã bị khóa."));
    assert_eq!(out.matches("Gõ /logout để thoát.").count(), 2);
    assert!(!out.contains("xin lỗi thầy\n"));
    assert_eq!(llm.calls(), 1);
    assert!(session.conversation().is_locked());
}

#[tokio::test]
async fn warning_is_shown_with_reminder() {
    let llm = ScriptedLlm::new(&["[[WARNING]] Quay lại bài nhé."]);
    let mut session = student_session(&llm);
    let out = drive(&mut session, "bóng đá?\n", Theme::Playful).await;
    assert!(out.contains("⚠️ **Nhắc nhở:**  Quay lại bài nhé."));
    assert!(out.contains("🧑‍🏫 Thầy Dũng:"));
}

#[tokio::test]
async fn training_commands_are_teacher_only() {
    let llm = ScriptedLlm::new(&[]);
    let mut session = student_session(&llm);
    let out = drive(&mut session, "/training bí mật\n", Theme::Classic).await;
    assert!(out.contains("Chỉ giáo viên mới dùng được lệnh này."));
    assert_eq!(session.training_text(), "");
}

#[tokio::test]
async fn teacher_saves_and_views_training_text() {
    let llm = ScriptedLlm::new(&[]);
    let mut session = teacher_session(&llm);
    let out = drive(&mut session, "/training\n/training Dùng sơ đồ tư duy\n/training\n", Theme::Classic).await;
    assert!(out.contains("(Chưa có dữ liệu huấn luyện.)"));
    assert!(out.contains("Đã lưu dữ liệu huấn luyện."));
    assert!(out.contains("Dữ liệu huấn luyện hiện tại:\nDùng sơ đồ tư duy"));
    assert_eq!(session.training_text(), "Dùng sơ đồ tư duy");
}

#[tokio::test]
async fn attached_image_rides_on_the_next_send_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("de-bai.png");
    std::fs::write(&path, b"ABC").unwrap();

    let llm = ScriptedLlm::new(&["x = 2", "ok"]);
    let mut session = student_session(&llm);
    let input = format!("/image {}\nGiải giúp em\nthêm câu nữa\n", path.display());
    let out = drive(&mut session, &input, Theme::Classic).await;

    assert!(out.contains("📎 Đã đính kèm ảnh"));
    assert!(out.contains("  [ảnh đính kèm]\n  Giải giúp em"));
    let messages = session.conversation().messages();
    assert_eq!(messages[1].image.as_ref().unwrap().as_data_url(), "data:image/png;base64,QUJD");
    assert!(messages[3].image.is_none());
}

#[tokio::test]
async fn missing_image_file_is_reported() {
    let llm = ScriptedLlm::new(&[]);
    let mut session = student_session(&llm);
    let out = drive(&mut session, "/image /no/such/file.png\n", Theme::Classic).await;
    assert!(out.contains("Không đính kèm được ảnh"));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn unknown_command_hints_at_help() {
    let llm = ScriptedLlm::new(&[]);
    let mut session = student_session(&llm);
    let out = drive(&mut session, "/dance\n", Theme::Classic).await;
    assert!(out.contains("Lệnh không hợp lệ: /dance"));
}

#[tokio::test]
async fn fraction_line_is_sent_to_the_model() {
    let llm = ScriptedLlm::new(&["Bằng 1 em nhé."]);
    let mut session = student_session(&llm);
    drive(&mut session, "/2 + 1/2 = ?\n", Theme::Classic).await;
    assert_eq!(llm.calls(), 1);
    assert_eq!(session.conversation().messages()[1].text, "/2 + 1/2 = ?");
}

#[tokio::test]
async fn teacher_clears_training_text() {
    let llm = ScriptedLlm::new(&[]);
    let mut session = teacher_session(&llm);
    let out = drive(&mut session, "/training Dùng sơ đồ\n/training-clear\n/training\n", Theme::Classic).await;
    assert!(out.contains("Đã xóa dữ liệu huấn luyện."));
    assert!(out.contains("(Chưa có dữ liệu huấn luyện.)"));
    assert_eq!(session.training_text(), "");
}

#[tokio::test]
async fn teacher_enters_multi_line_training_text() {
    let llm = ScriptedLlm::new(&[]);
    let mut session = teacher_session(&llm);
    let input = "/training-edit\nDùng sơ đồ tư duy.\n\n  Ví dụ gần gũi\n.\n/training\n";
    let out = drive(&mut session, input, Theme::Classic).await;
    assert!(out.contains("kết thúc bằng một dòng chỉ có dấu chấm"));
    assert_eq!(session.training_text(), "Dùng sơ đồ tư duy.\n\n  Ví dụ gần gũi");
    assert!(out.contains("Dữ liệu huấn luyện hiện tại:\nDùng sơ đồ tư duy.\n\n  Ví dụ gần gũi"));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn training_edit_stops_at_end_of_input() {
    let llm = ScriptedLlm::new(&[]);
    let mut session = teacher_session(&llm);
    drive(&mut session, "/training-edit\ndòng một\ndòng hai\n", Theme::Classic).await;
    assert_eq!(session.training_text(), "dòng một\ndòng hai");
}

#[tokio::test]
async fn student_cannot_edit_or_clear_training() {
    let llm = ScriptedLlm::new(&[]);
    let mut session = student_session(&llm);
    let out = drive(&mut session, "/training-edit\n/training-clear\n", Theme::Classic).await;
    assert_eq!(out.matches("Chỉ giáo viên mới dùng được lệnh này.").count(), 2);
}
