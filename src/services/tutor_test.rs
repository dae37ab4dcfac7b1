use super::*;
use crate::llm::types::ChatResponse;
use crate::state::GradeLevel;
use std::sync::Mutex;

// =========================================================================
// MockLlm
// =========================================================================

struct MockLlm {
    replies: Mutex<Vec<Result<String, LlmError>>>,
    calls: Mutex<Vec<(String, Vec<Turn>)>>,
}

impl MockLlm {
    fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies), calls: Mutex::new(Vec::new()) })
    }

    fn replying(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok((*t).to_string())).collect())
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last_call(&self) -> (String, Vec<Turn>) {
        self.calls.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl LlmChat for MockLlm {
    async fn generate(&self, system: &str, contents: &[Turn]) -> Result<ChatResponse, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), contents.to_vec()));
        let mut replies = self.replies.lock().unwrap();
        let next = if replies.is_empty() { Ok("done".to_string()) } else { replies.remove(0) };
        next.map(|text| ChatResponse {
            text,
            model: "mock".into(),
            finish_reason: "STOP".into(),
            input_tokens: 0,
            output_tokens: 0,
        })
    }
}

fn lan() -> UserProfile {
    UserProfile::student("Lan", GradeLevel::new(9).unwrap())
}

fn session_with(llm: &Arc<MockLlm>) -> ChatSession {
    let llm: Arc<dyn LlmChat> = llm.clone();
    ChatSession::start(lan(), Preferences::in_memory(), llm)
}

fn texts(session: &ChatSession) -> Vec<String> {
    session
        .conversation()
        .messages()
        .iter()
        .map(|m| m.text.clone())
        .collect()
}

// =========================================================================
// build_contents
// =========================================================================

#[test]
fn contents_for_fresh_text_only_turn() {
    let contents = build_contents(&[], "2+2=?", None);
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0].role, TurnRole::User);
    assert_eq!(contents[0].parts, vec![Part::Text { text: "2+2=?".into() }]);
}

#[test]
fn contents_put_image_before_text_with_fixed_mime() {
    let image = ImageAttachment::from_data_url("data:image/png;base64,QUJD");
    let contents = build_contents(&[], "what is this", Some(&image));
    assert_eq!(
        contents[0].parts,
        vec![
            Part::InlineImage { mime_type: "image/jpeg".into(), data: "QUJD".into() },
            Part::Text { text: "what is this".into() },
        ]
    );
}

#[test]
fn contents_image_only_has_no_text_part() {
    let image = ImageAttachment::from_data_url("data:image/jpeg;base64,QUJD");
    let contents = build_contents(&[], "", Some(&image));
    assert_eq!(contents[0].parts.len(), 1);
    assert!(matches!(contents[0].parts[0], Part::InlineImage { .. }));
}

#[test]
fn contents_map_history_in_order() {
    let mut conv = Conversation::with_greeting("Chào em");
    conv.push(Sender::User, "hỏi", None, false);
    conv.push(Sender::Model, "đáp", None, false);
    let contents = build_contents(conv.messages(), "tiếp", None);
    let roles: Vec<TurnRole> = contents.iter().map(|t| t.role).collect();
    assert_eq!(roles, [TurnRole::Model, TurnRole::User, TurnRole::Model, TurnRole::User]);
    let texts: Vec<String> = contents.iter().map(Turn::text).collect();
    assert_eq!(texts, ["Chào em", "hỏi", "đáp", "tiếp"]);
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn student_scenario_plain_reply() {
    let llm = MockLlm::replying(&["4"]);
    let mut session = session_with(&llm);

    let outcome = session.send_turn("2+2=?", None).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Replied);

    let (system, contents) = llm.last_call();
    assert!(system.contains("Lan"));
    assert!(system.contains("Lớp 9"));
    // greeting + new turn; the new turn carries a single text part
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[1].parts, vec![Part::Text { text: "2+2=?".into() }]);

    let last = session.conversation().last().unwrap();
    assert_eq!(last.sender, Sender::Model);
    assert_eq!(last.text, "4");
    assert!(!last.is_error);
    assert!(!session.conversation().is_locked());
    assert!(!session.conversation().is_in_flight());
}

#[tokio::test]
async fn request_excludes_the_new_message_from_history() {
    let llm = MockLlm::replying(&["a", "b"]);
    let mut session = session_with(&llm);
    session.send_turn("one", None).await.unwrap();
    session.send_turn("two", None).await.unwrap();

    let (_, contents) = llm.last_call();
    let texts: Vec<String> = contents.iter().map(Turn::text).collect();
    assert_eq!(texts.len(), 4);
    assert_eq!(texts[1..], ["one", "a", "two"]);
}

#[tokio::test]
async fn failure_appends_one_error_message() {
    let llm = MockLlm::new(vec![Err(LlmError::ApiRequest("connection reset".into()))]);
    let mut session = session_with(&llm);

    let outcome = session.send_turn("2+2=?", None).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Failed);

    let messages = session.conversation().messages();
    assert_eq!(messages.len(), 3);
    let last = &messages[2];
    assert_eq!(last.text, CONNECTION_APOLOGY);
    assert!(last.is_error);
    assert!(!session.conversation().is_locked());
    assert!(!session.conversation().is_in_flight());
}

#[tokio::test]
async fn warning_is_rewritten_and_does_not_lock() {
    let llm = MockLlm::replying(&["[[WARNING]] Quay lại bài học nhé."]);
    let mut session = session_with(&llm);

    let outcome = session.send_turn("chơi game gì vui?", None).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Warned);
    assert_eq!(session.conversation().last().unwrap().text, "⚠️ **Nhắc nhở:**  Quay lại bài học nhé.");
    assert!(!session.conversation().is_locked());
}

#[tokio::test]
async fn block_locks_and_rejects_further_sends() {
    let llm = MockLlm::replying(&["[[WARNING]] Học thôi em.", "[[BLOCK]]"]);
    let mut session = session_with(&llm);

    session.send_turn("game?", None).await.unwrap();
    let outcome = session.send_turn("game nữa?", None).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Locked);
    assert_eq!(session.conversation().last().unwrap().text, LOCK_NOTICE);
    assert!(session.conversation().is_locked());

    let before = texts(&session);
    let err = session.send_turn("xin lỗi thầy", None).await.unwrap_err();
    assert_eq!(err, SendRejected::Locked);
    assert_eq!(texts(&session), before);
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn block_token_inside_longer_reply_still_locks() {
    let llm = MockLlm::replying(&["Thầy phải dừng lại. [[BLOCK]]"]);
    let mut session = session_with(&llm);
    assert_eq!(session.send_turn("game", None).await.unwrap(), TurnOutcome::Locked);
    assert!(!texts(&session).iter().any(|t| t.contains("[[BLOCK]]")));
}

#[tokio::test]
async fn empty_reply_uses_fallback_text() {
    let llm = MockLlm::replying(&[""]);
    let mut session = session_with(&llm);
    session.send_turn("?", None).await.unwrap();
    assert_eq!(session.conversation().last().unwrap().text, EMPTY_REPLY_FALLBACK);
}

#[tokio::test]
async fn training_text_is_read_for_every_turn() {
    let llm = MockLlm::replying(&["a", "b"]);
    let mut session = session_with(&llm);
    session.send_turn("one", None).await.unwrap();
    assert!(!llm.last_call().0.contains("Dùng sơ đồ"));

    session.save_training_text("Dùng sơ đồ").unwrap();
    session.send_turn("two", None).await.unwrap();
    assert!(llm.last_call().0.contains("\"Dùng sơ đồ\""));
}

#[tokio::test]
async fn outgoing_image_is_kept_on_the_user_message() {
    let llm = MockLlm::replying(&["x = 2"]);
    let mut session = session_with(&llm);
    let image = ImageAttachment::from_data_url("data:image/png;base64,QUJD");

    session.send_turn("", Some(image.clone())).await.unwrap();

    let user_msg = &session.conversation().messages()[1];
    assert_eq!(user_msg.sender, Sender::User);
    assert_eq!(user_msg.image.as_ref(), Some(&image));
    let (_, contents) = llm.last_call();
    assert_eq!(contents[1].parts.len(), 1);
}

// =========================================================================
// Admission
// =========================================================================

#[tokio::test]
async fn blank_input_without_image_is_a_no_op() {
    let llm = MockLlm::replying(&[]);
    let mut session = session_with(&llm);
    for text in ["", "   ", "\n\t"] {
        assert_eq!(session.send_turn(text, None).await.unwrap_err(), SendRejected::Empty);
    }
    assert_eq!(session.conversation().messages().len(), 1);
    assert_eq!(llm.call_count(), 0);
}

#[test]
fn second_begin_while_in_flight_is_rejected() {
    let llm = MockLlm::replying(&[]);
    let mut session = session_with(&llm);

    let pending = session.begin_turn("first", None).unwrap();
    assert!(session.conversation().is_in_flight());
    assert_eq!(session.conversation().last().unwrap().text, "first");

    let before = texts(&session);
    assert_eq!(session.begin_turn("second", None).unwrap_err(), SendRejected::InFlight);
    assert_eq!(texts(&session), before);

    let outcome = session.complete_turn(pending, Ok("ok".into()));
    assert_eq!(outcome, TurnOutcome::Replied);
    assert!(!session.conversation().is_in_flight());
    assert!(session.begin_turn("second", None).is_ok());
}

#[test]
fn outgoing_message_is_appended_before_the_reply() {
    let llm = MockLlm::replying(&[]);
    let mut session = session_with(&llm);
    let pending = session.begin_turn("câu hỏi", None).unwrap();
    assert_eq!(session.conversation().messages().len(), 2);
    session.complete_turn(pending, Ok("trả lời".into()));
    assert_eq!(texts(&session)[1..], ["câu hỏi", "trả lời"]);
}

#[test]
fn block_then_begin_is_rejected() {
    let llm = MockLlm::replying(&[]);
    let mut session = session_with(&llm);
    let pending = session.begin_turn("a", None).unwrap();
    session.complete_turn(pending, Ok("[[BLOCK]]".into()));
    assert!(session.conversation().is_locked());
    assert_eq!(session.begin_turn("b", None).unwrap_err(), SendRejected::Locked);
}

#[test]
fn completion_without_turn_in_flight_is_ignored() {
    let llm = MockLlm::replying(&[]);
    let mut first = session_with(&llm);
    let mut second = session_with(&llm);

    let pending = first.begin_turn("a", None).unwrap();
    let outcome = second.complete_turn(pending, Ok("[[BLOCK]]".into()));

    assert_eq!(outcome, TurnOutcome::Ignored);
    assert_eq!(second.conversation().messages().len(), 1);
    assert!(!second.conversation().is_locked());
    assert!(first.conversation().is_in_flight());
}

// =========================================================================
// request_reply
// =========================================================================

#[tokio::test]
async fn request_reply_returns_raw_text() {
    let llm = MockLlm::replying(&["[[WARNING]] raw"]);
    let reply = request_reply(llm.as_ref(), &lan(), "", &[], "hi", None).await.unwrap();
    assert_eq!(reply, "[[WARNING]] raw");
}

#[tokio::test]
async fn request_reply_propagates_errors() {
    let llm = MockLlm::new(vec![Err(LlmError::ApiResponse { status: 503, body: "busy".into() })]);
    let err = request_reply(llm.as_ref(), &lan(), "", &[], "hi", None).await.unwrap_err();
    assert!(matches!(err, LlmError::ApiResponse { status: 503, .. }));
}

#[tokio::test]
async fn teacher_session_uses_teacher_instruction() {
    let llm = MockLlm::replying(&["Giáo án đây."]);
    let teacher_llm: Arc<dyn LlmChat> = llm.clone();
    let mut session = ChatSession::start(UserProfile::teacher("Thầy Dũng"), Preferences::in_memory(), teacher_llm);
    session.send_turn("Soạn giáo án phân số", None).await.unwrap();
    assert!(llm.last_call().0.contains("dành riêng cho giáo viên"));
    assert!(session.conversation().messages()[0].text.starts_with("Chào đồng nghiệp."));
}
