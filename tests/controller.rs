use nutribot::config::Config;
use nutribot::controller::{
    CHAT_FALLBACK, GREETING, UPLOAD_DEFAULT_REPLY, UPLOAD_FALLBACK, UPLOAD_NOTICE,
};
use nutribot::types::{ChatReply, UploadReply};
use nutribot::view::{
    Entry, FilePicker, LogOp, MemoryInput, MemoryLog, MemoryPicker, PanelBuilder, TextInput,
};
use nutribot::{
    Attachment, ChatBackend, ChatError, ChatResult, Controller, Message, Sender, UiEvent,
};
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

const FAST: Duration = Duration::from_millis(300);
const SLOW: Duration = Duration::from_millis(2500);

#[derive(Clone)]
enum UploadScript {
    Reply(Option<String>),
    Fail,
}

#[derive(Clone)]
struct Scripted {
    latency: Duration,
    chat_fails: bool,
    upload: UploadScript,
    gate: Option<Arc<Notify>>,
    chats: Arc<Mutex<Vec<String>>>,
    uploads: Arc<Mutex<Vec<Attachment>>>,
}

impl Scripted {
    fn replying_after(latency: Duration) -> Self {
        Self {
            latency,
            chat_fails: false,
            upload: UploadScript::Reply(Some("Added eggs and spinach to your pantry.".into())),
            gate: None,
            chats: Arc::default(),
            uploads: Arc::default(),
        }
    }

    fn failing_after(latency: Duration) -> Self {
        Self {
            chat_fails: true,
            upload: UploadScript::Fail,
            ..Self::replying_after(latency)
        }
    }

    fn with_upload(mut self, upload: UploadScript) -> Self {
        self.upload = upload;
        self
    }

    fn gated(mut self, gate: &Arc<Notify>) -> Self {
        self.gate = Some(Arc::clone(gate));
        self
    }

    async fn respond(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        tokio::time::sleep(self.latency).await;
    }
}

impl ChatBackend for Scripted {
    async fn chat(&self, message: &str) -> ChatResult<ChatReply> {
        self.chats.lock().push(message.to_string());
        self.respond().await;
        if self.chat_fails {
            return Err(ChatError::Status(StatusCode::BAD_GATEWAY));
        }
        let reply = if message == "What are good protein sources?" {
            "Lean meats, legumes, and dairy are great sources.".to_string()
        } else {
            format!("echo: {message}")
        };
        Ok(ChatReply { reply })
    }

    async fn upload(&self, attachment: Attachment) -> ChatResult<UploadReply> {
        self.uploads.lock().push(attachment);
        self.respond().await;
        match &self.upload {
            UploadScript::Reply(reply) => Ok(UploadReply {
                reply: reply.clone(),
            }),
            UploadScript::Fail => Err(ChatError::Decode("expected value at line 1".into())),
        }
    }
}

struct Harness {
    log: MemoryLog,
    input: MemoryInput,
    picker: MemoryPicker,
    tx: mpsc::UnboundedSender<UiEvent>,
    task: JoinHandle<()>,
}

impl Harness {
    fn start(backend: Scripted) -> Self {
        Self::with_config(backend, Config::default())
    }

    fn with_config(backend: Scripted, config: Config) -> Self {
        let log = MemoryLog::new();
        let input = MemoryInput::new();
        let picker = MemoryPicker::new();
        let panel = PanelBuilder::new()
            .message_log(log.clone())
            .text_input(input.clone())
            .file_picker(picker.clone());
        let controller = Controller::new(&config, backend, panel).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(controller.run(rx));
        Self {
            log,
            input,
            picker,
            tx,
            task,
        }
    }

    fn say(&self, text: &str) {
        self.tx.send(UiEvent::Input(text.to_string())).unwrap();
        self.tx.send(UiEvent::Send).unwrap();
    }

    fn choose(&self, files: Vec<Attachment>) {
        self.tx.send(UiEvent::FilesChosen(files)).unwrap();
    }

    async fn finish(self) -> (MemoryLog, MemoryInput, MemoryPicker) {
        drop(self.tx);
        self.task.await.unwrap();
        (self.log, self.input, self.picker)
    }
}

fn photo(name: &str) -> Attachment {
    Attachment::new(name, vec![0xff, 0xd8, 0xff])
}

fn bot_messages(log: &MemoryLog) -> Vec<String> {
    log.messages()
        .into_iter()
        .filter(|m| m.sender == Sender::Bot)
        .map(|m| m.text)
        .collect()
}

fn position(ops: &[LogOp], wanted: &LogOp) -> usize {
    ops.iter()
        .position(|op| op == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not found in {ops:?}"))
}

#[tokio::test(start_paused = true)]
async fn blank_input_sends_nothing() {
    let backend = Scripted::replying_after(FAST);
    let chats = Arc::clone(&backend.chats);
    let harness = Harness::start(backend);

    harness.say("");
    harness.say("   \t ");
    let (log, input, _) = harness.finish().await;

    assert!(log.entries().is_empty());
    assert!(chats.lock().is_empty());
    assert_eq!(input.value(), "   \t ");
}

#[tokio::test(start_paused = true)]
async fn reply_is_appended_verbatim_and_input_cleared() {
    let backend = Scripted::replying_after(FAST);
    let chats = Arc::clone(&backend.chats);
    let harness = Harness::start(backend);

    harness.say("  What are good protein sources?  ");
    let (log, input, _) = harness.finish().await;

    assert_eq!(*chats.lock(), vec!["What are good protein sources?".to_string()]);
    assert_eq!(
        log.messages(),
        vec![
            Message::you("What are good protein sources?"),
            Message::bot("Lean meats, legumes, and dairy are great sources."),
        ]
    );
    assert_eq!(input.value(), "");
    assert!(!log.has_indicator());
}

#[tokio::test(start_paused = true)]
async fn input_is_cleared_before_the_reply_arrives() {
    let gate = Arc::new(Notify::new());
    let harness = Harness::start(Scripted::replying_after(FAST).gated(&gate));

    harness.say("hello");
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(harness.input.value(), "");
    assert_eq!(harness.log.messages(), vec![Message::you("hello")]);

    gate.notify_one();
    let (log, _, _) = harness.finish().await;
    assert_eq!(bot_messages(&log), vec!["echo: hello"]);
}

#[tokio::test(start_paused = true)]
async fn fast_reply_never_shows_indicator() {
    let harness = Harness::start(Scripted::replying_after(FAST));

    harness.say("hi");
    let (log, _, _) = harness.finish().await;

    assert_eq!(log.indicator_insertions(), 0);
    assert!(!log.ops().contains(&LogOp::IndicatorRemoved));
    assert_eq!(bot_messages(&log), vec!["echo: hi"]);
}

#[tokio::test(start_paused = true)]
async fn slow_reply_shows_indicator_once_and_removes_it_first() {
    let harness = Harness::start(Scripted::replying_after(SLOW));

    harness.say("hi");
    let (log, _, _) = harness.finish().await;

    assert_eq!(log.indicator_insertions(), 1);
    assert!(!log.has_indicator());
    let ops = log.ops();
    let removed = position(&ops, &LogOp::IndicatorRemoved);
    let replied = position(&ops, &LogOp::Appended(Message::bot("echo: hi")));
    assert!(removed < replied);
}

#[tokio::test(start_paused = true)]
async fn indicator_appears_only_after_the_delay() {
    let gate = Arc::new(Notify::new());
    let harness = Harness::start(Scripted::replying_after(Duration::ZERO).gated(&gate));

    harness.say("hi");
    tokio::time::sleep(Duration::from_millis(999)).await;
    assert!(!harness.log.has_indicator());
    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(harness.log.has_indicator());
    assert_eq!(
        harness.log.entries().last(),
        Some(&Entry::TypingIndicator)
    );
    assert_eq!(harness.log.scrolled_to(), Some(1));

    gate.notify_one();
    let (log, _, _) = harness.finish().await;
    assert!(!log.has_indicator());
}

#[tokio::test(start_paused = true)]
async fn every_outcome_converges_without_indicator() {
    for latency in [FAST, SLOW] {
        for fails in [false, true] {
            let backend = if fails {
                Scripted::failing_after(latency)
            } else {
                Scripted::replying_after(latency)
            };
            let harness = Harness::start(backend);

            harness.say("hi");
            let (log, _, _) = harness.finish().await;

            let expected = if fails { CHAT_FALLBACK } else { "echo: hi" };
            assert_eq!(
                log.entries(),
                vec![
                    Entry::Message(Message::you("hi")),
                    Entry::Message(Message::bot(expected)),
                ],
                "latency {latency:?}, fails {fails}"
            );
        }
    }
}

#[tokio::test(start_paused = true)]
async fn disabled_indicator_never_appears() {
    let mut config = Config::default();
    config.features.typing_indicator = false;
    let harness = Harness::with_config(Scripted::replying_after(SLOW), config);

    harness.say("hi");
    let (log, _, _) = harness.finish().await;

    assert_eq!(log.indicator_insertions(), 0);
    assert_eq!(bot_messages(&log), vec!["echo: hi"]);
}

#[tokio::test(start_paused = true)]
async fn overlapping_sends_each_get_one_reply() {
    let harness = Harness::start(Scripted::replying_after(SLOW));

    harness.say("one");
    harness.say("two");
    let (log, _, _) = harness.finish().await;

    let mut replies = bot_messages(&log);
    replies.sort();
    assert_eq!(replies, vec!["echo: one", "echo: two"]);
    assert!(!log.has_indicator());
    // Shown once at the delay, then again under the first reply.
    assert_eq!(log.indicator_insertions(), 2);
}

#[tokio::test(start_paused = true)]
async fn every_insertion_scrolls_to_latest() {
    let harness = Harness::start(Scripted::replying_after(SLOW));

    harness.say("hi");
    let (log, _, _) = harness.finish().await;

    let ops = log.ops();
    for (i, op) in ops.iter().enumerate() {
        if matches!(op, LogOp::Appended(_) | LogOp::IndicatorInserted) {
            assert!(
                matches!(ops.get(i + 1), Some(LogOp::Scrolled(_))),
                "{op:?} was not followed by a scroll"
            );
        }
    }
    assert_eq!(log.scrolled_to(), Some(log.entries().len() - 1));
}

#[tokio::test(start_paused = true)]
async fn start_greets_after_half_a_second() {
    let harness = Harness::start(Scripted::replying_after(FAST));

    harness.tx.send(UiEvent::Start).unwrap();
    tokio::time::sleep(Duration::from_millis(499)).await;
    assert!(harness.log.entries().is_empty());
    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(harness.log.messages(), vec![Message::bot(GREETING)]);

    harness.finish().await;
}

#[tokio::test(start_paused = true)]
async fn pending_greeting_is_delivered_before_shutdown() {
    let harness = Harness::start(Scripted::replying_after(FAST));

    harness.tx.send(UiEvent::Start).unwrap();
    let (log, _, _) = harness.finish().await;

    assert_eq!(bot_messages(&log), vec![GREETING]);
}

#[tokio::test(start_paused = true)]
async fn upload_notice_is_shown_before_the_response() {
    let gate = Arc::new(Notify::new());
    let backend = Scripted::replying_after(FAST).gated(&gate);
    let uploads = Arc::clone(&backend.uploads);
    let harness = Harness::start(backend);

    harness.choose(vec![photo("fridge.jpg")]);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(harness.log.messages(), vec![Message::you(UPLOAD_NOTICE)]);
    assert_eq!(uploads.lock().len(), 1);

    gate.notify_one();
    let (log, _, _) = harness.finish().await;
    assert_eq!(
        bot_messages(&log),
        vec!["Added eggs and spinach to your pantry."]
    );
}

#[tokio::test(start_paused = true)]
async fn upload_sends_only_the_first_file_and_clears_selection() {
    let backend = Scripted::replying_after(FAST);
    let uploads = Arc::clone(&backend.uploads);
    let harness = Harness::start(backend);

    harness.choose(vec![photo("shelf.jpg"), photo("receipt.png")]);
    let (log, _, picker) = harness.finish().await;

    let sent = uploads.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name, "shelf.jpg");
    assert_eq!(sent[0].content_type, "image/jpeg");
    assert!(picker.selection().is_empty());
    assert_eq!(picker.times_cleared(), 1);
    assert_eq!(log.messages().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn upload_without_reply_uses_default_copy() {
    for reply in [None, Some(String::new())] {
        let backend = Scripted::replying_after(FAST).with_upload(UploadScript::Reply(reply));
        let harness = Harness::start(backend);

        harness.choose(vec![photo("fridge.jpg")]);
        let (log, _, _) = harness.finish().await;

        assert_eq!(bot_messages(&log), vec![UPLOAD_DEFAULT_REPLY]);
    }
}

#[tokio::test(start_paused = true)]
async fn upload_failure_uses_its_own_fallback() {
    let harness = Harness::start(Scripted::failing_after(SLOW));

    harness.choose(vec![photo("fridge.jpg")]);
    let (log, _, picker) = harness.finish().await;

    assert_eq!(
        log.messages(),
        vec![Message::you(UPLOAD_NOTICE), Message::bot(UPLOAD_FALLBACK)]
    );
    assert_ne!(UPLOAD_FALLBACK, CHAT_FALLBACK);
    assert!(!log.has_indicator());
    assert_eq!(picker.times_cleared(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_selection_is_ignored() {
    let backend = Scripted::replying_after(FAST);
    let uploads = Arc::clone(&backend.uploads);
    let harness = Harness::start(backend);

    harness.choose(Vec::new());
    let (log, _, picker) = harness.finish().await;

    assert!(log.entries().is_empty());
    assert!(uploads.lock().is_empty());
    assert_eq!(picker.times_cleared(), 0);
}

#[tokio::test(start_paused = true)]
async fn attach_opens_the_picker() {
    let harness = Harness::start(Scripted::replying_after(FAST));

    harness.tx.send(UiEvent::Attach).unwrap();
    let (log, _, picker) = harness.finish().await;

    assert_eq!(picker.times_opened(), 1);
    assert!(log.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disabled_upload_needs_no_picker_and_ignores_files() {
    let mut config = Config::default();
    config.features.image_upload = false;
    let backend = Scripted::replying_after(FAST);
    let uploads = Arc::clone(&backend.uploads);

    let log = MemoryLog::new();
    let panel = PanelBuilder::new()
        .message_log(log.clone())
        .text_input(MemoryInput::new());
    let controller = Controller::new(&config, backend, panel).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(controller.run(rx));

    tx.send(UiEvent::Attach).unwrap();
    tx.send(UiEvent::FilesChosen(vec![photo("fridge.jpg")])).unwrap();
    drop(tx);
    task.await.unwrap();

    assert!(log.entries().is_empty());
    assert!(uploads.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn chat_and_upload_can_overlap() {
    let harness = Harness::start(Scripted::replying_after(SLOW));

    harness.say("what can I cook?");
    harness.choose(vec![photo("fridge.jpg")]);
    let (log, _, _) = harness.finish().await;

    let messages = log.messages();
    assert_eq!(
        messages[..2],
        [Message::you("what can I cook?"), Message::you(UPLOAD_NOTICE)]
    );
    let mut replies = bot_messages(&log);
    replies.sort();
    assert_eq!(
        replies,
        vec!["Added eggs and spinach to your pantry.", "echo: what can I cook?"]
    );
    assert!(!log.has_indicator());
}
