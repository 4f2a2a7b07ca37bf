use crate::backend::ChatBackend;
use crate::config::{Config, FeaturesConfig};
use crate::error::ChatResult;
use crate::types::{Attachment, ChatReply, Message, UploadReply};
use crate::view::{Panel, PanelBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const GREETING: &str = "👋 Welcome to NutriBot! I can see your profile is set up. Ask me anything about nutrition, diet, or healthy living! 🍎";
pub const CHAT_FALLBACK: &str = "Sorry, something went wrong. Please try again.";
pub const UPLOAD_NOTICE: &str = "📎 Uploaded an image";
pub const UPLOAD_DEFAULT_REPLY: &str = "Image uploaded to pantry.";
pub const UPLOAD_FALLBACK: &str = "Sorry, there was a problem uploading the image.";

/// Something the user did on the panel.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// The welcome button.
    Start,
    /// The text input changed.
    Input(String),
    /// Send button or enter key.
    Send,
    /// The attach button.
    Attach,
    /// The file picker reported a new selection.
    FilesChosen(Vec<Attachment>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TurnId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnKind {
    Chat,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    IndicatorShown,
}

#[derive(Debug)]
struct PendingTurn {
    kind: TurnKind,
    phase: Phase,
    timer: Option<JoinHandle<()>>,
}

#[derive(Debug)]
enum Completion {
    Greeting,
    TypingDue(TurnId),
    Chat(TurnId, ChatResult<ChatReply>),
    Upload(TurnId, ChatResult<UploadReply>),
}

/// Drives one chat panel.
///
/// All view mutations happen on the task running [`Controller::run`]. Network
/// calls and timers are spawned and report back through a completion channel,
/// so a turn's timer and its response can race without ever touching the view
/// concurrently.
pub struct Controller<B> {
    backend: Arc<B>,
    panel: Panel,
    features: FeaturesConfig,
    typing_delay: Duration,
    greeting_delay: Duration,
    pending: HashMap<TurnId, PendingTurn>,
    greetings_pending: usize,
    next_turn: u64,
    done_tx: mpsc::UnboundedSender<Completion>,
    done_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<B: ChatBackend> Controller<B> {
    pub fn new(config: &Config, backend: B, panel: PanelBuilder) -> ChatResult<Self> {
        let panel = panel.build(&config.features)?;
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Ok(Self {
            backend: Arc::new(backend),
            panel,
            features: config.features,
            typing_delay: config.timing.typing_delay(),
            greeting_delay: config.timing.greeting_delay(),
            pending: HashMap::new(),
            greetings_pending: 0,
            next_turn: 0,
            done_tx,
            done_rx,
        })
    }

    /// Processes events until the sender side closes and every in-flight turn
    /// has settled.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<UiEvent>) {
        let mut events_open = true;
        loop {
            if !events_open && self.is_idle() {
                break;
            }
            tokio::select! {
                maybe_event = events.recv(), if events_open => {
                    match maybe_event {
                        Some(event) => self.handle_event(event),
                        None => {
                            debug!(pending = self.pending.len(), "ui events closed, draining");
                            events_open = false;
                        }
                    }
                }
                Some(done) = self.done_rx.recv() => {
                    self.handle_completion(done);
                }
                else => break,
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.greetings_pending == 0
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Start => self.schedule_greeting(),
            UiEvent::Input(text) => self.panel.input.set_value(&text),
            UiEvent::Send => self.send_message(),
            UiEvent::Attach => self.open_picker(),
            UiEvent::FilesChosen(files) => self.upload_selection(files),
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Greeting => {
                self.greetings_pending = self.greetings_pending.saturating_sub(1);
                self.append(Message::bot(GREETING));
            }
            Completion::TypingDue(id) => self.show_indicator(id),
            Completion::Chat(id, result) => {
                if self.settle(id).is_none() {
                    return;
                }
                let text = match result {
                    Ok(reply) => reply.reply,
                    Err(err) => {
                        warn!(error = %err, "chat request failed");
                        CHAT_FALLBACK.to_string()
                    }
                };
                self.append(Message::bot(text));
                self.restore_indicator();
            }
            Completion::Upload(id, result) => {
                if self.settle(id).is_none() {
                    return;
                }
                let text = match result {
                    Ok(UploadReply { reply: Some(reply) }) if !reply.is_empty() => reply,
                    Ok(_) => UPLOAD_DEFAULT_REPLY.to_string(),
                    Err(err) => {
                        warn!(error = %err, "image upload failed");
                        UPLOAD_FALLBACK.to_string()
                    }
                };
                self.append(Message::bot(text));
                if let Some(picker) = self.panel.picker.as_mut() {
                    picker.clear();
                }
                self.restore_indicator();
            }
        }
    }

    fn schedule_greeting(&mut self) {
        self.greetings_pending += 1;
        let delay = self.greeting_delay;
        let tx = self.done_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Completion::Greeting);
        });
    }

    fn send_message(&mut self) {
        let text = self.panel.input.value().trim().to_string();
        if text.is_empty() {
            return;
        }

        self.append(Message::you(text.clone()));
        self.panel.input.clear();

        let id = self.begin_turn(TurnKind::Chat);
        let backend = Arc::clone(&self.backend);
        let tx = self.done_tx.clone();
        tokio::spawn(async move {
            let result = backend.chat(&text).await;
            let _ = tx.send(Completion::Chat(id, result));
        });
    }

    fn open_picker(&mut self) {
        if !self.features.image_upload {
            return;
        }
        if let Some(picker) = self.panel.picker.as_mut() {
            picker.open();
        }
    }

    fn upload_selection(&mut self, files: Vec<Attachment>) {
        if !self.features.image_upload {
            debug!("image upload disabled, ignoring file selection");
            return;
        }
        let Some(picker) = self.panel.picker.as_mut() else {
            return;
        };
        picker.set_selection(files);
        let Some(file) = picker.selection().into_iter().next() else {
            return;
        };

        self.append(Message::you(UPLOAD_NOTICE));

        let id = self.begin_turn(TurnKind::Upload);
        let backend = Arc::clone(&self.backend);
        let tx = self.done_tx.clone();
        tokio::spawn(async move {
            let result = backend.upload(file).await;
            let _ = tx.send(Completion::Upload(id, result));
        });
    }

    fn begin_turn(&mut self, kind: TurnKind) -> TurnId {
        let id = TurnId(self.next_turn);
        self.next_turn += 1;

        let timer = self.features.typing_indicator.then(|| {
            let delay = self.typing_delay;
            let tx = self.done_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(Completion::TypingDue(id));
            })
        });

        debug!(turn = id.0, ?kind, "turn started");
        self.pending.insert(
            id,
            PendingTurn {
                kind,
                phase: Phase::Waiting,
                timer,
            },
        );
        id
    }

    fn show_indicator(&mut self, id: TurnId) {
        let Some(turn) = self.pending.get_mut(&id) else {
            debug!(turn = id.0, "typing timer fired after turn settled");
            return;
        };
        if turn.phase != Phase::Waiting {
            return;
        }
        turn.phase = Phase::IndicatorShown;
        if self.panel.log.insert_indicator() {
            self.panel.log.scroll_to_latest();
        }
    }

    /// Moves a turn to done. Runs at most once per turn: the pending entry is
    /// removed here, the timer is aborted and any indicator is taken down.
    fn settle(&mut self, id: TurnId) -> Option<PendingTurn> {
        let Some(turn) = self.pending.remove(&id) else {
            warn!(turn = id.0, "completion for unknown turn");
            return None;
        };
        if let Some(timer) = &turn.timer {
            timer.abort();
        }
        self.panel.log.remove_indicator();
        debug!(turn = id.0, kind = ?turn.kind, phase = ?turn.phase, "turn settled");
        Some(turn)
    }

    /// Puts the indicator back below the newest message while another turn
    /// is still past its typing delay.
    fn restore_indicator(&mut self) {
        let overdue = self
            .pending
            .values()
            .any(|turn| turn.phase == Phase::IndicatorShown);
        if overdue && self.panel.log.insert_indicator() {
            self.panel.log.scroll_to_latest();
        }
    }

    fn append(&mut self, message: Message) {
        self.panel.log.append(&message);
        self.panel.log.scroll_to_latest();
    }
}
