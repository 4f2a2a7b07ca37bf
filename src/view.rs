//! UI handles the controller drives.
//!
//! Each trait stands for one element role on the host page. A [`Panel`] bundles
//! them and is validated once at construction, so the controller never has to
//! cope with a missing element at runtime.

use crate::config::FeaturesConfig;
use crate::error::{ChatError, ChatResult};
use crate::types::{Attachment, Message};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// The scrollable, append-only message list.
pub trait MessageLog: Send {
    fn append(&mut self, message: &Message);

    /// Inserts the typing indicator. Returns `false` if one is already shown.
    fn insert_indicator(&mut self) -> bool;

    /// Removes the typing indicator. Returns `false` if none was shown.
    fn remove_indicator(&mut self) -> bool;

    fn scroll_to_latest(&mut self);
}

pub trait TextInput: Send {
    fn value(&self) -> String;
    fn set_value(&mut self, value: &str);
    fn clear(&mut self);
}

pub trait FilePicker: Send {
    fn open(&mut self);
    fn selection(&self) -> Vec<Attachment>;
    fn set_selection(&mut self, files: Vec<Attachment>);
    fn clear(&mut self);
}

pub struct Panel {
    pub(crate) log: Box<dyn MessageLog>,
    pub(crate) input: Box<dyn TextInput>,
    pub(crate) picker: Option<Box<dyn FilePicker>>,
}

#[derive(Default)]
pub struct PanelBuilder {
    log: Option<Box<dyn MessageLog>>,
    input: Option<Box<dyn TextInput>>,
    picker: Option<Box<dyn FilePicker>>,
}

impl PanelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message_log(mut self, log: impl MessageLog + 'static) -> Self {
        self.log = Some(Box::new(log));
        self
    }

    pub fn text_input(mut self, input: impl TextInput + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    pub fn file_picker(mut self, picker: impl FilePicker + 'static) -> Self {
        self.picker = Some(Box::new(picker));
        self
    }

    /// Fails with [`ChatError::MissingElement`] when a handle needed by the
    /// enabled features was never supplied.
    pub fn build(self, features: &FeaturesConfig) -> ChatResult<Panel> {
        let log = self.log.ok_or(ChatError::MissingElement("message log"))?;
        let input = self.input.ok_or(ChatError::MissingElement("text input"))?;
        if features.image_upload && self.picker.is_none() {
            return Err(ChatError::MissingElement("file picker"));
        }
        Ok(Panel {
            log,
            input,
            picker: self.picker,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Message(Message),
    TypingIndicator,
}

/// Every mutation a [`MemoryLog`] has seen, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOp {
    Appended(Message),
    IndicatorInserted,
    IndicatorRemoved,
    Scrolled(usize),
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<Entry>,
    ops: Vec<LogOp>,
    scrolled_to: Option<usize>,
}

/// In-memory message list. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    state: Arc<Mutex<LogState>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.state.lock().entries.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state
            .lock()
            .entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Message(message) => Some(message.clone()),
                Entry::TypingIndicator => None,
            })
            .collect()
    }

    pub fn ops(&self) -> Vec<LogOp> {
        self.state.lock().ops.clone()
    }

    pub fn has_indicator(&self) -> bool {
        self.state
            .lock()
            .entries
            .contains(&Entry::TypingIndicator)
    }

    pub fn indicator_insertions(&self) -> usize {
        self.state
            .lock()
            .ops
            .iter()
            .filter(|op| matches!(op, LogOp::IndicatorInserted))
            .count()
    }

    /// Index of the entry last scrolled into view.
    pub fn scrolled_to(&self) -> Option<usize> {
        self.state.lock().scrolled_to
    }
}

impl MessageLog for MemoryLog {
    fn append(&mut self, message: &Message) {
        let mut state = self.state.lock();
        state.entries.push(Entry::Message(message.clone()));
        state.ops.push(LogOp::Appended(message.clone()));
    }

    fn insert_indicator(&mut self) -> bool {
        let mut state = self.state.lock();
        if state.entries.contains(&Entry::TypingIndicator) {
            return false;
        }
        state.entries.push(Entry::TypingIndicator);
        state.ops.push(LogOp::IndicatorInserted);
        true
    }

    fn remove_indicator(&mut self) -> bool {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|entry| *entry != Entry::TypingIndicator);
        if state.entries.len() == before {
            return false;
        }
        state.ops.push(LogOp::IndicatorRemoved);
        true
    }

    fn scroll_to_latest(&mut self) {
        let mut state = self.state.lock();
        let latest = state.entries.len().checked_sub(1);
        state.scrolled_to = latest;
        if let Some(index) = latest {
            state.ops.push(LogOp::Scrolled(index));
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryInput {
    value: Arc<Mutex<String>>,
}

impl MemoryInput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextInput for MemoryInput {
    fn value(&self) -> String {
        self.value.lock().clone()
    }

    fn set_value(&mut self, value: &str) {
        *self.value.lock() = value.to_string();
    }

    fn clear(&mut self) {
        self.value.lock().clear();
    }
}

#[derive(Debug, Default)]
struct PickerState {
    selection: Vec<Attachment>,
    opened: usize,
    cleared: usize,
}

#[derive(Clone, Default)]
pub struct MemoryPicker {
    state: Arc<Mutex<PickerState>>,
    on_open: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl fmt::Debug for MemoryPicker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPicker")
            .field("state", &self.state)
            .field("on_open", &self.on_open.is_some())
            .finish()
    }
}

impl MemoryPicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `hook` whenever the picker is opened.
    pub fn with_open_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(hook));
        self
    }

    pub fn times_opened(&self) -> usize {
        self.state.lock().opened
    }

    pub fn times_cleared(&self) -> usize {
        self.state.lock().cleared
    }
}

impl FilePicker for MemoryPicker {
    fn open(&mut self) {
        self.state.lock().opened += 1;
        if let Some(hook) = &self.on_open {
            hook();
        }
    }

    fn selection(&self) -> Vec<Attachment> {
        self.state.lock().selection.clone()
    }

    fn set_selection(&mut self, files: Vec<Attachment>) {
        self.state.lock().selection = files;
    }

    fn clear(&mut self) {
        let mut state = self.state.lock();
        state.selection.clear();
        state.cleared += 1;
    }
}
