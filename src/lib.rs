//! Client side of the NutriBot nutrition assistant.
//!
//! [`controller::Controller`] drives a chat panel: it captures input, posts
//! messages and grocery photos to the server through a [`backend::ChatBackend`],
//! and renders replies into whatever [`view`] handles it was built with.

pub mod backend;
pub mod cli_adapter;
pub mod config;
pub mod controller;
pub mod error;
pub mod terminal;
pub mod types;
pub mod view;

pub use backend::{ChatBackend, HttpBackend};
pub use config::Config;
pub use controller::{Controller, UiEvent};
pub use error::{ChatError, ChatResult};
pub use types::{Attachment, Message, Sender};
