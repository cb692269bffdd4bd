//! A floating, draggable chat launcher that opens a panel talking to an
//! OpenAI-compatible completion endpoint, packaged as an iced component.

pub mod completion;
pub mod config;
pub mod launcher;
pub mod message;
pub mod placement;
pub mod store;
pub mod upload;
pub mod widget;

pub use completion::{CompletionClient, CompletionError, CompletionRequest, HttpCompletionClient};
pub use config::Config;
pub use store::MessageStore;
pub use widget::ChatWidget;
