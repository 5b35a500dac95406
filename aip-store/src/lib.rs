//! Local JSON files backing the relay.
//!
//! - [`ChatStore`]: the rolling chat history (`user_history.json`)
//! - [`PersonaStore`]: the user profile and model persona injected into prompts
//!
//! Both tolerate missing or malformed files by reading them as empty.
pub mod history;
pub mod persona;

pub use history::{ChatHistory, ChatStore, Message, Role};
pub use persona::{ModelInfo, PersonaStore, UserInfo};
