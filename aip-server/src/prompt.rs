//! Prompt assembly from history and persona context.
use aip_config::PromptStyle;
use aip_store::{ModelInfo, UserInfo};

const NO_USER_INFO: &str = "No user info available. ";
const NO_MODEL_INFO: &str = "I’m a nameless AI, just here to help. ";

/// `Previous inputs: a, b. ` or nothing when there is no history.
pub fn history_context(inputs: &[String]) -> String {
    if inputs.is_empty() {
        String::new()
    } else {
        format!("Previous inputs: {}. ", inputs.join(", "))
    }
}

pub fn user_context(user: Option<&UserInfo>) -> String {
    match user {
        Some(u) => format!(
            "User info: Name: {}, Age: {}, Personality: {}, Location: {}, Interests: {}, Preferred tone: {}. ",
            u.name,
            u.age,
            u.personality.join(", "),
            u.location,
            u.interests.join(", "),
            u.tone_preference
        ),
        None => NO_USER_INFO.to_string(),
    }
}

pub fn model_context(model: Option<&ModelInfo>) -> String {
    match model {
        Some(m) => format!(
            "I am {} (aka {}), {}. My tone is {}. ",
            m.name, m.alias, m.description, m.tone
        ),
        None => NO_MODEL_INFO.to_string(),
    }
}

fn instruction(text: &str) -> String {
    format!("Given this input: \"{text}\", provide a context-aware suggestion or response.")
}

/// Everything needed to render one prompt.
pub struct PromptParts<'a> {
    pub text: &'a str,
    pub previous_inputs: &'a [String],
    pub user: Option<&'a UserInfo>,
    pub model: Option<&'a ModelInfo>,
}

pub fn build_prompt(style: PromptStyle, parts: &PromptParts<'_>) -> String {
    let history = history_context(parts.previous_inputs);
    match style {
        PromptStyle::Raw => format!("{history}{}", instruction(parts.text)),
        PromptStyle::Persona => format!(
            "{}{}{history}{}",
            model_context(parts.model),
            user_context(parts.user),
            instruction(parts.text)
        ),
    }
}
