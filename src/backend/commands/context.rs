use std::collections::HashMap;

use crate::backend::discord::{CommandOption, Interaction};

/// A slash command invocation with its options flattened by name
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub command_name: String,
    pub options: HashMap<String, serde_json::Value>,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    /// Username of whoever invoked the command
    pub invoker: Option<String>,
}

impl CommandContext {
    /// Build a context from an interaction, `None` if it carries no command
    pub fn from_interaction(interaction: &Interaction) -> Option<Self> {
        let data = interaction.data.as_ref()?;
        let mut options = HashMap::new();
        flatten(&data.options, &mut options);

        Some(Self {
            command_name: data.name.clone(),
            options,
            channel_id: interaction.channel_id().map(str::to_string),
            channel_name: interaction.channel_name().map(str::to_string),
            invoker: interaction.invoker().map(|user| user.username.clone()),
        })
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.options
            .get(name)
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.options.get(name).and_then(|value| value.as_i64())
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.options.get(name).and_then(|value| value.as_bool())
    }
}

// Subcommand groups nest their options one level down
fn flatten(options: &[CommandOption], out: &mut HashMap<String, serde_json::Value>) {
    for option in options {
        match &option.value {
            Some(value) => {
                out.insert(option.name.clone(), value.clone());
            }
            None => flatten(&option.options, out),
        }
    }
}
