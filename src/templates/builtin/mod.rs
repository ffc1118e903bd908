use std::sync::Arc;

use super::TemplateRegistry;

pub mod audio;
pub mod notes;
pub mod text;

pub fn register_all(registry: &mut TemplateRegistry) {
    registry.register("random_text", Arc::new(text::RandomText));
    registry.register("random_file", Arc::new(text::RandomFile));
    registry.register("static_reply", Arc::new(text::StaticReply));
    registry.register("help_text", Arc::new(text::HelpText));
    registry.register("list_commands", Arc::new(text::ListCommands));
    registry.register("note", Arc::new(notes::Note));
    registry.register("play_youtube", Arc::new(audio::PlayYoutube));
    registry.register("play_radio", Arc::new(audio::PlayRadio));
}
