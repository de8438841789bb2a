use poise::serenity_prelude::{
    Colour, CreateEmbed, CreateEmbedAuthor, Timestamp, User,
};

use crate::services::tickets::ticket_db::CollectedResponse;

/// Deals with standardization of embeds to keep them consistent throughout the bot

pub enum EmbedColor {
    Success,
    Error,
    Info,
    Warning,
}

impl EmbedColor {
    /// Convert to rgb colors
    pub fn to_colour(&self) -> Colour {
        match self {
            EmbedColor::Success => Colour::from_rgb(0, 255, 0),
            EmbedColor::Error => Colour::from_rgb(255, 0, 0),
            EmbedColor::Info => Colour::from_rgb(0, 153, 255),
            EmbedColor::Warning => Colour::from_rgb(255, 170, 0),
        }
    }
}

/// Generate a default embed
pub fn default_embed(color: EmbedColor) -> CreateEmbed {
    CreateEmbed::new().colour(color.to_colour())
}

/// Cut a string down to `max_length`, appending `...` when anything was dropped
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    // No room for an ellipsis below 4 characters, just hard-cut
    if max_length <= 3 {
        return text.chars().take(max_length).collect();
    }
    let cut: String = text.chars().take(max_length - 3).collect();
    format!("{cut}...")
}

/// Aggregate transcript of a completed form, posted to the guild's target channel
pub fn form_transcript_embed(user: &User, responses: &[CollectedResponse]) -> CreateEmbed {
    let mut embed = default_embed(EmbedColor::Info)
        .title("New Ticket Form Submission")
        .author(CreateEmbedAuthor::new(user.name.clone()).icon_url(user.face()))
        .description(format!("**User:** <@{}>\n**User ID:** {}", user.id, user.id))
        .timestamp(Timestamp::now());
    for response in responses {
        // 1024 is discord's embed field value limit
        embed = embed.field(
            response.question_text.clone(),
            truncate_text(&response.response_text, 1024),
            false,
        );
    }
    embed
}

#[cfg(test)]
mod tests {
    use super::truncate_text;

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate_text("hello", 100), "hello");
        assert_eq!(truncate_text("", 10), "");
    }

    #[test]
    fn truncate_cuts_long_text_with_ellipsis() {
        let long = "a".repeat(120);
        let cut = truncate_text(&long, 100);
        assert_eq!(cut.chars().count(), 100);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn truncate_never_exceeds_tiny_limits() {
        for max_length in 0..=3 {
            let cut = truncate_text("abcdef", max_length);
            assert_eq!(cut.chars().count(), max_length);
        }
        assert_eq!(truncate_text("abcdef", 2), "ab");
    }
}
