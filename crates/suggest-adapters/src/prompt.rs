//! Prompt text and response parsing for quick replies.

use crate::MAX_SUGGESTIONS;

pub(crate) fn build_prompt(incoming_text: &str, sender_name: &str, recipient_name: &str) -> String {
    format!(
        "You are a helpful office assistant for an internal chat app.\n\
         User '{sender_name}' sent this message: \"{incoming_text}\" to '{recipient_name}'.\n\
         Generate 3 short, professional, and context-aware quick replies in Italian that \
         '{recipient_name}' can send back.\n\
         Strictly return a JSON array of strings.\n\
         Examples: [\"Ricevuto, grazie.\", \"Arrivo subito.\", \"Sono occupato, ti scrivo dopo.\"]"
    )
}

/// Parses the model output as a JSON array of strings. Blank entries are
/// dropped and the list is capped; anything else yields `None`.
pub(crate) fn parse_replies(raw: &str) -> Option<Vec<String>> {
    let replies: Vec<String> = serde_json::from_str(raw.trim()).ok()?;
    Some(
        replies
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .take(MAX_SUGGESTIONS)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_both_participants() {
        let prompt = build_prompt("Puoi venire in ufficio oggi?", "Franco C.", "Giovanni C.");
        assert!(prompt.contains("User 'Franco C.' sent this message: \"Puoi venire in ufficio oggi?\""));
        assert!(prompt.contains("'Giovanni C.' can send back"));
        assert!(prompt.contains("JSON array of strings"));
    }

    #[test]
    fn caps_at_three_and_drops_blanks() {
        let parsed = parse_replies(r#"["Sì", " ", "Arrivo", "Dopo", "Domani"]"#).unwrap();
        assert_eq!(parsed, ["Sì", "Arrivo", "Dopo"]);
    }

    #[test]
    fn rejects_anything_but_a_string_array() {
        assert!(parse_replies("Ricevuto").is_none());
        assert!(parse_replies(r#"{"replies": []}"#).is_none());
        assert!(parse_replies("[1, 2]").is_none());
    }
}
