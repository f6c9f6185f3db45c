//! Diarized dialogue script parsing.
//!
//! A script is plain text where each turn starts at the beginning of a line
//! with a configured speaker name and a colon:
//!
//! ```text
//! Herman: Welcome back! Today we're digging into tide pools.
//! Emma: And there's more going on in them than most people think.
//! ```
//!
//! Lines without a known speaker prefix continue the current turn; anything
//! before the first known speaker is ignored.

use crate::config::SpeakerConfig;
use crate::episode::segment::DialogueTurn;
use tracing::debug;

/// Parse a script into turns, assigning each speaker's configured voice.
///
/// Blank turns are dropped. Continuation lines are joined with a space.
pub fn parse_script(script: &str, speakers: &[SpeakerConfig]) -> Vec<DialogueTurn> {
    let mut turns: Vec<DialogueTurn> = Vec::new();
    let mut current: Option<DialogueTurn> = None;

    for line in script.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((speaker, text)) = match_speaker(line, speakers) {
            if let Some(turn) = current.take() {
                push_turn(&mut turns, turn);
            }
            current = Some(DialogueTurn::new(
                Some(&speaker.name),
                text,
                speaker.voice.clone(),
            ));
        } else if let Some(turn) = current.as_mut() {
            if !turn.text.is_empty() {
                turn.text.push(' ');
            }
            turn.text.push_str(line);
        }
    }

    if let Some(turn) = current {
        push_turn(&mut turns, turn);
    }

    debug!("Parsed {} dialogue turns", turns.len());
    turns
}

fn match_speaker<'a, 'l>(
    line: &'l str,
    speakers: &'a [SpeakerConfig],
) -> Option<(&'a SpeakerConfig, &'l str)> {
    speakers.iter().find_map(|speaker| {
        line.strip_prefix(speaker.name.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .map(|text| (speaker, text.trim()))
    })
}

fn push_turn(turns: &mut Vec<DialogueTurn>, mut turn: DialogueTurn) {
    let trimmed = turn.text.trim();
    if trimmed.is_empty() {
        return;
    }
    if trimmed.len() != turn.text.len() {
        turn.text = trimmed.to_string();
    }
    turns.push(turn);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthesisConfig;

    fn speakers() -> Vec<SpeakerConfig> {
        SynthesisConfig::default().speakers
    }

    #[test]
    fn parses_alternating_speakers_with_voices() {
        let script = "Herman: Welcome back to the show!\n\
                      Emma: Thanks, great to be here.\n\
                      Herman: Let's dive in.";

        let turns = parse_script(script, &speakers());

        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0], DialogueTurn::new(Some("Herman"), "Welcome back to the show!", "am_adam"));
        assert_eq!(turns[1], DialogueTurn::new(Some("Emma"), "Thanks, great to be here.", "bf_emma"));
        assert_eq!(turns[2].text, "Let's dive in.");
    }

    #[test]
    fn continuation_lines_join_current_turn() {
        let script = "Emma: The first part of a long thought\n\
                      that keeps going on the next line.\n\
                      \n\
                      Herman: Wow.";

        let turns = parse_script(script, &speakers());

        assert_eq!(turns.len(), 2);
        assert_eq!(
            turns[0].text,
            "The first part of a long thought that keeps going on the next line."
        );
    }

    #[test]
    fn preamble_before_first_speaker_is_ignored() {
        let script = "Here is your script:\n\nHerman: Hello.";
        let turns = parse_script(script, &speakers());

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].text, "Hello.");
    }

    #[test]
    fn unknown_speaker_lines_are_continuations() {
        let script = "Herman: Hi.\nNarrator: this is not a configured speaker";
        let turns = parse_script(script, &speakers());

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].text, "Hi. Narrator: this is not a configured speaker");
    }

    #[test]
    fn empty_turns_are_dropped() {
        let script = "Herman:\nEmma:   \nHerman: Finally some words.";
        let turns = parse_script(script, &speakers());

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].speaker.as_deref(), Some("Herman"));
    }

    #[test]
    fn speaker_prefix_requires_colon() {
        let script = "Herman: Start.\nHermannn said something";
        let turns = parse_script(script, &speakers());
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].text, "Start. Hermannn said something");
    }

    #[test]
    fn empty_script_yields_no_turns() {
        assert!(parse_script("", &speakers()).is_empty());
        assert!(parse_script("no speakers here at all", &speakers()).is_empty());
    }

    #[test]
    fn custom_speakers_are_honoured() {
        let speakers = vec![SpeakerConfig {
            name: "Corn".to_string(),
            voice: "bm_george".to_string(),
        }];
        let turns = parse_script("Corn: Pop!\nHerman: ignored speaker", &speakers);

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].voice, "bm_george");
        assert_eq!(turns[0].text, "Pop! Herman: ignored speaker");
    }
}
