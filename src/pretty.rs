//! Human-readable rendering for the server console.

use owo_colors::OwoColorize;
use std::collections::BTreeMap;

use pokerd_shared::{Action, Card, CardSuit, PlayerId};

pub fn format_card(card: Card, color: bool) -> String {
    let text = card.tag();
    if color && matches!(card.suit(), CardSuit::Hearts | CardSuit::Diamonds) {
        text.red().to_string()
    } else {
        text
    }
}

pub fn format_cards(cards: &[Card], color: bool) -> String {
    cards
        .iter()
        .map(|&c| format_card(c, color))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn describe_action(player: PlayerId, action: Action) -> String {
    match action {
        Action::Fold => format!("Player {player} folds"),
        Action::Check => format!("Player {player} checks"),
        Action::Call => format!("Player {player} calls"),
        Action::Raise(a) => format!("Player {player} raises {a}"),
        Action::AllIn(a) => format!("Player {player} moves all-in for {a}"),
    }
}

pub fn format_scores(scores: &BTreeMap<PlayerId, i64>, color: bool) -> String {
    scores
        .iter()
        .map(|(player, &score)| {
            let delta = if score >= 0 {
                let s = format!("+{score}");
                if color {
                    s.green().to_string()
                } else {
                    s
                }
            } else {
                let s = score.to_string();
                if color {
                    s.red().to_string()
                } else {
                    s
                }
            };
            format!("{player}: {delta}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_rendering_has_no_escape_codes() {
        let card: Card = "Ah".parse().unwrap();
        assert_eq!(format_card(card, false), "Ah");
        let scores = BTreeMap::from([(PlayerId(1), -5i64), (PlayerId(2), 5i64)]);
        assert_eq!(format_scores(&scores, false), "1: -5, 2: +5");
    }

    #[test]
    fn action_descriptions_name_the_player() {
        assert_eq!(
            describe_action(PlayerId(3), Action::Raise(40)),
            "Player 3 raises 40"
        );
    }
}
