//! Diversity selector — forces regenerated drafts to differ
//!
//! Used only on the regeneration path when no explicit feedback is given:
//! one challenge (per prospect) and one highlight line (per request) are
//! picked at random to steer the model away from the prior draft. The
//! randomness sits behind `ChoiceSource` so tests can inject a fixed
//! sequence and assert on the chosen index.

use outreach_core::models::Challenge;
use rand::Rng;

pub trait ChoiceSource: Send {
    /// Pick an index in `0..len`. Never called with `len < 2`.
    fn pick(&mut self, len: usize) -> usize;
}

/// Production source backed by the thread RNG.
#[derive(Debug, Default)]
pub struct RngChoice;

impl ChoiceSource for RngChoice {
    fn pick(&mut self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Deterministic source for tests: yields a fixed sequence of indices,
/// clamped into range, then repeats the last one.
#[derive(Debug)]
pub struct SeqChoice {
    picks: Vec<usize>,
    next: usize,
}

impl SeqChoice {
    pub fn new(picks: Vec<usize>) -> Self {
        Self { picks, next: 0 }
    }

    /// How many picks have been consumed.
    pub fn consumed(&self) -> usize {
        self.next
    }
}

impl ChoiceSource for SeqChoice {
    fn pick(&mut self, len: usize) -> usize {
        let idx = self
            .picks
            .get(self.next)
            .or_else(|| self.picks.last())
            .copied()
            .unwrap_or(0);
        self.next += 1;
        idx.min(len.saturating_sub(1))
    }
}

/// Pick one challenge to keep. A single-challenge set is returned as-is
/// without consulting the source.
pub fn pick_challenge<'a>(
    challenges: &'a [Challenge],
    chooser: &mut dyn ChoiceSource,
) -> Option<&'a Challenge> {
    match challenges.len() {
        0 => None,
        1 => challenges.first(),
        len => challenges.get(chooser.pick(len)),
    }
}

/// Pick one non-blank highlight line. Single-line text is returned as-is
/// without consulting the source.
pub fn pick_highlight_line<'a>(
    highlights: &'a str,
    chooser: &mut dyn ChoiceSource,
) -> Option<&'a str> {
    let lines: Vec<&str> = highlights
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    match lines.len() {
        0 => None,
        1 => Some(lines[0]),
        len => Some(lines[chooser.pick(len)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn challenge(text: &str) -> Challenge {
        Challenge {
            id: Uuid::new_v4(),
            prospect_id: Uuid::new_v4(),
            challenge: text.to_string(),
            relevance: "r".to_string(),
        }
    }

    #[test]
    fn test_pick_challenge_uses_injected_index() {
        let challenges = vec![challenge("a"), challenge("b"), challenge("c")];
        let mut chooser = SeqChoice::new(vec![2]);
        let picked = pick_challenge(&challenges, &mut chooser).unwrap();
        assert_eq!(picked.challenge, "c");
        assert_eq!(chooser.consumed(), 1);
    }

    #[test]
    fn test_single_challenge_skips_chooser() {
        let challenges = vec![challenge("only")];
        let mut chooser = SeqChoice::new(vec![5]);
        let picked = pick_challenge(&challenges, &mut chooser).unwrap();
        assert_eq!(picked.challenge, "only");
        assert_eq!(chooser.consumed(), 0, "single item must not consume a pick");
    }

    #[test]
    fn test_empty_challenges_yield_none() {
        let mut chooser = SeqChoice::new(vec![0]);
        assert!(pick_challenge(&[], &mut chooser).is_none());
    }

    #[test]
    fn test_pick_highlight_line_filters_blank_lines() {
        let highlights = "shipped a payments platform\n\n  \nled a team of six\n";
        let mut chooser = SeqChoice::new(vec![1]);
        let line = pick_highlight_line(highlights, &mut chooser).unwrap();
        assert_eq!(line, "led a team of six");
    }

    #[test]
    fn test_single_line_skips_chooser() {
        let mut chooser = SeqChoice::new(vec![9]);
        let line = pick_highlight_line("one achievement", &mut chooser).unwrap();
        assert_eq!(line, "one achievement");
        assert_eq!(chooser.consumed(), 0);
    }

    #[test]
    fn test_seq_choice_clamps_out_of_range() {
        let mut chooser = SeqChoice::new(vec![10]);
        assert_eq!(chooser.pick(3), 2);
    }

    #[test]
    fn test_rng_choice_stays_in_range() {
        let mut chooser = RngChoice;
        for _ in 0..100 {
            assert!(chooser.pick(4) < 4);
        }
    }
}
