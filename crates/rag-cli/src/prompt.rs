//! Interactive rebuild prompt.

use std::io::{self, BufRead, IsTerminal, Write};

use rag_indexing::{DecisionPrompt, RebuildDecision};
use rag_vector::IndexState;
use tracing::info;

const MAX_ATTEMPTS: usize = 3;

/// Asks on the terminal what to do with a populated index.
///
/// Without an interactive stdin the existing index is kept.
pub struct InteractivePrompt;

impl DecisionPrompt for InteractivePrompt {
    fn choose(&self, state: IndexState) -> RebuildDecision {
        if !io::stdin().is_terminal() {
            info!(%state, "stdin is not interactive, keeping existing index");
            return RebuildDecision::Skip;
        }
        ask_decision(&mut io::stdin().lock(), &mut io::stderr(), state)
    }
}

/// Read a decision from `input`, re-asking on unknown answers.
///
/// End of input, a read error, or repeated invalid answers mean skip.
pub fn ask_decision<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    state: IndexState,
) -> RebuildDecision {
    for _ in 0..MAX_ATTEMPTS {
        let _ = write!(
            output,
            "Index is {}. [s]kip / [r]ebuild / [i]ncremental? ",
            state
        );
        let _ = output.flush();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match line.parse::<RebuildDecision>() {
            Ok(decision) => return decision,
            Err(e) => {
                let _ = writeln!(output, "{}", e);
            }
        }
    }
    RebuildDecision::Skip
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(input: &str) -> (RebuildDecision, String) {
        let mut output = Vec::new();
        let decision = ask_decision(
            &mut Cursor::new(input.as_bytes()),
            &mut output,
            IndexState::PresentNonEmpty,
        );
        (decision, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_letters_and_words() {
        assert_eq!(ask("r\n").0, RebuildDecision::Rebuild);
        assert_eq!(ask("incremental\n").0, RebuildDecision::Incremental);
        assert_eq!(ask("S\n").0, RebuildDecision::Skip);
    }

    #[test]
    fn test_reasks_after_invalid_answer() {
        let (decision, output) = ask("x\nr\n");
        assert_eq!(decision, RebuildDecision::Rebuild);
        assert!(output.contains("unknown choice 'x'"));
        assert_eq!(output.matches("[s]kip").count(), 2);
    }

    #[test]
    fn test_eof_means_skip() {
        assert_eq!(ask("").0, RebuildDecision::Skip);
        assert_eq!(ask("x\ny\nz\nr\n").0, RebuildDecision::Skip);
    }

    #[test]
    fn test_prompt_names_state() {
        let (_, output) = ask("s\n");
        assert!(output.starts_with("Index is present-nonempty."));
    }
}
