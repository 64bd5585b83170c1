//! Extraction of question/answer pairs from free-form generated text.
//!
//! The backend is asked to number each question and to separate it from its answer
//! with `||`, but nothing guarantees it does. Extraction therefore runs an ordered
//! list of strategies and keeps the first one that yields at least one valid pair:
//!
//! 1. numbered blocks (`1.`, `2.`, ... at the start of a line)
//! 2. paragraph blocks separated by blank lines
//! 3. a line-by-line scan that accumulates question lines until a delimiter line
//!
//! Malformed blocks are dropped with a log entry; only a completely unusable reply
//! is an error.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::models::ParsedQuestion;
use crate::{Error, Result};

/// Separates question text (and any options) from the correct answer.
pub const ANSWER_DELIMITER: &str = "||";

/// Serialization artifacts that mark a part as garbage wherever they appear.
const GARBAGE_SUBSTRINGS: &[&str] = &["[object object]"];

/// Placeholder values that mark a part as garbage when they are the whole part.
const GARBAGE_VALUES: &[&str] = &["undefined"];

// A list marker is `digits.` followed by whitespace, so `3.14` never counts as one.
static LIST_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d+\.\s").unwrap());
static BLOCK_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\d+\.\s").unwrap());
static LEADING_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\.(?:\s+|$)").unwrap());
static BLANK_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

type Strategy = fn(&str) -> Option<Vec<ParsedQuestion>>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("numbered", numbered_blocks),
    ("paragraph", paragraph_blocks),
    ("line", line_by_line),
];

/// Parse `raw_text` into at most `requested_count` questions, in source order.
///
/// Fewer questions than requested is not an error, but finding none is. A
/// `requested_count` of 0 is treated as 1.
pub fn parse_questions(raw_text: &str, requested_count: usize) -> Result<Vec<ParsedQuestion>> {
    let text = raw_text.replace("\r\n", "\n");
    let requested_count = requested_count.max(1);

    for (name, strategy) in STRATEGIES {
        match strategy(&text) {
            Some(mut questions) if !questions.is_empty() => {
                debug!(
                    strategy = name,
                    found = questions.len(),
                    requested = requested_count,
                    "Extracted questions"
                );
                questions.truncate(requested_count);
                return Ok(questions);
            }
            _ => debug!(strategy = name, "Strategy produced no questions"),
        }
    }

    Err(Error::Parse(
        "generated text contained no delimited question/answer pairs".to_string(),
    ))
}

/// Split on line-leading list markers. Returns `None` when the text has no markers.
fn numbered_blocks(text: &str) -> Option<Vec<ParsedQuestion>> {
    if !LIST_MARKER_RE.is_match(text) {
        return None;
    }

    let mut segments = BLOCK_SPLIT_RE.split(text);
    let mut questions = Vec::new();

    // Anything before the first split is preamble unless it already holds an answer.
    // It is also the only segment whose list marker the split did not consume.
    if let Some(first) = segments.next() {
        if first.contains(ANSWER_DELIMITER) {
            questions.extend(parse_block(strip_marker(first)));
        }
    }
    questions.extend(segments.filter_map(parse_block));

    Some(questions)
}

fn paragraph_blocks(text: &str) -> Option<Vec<ParsedQuestion>> {
    Some(
        BLANK_LINE_RE
            .split(text)
            .filter_map(|block| parse_block(strip_marker(block)))
            .collect(),
    )
}

fn line_by_line(text: &str) -> Option<Vec<ParsedQuestion>> {
    let mut questions = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines() {
        if let Some((fragment, answer)) = line.split_once(ANSWER_DELIMITER) {
            if !fragment.trim().is_empty() {
                buffer.push(fragment);
            }
            let question = buffer.join("\n");
            buffer.clear();
            if let Some(parsed) = validated_pair(strip_marker(&question), answer) {
                questions.push(parsed);
            }
        } else if LEADING_MARKER_RE.is_match(line) && !buffer.is_empty() {
            warn!(
                discarded_lines = buffer.len(),
                "Question without an answer before the next numbered item"
            );
            buffer.clear();
            buffer.push(line);
        } else if !line.trim().is_empty() {
            buffer.push(line);
        }
    }

    if !buffer.is_empty() {
        warn!(
            discarded_lines = buffer.len(),
            "Unprocessed text left after the last answer"
        );
    }

    Some(questions)
}

/// Split one block at the first delimiter and validate both halves.
fn parse_block(block: &str) -> Option<ParsedQuestion> {
    let block = block.trim();
    if block.is_empty() {
        return None;
    }

    let Some((question, answer)) = block.split_once(ANSWER_DELIMITER) else {
        debug!(block = %preview(block), "Block has no answer delimiter");
        return None;
    };

    validated_pair(question, answer)
}

fn validated_pair(question: &str, answer: &str) -> Option<ParsedQuestion> {
    let question = question.trim();
    let answer = answer.trim();

    if question.is_empty() || answer.is_empty() {
        debug!(question = %preview(question), "Dropping block with an empty part");
        return None;
    }
    if is_garbage(question) || is_garbage(answer) {
        warn!(question = %preview(question), "Dropping block with placeholder text");
        return None;
    }

    Some(ParsedQuestion::new(question, answer))
}

fn strip_marker(text: &str) -> &str {
    match LEADING_MARKER_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

fn is_garbage(part: &str) -> bool {
    let lowered = part.to_lowercase();
    GARBAGE_SUBSTRINGS.iter().any(|g| lowered.contains(g))
        || GARBAGE_VALUES.iter().any(|g| lowered == *g)
}

fn preview(text: &str) -> String {
    text.chars().take(60).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(questions: &[ParsedQuestion]) -> Vec<(&str, &str)> {
        questions
            .iter()
            .map(|q| (q.question_text.as_str(), q.answer_text.as_str()))
            .collect()
    }

    #[test]
    fn test_parses_numbered_blocks_in_order() {
        let text = "1. What is 2+2?\n||4\n2. Capital of France?\n||Paris";
        let questions = parse_questions(text, 5).unwrap();
        assert_eq!(
            pairs(&questions),
            vec![("What is 2+2?", "4"), ("Capital of France?", "Paris")]
        );
    }

    #[test]
    fn test_keeps_multiple_choice_options_in_question() {
        let text = "Here are your questions:\n\
                    1. Which is a Rust keyword?\nA) func\nB) fn\nC) def\nD) lambda\n|| B\n\
                    2. What does `?` do?\nA) panics\nB) propagates errors\nC) loops\nD) nothing\n|| B";
        let questions = parse_questions(text, 10).unwrap();
        assert_eq!(questions.len(), 2);
        assert!(questions[0].question_text.starts_with("Which is a Rust keyword?"));
        assert!(questions[0].question_text.contains("D) lambda"));
        assert_eq!(questions[0].answer_text, "B");
    }

    #[test]
    fn test_truncates_to_requested_count() {
        let text = (1..=5)
            .map(|i| format!("{i}. Question {i}?\n|| Answer {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let questions = parse_questions(&text, 2).unwrap();
        assert_eq!(
            pairs(&questions),
            vec![("Question 1?", "Answer 1"), ("Question 2?", "Answer 2")]
        );
    }

    #[test]
    fn test_under_production_is_not_an_error() {
        let questions = parse_questions("1. Only one?\n|| Yes", 10).unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn test_drops_block_with_empty_answer() {
        let text = "1. First?\n||\n2. Second?\n|| two\n3. Third?\n||   ";
        let questions = parse_questions(text, 10).unwrap();
        assert_eq!(pairs(&questions), vec![("Second?", "two")]);
    }

    #[test]
    fn test_drops_block_with_empty_question() {
        let text = "1. ||orphan answer\n2. Real question?\n|| real answer";
        let questions = parse_questions(text, 10).unwrap();
        assert_eq!(pairs(&questions), vec![("Real question?", "real answer")]);
    }

    #[test]
    fn test_drops_garbage_placeholders_in_either_position() {
        let text = "1. [object Object]\n|| 4\n\
                    2. Capital of Peru?\n|| [object Object]\n\
                    3. Capital of Chile?\n|| undefined\n\
                    4. Capital of Spain?\n|| Madrid";
        let questions = parse_questions(text, 10).unwrap();
        assert_eq!(pairs(&questions), vec![("Capital of Spain?", "Madrid")]);
    }

    #[test]
    fn test_drops_numbered_blocks_without_delimiter() {
        let text = "1. No answer here\n2. Has one?\n|| yes";
        let questions = parse_questions(text, 10).unwrap();
        assert_eq!(pairs(&questions), vec![("Has one?", "yes")]);
    }

    #[test]
    fn test_paragraph_strategy_without_numbering() {
        let text = "What is the boiling point of water?\n|| 100 C\n\n\
                    Who wrote Hamlet?\n|| Shakespeare\n\n\
                    Just some trailing commentary.";
        let questions = parse_questions(text, 10).unwrap();
        assert_eq!(
            pairs(&questions),
            vec![
                ("What is the boiling point of water?", "100 C"),
                ("Who wrote Hamlet?", "Shakespeare"),
            ]
        );
    }

    #[test]
    fn test_paragraph_strategy_tolerates_crlf() {
        let text = "Q one?\r\n|| A one\r\n\r\nQ two?\r\n|| A two";
        let questions = parse_questions(text, 10).unwrap();
        assert_eq!(pairs(&questions), vec![("Q one?", "A one"), ("Q two?", "A two")]);
    }

    #[test]
    fn test_no_delimiter_anywhere_is_a_parse_error() {
        let err = parse_questions("1. What is 2+2?\n2. Capital of France?", 5).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        let err = parse_questions("", 5).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let text = "1. Same?\n|| yes\n2. Same?\n|| yes";
        assert_eq!(parse_questions(text, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_line_scan_joins_question_lines() {
        let questions = line_by_line("Pick one:\nA) red\nB) blue\n|| B").unwrap();
        assert_eq!(pairs(&questions), vec![("Pick one:\nA) red\nB) blue", "B")]);
    }

    #[test]
    fn test_line_scan_discards_unterminated_question() {
        let text = "1. Lost question\nstill lost\n2. Kept question\n|| kept";
        let questions = line_by_line(text).unwrap();
        assert_eq!(pairs(&questions), vec![("Kept question", "kept")]);
    }

    #[test]
    fn test_line_scan_never_emits_trailing_buffer() {
        let questions = line_by_line("Q?\n|| A\ndangling question").unwrap();
        assert_eq!(pairs(&questions), vec![("Q?", "A")]);
    }

    #[test]
    fn test_leading_decimal_in_later_question_is_kept() {
        let text = "1. What is 2+2?\n|| 4\n2. 3.14 approximates which constant?\n|| pi";
        let questions = parse_questions(text, 5).unwrap();
        assert_eq!(
            pairs(&questions),
            vec![("What is 2+2?", "4"), ("3.14 approximates which constant?", "pi")]
        );
    }

    #[test]
    fn test_leading_decimal_in_first_question_is_kept() {
        let text = "1. 2.5 plus 2.5 equals?\n|| 5\n2. 0.5 as a fraction?\n|| 1/2";
        let questions = parse_questions(text, 5).unwrap();
        assert_eq!(
            pairs(&questions),
            vec![("2.5 plus 2.5 equals?", "5"), ("0.5 as a fraction?", "1/2")]
        );
    }

    #[test]
    fn test_decimal_is_not_a_list_marker() {
        let text = "3.14 approximates which constant?\n|| pi";
        assert!(numbered_blocks(text).is_none());
        let questions = parse_questions(text, 5).unwrap();
        assert_eq!(pairs(&questions), vec![("3.14 approximates which constant?", "pi")]);
    }

    #[test]
    fn test_zero_requested_count_still_returns_a_question() {
        let questions = parse_questions("1. Q?\n|| A", 0).unwrap();
        assert_eq!(pairs(&questions), vec![("Q?", "A")]);
    }

    #[test]
    fn test_line_scan_recovers_when_block_strategies_find_nothing() {
        let text = "Q1?\n|| [object Object]\nQ2?\n|| B";
        assert_eq!(paragraph_blocks(text), Some(Vec::new()));
        let questions = parse_questions(text, 5).unwrap();
        assert_eq!(pairs(&questions), vec![("Q2?", "B")]);
    }

    #[test]
    fn test_numbered_strategy_skipped_without_markers() {
        assert!(numbered_blocks("no list here\n|| answer").is_none());
    }
}
