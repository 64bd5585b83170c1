//! Instruction prompt sent to the generation backend.

use crate::models::GenerationRequest;
use crate::parser::ANSWER_DELIMITER;

/// Build the deterministic instruction prompt for a request.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "Generate {} {} {} questions about the following topics: {}.\n\n",
        request.requested_count,
        request.difficulty,
        request.question_type,
        request.topics.join(", ")
    );

    prompt.push_str("Formatting rules:\n");
    prompt.push_str("- Number every question: 1., 2., 3., and so on, each at the start of a line.\n");
    if offers_choices(&request.question_type) {
        prompt.push_str(
            "- List four options under each question, one per line, lettered A), B), C) and D).\n",
        );
    }
    prompt.push_str(&format!(
        "- After the question{} write {} followed by the correct answer.\n",
        if offers_choices(&request.question_type) {
            " and its options"
        } else {
            ""
        },
        ANSWER_DELIMITER
    ));
    prompt.push_str("- Leave one blank line between questions.\n");
    prompt.push_str("- Do not add an introduction, explanations or closing remarks.\n\n");

    prompt.push_str("Example:\n");
    if offers_choices(&request.question_type) {
        prompt.push_str("1. What is the capital of France?\nA) Berlin\nB) Paris\nC) Madrid\nD) Rome\n");
        prompt.push_str(&format!("{} B) Paris\n", ANSWER_DELIMITER));
    } else {
        prompt.push_str("1. What is the capital of France?\n");
        prompt.push_str(&format!("{} Paris\n", ANSWER_DELIMITER));
    }

    prompt
}

fn offers_choices(question_type: &str) -> bool {
    question_type.to_lowercase().contains("choice")
}
