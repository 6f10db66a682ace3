// file: src/index/prompts.rs
// description: prompt templates for answer synthesis and index selection

use crate::models::SearchResult;

pub fn text_qa_prompt(context: &str, question: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {question}\n\
         Answer: "
    )
}

pub fn single_select_prompt(choices: &[&str], question: &str) -> String {
    let numbered = choices
        .iter()
        .enumerate()
        .map(|(i, choice)| format!("({}) {}", i + 1, choice))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Some choices are given below. It is provided in a numbered list (1 to {count}), \
         where each item in the list corresponds to a summary.\n\
         ---------------------\n\
         {numbered}\n\
         ---------------------\n\
         Using only the choices above and not prior knowledge, return the choice that is \
         most relevant to the question: '{question}'\n\
         Respond with a JSON object of the form {{\"choice\": <number>, \"reason\": \"<text>\"}}.",
        count = choices.len()
    )
}

/// Retrieved nodes joined into a prompt context block.
pub fn build_context(nodes: &[SearchResult]) -> String {
    nodes
        .iter()
        .map(|node| format!("[{}]\n{}", node.location(), node.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_qa_prompt_embeds_context_and_query() {
        let prompt = text_qa_prompt("Revenue was 5M.", "What was revenue?");
        assert!(prompt.contains("Revenue was 5M."));
        assert!(prompt.contains("Query: What was revenue?"));
        assert!(prompt.ends_with("Answer: "));
    }

    #[test]
    fn test_single_select_prompt_numbers_choices() {
        let prompt = single_select_prompt(&["pdf things", "sql things"], "how many rows?");
        assert!(prompt.contains("(1) pdf things"));
        assert!(prompt.contains("(2) sql things"));
        assert!(prompt.contains("1 to 2"));
    }
}
