//! Prompt assembly for the review call.

use crate::constants::CHARS_PER_TOKEN;
use crate::models::{AssembledPrompt, DiffResult, RepoSnapshot};

/// Combine snapshot, diff, query and documents into the final prompt.
pub fn assemble(
    snapshot: &RepoSnapshot,
    diff: &DiffResult,
    query: &str,
    base_branch: &str,
    documents: &str,
) -> AssembledPrompt {
    let mut text = format!(
        "<current-repository>\n{}\n</current-repository>\n\n\
         <changes base=\"{base_branch}\">\n{}\n</changes>\n\n\
         <query>\n{query}\n</query>",
        snapshot.content, diff.diff_text
    );

    let has_documents = !documents.is_empty();
    if has_documents {
        text.push_str("\n\nCONTEXT DOCUMENT:\n");
        text.push_str(documents);
    }

    AssembledPrompt {
        text,
        system_prompt: system_prompt(has_documents),
        has_documents,
        estimated_context_tokens: snapshot.token_count
            + diff.diff_text.len() / CHARS_PER_TOKEN
            + documents.len() / CHARS_PER_TOKEN,
    }
}

/// Reviewer instructions. The input list mentions the context document only
/// when one is attached.
pub fn system_prompt(has_documents: bool) -> String {
    let mut prompt = String::from(
        "You are an expert code reviewer analyzing repository changes.\n\
         You will be provided with:\n\
         1. The current state of the repository (full context)\n\
         2. A git diff showing what changed from the base branch\n\
         3. A specific query or review request from the user\n",
    );
    if has_documents {
        prompt.push_str("4. Additional context document from the user\n");
    }
    prompt.push_str(
        "\nAnalyze the changes in the context of the full repository and provide a \
         comprehensive review based on the user's query.\n\
         Focus on the changes shown in the diff, but use the full repository context \
         to understand the impact.\n\n\
         Be specific and reference exact file names and line numbers when discussing changes.",
    );
    prompt
}
