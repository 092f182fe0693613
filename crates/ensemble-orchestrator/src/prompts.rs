//! Prompt text and the result blocks spliced into collaborator requests.

use crate::types::TaskResult;

/// Default system prompt for task decomposition.
pub const DECOMPOSITION_SYSTEM_PROMPT: &str = "\
You coordinate a team of specialised agents. Split the user's request into the \
smallest set of subtasks those agents can carry out.

Agents:
- GPA: general-purpose agent. Web search, calculations and code execution, \
reading attached files, generating images, general knowledge.
- UMS: user management service agent. Searching, creating, updating and \
deleting users in the user management system.

Rules:
- Give every subtask a unique positive task_id, starting at 1.
- Each task_description must be self-contained: the agent sees only that text \
and, when depends_on is set, the result of that one task.
- Use depends_on only when a task truly needs another task's output. It may \
name a task from this round or from the results of previous rounds.
- If previous results are provided and they already answer the request, return \
no subtasks and set stop to true. Never repeat a task that already succeeded.
- Answer strictly in the requested JSON format.";

/// Default system prompt for the final answer.
pub const AGGREGATION_SYSTEM_PROMPT: &str = "\
You combine the work of several specialised agents into one answer for the user. \
Use only the successful task results; do not mention failed tasks, task ids or \
agent names unless the user asked about them. If the results do not answer the \
request, say what could not be done. Reply in the user's language and format \
the answer for readability.";

/// Closing instruction of the aggregation request.
pub const SYNTHESIS_INSTRUCTION: &str =
    "Please synthesize the agent results into a coherent response for the user.";

/// Header plus one JSON line per result.
pub fn results_block(header: &str, results: &[TaskResult]) -> String {
    let mut block = format!("{header}\n\n");
    for result in results {
        block.push_str(&result.to_json());
        block.push('\n');
    }
    block
}

/// User content for a decomposition round that has prior results.
pub fn decomposition_user_content(results: &[TaskResult], original: &str) -> String {
    format!(
        "{}\n---\n\n{original}",
        results_block("## Results from previous tasks:", results)
    )
}

/// User content for the aggregation request.
pub fn aggregation_user_content(results: &[TaskResult], original: &str) -> String {
    format!(
        "{}\n---\n\n# Original User Request:\n{original}\n\n{SYNTHESIS_INSTRUCTION}",
        results_block("# Tasks Results:", results)
    )
}
