use serde_json::Value;

const USER_REQUEST_PLACEHOLDER: &str = "{{user_request}}";
const CURRENT_WORKFLOW_PLACEHOLDER: &str = "{{current_workflow}}";

/// Instruction template for workflow edits.
pub const EDITOR_PROMPT: &str = r#"You are an n8n Workflow Editor AI Assistant.

Your job: Modify n8n workflows based on user requests.

CRITICAL RULES:
1. Output ONLY valid JSON (no explanations, no markdown)
2. Return ONLY these fields: { "name", "nodes", "connections", "settings" }
3. Do NOT include: id, createdAt, updatedAt, active, isArchived, tags, versionId
4. n8n uses "disabled": true in node parameters to disable nodes - if user says "remove disabled nodes", filter out nodes where parameters.disabled === true
5. When removing nodes, also remove their connections
6. Keep all other nodes and connections unchanged unless explicitly requested

n8n Node Structure:
- Each node has: id, name, type, typeVersion, position, parameters, credentials
- "disabled" nodes have: "parameters": { "disabled": true, ... }
- Connections format: { "NodeName": { "main": [[ { "node": "TargetNode", "type": "main", "index": 0 } ]] } }

Common User Requests:
- "remove disabled nodes" → Filter out nodes where parameters.disabled === true
- "remove [node name]" → Remove node by name and its connections
- "add delay" → Add n8n-nodes-base.wait node with amount/unit parameters
- "undo" → You CANNOT undo, respond with explanation

User Request: {{user_request}}

Current Workflow (JSON):
{{current_workflow}}

RETURN ONLY: { "name": "...", "nodes": [...], "connections": {...}, "settings": {...} }"#;

/// Substitute the first occurrence of each placeholder in `template`.
///
/// The workflow is substituted first, so placeholder text inside the user
/// request is left exactly as typed.
pub fn build_prompt(template: &str, user_request: &str, current_workflow: &str) -> String {
    template
        .replacen(CURRENT_WORKFLOW_PLACEHOLDER, current_workflow, 1)
        .replacen(USER_REQUEST_PLACEHOLDER, user_request, 1)
}

/// [`build_prompt`] with the workflow document pretty-printed as received.
pub fn build_editor_prompt(template: &str, user_request: &str, current_workflow: &Value) -> String {
    let workflow_json = serde_json::to_string_pretty(current_workflow).unwrap_or_default();
    build_prompt(template, user_request, &workflow_json)
}

/// Follow-up turn sent when the previous answer could not be used.
pub fn repair_instruction(error: &str) -> String {
    format!(
        "Your previous output was not valid JSON: {}\n\nReturn ONLY the corrected workflow as a single JSON object with the fields name, nodes, connections and settings.",
        error
    )
}
