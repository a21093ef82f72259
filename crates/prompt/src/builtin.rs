//! Prompts shipped with PolicyQA.

use crate::types::{PromptDefinition, PromptInputSpec, PromptOutputSpec};

/// Batch question understanding.
pub const QUERY_PARSE: &str = "query.parse";
/// Grounded answer as a JSON record.
pub const ANSWER_STRUCTURED: &str = "answer.structured";
/// Grounded answer as one sentence.
pub const ANSWER_SENTENCE: &str = "answer.sentence";

const QUERY_PARSE_TEMPLATE: &str = r#"You are an expert in understanding insurance/legal queries.
Parse the following questions and extract for EACH:
- domain (e.g., insurance, legal, healthcare)
- sub_domain (e.g., health, car, life, property, etc.)
- key_clauses (main clause name or type the user is asking about)
- additional_context (any other important details like duration, time period, beneficiary)

Example 1:
Query: "Does my policy cover artificial pregnancy?"
Output:
{
  "query": "Does my policy cover artificial pregnancy?",
  "domain": "insurance",
  "sub_domain": "health",
  "key_clauses": ["artificial pregnancy coverage"],
  "additional_context": ["fertility treatments"]
}

Example 2:
Query: "What is the grace period for premium payment?"
Output:
{
  "query": "What is the grace period for premium payment?",
  "domain": "insurance",
  "sub_domain": "life",
  "key_clauses": ["grace period clause"],
  "additional_context": ["premium due date", "policy lapse rules"]
}

Example 3:
Query: "What is the waiting period before surgery coverage starts?"
Output:
{
  "query": "What is the waiting period before surgery coverage starts?",
  "domain": "insurance",
  "sub_domain": "health",
  "key_clauses": ["waiting period clause"],
  "additional_context": ["surgery eligibility", "policy start date"]
}

Example 4:
Query: "Is accidental death covered under this policy?"
Output:
{
  "query": "Is accidental death covered under this policy?",
  "domain": "insurance",
  "sub_domain": "life",
  "key_clauses": ["accidental death benefit"],
  "additional_context": ["death benefit eligibility", "coverage conditions"]
}

Example 5:
Query: "Does my car insurance include natural disaster damage?"
Output:
{
  "query": "Does my car insurance include natural disaster damage?",
  "domain": "insurance",
  "sub_domain": "vehicle",
  "key_clauses": ["natural disaster coverage"],
  "additional_context": ["comprehensive plan", "flood, earthquake"]
}

Example 6:
Query: "Are pre-existing conditions excluded from this health plan?"
Output:
{
  "query": "Are pre-existing conditions excluded from this health plan?",
  "domain": "insurance",
  "sub_domain": "health",
  "key_clauses": ["pre-existing condition exclusion"],
  "additional_context": ["chronic illness", "policy limitations"]
}

Now parse the following questions and return a JSON array with exactly one object per question, in the same order, following this pattern:

Questions: {{questions}}
"#;

const ANSWER_STRUCTURED_TEMPLATE: &str = r#"You are an expert insurance policy assistant.
Answer the question STRICTLY based on the given context.
If the context does not mention the answer, say:
"Information not found in the provided policy document."

Output JSON only in this format:
{
  "query": "{{query}}",
  "answer": "<one-line answer or 'Information not found in the provided policy document.'>",
  "supporting_clauses": ["list of relevant clauses from context"],
  "explanation": "short reasoning (1-2 sentences)"
}

-----
Policy Context:
{{context}}
-----
Additional Parsed Info:
{{parsed_info}}
"#;

const ANSWER_SENTENCE_TEMPLATE: &str = r#"You are an expert insurance policy assistant.
Based strictly on the provided policy context, answer the question in ONE clear and complete sentence.

If the context does not include the answer, say:
"Information not found in the provided policy document. or no this is not covered under the policy."

-----
Question: {{query}}

Policy Context:
{{context}}
-----
Additional Info:
{{parsed_info}}
"#;

/// Look up a built-in prompt by id.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    let (title, variables, template, format): (&str, &[&str], &str, &str) = match id {
        QUERY_PARSE => (
            "Structured query understanding",
            &["questions"],
            QUERY_PARSE_TEMPLATE,
            "json",
        ),
        ANSWER_STRUCTURED => (
            "Grounded structured answer",
            &["query", "context", "parsed_info"],
            ANSWER_STRUCTURED_TEMPLATE,
            "json",
        ),
        ANSWER_SENTENCE => (
            "Grounded one-sentence answer",
            &["query", "context", "parsed_info"],
            ANSWER_SENTENCE_TEMPLATE,
            "text",
        ),
        _ => return None,
    };

    Some(PromptDefinition {
        id: id.to_string(),
        title: title.to_string(),
        api_version: "1.0".to_string(),
        created_by: "policyqa".to_string(),
        input: PromptInputSpec {
            variables: variables.iter().map(|v| v.to_string()).collect(),
        },
        template: template.to_string(),
        output: PromptOutputSpec {
            format: format.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_resolve() {
        for id in [QUERY_PARSE, ANSWER_STRUCTURED, ANSWER_SENTENCE] {
            let def = builtin_prompt(id).unwrap();
            assert_eq!(def.id, id);
            for var in &def.input.variables {
                assert!(
                    def.template.contains(&format!("{{{{{}}}}}", var)),
                    "{} does not reference {}",
                    id,
                    var
                );
            }
        }
    }

    #[test]
    fn test_query_parse_has_six_examples() {
        let def = builtin_prompt(QUERY_PARSE).unwrap();
        assert_eq!(def.template.matches("Example ").count(), 6);
        assert!(def.template.contains("artificial pregnancy"));
        assert!(def.template.contains("pre-existing condition exclusion"));
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin_prompt("agent.ask.default").is_none());
    }
}
