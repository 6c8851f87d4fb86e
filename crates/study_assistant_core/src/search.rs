//! crates/study_assistant_core/src/search.rs
//!
//! The two-step web-search protocol: a closed yes/no decision, then (on yes)
//! query reduction, the search itself, and a final prompt built from the results.

use tracing::info;

use crate::domain::{Message, ModelChoice, SearchSnippet};
use crate::ports::{LanguageModelService, PortResult, SearchService};

const DECISION_PROMPT: &str = r#"Decide whether answering the following message requires searching the web for current or factual information.

Message:
{query}

Reply with exactly one word: YES or NO."#;

const QUERY_PROMPT: &str = r#"Rewrite the following message as a single concise web search query. Reply with the query only, no quotes, no explanation.

Message:
{query}"#;

const RESULTS_PROMPT: &str = r#"Answer the user's question using the web search results below. Cite the sources you rely on with their markdown links.

Question:
{query}

Search results:
{results}"#;

const NATURAL_PROMPT: &str = "Respond naturally and helpfully to the following message:\n\n{query}";

/// The outcome of the yes/no decision step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDecision {
    Search,
    Skip,
}

/// Normalizes the decision reply; only an exact `YES` triggers a search.
pub fn parse_decision(reply: &str) -> SearchDecision {
    if reply.trim().to_uppercase() == "YES" {
        SearchDecision::Search
    } else {
        SearchDecision::Skip
    }
}

fn clean_query(reply: &str, fallback: &str) -> String {
    let query = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim();
    if query.is_empty() {
        fallback.to_string()
    } else {
        query.to_string()
    }
}

/// Formats each snippet with a markdown-style attributed link.
pub fn format_results(snippets: &[SearchSnippet]) -> String {
    snippets
        .iter()
        .map(|s| format!("- {} ([{}]({}))", s.snippet, s.source, s.link))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The single message sent once search results are in.
pub fn results_prompt(query: &str, snippets: &[SearchSnippet]) -> Message {
    Message::user(
        RESULTS_PROMPT
            .replace("{query}", query)
            .replace("{results}", &format_results(snippets)),
    )
}

/// The single message sent when no search is needed.
pub fn natural_prompt(query: &str) -> Message {
    Message::user(NATURAL_PROMPT.replace("{query}", query))
}

/// What a web-search turn ends up sending, and whether it searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSearchPlan {
    pub messages: Vec<Message>,
    pub search_query: Option<String>,
}

/// Runs the decision protocol for one utterance.
pub async fn plan_web_search(
    llm: &dyn LanguageModelService,
    search: &dyn SearchService,
    utterance: &str,
) -> PortResult<WebSearchPlan> {
    let decision_reply = llm
        .complete(
            ModelChoice::Default,
            &[Message::user(DECISION_PROMPT.replace("{query}", utterance))],
        )
        .await?;

    match parse_decision(&decision_reply) {
        SearchDecision::Skip => {
            info!("Search decision was {:?}; answering without search.", decision_reply.trim());
            Ok(WebSearchPlan {
                messages: vec![natural_prompt(utterance)],
                search_query: None,
            })
        }
        SearchDecision::Search => {
            let query_reply = llm
                .complete(
                    ModelChoice::Default,
                    &[Message::user(QUERY_PROMPT.replace("{query}", utterance))],
                )
                .await?;
            let query = clean_query(&query_reply, utterance);
            info!("Searching the web for '{}'", query);
            let snippets = search.search(&query).await?;
            Ok(WebSearchPlan {
                messages: vec![results_prompt(utterance, &snippets)],
                search_query: Some(query),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingSearch, ScriptedLlm};

    fn snippet() -> SearchSnippet {
        SearchSnippet {
            snippet: "The derivative measures instantaneous rate of change.".to_string(),
            source: "Khan Academy".to_string(),
            link: "https://www.khanacademy.org/derivatives".to_string(),
        }
    }

    #[test]
    fn test_decision_normalization() {
        assert_eq!(parse_decision("YES"), SearchDecision::Search);
        assert_eq!(parse_decision("  yes\n"), SearchDecision::Search);
        assert_eq!(parse_decision("NO "), SearchDecision::Skip);
        assert_eq!(parse_decision("no"), SearchDecision::Skip);
        assert_eq!(parse_decision("Yes, definitely."), SearchDecision::Skip);
        assert_eq!(parse_decision(""), SearchDecision::Skip);
    }

    #[test]
    fn test_query_cleanup() {
        assert_eq!(clean_query("\n \"latest calculus news\" \n", "x"), "latest calculus news");
        assert_eq!(clean_query("   ", "fallback question"), "fallback question");
    }

    #[test]
    fn test_results_carry_markdown_links() {
        let formatted = format_results(&[snippet()]);
        assert_eq!(
            formatted,
            "- The derivative measures instantaneous rate of change. ([Khan Academy](https://www.khanacademy.org/derivatives))"
        );
    }

    #[tokio::test]
    async fn test_yes_decision_searches_and_embeds_results() {
        let llm = ScriptedLlm::new(["YES", "\"derivative definition\""]);
        let search = CountingSearch::with_results(vec![snippet()]);

        let plan = plan_web_search(&llm, &search, "What is a derivative?")
            .await
            .unwrap();

        assert_eq!(search.queries(), vec!["derivative definition".to_string()]);
        assert_eq!(plan.search_query.as_deref(), Some("derivative definition"));
        assert_eq!(plan.messages.len(), 1);
        assert!(plan.messages[0].content.contains("What is a derivative?"));
        assert!(plan.messages[0]
            .content
            .contains("[Khan Academy](https://www.khanacademy.org/derivatives)"));
    }

    #[tokio::test]
    async fn test_no_with_trailing_space_skips_search() {
        let llm = ScriptedLlm::new(["NO "]);
        let search = CountingSearch::default();

        let plan = plan_web_search(&llm, &search, "Tell me a joke").await.unwrap();

        assert!(search.queries().is_empty());
        assert_eq!(plan.search_query, None);
        assert_eq!(plan.messages, vec![natural_prompt("Tell me a joke")]);
        assert_eq!(llm.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_decision_skips_search() {
        let llm = ScriptedLlm::new(["Maybe?"]);
        let search = CountingSearch::default();
        plan_web_search(&llm, &search, "hmm").await.unwrap();
        assert!(search.queries().is_empty());
    }
}
