//! crates/study_assistant_core/src/turn.rs
//!
//! Mode dispatch for a single chat turn: decide what to send and to which
//! model, then stream the reply back.

use futures::StreamExt;
use std::future::Future;

use crate::domain::{ChatMode, Message, ModelChoice};
use crate::ports::{LanguageModelService, PortError, PortResult, SearchService};
use crate::search::plan_web_search;
use crate::stream::{Reply, ReplyAccumulator};

/// The request a turn resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPlan {
    pub model: ModelChoice,
    pub messages: Vec<Message>,
    /// Set when web-search mode actually searched.
    pub search_query: Option<String>,
}

/// Resolves a turn in `mode`. `context` is the output of
/// [`crate::context::build_context`] for this utterance.
pub async fn plan_turn(
    mode: ChatMode,
    context: Vec<Message>,
    utterance: &str,
    llm: &dyn LanguageModelService,
    search: Option<&dyn SearchService>,
) -> PortResult<TurnPlan> {
    match mode {
        ChatMode::Plain | ChatMode::Reasoning => Ok(TurnPlan {
            model: mode.model(),
            messages: context,
            search_query: None,
        }),
        ChatMode::WebSearch => {
            let search =
                search.ok_or_else(|| PortError::Unavailable("Web search".to_string()))?;
            let plan = plan_web_search(llm, search, utterance).await?;
            Ok(TurnPlan {
                model: mode.model(),
                messages: plan.messages,
                search_query: plan.search_query,
            })
        }
    }
}

/// Streams the completion for `plan`, handing the displayable running buffer
/// to `on_delta` after every fragment.
///
/// An error mid-stream abandons the reply; nothing partial is returned.
pub async fn stream_reply<F, Fut>(
    llm: &dyn LanguageModelService,
    plan: &TurnPlan,
    mut on_delta: F,
) -> PortResult<Reply>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut stream = llm.complete_streaming(plan.model, &plan.messages).await?;
    let mut accumulator = ReplyAccumulator::new(plan.model);
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        if fragment.is_empty() {
            continue;
        }
        let visible = accumulator.push(&fragment);
        on_delta(visible).await;
    }
    if accumulator.is_empty() {
        return Err(PortError::Unexpected("The model returned an empty reply.".to_string()));
    }
    Ok(accumulator.finish())
}
