//! RAG orchestrator
//!
//! Composes retrieved chunks and the conversation window into a prompt,
//! calls the generation provider, and applies the no-context /
//! provider-failure fallback policy. A question never produces a hard
//! failure: the worst case is a canned supportive line.

use crate::config::{ContextConfig, RetrievalConfig};
use crate::context::{ContextWindow, Conversation, Sender, Turn};
use crate::generate::{ChatMessage, GenerationProvider};
use crate::index::SearchResult;
use crate::store::VectorStore;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{error, info};

/// Displayed preview length for source documents.
const PREVIEW_CHARS: usize = 200;

/// Canned answers used when the generation provider fails. Chosen uniformly
/// at random so consecutive failures do not repeat the same line.
const FALLBACK_RESPONSES: &[&str] = &[
    "I'm here to help you learn! Can you tell me more about what you'd like to understand?",
    "That's an interesting question! Let me think about the best way to explain this to you.",
    "I love that you're curious about learning! What specific aspect would you like to explore?",
    "Great question! Let's work through this together step by step.",
];

const PERSONA: &str = "\
Your personality:
- Encouraging and supportive
- Patient and understanding
- Clear in explanations
- Enthusiastic about learning
- Ask follow-up questions to ensure understanding

Your teaching approach:
- Use examples and analogies
- Encourage critical thinking
- Adapt language to the student's level
- Make learning engaging and fun
- Be positive and motivating";

const FORMATTING: &str = "\
IMPORTANT FORMATTING: Always format your responses using Markdown syntax:
- Use **bold** for important terms or emphasis
- Use *italics* for subtle emphasis
- Use bullet points with * for lists
- Use numbered lists when showing steps
- Use `code` formatting for technical terms
- Use proper headings with # when needed
- Use > for quotes or important notes

Keep responses conversational, helpful, and educational.";

/// A retrieved source attached to an answer. `preview` is bounded for
/// display; the full chunk stays available for re-ranking or logging.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub preview: String,
    pub source: String,
    pub score: f32,
    pub chunk: crate::chunking::Chunk,
}

/// The orchestrator's terminal outcome for one question.
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    /// In retrieval ranking order (descending similarity), never re-sorted.
    pub source_documents: Vec<SourceDocument>,
    /// Whether relevant knowledge-base chunks were found for this question.
    pub has_context: bool,
    /// Whether those chunks actually informed the generated answer.
    pub used_context: bool,
}

/// Orchestrates retrieval, prompting, generation, and fallback.
///
/// One instance per process: construct it once at startup and share it
/// (behind `Arc`) with every request handler. It keeps no per-query state
/// beyond what the context window reads.
pub struct RagEngine {
    store: Arc<VectorStore>,
    generator: Arc<dyn GenerationProvider>,
    window: ContextWindow,
    retrieval: RetrievalConfig,
}

impl RagEngine {
    pub fn new(
        store: Arc<VectorStore>,
        generator: Arc<dyn GenerationProvider>,
        context: &ContextConfig,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            generator,
            window: ContextWindow::new(context.max_total, context.max_in_prompt),
            retrieval,
        }
    }

    /// Answer a student question. Never raises; always returns a
    /// best-effort answer.
    pub async fn answer(&self, question: &str, turns: &[Turn]) -> RagAnswer {
        let results = self
            .store
            .search(question, self.retrieval.k, self.retrieval.score_threshold);
        let conversation = self.window.window(turns);

        if results.is_empty() {
            info!(
                question = %head(question, 50),
                "no relevant chunks; answering from general knowledge"
            );
            return self.answer_without_context(question, &conversation).await;
        }

        let messages = self.context_prompt(question, &conversation, &results);
        match self.generator.complete(&messages).await {
            Ok(answer) => {
                info!(
                    sources = results.len(),
                    first_interaction = conversation.is_first_interaction,
                    "generated answer from knowledge-base context"
                );
                RagAnswer {
                    answer,
                    source_documents: results.into_iter().map(to_source_document).collect(),
                    has_context: true,
                    used_context: true,
                }
            }
            Err(e) => {
                error!(error = %e, "generation failed on context path");
                self.canned_answer()
            }
        }
    }

    async fn answer_without_context(
        &self,
        question: &str,
        conversation: &Conversation,
    ) -> RagAnswer {
        let messages = self.fallback_prompt(question, conversation);
        match self.generator.complete(&messages).await {
            Ok(answer) => RagAnswer {
                answer,
                source_documents: Vec::new(),
                has_context: false,
                used_context: false,
            },
            Err(e) => {
                error!(error = %e, "generation failed on fallback path");
                self.canned_answer()
            }
        }
    }

    /// Prompt for the context path: knowledge-base blocks, conversation,
    /// question, style guidelines, and the introduction directive keyed on
    /// the first-interaction flag.
    fn context_prompt(
        &self,
        question: &str,
        conversation: &Conversation,
        results: &[SearchResult],
    ) -> Vec<ChatMessage> {
        let intro = if conversation.is_first_interaction {
            "This is your FIRST interaction with this student. For this first \
             message only, introduce yourself briefly as \"Hi there! I'm your \
             friendly AI tutor\" and then proceed to help with their question."
        } else {
            "DO NOT introduce yourself again - you've already met this student. \
             Simply continue the conversation naturally and helpfully."
        };

        let system = format!(
            "You are an intelligent AI tutor. Use the following context from \
             the knowledge base to help answer the student's question.\n\n\
             If the context provides relevant information, incorporate it into \
             your response naturally and cite it (e.g., \"According to the \
             document...\"). If the context doesn't contain relevant \
             information, respond from your general knowledge but mention that \
             you're drawing from general knowledge rather than the knowledge \
             base.\n\n\
             Context from Knowledge Base:\n{context}\n\n{intro}\n\n{persona}\n\n{formatting}",
            context = format_context(results),
            intro = intro,
            persona = PERSONA,
            formatting = FORMATTING,
        );

        let mut messages = vec![ChatMessage::system(system)];
        messages.extend(conversation_messages(conversation));
        messages.push(ChatMessage::user(question));
        messages
    }

    /// Prompt for the no-context path: conversation and question only,
    /// tagged so the model answers from general knowledge and discloses
    /// that the knowledge base had nothing relevant.
    fn fallback_prompt(&self, question: &str, conversation: &Conversation) -> Vec<ChatMessage> {
        let intro = if conversation.is_first_interaction {
            "This is your FIRST interaction with this student. For this first \
             message only, introduce yourself briefly as \"Hi there! I'm your \
             friendly AI tutor\"."
        } else {
            "DO NOT introduce yourself again - you've already met this student."
        };

        let system = format!(
            "You are an intelligent AI tutor. The student has asked a question, \
             but there is no relevant information in the current knowledge \
             base.\n\n\
             Provide a helpful response based on your general knowledge, and \
             mention that you're drawing from general knowledge since the \
             specific information isn't in the knowledge base.\n\n\
             {intro}\n\n{persona}\n\n{formatting}",
            intro = intro,
            persona = PERSONA,
            formatting = FORMATTING,
        );

        let mut messages = vec![ChatMessage::system(system)];
        messages.extend(conversation_messages(conversation));
        messages.push(ChatMessage::user(question));
        messages
    }

    fn canned_answer(&self) -> RagAnswer {
        let line = FALLBACK_RESPONSES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(FALLBACK_RESPONSES[0]);
        RagAnswer {
            answer: line.to_string(),
            source_documents: Vec::new(),
            has_context: false,
            used_context: false,
        }
    }
}

/// Format retrieved chunks as labeled blocks, in ranking order.
fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[Document {} - {}]:\n{}\n",
                i + 1,
                r.chunk.source(),
                r.chunk.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn conversation_messages(conversation: &Conversation) -> Vec<ChatMessage> {
    conversation
        .prompt_turns
        .iter()
        .map(|turn| match turn.sender {
            Sender::User => ChatMessage::user(turn.text.clone()),
            Sender::Bot => ChatMessage::assistant(turn.text.clone()),
        })
        .collect()
}

fn to_source_document(result: SearchResult) -> SourceDocument {
    let preview: String = if result.chunk.text.chars().count() > PREVIEW_CHARS {
        let head: String = result.chunk.text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        result.chunk.text.clone()
    };

    SourceDocument {
        preview,
        source: result.chunk.source().to_string(),
        score: result.score,
        chunk: result.chunk,
    }
}

fn head(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
