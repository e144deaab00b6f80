//! Bounded conversation history.

use std::collections::HashSet;

use tracing::warn;
use uuid::Uuid;

use crate::types::{AssistantTurn, ToolCall, Turn};

/// Text of the user turn inserted when trimming leaves no leading user turn.
pub const TRIMMED_PLACEHOLDER: &str = "(earlier conversation trimmed)";

/// Default bound on the number of turns kept.
pub const DEFAULT_MAX_TURNS: usize = 100;

/// Owns the ordered turn history of one agent run.
///
/// Invariants held after every mutation:
/// - at most one system turn, always first;
/// - the first non-system turn, if any, is a user turn;
/// - `len() <= max_turns`, and trimming never drops the system turn or
///   the first user turn.
#[derive(Debug, Clone)]
pub struct ContextManager {
    id: Uuid,
    turns: Vec<Turn>,
    max_turns: usize,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ContextManager {
    /// `max_turns` below 2 is raised to 2 so the system and first user turn fit.
    pub fn new(max_turns: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
            max_turns: max_turns.max(2),
        }
    }

    /// Identity of this conversation; differs for every manager created.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Set or replace the system instruction.
    pub fn set_system(&mut self, text: impl Into<String>) {
        let turn = Turn::system(text);
        match self.turns.first() {
            Some(first) if first.is_system() => self.turns[0] = turn,
            _ => {
                self.turns.insert(0, turn);
                self.trim();
            }
        }
    }

    pub fn add_user(&mut self, text: impl Into<String>) {
        self.push(Turn::user(text));
    }

    pub fn add_assistant(&mut self, turn: AssistantTurn) {
        self.push(Turn::Assistant(turn));
    }

    pub fn add_tool_result(&mut self, call: &ToolCall, content: impl Into<String>) {
        self.push(Turn::tool_result(call, content));
    }

    pub fn add_tool_error(&mut self, call: &ToolCall, content: impl Into<String>) {
        self.push(Turn::tool_error(call, content));
    }

    /// Append any turn. A system turn is routed to [`Self::set_system`].
    pub fn push(&mut self, turn: Turn) {
        if let Turn::System { text } = turn {
            self.set_system(text);
            return;
        }
        if let Turn::ToolResult(result) = &turn {
            if !self.has_pending_call(&result.tool_call_id) {
                warn!(tool_call_id = %result.tool_call_id, "dropping tool result whose request was trimmed");
                return;
            }
        }
        if !turn.is_user() && !self.turns.iter().any(|t| !t.is_system()) {
            self.turns.push(Turn::user(TRIMMED_PLACEHOLDER));
        }
        self.turns.push(turn);
        self.trim();
    }

    pub fn messages(&self) -> &[Turn] {
        &self.turns
    }

    pub fn system(&self) -> Option<&str> {
        self.turns.first().filter(|t| t.is_system()).map(Turn::text)
    }

    /// Drop everything except the system turn.
    pub fn clear(&mut self) {
        self.turns.retain(Turn::is_system);
    }

    pub fn clear_all(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Rough token count: `len(text) / 4 + 1` per turn.
    pub fn estimated_tokens(&self) -> usize {
        self.turns.iter().map(estimate_turn_tokens).sum()
    }

    fn trim(&mut self) {
        while self.turns.len() > self.max_turns {
            let Some(index) = self.first_removable() else {
                break;
            };
            self.remove_at(index);
            self.ensure_leading_user();
        }
    }

    fn first_removable(&self) -> Option<usize> {
        let mut seen_user = false;
        for (index, turn) in self.turns.iter().enumerate() {
            if turn.is_system() {
                continue;
            }
            if turn.is_user() && !seen_user {
                seen_user = true;
                continue;
            }
            return Some(index);
        }
        None
    }

    fn has_pending_call(&self, call_id: &str) -> bool {
        self.turns
            .iter()
            .flat_map(Turn::tool_calls)
            .any(|call| call.id() == call_id)
    }

    fn remove_at(&mut self, index: usize) {
        let removed = self.turns.remove(index);
        let orphaned: HashSet<String> = removed
            .tool_calls()
            .iter()
            .map(|call| call.id().to_string())
            .collect();
        if orphaned.is_empty() {
            return;
        }
        self.turns.retain(|turn| match turn {
            Turn::ToolResult(result) => !orphaned.contains(&result.tool_call_id),
            _ => true,
        });
    }

    fn ensure_leading_user(&mut self) {
        let first_other = self.turns.iter().position(|t| !t.is_system());
        if let Some(index) = first_other {
            if !self.turns[index].is_user() {
                self.turns.insert(index, Turn::user(TRIMMED_PLACEHOLDER));
            }
        }
    }
}

fn estimate_turn_tokens(turn: &Turn) -> usize {
    let mut chars = turn.text().len();
    for call in turn.tool_calls() {
        chars += call.name().len() + call.arguments().to_string().len();
    }
    chars / 4 + 1
}
