//! Session state for one REPL invocation.
//!
//! `SessionState` owns the conversation history, the pending input buffer,
//! the input mode, the active model and the one-shot turn flags.  It performs
//! no I/O; the engine mirrors mode changes onto the terminal.

use crate::provider::{ChatEntry, Role, TurnFlags};

/// Whether the parser is collecting a multi-line entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    /// Each non-empty line is submitted on its own.
    #[default]
    SingleLine,
    /// Lines are buffered verbatim until a lone `.` line.
    MultiLine,
}

/// Conversation and input state.
#[derive(Debug, Clone)]
pub struct SessionState {
    history: Vec<ChatEntry>,
    input: String,
    mode: InputMode,
    active_model: String,
    turn_flags: TurnFlags,
}

impl SessionState {
    /// Creates an empty session addressing `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            history: Vec::new(),
            input: String::new(),
            mode: InputMode::SingleLine,
            active_model: model.into(),
            turn_flags: TurnFlags::new(),
        }
    }

    /// Returns the conversation history.
    pub fn history(&self) -> &[ChatEntry] {
        &self.history
    }

    /// Appends an entry to the history.
    pub fn push_entry(&mut self, entry: ChatEntry) {
        self.history.push(entry);
    }

    /// Removes the last entry if it was written by the user.
    pub fn retract_user_entry(&mut self) -> Option<ChatEntry> {
        if self.history.last().is_some_and(|e| e.role == Role::User) {
            self.history.pop()
        } else {
            None
        }
    }

    /// Clears the conversation history.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Returns the pending input.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Appends one line of input.
    pub fn append_line(&mut self, line: &str) {
        self.input.push_str(line);
        self.input.push('\n');
    }

    /// Takes the pending input for submission and returns to single-line mode.
    ///
    /// A single-line entry loses the newline added by [`append_line`]; a
    /// multi-line entry is returned verbatim.
    ///
    /// [`append_line`]: SessionState::append_line
    pub fn take_input(&mut self) -> String {
        let mut text = std::mem::take(&mut self.input);
        if self.mode == InputMode::SingleLine && text.ends_with('\n') {
            text.pop();
        }
        self.mode = InputMode::SingleLine;
        text
    }

    /// Discards pending input and returns to single-line mode.
    pub fn reset_input(&mut self) {
        self.input.clear();
        self.mode = InputMode::SingleLine;
    }

    /// Returns the current input mode.
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Switches to multi-line mode.
    pub fn enter_multi_line(&mut self) {
        self.mode = InputMode::MultiLine;
    }

    /// Returns the active model.
    pub fn active_model(&self) -> &str {
        &self.active_model
    }

    /// Replaces the active model.
    pub fn set_active_model(&mut self, model: impl Into<String>) {
        self.active_model = model.into();
    }

    /// Returns the flags for the next turn.
    pub fn turn_flags(&self) -> &TurnFlags {
        &self.turn_flags
    }

    /// Returns the flags for the next turn for mutation.
    pub fn turn_flags_mut(&mut self) -> &mut TurnFlags {
        &mut self.turn_flags
    }

    /// Takes the flags for the turn being submitted, leaving defaults behind.
    pub fn take_turn_flags(&mut self) -> TurnFlags {
        std::mem::take(&mut self.turn_flags)
    }

    /// The prompt to show for the current mode.
    pub fn prompt(&self) -> String {
        match self.mode {
            InputMode::SingleLine => format!("[User@{}]: ", self.active_model),
            InputMode::MultiLine => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SUPPRESS_GROUNDING;

    #[test]
    fn new_session_is_empty() {
        let session = SessionState::new("gpt-4o-mini");
        assert!(session.history().is_empty());
        assert_eq!(session.input(), "");
        assert_eq!(session.mode(), InputMode::SingleLine);
        assert_eq!(session.active_model(), "gpt-4o-mini");
        assert!(session.turn_flags().is_default());
    }

    #[test]
    fn single_line_input_drops_newline() {
        let mut session = SessionState::new("m");
        session.append_line("Hi");
        assert_eq!(session.input(), "Hi\n");
        assert_eq!(session.take_input(), "Hi");
        assert_eq!(session.input(), "");
    }

    #[test]
    fn multi_line_input_is_verbatim() {
        let mut session = SessionState::new("m");
        session.enter_multi_line();
        session.append_line("first");
        session.append_line("");
        session.append_line("second");
        assert_eq!(session.take_input(), "first\n\nsecond\n");
        assert_eq!(session.mode(), InputMode::SingleLine);
    }

    #[test]
    fn retract_only_removes_user_entries() {
        let mut session = SessionState::new("m");
        session.push_entry(ChatEntry::user("q"));
        session.push_entry(ChatEntry::assistant("a"));
        assert_eq!(session.retract_user_entry(), None);
        session.push_entry(ChatEntry::user("q2"));
        assert_eq!(session.retract_user_entry(), Some(ChatEntry::user("q2")));
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn take_turn_flags_resets() {
        let mut session = SessionState::new("m");
        session.turn_flags_mut().set_bool(SUPPRESS_GROUNDING, true);
        let flags = session.take_turn_flags();
        assert!(flags.is_enabled(SUPPRESS_GROUNDING));
        assert!(session.turn_flags().is_default());
    }

    #[test]
    fn prompt_follows_mode_and_model() {
        let mut session = SessionState::new("gpt-4o-mini");
        assert_eq!(session.prompt(), "[User@gpt-4o-mini]: ");
        session.set_active_model("gemini-2.0-flash");
        assert_eq!(session.prompt(), "[User@gemini-2.0-flash]: ");
        session.enter_multi_line();
        assert_eq!(session.prompt(), "");
        session.reset_input();
        assert_eq!(session.prompt(), "[User@gemini-2.0-flash]: ");
    }
}
