use tracing::warn;

use crate::event::StreamEvent;

/// What the view should do after one event has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Visible partial state changed; redraw.
    Updated,
    /// The response is finished.
    Completed {
        message: String,
        thoughts: Option<String>,
        audio_data: Option<String>,
    },
    /// The relay gave up mid-stream.
    Failed(String),
}

/// Folds relay events, in arrival order, into the partially rendered reply.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    current_thoughts: String,
    current_message: String,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_thoughts(&self) -> &str {
        &self.current_thoughts
    }

    pub fn current_message(&self) -> &str {
        &self.current_message
    }

    pub fn apply(&mut self, event: StreamEvent) -> Step {
        match event {
            StreamEvent::Thought { content } => {
                self.current_thoughts.push_str(&content);
                Step::Updated
            }
            StreamEvent::Message { content } => {
                self.current_message.push_str(&content);
                Step::Updated
            }
            StreamEvent::Complete {
                message,
                thoughts,
                audio_data,
            } => {
                if message != self.current_message {
                    warn!(
                        "completed message ({} chars) differs from streamed text ({} chars)",
                        message.len(),
                        self.current_message.len()
                    );
                }
                self.clear();
                Step::Completed {
                    message,
                    thoughts: (!thoughts.is_empty()).then_some(thoughts),
                    audio_data,
                }
            }
            StreamEvent::Error { error } => {
                self.clear();
                Step::Failed(error)
            }
        }
    }

    pub fn clear(&mut self) {
        self.current_thoughts.clear();
        self.current_message.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_state_accumulates_in_order() {
        let mut assembler = StreamAssembler::new();
        assert_eq!(assembler.apply(StreamEvent::Thought { content: "a".into() }), Step::Updated);
        assembler.apply(StreamEvent::Message { content: "Hel".into() });
        assembler.apply(StreamEvent::Thought { content: "b".into() });
        assembler.apply(StreamEvent::Message { content: "lo".into() });
        assert_eq!(assembler.current_thoughts(), "ab");
        assert_eq!(assembler.current_message(), "Hello");

        let step = assembler.apply(StreamEvent::Complete {
            message: "Hello".into(),
            thoughts: "ab".into(),
            audio_data: None,
        });
        assert_eq!(
            step,
            Step::Completed {
                message: "Hello".into(),
                thoughts: Some("ab".into()),
                audio_data: None,
            }
        );
        assert!(assembler.current_message().is_empty());
        assert!(assembler.current_thoughts().is_empty());
    }

    #[test]
    fn test_empty_thoughts_become_none() {
        let mut assembler = StreamAssembler::new();
        let step = assembler.apply(StreamEvent::Complete {
            message: "hi".into(),
            thoughts: String::new(),
            audio_data: Some("AAAA".into()),
        });
        assert!(matches!(step, Step::Completed { thoughts: None, audio_data: Some(_), .. }));
    }

    #[test]
    fn test_error_clears_partial_state() {
        let mut assembler = StreamAssembler::new();
        assembler.apply(StreamEvent::Message { content: "par".into() });
        let step = assembler.apply(StreamEvent::Error { error: "boom".into() });
        assert_eq!(step, Step::Failed("boom".into()));
        assert!(assembler.current_message().is_empty());
    }
}
