use serde::{Deserialize, Serialize};

/// The text under grading and the topic it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Essay {
    pub topic: String,
    pub text: String,
}

impl Essay {
    pub fn new(topic: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            text: text.into(),
        }
    }
}

impl From<grading_state::Submission> for Essay {
    fn from(submission: grading_state::Submission) -> Self {
        Self {
            topic: submission.topic,
            text: submission.text,
        }
    }
}
