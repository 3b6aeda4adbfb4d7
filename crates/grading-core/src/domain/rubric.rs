//! The five-competency essay rubric handed to the evaluator.
//!
//! Rubric text is configuration data: the engine only routes it to the
//! evaluator and never interprets it.

use serde::{Deserialize, Serialize};

use crate::domain::score::Competency;

/// What one competency measures and which failures cap it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionSpec {
    pub competency: Competency,
    pub title: String,
    /// Level descriptors, highest first.
    pub criteria: String,
    /// Failure patterns the evaluator must look for before scoring.
    pub anti_criteria: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    dimensions: Vec<DimensionSpec>,
}

impl Rubric {
    pub fn dimensions(&self) -> &[DimensionSpec] {
        &self.dimensions
    }

    pub fn dimension(&self, competency: Competency) -> &DimensionSpec {
        &self.dimensions[competency.index()]
    }

    /// The standard argumentative-essay rubric.
    pub fn standard() -> Self {
        let entries: [(&str, &str, &str); 5] = [
            (
                "Command of the formal written register",
                "200: excellent command; complex syntax with at most one structural slip and \
                 at most two minor grammar slips.\n\
                 160: good command; sound syntax and few slips that do not hurt fluency.\n\
                 120: average command; simple syntax and some recurring slips.\n\
                 80: insufficient command; many slips and deficient syntax.\n\
                 40: precarious command; numerous slips and oral-register syntax.\n\
                 0: no knowledge of the formal written register.",
                "- Do not overlook comma or agreement errors because the text sounds learned.\n\
                 - Complex sentence structure does not excuse basic errors.\n\
                 - Look actively for run-on sentences, comma splices and agreement failures.\n\
                 - Two or more distinct grammar errors cap the score at 160.",
            ),
            (
                "Understanding of the prompt and use of cultural repertoire",
                "200: addresses the topic fully with legitimate, relevant and productively used \
                 repertoire (the reference grounds the discussion).\n\
                 160: addresses the topic fully with legitimate, relevant repertoire that is not \
                 used productively.\n\
                 120: addresses the topic fully with predictable or common-sense repertoire.\n\
                 80: tangential treatment of the topic with weakly relevant repertoire.\n\
                 40: drifts off topic or repertoire is disconnected.\n\
                 0: entirely off topic.",
                "- Generic quotations that fit any topic must be penalised unless tied to this \
                 specific discussion.\n\
                 - Citing an author without using the idea to argue caps the score at 120 or 160.\n\
                 - Check that the text is not merely skirting the topic.",
            ),
            (
                "Selection, organisation and interpretation of arguments",
                "200: strong authorship; moves past common sense, criticises structural causes, \
                 with a visible strategic text plan and consistent development.\n\
                 160: organised text with beginning, middle and end, but predictable or shallow \
                 arguments.\n\
                 120: flawed text plan; limited, redundant or gapped argumentation.\n\
                 80: disorganised, contradictory or loosely related information.\n\
                 40: disconnected information in a single block.\n\
                 0: not an argumentative essay.",
                "- This is the hardest competency. Be severe.\n\
                 - Penalise lists of facts that never explain why or what follows.\n\
                 - Penalise common-sense arguments without critical detail.\n\
                 - Look for strong claims with no logical follow-up.\n\
                 - An organised but shallow text scores 120 or 160, never 200.",
            ),
            (
                "Linguistic cohesion mechanisms",
                "200: articulates the parts of the text well with a diversified cohesive \
                 repertoire within and between paragraphs and no inadequacies.\n\
                 160: articulates well with few inadequacies or repetitions.\n\
                 120: average articulation, little variety and some inadequacies.\n\
                 80: insufficient articulation, limited repertoire and many inadequacies.\n\
                 40: precarious articulation.\n\
                 0: no articulation.",
                "- Repeating the same word many times lowers the score.\n\
                 - Formulaic paragraph openers earn a base score, not the maximum, without \
                 variety inside the paragraphs.\n\
                 - Check for misused connectives, such as a contrastive one used to add an idea.",
            ),
            (
                "Intervention proposal respecting human rights",
                "200: excellent, complete proposal (action, agent, means, effect, detail) well \
                 articulated with the discussion.\n\
                 160: good proposal with all five elements but weak detail or average \
                 articulation.\n\
                 120: sufficient proposal with four valid elements.\n\
                 80: insufficient proposal with three elements.\n\
                 40: precarious proposal with one or two elements, or one that disrespects human \
                 rights.\n\
                 0: no intervention proposal.",
                "- Do not award 200 merely because five elements are present.\n\
                 - The detail must add valid information, not restate the action.\n\
                 - An empty action such as raising awareness is weak without practical means.",
            ),
        ];

        let dimensions = Competency::ALL
            .iter()
            .zip(entries)
            .map(|(competency, (title, criteria, anti))| DimensionSpec {
                competency: *competency,
                title: title.to_string(),
                criteria: criteria.to_string(),
                anti_criteria: anti.to_string(),
            })
            .collect();
        Self { dimensions }
    }
}

impl Default for Rubric {
    fn default() -> Self {
        Self::standard()
    }
}
