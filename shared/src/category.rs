use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Closed vocabulary the tagger may assign.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    EnumIter,
    EnumString,
    Display,
)]
pub enum Category {
    #[serde(rename = "Foundation Model")]
    #[strum(serialize = "Foundation Model")]
    FoundationModel,
    #[serde(rename = "Inference & Serving")]
    #[strum(serialize = "Inference & Serving")]
    InferenceServing,
    #[serde(rename = "Fine-tuning & Training")]
    #[strum(serialize = "Fine-tuning & Training")]
    FineTuningTraining,
    #[serde(rename = "Quantization")]
    #[strum(serialize = "Quantization")]
    Quantization,
    #[serde(rename = "Agent Framework")]
    #[strum(serialize = "Agent Framework")]
    AgentFramework,
    #[serde(rename = "Workflow Orchestration")]
    #[strum(serialize = "Workflow Orchestration")]
    WorkflowOrchestration,
    #[serde(rename = "RAG")]
    #[strum(serialize = "RAG")]
    Rag,
    #[serde(rename = "Vector Database")]
    #[strum(serialize = "Vector Database")]
    VectorDatabase,
    #[serde(rename = "Coding Assistant")]
    #[strum(serialize = "Coding Assistant")]
    CodingAssistant,
    #[serde(rename = "Chatbot")]
    #[strum(serialize = "Chatbot")]
    Chatbot,
    #[serde(rename = "Image & Video Generation")]
    #[strum(serialize = "Image & Video Generation")]
    ImageVideoGeneration,
    #[serde(rename = "Audio & Speech")]
    #[strum(serialize = "Audio & Speech")]
    AudioSpeech,
    #[serde(rename = "LLMOps & Evaluation")]
    #[strum(serialize = "LLMOps & Evaluation")]
    LlmOpsEvaluation,
    #[serde(rename = "Security & Safety")]
    #[strum(serialize = "Security & Safety")]
    SecuritySafety,
    #[serde(rename = "Data & Datasets")]
    #[strum(serialize = "Data & Datasets")]
    DataDatasets,
    #[serde(rename = "Non-AI")]
    #[strum(serialize = "Non-AI")]
    NonAi,
}

impl Category {
    pub fn group(&self) -> &'static str {
        match self {
            Category::FoundationModel
            | Category::InferenceServing
            | Category::FineTuningTraining
            | Category::Quantization => "Infrastructure & Training",
            Category::AgentFramework
            | Category::WorkflowOrchestration
            | Category::Rag
            | Category::VectorDatabase => "App Development",
            Category::CodingAssistant
            | Category::Chatbot
            | Category::ImageVideoGeneration
            | Category::AudioSpeech => "Verticals & Tools",
            Category::LlmOpsEvaluation | Category::SecuritySafety => "Ops & Eval",
            Category::DataDatasets | Category::NonAi => "Others",
        }
    }

    /// Lines of the form `- Group: A, B, C`, in declaration order.
    pub fn vocabulary_listing() -> String {
        let mut groups: Vec<(&'static str, Vec<String>)> = Vec::new();
        for category in Category::iter() {
            match groups.last_mut() {
                Some((group, names)) if *group == category.group() => {
                    names.push(category.to_string())
                }
                _ => groups.push((category.group(), vec![category.to_string()])),
            }
        }

        groups
            .into_iter()
            .map(|(group, names)| format!("- {group}: {}", names.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Keeps known labels only, dropping duplicates but preserving order.
    pub fn normalize_labels<I, S>(labels: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = Vec::new();
        for label in labels {
            if let Ok(category) = label.as_ref().trim().parse::<Category>() {
                if !seen.contains(&category) {
                    seen.push(category);
                }
            }
        }
        seen.into_iter().map(|c| c.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_roundtrip() {
        for category in Category::iter() {
            assert_eq!(category.to_string().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn normalize_drops_unknown_and_duplicates() {
        let tags = Category::normalize_labels(["RAG", "Blockchain", " Agent Framework ", "RAG"]);
        assert_eq!(tags, vec!["RAG".to_string(), "Agent Framework".to_string()]);
    }

    #[test]
    fn listing_groups_categories() {
        let listing = Category::vocabulary_listing();
        assert_eq!(listing.lines().count(), 5);
        assert!(listing.starts_with(
            "- Infrastructure & Training: Foundation Model, Inference & Serving, Fine-tuning & Training, Quantization"
        ));
        assert!(listing.ends_with("- Others: Data & Datasets, Non-AI"));
    }
}
