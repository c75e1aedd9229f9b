use serde::{Deserialize, Serialize};

/// Free-text questionnaire answers describing one child.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChildProfile {
    pub name: String,
    pub age: String,
    pub strengths: String,
    pub challenges: String,
    pub diagnoses: String,
    pub skills_to_improve: String,
    pub sensory_physical: String,
    pub motivation: String,
    #[serde(default)]
    pub other_info: Option<String>,
}

/// Profile keyword → article categories a parent is likely to want.
const INTEREST_MAPPING: &[(&str, &[&str])] = &[
    ("adhd", &["ADHD", "Behavioral Strategies"]),
    ("autism", &["Autism", "Social Skills", "Speech and Language"]),
    ("asd", &["Autism", "Social Skills", "Speech and Language"]),
    ("anxiety", &["Anxiety", "Emotional Regulation", "Behavioral Strategies"]),
    ("sensory", &["Sensory Processing", "Motor Skills"]),
    ("fine motor", &["Motor Skills", "Child Development"]),
    ("gross motor", &["Motor Skills", "Child Development"]),
    ("communication", &["Speech and Language", "Social Skills"]),
    ("speech", &["Speech and Language"]),
    ("social", &["Social Skills", "Child Development"]),
    ("attention", &["ADHD", "Behavioral Strategies"]),
    ("focus", &["ADHD", "Behavioral Strategies"]),
    ("emotional", &["Emotional Regulation", "Behavioral Strategies"]),
    ("tantrum", &["Emotional Regulation", "Parenting Tips"]),
    ("sleep", &["Sleep"]),
    ("school", &["School Support", "Educational Support"]),
    ("learning", &["Educational Support", "Special Needs"]),
];

impl ChildProfile {
    /// Names of mandatory answers that are blank. `other_info` is optional.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("age", &self.age),
            ("strengths", &self.strengths),
            ("challenges", &self.challenges),
            ("diagnoses", &self.diagnoses),
            ("skills_to_improve", &self.skills_to_improve),
            ("sensory_physical", &self.sensory_physical),
            ("motivation", &self.motivation),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    /// First whole number in the age answer ("8 years old" → 8).
    pub fn age_years(&self) -> Option<u32> {
        let digits: String = self
            .age
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }

    /// All non-empty answers except the name, joined with spaces.
    pub fn query_text(&self) -> String {
        [
            self.age.as_str(),
            self.strengths.as_str(),
            self.challenges.as_str(),
            self.diagnoses.as_str(),
            self.skills_to_improve.as_str(),
            self.sensory_physical.as_str(),
            self.motivation.as_str(),
            self.other_info.as_deref().unwrap_or(""),
        ]
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Human-readable block used inside prompts.
    pub fn summary(&self) -> String {
        format!(
            "Name: {}\nAge: {}\nStrengths: {}\nChallenges: {}\nDiagnoses: {}\n\
             Skills to improve: {}\nSensory/physical: {}\nMotivation: {}\nOther: {}",
            self.name,
            self.age,
            self.strengths,
            self.challenges,
            self.diagnoses,
            self.skills_to_improve,
            self.sensory_physical,
            self.motivation,
            self.other_info.as_deref().unwrap_or("-"),
        )
    }

    /// Article categories inferred from diagnoses, challenges and goals. Sorted, unique.
    pub fn interests(&self) -> Vec<String> {
        let text = [
            self.diagnoses.as_str(),
            self.challenges.as_str(),
            self.skills_to_improve.as_str(),
            self.sensory_physical.as_str(),
        ]
        .join(" ")
        .to_lowercase();

        let mut interests: Vec<String> = INTEREST_MAPPING
            .iter()
            .filter(|(needle, _)| text.contains(needle))
            .flat_map(|(_, categories)| categories.iter().map(|c| c.to_string()))
            .collect();
        interests.sort();
        interests.dedup();
        interests
    }
}

#[cfg(test)]
pub(crate) fn sample_profile() -> ChildProfile {
    ChildProfile {
        name: "Maya".to_string(),
        age: "6 years old".to_string(),
        strengths: "creative, loves drawing".to_string(),
        challenges: "attention, sensory overload".to_string(),
        diagnoses: "ADHD".to_string(),
        skills_to_improve: "fine motor control".to_string(),
        sensory_physical: "sensitive to loud noise".to_string(),
        motivation: "stickers and music".to_string(),
        other_info: None,
    }
}
