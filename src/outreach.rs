use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

impl ContactDetails {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.linked_in.is_none() && self.twitter.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FormalEmail {
    pub subject: String,
    pub body: String,
}

/// A grounding citation returned alongside a generation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

/// The drafted artifacts for one query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutreachResult {
    pub research_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_details: Option<ContactDetails>,
    pub formal_email: FormalEmail,
    pub social_message: String,
    pub elevator_pitch: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

/// Fields the user may rewrite in place after a successful generation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EditableField {
    EmailSubject,
    EmailBody,
    SocialMessage,
    ElevatorPitch,
}

/// Artifacts that carry a copy action.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CopyTarget {
    Brief,
    EmailSubject,
    EmailBody,
    Social,
    Pitch,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputTab {
    #[default]
    Brief,
    Email,
    Social,
    Pitch,
}

impl OutputTab {
    pub const ALL: [OutputTab; 4] = [
        OutputTab::Brief,
        OutputTab::Email,
        OutputTab::Social,
        OutputTab::Pitch,
    ];

    pub fn id(self) -> &'static str {
        match self {
            OutputTab::Brief => "brief",
            OutputTab::Email => "email",
            OutputTab::Social => "social",
            OutputTab::Pitch => "pitch",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutputTab::Brief => "Briefing",
            OutputTab::Email => "Strategic Email",
            OutputTab::Social => "Hook",
            OutputTab::Pitch => "Pitch",
        }
    }
}

impl OutreachResult {
    pub fn apply_edit(&mut self, field: EditableField, value: String) {
        match field {
            EditableField::EmailSubject => self.formal_email.subject = value,
            EditableField::EmailBody => self.formal_email.body = value,
            EditableField::SocialMessage => self.social_message = value,
            EditableField::ElevatorPitch => self.elevator_pitch = value,
        }
    }

    /// Current (possibly edited) text behind a copy action.
    pub fn copy_text(&self, target: CopyTarget) -> &str {
        match target {
            CopyTarget::Brief => &self.research_summary,
            CopyTarget::EmailSubject => &self.formal_email.subject,
            CopyTarget::EmailBody => &self.formal_email.body,
            CopyTarget::Social => &self.social_message,
            CopyTarget::Pitch => &self.elevator_pitch,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_result() -> OutreachResult {
    OutreachResult {
        research_summary: "**MeitY** announced the IndiaAI compute pillar.".to_string(),
        contact_details: Some(ContactDetails {
            email: Some("office@meity.gov.in".to_string()),
            linked_in: None,
            twitter: None,
        }),
        formal_email: FormalEmail {
            subject: "Subject: Partnership".to_string(),
            body: "Dear Secretary,\n\nFollowing the AI Impact Summit...".to_string(),
        },
        social_message: "Loved your summit remarks on assistive learning.".to_string(),
        elevator_pitch: "SahayakAI gives rural teachers 80% of their prep time back.".to_string(),
        sources: vec![Source {
            uri: "https://indiaai.gov.in/article/summit".to_string(),
            title: "IndiaAI Impact Summit 2026".to_string(),
        }],
    }
}
