//! Presentation model.
//!
//! `build_view` is a pure function of the controller state; the web page only
//! paints what it gets from here and forwards user events back as commands.

use crate::controller::AppState;
use crate::managers::audio::CaptureState;
use crate::managers::leads::Lead;
use crate::outreach::{ContactDetails, CopyTarget, GenerationStatus, OutputTab, OutreachResult};
use chrono::{Local, NaiveDate};
use pulldown_cmark::{html, Event, Options, Parser};
use serde::Serialize;
use std::time::Instant;

pub const SOURCE_TITLE_MAX_CHARS: usize = 35;
pub const COPIED_LABEL: &str = "Copied!";
pub const NO_PAST_SIGNALS: &str = "No Past Signals";

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub query: String,
    pub query_placeholder: &'static str,
    pub submit: SubmitButton,
    pub microphone: MicrophoneButton,
    pub banner: Option<String>,
    pub panel: Panel,
    pub history: HistoryView,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitButton {
    pub label: &'static str,
    pub enabled: bool,
    pub loading: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MicrophoneButton {
    pub title: &'static str,
    pub icon: &'static str,
    pub disabled: bool,
    /// "Recording Audio..." / "Transcribing..." next to the editor header.
    pub indicator: Option<&'static str>,
    pub state: CaptureState,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Panel {
    Idle {
        title: &'static str,
        hint: &'static str,
    },
    Loading {
        title: &'static str,
        detail: &'static str,
    },
    Result(Box<ResultView>),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabView {
    pub id: &'static str,
    pub label: &'static str,
    pub active: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceLink {
    pub uri: String,
    pub label: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CopyLabels {
    pub brief: &'static str,
    pub email_subject: &'static str,
    pub email_body: &'static str,
    pub social: &'static str,
    pub pitch: &'static str,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub tabs: Vec<TabView>,
    pub active_tab: OutputTab,
    pub editable: bool,
    pub brief_html: String,
    pub sources: Vec<SourceLink>,
    pub contact: Option<ContactDetails>,
    pub email_subject: String,
    pub email_body: String,
    pub social_message: String,
    pub elevator_pitch: String,
    pub copy_labels: CopyLabels,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub query: String,
    pub date: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub items: Vec<HistoryItem>,
    pub empty_label: Option<&'static str>,
}

/// Briefing Markdown to HTML. Single newlines become line breaks and embedded
/// HTML is escaped rather than passed through.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

/// Chip label for a grounding source.
pub fn source_label(title: &str) -> String {
    let truncated: String = title.chars().take(SOURCE_TITLE_MAX_CHARS).collect();
    if truncated.trim().is_empty() {
        "Source...".to_string()
    } else {
        format!("{}...", truncated)
    }
}

pub fn format_signal_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

fn history_item(lead: &Lead) -> HistoryItem {
    HistoryItem {
        id: lead.id.clone(),
        query: lead.query.clone(),
        date: format_signal_date(lead.last_generated_at.with_timezone(&Local).date_naive()),
    }
}

fn copy_label(state: &AppState, target: CopyTarget, idle: &'static str, now: Instant) -> &'static str {
    match state.copy_feedback {
        Some(feedback) if feedback.target == target && feedback.is_active(now) => COPIED_LABEL,
        _ => idle,
    }
}

fn result_view(state: &AppState, result: &OutreachResult, now: Instant) -> ResultView {
    ResultView {
        tabs: OutputTab::ALL
            .iter()
            .map(|&tab| TabView {
                id: tab.id(),
                label: tab.label(),
                active: tab == state.active_tab,
            })
            .collect(),
        active_tab: state.active_tab,
        editable: state.status == GenerationStatus::Success,
        brief_html: render_markdown(&result.research_summary),
        sources: result
            .sources
            .iter()
            .map(|s| SourceLink {
                uri: s.uri.clone(),
                label: source_label(&s.title),
            })
            .collect(),
        contact: result.contact_details.clone().filter(|c| !c.is_empty()),
        email_subject: result.formal_email.subject.clone(),
        email_body: result.formal_email.body.clone(),
        social_message: result.social_message.clone(),
        elevator_pitch: result.elevator_pitch.clone(),
        copy_labels: CopyLabels {
            brief: copy_label(state, CopyTarget::Brief, "Copy Brief", now),
            email_subject: copy_label(state, CopyTarget::EmailSubject, "Copy", now),
            email_body: copy_label(state, CopyTarget::EmailBody, "Edit & Copy", now),
            social: copy_label(state, CopyTarget::Social, "Copy Hook", now),
            pitch: copy_label(state, CopyTarget::Pitch, "Copy Script", now),
        },
    }
}

fn panel(state: &AppState, now: Instant) -> Panel {
    if state.status == GenerationStatus::Loading {
        return Panel::Loading {
            title: "Deploying Research Agents",
            detail: "Scanning Web, Policy Papers, and IndiaAI Summit Records...",
        };
    }
    match &state.result {
        Some(result) => Panel::Result(Box::new(result_view(state, result, now))),
        None => Panel::Idle {
            title: "Intelligence Feed Inactive",
            hint: "Enter a target or topic in the Command Center to initiate agentic research and outreach orchestration.",
        },
    }
}

fn microphone(capture: CaptureState) -> MicrophoneButton {
    let (title, icon, indicator) = match capture {
        CaptureState::Idle => ("Start Voice Input", "microphone", None),
        CaptureState::Starting => ("Start Voice Input", "spinner", None),
        CaptureState::Recording => ("Stop Recording", "stop", Some("Recording Audio...")),
        CaptureState::Processing => ("Start Voice Input", "spinner", Some("Transcribing...")),
    };
    MicrophoneButton {
        title,
        icon,
        disabled: matches!(capture, CaptureState::Starting | CaptureState::Processing),
        indicator,
        state: capture,
    }
}

pub fn build_view(state: &AppState, capture: CaptureState, now: Instant) -> ViewModel {
    let loading = state.status == GenerationStatus::Loading;
    let items: Vec<HistoryItem> = state.leads.iter().map(history_item).collect();

    ViewModel {
        query: state.query.clone(),
        query_placeholder: "Target Name, Organization, or LinkedIn URL...",
        submit: SubmitButton {
            label: "Initiate Research",
            enabled: !loading && capture == CaptureState::Idle,
            loading,
        },
        microphone: microphone(capture),
        banner: state.error.clone(),
        panel: panel(state, now),
        history: HistoryView {
            empty_label: items.is_empty().then_some(NO_PAST_SIGNALS),
            items,
        },
    }
}
