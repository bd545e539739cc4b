//! Rendering of alert notification emails.
//!
//! Each alert kind maps to exactly one [`Template`], chosen by
//! [`Template::for_kind`]. Every template has a subject and a body, which are
//! registered as handlebars templates by the module of the same name. Kinds
//! without a dedicated template use the `fallback` subject, whose text is
//! derived from the kind name, together with the emergency body.
//!
//! Rendering is pure: the same kind and fields always produce byte-identical
//! output.
use anyhow::Context;
use chrono::{DateTime, Utc};
use models::{AlertEvent, AlertKind, Location, ThreatLevel};
use serde::Serialize;

mod audio_alert;
mod emergency;
mod fallback;
mod text_threat;

/// Body phrase used by the emergency template when an alert has no content.
pub const DEFAULT_EMERGENCY_CONTENT: &str = "Emergency alert triggered";
/// Body phrase used by the audio template when an alert has no content.
pub const DEFAULT_AUDIO_CONTENT: &str = "Audio alert triggered";
/// Threat level shown in text threat notifications when no scorer supplied one.
pub const DEFAULT_THREAT_LEVEL: ThreatLevel = ThreatLevel::High;

/// The notification templates, in order of specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Emergency,
    TextThreat,
    AudioAlert,
    Fallback,
}

impl Template {
    pub fn for_kind(kind: &AlertKind) -> Template {
        match kind {
            AlertKind::Emergency => Template::Emergency,
            AlertKind::TextThreat => Template::TextThreat,
            AlertKind::AudioDetection | AlertKind::ManualAudioAlert => Template::AudioAlert,
            AlertKind::SafeZoneExit | AlertKind::Other(_) => Template::Fallback,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Template::Emergency => "emergency",
            Template::TextThreat => "text_threat",
            Template::AudioAlert => "audio_alert",
            Template::Fallback => "fallback",
        }
    }
}

/// Returns the registered (subject, body) template names for `template`.
fn template_names(template: Template) -> (String, String) {
    let body_template = match template {
        Template::Fallback => Template::Emergency,
        other => other,
    };
    (
        format!("{}-subject", template.name()),
        format!("{}-body", body_template.name()),
    )
}

/// The fields of an alert that notification templates may reference.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFields<'a> {
    pub user_name: &'a str,
    pub content: Option<&'a str>,
    pub location: Option<Location>,
    pub threat_level: Option<ThreatLevel>,
    pub triggered_at: Option<DateTime<Utc>>,
}

impl<'a> TemplateFields<'a> {
    pub fn from_event(event: &'a AlertEvent) -> Self {
        TemplateFields {
            user_name: &event.subject_user.display_name,
            content: event.content.as_deref(),
            location: event.location,
            threat_level: event.threat_level,
            triggered_at: Some(event.created_at),
        }
    }
}

/// A rendered notification, ready to be handed to an email gateway.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RenderedNotification {
    pub template: &'static str,
    pub subject: String,
    pub body: String,
}

#[derive(Serialize)]
struct FormattedLocation {
    latitude: String,
    longitude: String,
}

#[derive(Serialize)]
struct TemplateArgs<'a> {
    user_name: &'a str,
    alert_label: String,
    content: Option<&'a str>,
    location: Option<FormattedLocation>,
    threat_level: &'static str,
    triggered_at: Option<String>,
}

#[derive(Debug)]
pub struct Renderer {
    registry: handlebars::Handlebars<'static>,
}

impl Renderer {
    pub fn try_new() -> anyhow::Result<Renderer> {
        let mut registry = handlebars::Handlebars::new();

        registry
            .register_partial(
                "location_block",
                r#"{{#if location}}
<p class="body-text">Last known location: ({{location.latitude}}, {{location.longitude}})</p>
<p class="body-text"><a href="https://www.google.com/maps?q={{location.latitude}},{{location.longitude}}" target="_blank" rel="noopener">View location on a map</a></p>
{{/if}}"#,
            )
            .context("registering location_block partial")?;

        registry
            .register_partial(
                "triggered_at",
                r#"{{#if triggered_at}}<p class="body-text">Triggered at {{triggered_at}}</p>{{/if}}"#,
            )
            .context("registering triggered_at partial")?;

        registry
            .register_partial(
                "next_steps",
                r#"<p class="body-text">
    You are receiving this message because {{user_name}} listed you as their emergency contact in SafeSpace.
    Please try to reach them, and contact local emergency services if you believe they are in danger.
</p>"#,
            )
            .context("registering next_steps partial")?;

        registry
            .register_template_string(
                "layout",
                r#"<!DOCTYPE html>
<html>
<body>
<div class="content">
{{{body}}}
</div>
<p class="footer">SafeSpace &middot; personal safety alerts</p>
</body>
</html>"#,
            )
            .context("registering layout template")?;

        emergency::register_templates(&mut registry)?;
        text_threat::register_templates(&mut registry)?;
        audio_alert::register_templates(&mut registry)?;
        fallback::register_templates(&mut registry)?;

        Ok(Renderer { registry })
    }

    /// Renders the subject and HTML body of a notification for an alert of
    /// the given `kind`.
    ///
    /// Errors indicate a malformed alert (for example a missing user name or
    /// an empty kind), and are not expected for alerts which passed dispatch
    /// validation.
    pub fn render(
        &self,
        kind: &AlertKind,
        fields: &TemplateFields<'_>,
    ) -> anyhow::Result<RenderedNotification> {
        // A kind made only of separators humanizes to nothing.
        let alert_label = humanize(kind.name());
        if alert_label.is_empty() {
            anyhow::bail!("alert kind must not be empty");
        }
        if fields.user_name.trim().is_empty() {
            anyhow::bail!("alert for kind '{kind}' is missing a user name");
        }

        let template = Template::for_kind(kind);
        let (subject_name, body_name) = template_names(template);

        let args = TemplateArgs {
            user_name: fields.user_name,
            alert_label,
            content: fields
                .content
                .map(str::trim)
                .filter(|content| !content.is_empty()),
            location: fields.location.map(format_location),
            threat_level: fields.threat_level.unwrap_or(DEFAULT_THREAT_LEVEL).name(),
            triggered_at: fields
                .triggered_at
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        };

        let subject = self
            .registry
            .render(&subject_name, &args)
            .with_context(|| format!("rendering {subject_name} template"))?;
        let inner_body = self
            .registry
            .render(&body_name, &args)
            .with_context(|| format!("rendering {body_name} template"))?;
        let body = self
            .registry
            .render("layout", &serde_json::json!({ "body": inner_body }))
            .context("rendering layout template")?;

        Ok(RenderedNotification {
            template: template.name(),
            subject: subject.trim().to_string(),
            body,
        })
    }
}

fn format_location(location: Location) -> FormattedLocation {
    FormattedLocation {
        latitude: format!("{:.6}", location.latitude),
        longitude: format!("{:.6}", location.longitude),
    }
}

/// Turns an alert kind name like `safe_zone_exit` into `Safe Zone Exit`.
pub fn humanize(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
