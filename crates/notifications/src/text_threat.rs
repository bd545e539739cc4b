use super::{template_names, Template};
use anyhow::Context;

pub fn register_templates<'a>(registry: &mut handlebars::Handlebars<'a>) -> anyhow::Result<()> {
    let (subject, body) = template_names(Template::TextThreat);
    registry
        .register_template_string(&subject, r#"SafeSpace Text Threat Detection"#)
        .context("registering text_threat-subject template")?;

    registry
        .register_template_string(
            &body,
            r#"<h1 class="alert-heading">Text threat detected</h1>
<p class="body-text">
    SafeSpace detected potentially threatening content in a message analyzed by <strong>{{user_name}}</strong>.
</p>
<p class="body-text">Threat level: <strong>{{threat_level}}</strong></p>
{{#if content}}
<blockquote class="quoted-content">{{content}}</blockquote>
{{/if}}
{{> triggered_at}}
{{> next_steps}}"#,
        )
        .context("registering text_threat-body template")?;

    Ok(())
}
