use super::{template_names, Template};
use anyhow::Context;

pub fn register_templates<'a>(registry: &mut handlebars::Handlebars<'a>) -> anyhow::Result<()> {
    let (subject, body) = template_names(Template::AudioAlert);
    registry
        .register_template_string(&subject, r#"SafeSpace Audio Alert Detection"#)
        .context("registering audio_alert-subject template")?;

    registry
        .register_template_string(
            &body,
            r#"<h1 class="alert-heading">Audio alert</h1>
<p class="body-text">
    SafeSpace raised an audio alert while monitoring sound for <strong>{{user_name}}</strong>.
</p>
<p class="body-text">{{#if content}}{{content}}{{else}}Audio alert triggered{{/if}}</p>
{{> location_block}}
{{> triggered_at}}
{{> next_steps}}"#,
        )
        .context("registering audio_alert-body template")?;

    Ok(())
}
