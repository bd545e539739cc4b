use super::{template_names, Template};
use anyhow::Context;

pub fn register_templates<'a>(registry: &mut handlebars::Handlebars<'a>) -> anyhow::Result<()> {
    let (subject, body) = template_names(Template::Emergency);
    registry
        .register_template_string(&subject, r#"URGENT: SafeSpace Emergency Alert"#)
        .context("registering emergency-subject template")?;

    // Also used as the body of the fallback template, which is why it names
    // the alert using its label rather than assuming an emergency.
    registry
        .register_template_string(
            &body,
            r#"<h1 class="alert-heading">{{alert_label}} alert</h1>
<p class="body-text">
    <strong>{{user_name}}</strong> has triggered a SafeSpace {{alert_label}} alert and may need help.
</p>
<p class="body-text">{{#if content}}{{content}}{{else}}Emergency alert triggered{{/if}}</p>
{{> location_block}}
{{> triggered_at}}
{{> next_steps}}"#,
        )
        .context("registering emergency-body template")?;

    Ok(())
}
