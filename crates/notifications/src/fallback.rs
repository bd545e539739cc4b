use super::{template_names, Template};
use anyhow::Context;

// Only the subject is registered here: the fallback renders its body using
// the emergency body template.
pub fn register_templates<'a>(registry: &mut handlebars::Handlebars<'a>) -> anyhow::Result<()> {
    let (subject, _) = template_names(Template::Fallback);
    registry
        .register_template_string(&subject, r#"SafeSpace Alert: {{{alert_label}}}"#)
        .context("registering fallback-subject template")?;

    Ok(())
}
