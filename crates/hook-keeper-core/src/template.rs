//! `{{placeholder}}` substitution for action parameters.
//!
//! Supported placeholders:
//!
//! | Placeholder          | Value                          |
//! |----------------------|--------------------------------|
//! | `{{event.type}}`     | event type                     |
//! | `{{event.action}}`   | event sub-action               |
//! | `{{event.id}}`       | delivery id                    |
//! | `{{repo.name}}`      | repository name                |
//! | `{{repo.full_name}}` | repository `owner/name`        |
//! | `{{sender.login}}`   | sender login                   |
//! | `{{var.<name>}}`     | global configuration variable  |
//!
//! Unknown placeholders are left in place.

use crate::event::Event;
use std::collections::HashMap;

/// Render `template` against `event` and the configured global variables
pub fn render(template: &str, event: &Event, variables: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = after_open[..end].trim();
        match resolve(key, event, variables) {
            Some(value) => output.push_str(&value),
            None => output.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    output.push_str(rest);
    output
}

fn resolve(key: &str, event: &Event, variables: &HashMap<String, String>) -> Option<String> {
    let value = match key {
        "event.type" => event.event_type.clone(),
        "event.action" => event.action.clone(),
        "event.id" => event.id.to_string(),
        "repo.name" => event.repository_name().to_string(),
        "repo.full_name" => event.repository_full_name().to_string(),
        "sender.login" => event.sender_login().to_string(),
        other => variables.get(other.strip_prefix("var.")?)?.clone(),
    };
    Some(value)
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
