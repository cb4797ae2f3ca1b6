//! Trigger matching

use oneclick_core::{FormEvent, FormEventArgs, Trigger};

/// Whether a trigger fires for a lifecycle event
pub fn trigger_matches(trigger: &Trigger, event: FormEvent, args: &FormEventArgs) -> bool {
    if trigger.event() != event {
        return false;
    }

    match trigger {
        Trigger::WorkItemLoaded { only_if_new } => !only_if_new || args.is_new,
        Trigger::FieldChanged {
            field_ref_name,
            value,
        } => match args.changed_value(field_ref_name) {
            None => false,
            Some(new_value) => value
                .as_deref()
                .map_or(true, |expected| value_text(new_value).eq_ignore_ascii_case(expected)),
        },
        _ => true,
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_must_match() {
        let args = FormEventArgs::default();
        assert!(trigger_matches(&Trigger::WorkItemSaved, FormEvent::Saved, &args));
        assert!(!trigger_matches(&Trigger::WorkItemSaved, FormEvent::Reset, &args));
    }

    #[test]
    fn test_loaded_only_if_new() {
        let trigger = Trigger::WorkItemLoaded { only_if_new: true };
        assert!(!trigger_matches(&trigger, FormEvent::Loaded, &FormEventArgs::loaded(Some(7), false)));
        assert!(trigger_matches(&trigger, FormEvent::Loaded, &FormEventArgs::loaded(None, true)));
    }

    #[test]
    fn test_field_changed_conditions() {
        let any_change = Trigger::FieldChanged {
            field_ref_name: "System.State".to_string(),
            value: None,
        };
        let to_resolved = Trigger::FieldChanged {
            field_ref_name: "System.State".to_string(),
            value: Some("resolved".to_string()),
        };

        let resolved = FormEventArgs::field_changed("System.State", json!("Resolved"));
        let active = FormEventArgs::field_changed("System.State", json!("Active"));
        let title = FormEventArgs::field_changed("System.Title", json!("Resolved"));

        assert!(trigger_matches(&any_change, FormEvent::FieldChanged, &active));
        assert!(trigger_matches(&to_resolved, FormEvent::FieldChanged, &resolved));
        assert!(!trigger_matches(&to_resolved, FormEvent::FieldChanged, &active));
        assert!(!trigger_matches(&any_change, FormEvent::FieldChanged, &title));
    }

    #[test]
    fn test_field_changed_matches_numbers() {
        let trigger = Trigger::FieldChanged {
            field_ref_name: "Microsoft.VSTS.Common.Priority".to_string(),
            value: Some("1".to_string()),
        };
        let args = FormEventArgs::field_changed("Microsoft.VSTS.Common.Priority", json!(1));
        assert!(trigger_matches(&trigger, FormEvent::FieldChanged, &args));
    }
}
