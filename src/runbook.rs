//! Runbook resolution (C5): pick the first matching rule and render its
//! URL template.

use crate::model::RunbookRule;

/// `fnmatch`-equivalent glob match, case-sensitive, using shell glob syntax
/// (`*`, `?`, `[...]`) as the original's `fnmatch.fnmatch` does.
fn glob_match(pattern: &str, value: &str) -> bool {
    glob::Pattern::new(pattern)
        .map(|p| p.matches(value))
        .unwrap_or(false)
}

/// Rules are assumed pre-sorted by ascending priority then created_at
/// (the store returns them that way). Returns the first rule whose
/// service/name globs match.
pub fn find_matching_rule<'a>(
    rules: &'a [RunbookRule],
    service: Option<&str>,
    name: &str,
) -> Option<&'a RunbookRule> {
    rules.iter().find(|rule| {
        let service_ok = glob_match(&rule.service_pattern, service.unwrap_or(""));
        let name_ok = rule
            .name_pattern
            .as_deref()
            .map(|pat| glob_match(pat, name))
            .unwrap_or(true);
        service_ok && name_ok
    })
}

/// Render `{service}`, `{host}`, `{name}`, `{environment}` tokens.
/// Unknown `{…}` tokens are preserved verbatim; null substitutions render
/// as the empty string.
pub fn resolve_template(
    template: &str,
    service: Option<&str>,
    host: Option<&str>,
    name: &str,
    environment: Option<&str>,
) -> String {
    let mut known = std::collections::HashMap::new();
    known.insert("service", service.unwrap_or(""));
    known.insert("host", host.unwrap_or(""));
    known.insert("name", name);
    known.insert("environment", environment.unwrap_or(""));

    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i..].find('}') {
                let key = &template[i + 1..i + end];
                if let Some(v) = known.get(key) {
                    out.push_str(v);
                } else {
                    out.push_str(&template[i..i + end + 1]);
                }
                i += end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn rule(pattern: &str, name_pattern: Option<&str>, priority: i32) -> RunbookRule {
        RunbookRule {
            id: Uuid::new_v4(),
            service_pattern: pattern.into(),
            name_pattern: name_pattern.map(|s| s.to_string()),
            runbook_url_template: "https://runbooks/{service}/{name}".into(),
            description: None,
            priority,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn first_matching_rule_wins_by_priority() {
        let rules = vec![rule("api-*", None, 5), rule("api-gateway", None, 1)];
        let found = find_matching_rule(&rules, Some("api-gateway"), "HighCPU").unwrap();
        assert_eq!(found.priority, 5);
    }

    #[test]
    fn name_pattern_is_optional() {
        let rules = vec![rule("api-*", Some("HighCPU"), 0)];
        assert!(find_matching_rule(&rules, Some("api-gateway"), "HighCPU").is_some());
        assert!(find_matching_rule(&rules, Some("api-gateway"), "HighMem").is_none());
    }

    #[test]
    fn missing_service_matches_empty_string_pattern() {
        let rules = vec![rule("*", None, 0)];
        assert!(find_matching_rule(&rules, None, "HighCPU").is_some());
    }

    #[test]
    fn template_preserves_unknown_tokens_and_nulls_render_empty() {
        let rendered = resolve_template("https://x/{service}/{unknown}/{host}", Some("api"), None, "n", None);
        assert_eq!(rendered, "https://x/api/{unknown}/");
    }
}
