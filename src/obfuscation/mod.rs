//! Text obfuscation rules.
//!
//! Rules are validated once, when an operator creates or updates them, and
//! compiled once before application. The hot path never branches on a regex
//! compile failure and never re-checks injection safety.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::RuleError;
use crate::model::ObfuscationRule;

lazy_static! {
    static ref EVENT_HANDLER_RE: Regex =
        Regex::new(r"(?i)\bon\w+\s*=").expect("hardcoded event handler pattern must compile");
}

/// Validate a rule at create/update time.
///
/// Rejects replacement text carrying a script tag or an inline event-handler
/// attribute, and regex rules whose search term does not compile. A rejected
/// rule must never be stored.
pub fn validate(rule: &ObfuscationRule) -> Result<(), RuleError> {
    let replace_lower = rule.replace_term.to_lowercase();
    if replace_lower.contains("<script") {
        return Err(RuleError::ScriptInReplacement);
    }
    if EVENT_HANDLER_RE.is_match(&rule.replace_term) {
        return Err(RuleError::EventHandlerInReplacement);
    }
    if rule.is_regex
        && let Err(e) = Regex::new(&rule.search_term)
    {
        return Err(RuleError::InvalidPattern(e.to_string()));
    }
    Ok(())
}

/// A rule resolved for application.
#[derive(Debug, Clone)]
pub enum CompiledRule {
    Literal { search: String, replace: String },
    Pattern { regex: Regex, replace: String },
}

impl CompiledRule {
    fn apply(&self, text: &str) -> String {
        match self {
            Self::Literal { search, replace } => text.replace(search.as_str(), replace),
            Self::Pattern { regex, replace } => regex
                .replace_all(text, regex::NoExpand(replace))
                .into_owned(),
        }
    }
}

/// Compile the active rules in stable storage order.
///
/// Rules were validated at write time; a rule that nevertheless fails to
/// compile (datastore edited out of band) is skipped with a warning rather
/// than taking replay down.
#[must_use]
pub fn compile(rules: &[ObfuscationRule]) -> Vec<CompiledRule> {
    let mut ordered: Vec<&ObfuscationRule> =
        rules.iter().filter(|r| r.is_active).collect();
    ordered.sort_by_key(|r| r.ordinal);

    ordered
        .into_iter()
        .filter_map(|rule| {
            if rule.is_regex {
                match Regex::new(&rule.search_term) {
                    Ok(regex) => Some(CompiledRule::Pattern {
                        regex,
                        replace: rule.replace_term.clone(),
                    }),
                    Err(e) => {
                        log::warn!(
                            target: "demoforge::replay",
                            "skipping stored rule {} with invalid pattern: {e}",
                            rule.id
                        );
                        None
                    }
                }
            } else {
                Some(CompiledRule::Literal {
                    search: rule.search_term.clone(),
                    replace: rule.replace_term.clone(),
                })
            }
        })
        .collect()
}

/// Apply compiled rules in strict sequential order.
#[must_use]
pub fn apply_compiled(html: &str, rules: &[CompiledRule]) -> String {
    let mut out = html.to_string();
    for rule in rules {
        out = rule.apply(&out);
    }
    out
}

/// Validate-free application of stored rules: compile then apply.
#[must_use]
pub fn apply(html: &str, rules: &[ObfuscationRule]) -> String {
    apply_compiled(html, &compile(rules))
}
