//! Minimal selector matching for the in-memory host.
//!
//! Supports comma-separated lists of compound selectors built from `*`, a tag
//! name, `#id`, `.class`, `[attr]` and `[attr=value]` (value optionally
//! quoted). Combinators are not supported; a selector using them matches
//! nothing.

/// One simple condition of a compound selector.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Tag(String),
    Id(String),
    Class(String),
    HasAttribute(String),
    AttributeEquals(String, String),
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorList {
    alternatives: Vec<Vec<Condition>>,
}

impl SelectorList {
    /// Parses `input`, returning `None` for unsupported syntax.
    pub(crate) fn parse(input: &str) -> Option<Self> {
        let alternatives = input
            .split(',')
            .map(|part| parse_compound(part.trim()))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { alternatives })
    }

    /// Returns true if an element with `tag` and `attribute` lookup matches.
    pub(crate) fn matches<'a>(
        &self,
        tag: &str,
        attribute: impl Fn(&str) -> Option<&'a str> + Copy,
    ) -> bool {
        self.alternatives.iter().any(|conditions| {
            conditions.iter().all(|condition| match condition {
                Condition::Tag(name) => name.eq_ignore_ascii_case(tag),
                Condition::Id(id) => attribute("id") == Some(id.as_str()),
                Condition::Class(class) => attribute("class")
                    .is_some_and(|list| list.split_whitespace().any(|c| c == class.as_str())),
                Condition::HasAttribute(name) => attribute(name.as_str()).is_some(),
                Condition::AttributeEquals(name, value) => {
                    attribute(name.as_str()) == Some(value.as_str())
                }
            })
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(rest: &str) -> Option<(&str, &str)> {
    let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
    (end > 0).then(|| rest.split_at(end))
}

fn parse_compound(input: &str) -> Option<Vec<Condition>> {
    if input.is_empty() {
        return None;
    }

    let mut conditions = Vec::new();
    let mut rest = input;

    if let Some(after) = rest.strip_prefix('*') {
        rest = after;
    } else if let Some((tag, after)) = take_ident(rest) {
        conditions.push(Condition::Tag(tag.to_string()));
        rest = after;
    }

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('#') {
            let (id, after) = take_ident(after)?;
            conditions.push(Condition::Id(id.to_string()));
            rest = after;
        } else if let Some(after) = rest.strip_prefix('.') {
            let (class, after) = take_ident(after)?;
            conditions.push(Condition::Class(class.to_string()));
            rest = after;
        } else if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']')?;
            conditions.push(parse_attribute(&after[..close])?);
            rest = &after[close + 1..];
        } else {
            return None;
        }
    }

    Some(conditions)
}

fn parse_attribute(body: &str) -> Option<Condition> {
    match body.split_once('=') {
        None => {
            let name = body.trim();
            let (ident, tail) = take_ident(name)?;
            tail.is_empty()
                .then(|| Condition::HasAttribute(ident.to_string()))
        }
        Some((name, value)) => {
            let (ident, tail) = take_ident(name.trim())?;
            if !tail.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some(Condition::AttributeEquals(
                ident.to_string(),
                value.to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(attrs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<&'a str> + Copy + 'a {
        move |name: &str| attrs.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
    }

    #[test]
    fn test_id_and_tag() {
        let attrs = [("id", "btn"), ("disabled", "")];
        let list = SelectorList::parse("#btn").unwrap();
        assert!(list.matches("button", lookup(&attrs)));

        let list = SelectorList::parse("button#btn").unwrap();
        assert!(list.matches("BUTTON", lookup(&attrs)));

        let list = SelectorList::parse("a#btn").unwrap();
        assert!(!list.matches("button", lookup(&attrs)));
    }

    #[test]
    fn test_class_and_attributes() {
        let attrs = [("class", "primary locked"), ("data-role", "pay")];
        assert!(SelectorList::parse(".locked")
            .unwrap()
            .matches("div", lookup(&attrs)));
        assert!(SelectorList::parse("[data-role]")
            .unwrap()
            .matches("div", lookup(&attrs)));
        assert!(SelectorList::parse("[data-role=\"pay\"]")
            .unwrap()
            .matches("div", lookup(&attrs)));
        assert!(!SelectorList::parse("[data-role=refund]")
            .unwrap()
            .matches("div", lookup(&attrs)));
    }

    #[test]
    fn test_selector_list() {
        let attrs = [("id", "b")];
        let list = SelectorList::parse("#a, #b").unwrap();
        assert!(list.matches("span", lookup(&attrs)));
        assert!(SelectorList::parse("*").unwrap().matches("span", lookup(&attrs)));
    }

    #[test]
    fn test_unsupported_syntax() {
        assert!(SelectorList::parse("div > span").is_none());
        assert!(SelectorList::parse("").is_none());
        assert!(SelectorList::parse("#").is_none());
        assert!(SelectorList::parse("[unterminated").is_none());
    }
}
