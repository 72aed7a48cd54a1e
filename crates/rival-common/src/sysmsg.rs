// sysmsg.rs -- system-message string conversion
//
// The client renders system messages from a compact string form:
// "@<id>" followed by vertical-tab separated key/value pairs. Token order
// is preserved because some messages repeat keys positionally.

const SEP: char = '\u{b}';

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemMessage {
    pub id: String,
    pub tokens: Vec<(String, String)>,
}

impl SystemMessage {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            tokens: Vec::new(),
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.tokens.push((key.to_string(), value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse `"@id\vkey\vvalue…"`. Returns None when the string is not a
/// system message (no leading '@').
pub fn parse_system_message(s: &str) -> Option<SystemMessage> {
    let rest = s.strip_prefix('@')?;
    let mut parts = rest.split(SEP);
    let id = parts.next()?.to_string();
    let mut tokens = Vec::new();
    loop {
        let key = match parts.next() {
            Some(k) if !k.is_empty() => k,
            _ => break,
        };
        let value = parts.next().unwrap_or("");
        tokens.push((key.to_string(), value.to_string()));
    }
    Some(SystemMessage { id, tokens })
}

pub fn build_system_message(msg: &SystemMessage) -> String {
    let mut out = format!("@{}", msg.id);
    for (key, value) in &msg.tokens {
        out.push(SEP);
        out.push_str(key);
        out.push(SEP);
        out.push_str(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let msg = SystemMessage::new("SMT_SKILL_FAIL_CATEGORY")
            .with("SkillName", "Blade Draw")
            .with("Reason", "cooldown");
        let s = build_system_message(&msg);
        assert_eq!(parse_system_message(&s), Some(msg));
    }

    #[test]
    fn test_no_tokens() {
        let msg = parse_system_message("@41").unwrap();
        assert_eq!(msg.id, "41");
        assert!(msg.tokens.is_empty());
    }

    #[test]
    fn test_not_a_system_message() {
        assert_eq!(parse_system_message("hello"), None);
    }
}
