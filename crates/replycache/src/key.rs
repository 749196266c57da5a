use std::fmt;

/// One half of a reply-thread link: a `"<chat-id>:<message-id>"` identity,
/// either the relayed message in the owner's chat (a forward key) or the
/// original sender's message (an origin key).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadKey {
    pub chat_id: i64,
    pub message_id: i64,
}

impl ThreadKey {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (chat, mid) = s.split_once(':')?;
        Some(Self {
            chat_id: chat.parse().ok()?,
            message_id: mid.parse().ok()?,
        })
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.message_id)
    }
}

pub(crate) fn forward_redis_key(forward: &ThreadKey) -> String {
    format!("fwd:{forward}")
}

pub(crate) fn origin_redis_key(origin: &ThreadKey) -> String {
    format!("org:{origin}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn formats_as_chat_colon_message() {
        assert_eq!(ThreadKey::new(111, 42).to_string(), "111:42");
    }

    #[test]
    fn parses_back_to_the_same_key() {
        let key = ThreadKey::new(-5, 7);
        assert_eq!(ThreadKey::parse(&key.to_string()), Some(key));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(ThreadKey::parse("no-colon-here"), None);
        assert_eq!(ThreadKey::parse("abc:def"), None);
        assert_eq!(ThreadKey::parse(""), None);
    }

    #[test]
    fn redis_keys_are_prefixed_and_disjoint() {
        let key = ThreadKey::new(111, 42);
        assert_eq!(forward_redis_key(&key), "fwd:111:42");
        assert_eq!(origin_redis_key(&key), "org:111:42");
    }
}
