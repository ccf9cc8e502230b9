use serde::{Deserialize, Serialize};

/// Header carrying the encoded caller identity over HTTP and WebSocket.
pub const CALLER_ID_HEADER: &str = "x-caller-id";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CallerId {
    pub principal: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub subcomponent: String,
}

impl CallerId {
    pub fn new(principal: impl Into<String>, component: impl Into<String>, subcomponent: impl Into<String>) -> Self {
        Self { principal: principal.into(), component: component.into(), subcomponent: subcomponent.into() }
    }

    /// `principal/component/subcomponent`, each part percent-encoded so `/` inside a part survives.
    pub fn to_header_value(&self) -> String {
        format!(
            "{}/{}/{}",
            urlencoding::encode(&self.principal),
            urlencoding::encode(&self.component),
            urlencoding::encode(&self.subcomponent)
        )
    }

    /// Inverse of `to_header_value`. Empty parts are kept, so an empty principal survives the
    /// round trip; only undecodable percent-escapes yield `None`.
    pub fn from_header_value(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '/');
        let principal = match parts.next() { Some(p) => urlencoding::decode(p).ok()?.into_owned(), None => String::new() };
        let component = match parts.next() { Some(p) => urlencoding::decode(p).ok()?.into_owned(), None => String::new() };
        let subcomponent = match parts.next() { Some(p) => urlencoding::decode(p).ok()?.into_owned(), None => String::new() };
        Some(Self { principal, component, subcomponent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_value_survives_separators() {
        let id = CallerId::new("svc/a b", "comp", "sub%1");
        let raw = id.to_header_value();
        assert_eq!(raw.matches('/').count(), 2);
        assert_eq!(CallerId::from_header_value(&raw), Some(id));
    }

    #[test]
    fn empty_parts_are_kept() {
        let anonymous = CallerId::new("", "c", "s");
        assert_eq!(CallerId::from_header_value(&anonymous.to_header_value()), Some(anonymous));
        assert_eq!(CallerId::from_header_value("//"), Some(CallerId::default()));
        let short = CallerId::from_header_value("only").unwrap();
        assert_eq!(short.component, "");
        assert_eq!(CallerId::from_header_value("%FF/x/y"), None);
    }
}
