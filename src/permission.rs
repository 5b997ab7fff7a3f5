use serde::{Deserialize, Serialize};

/// Identity of the caller asking to change tracking settings or read
/// activity data.
///
/// Semantics are intentionally strict:
/// - only a superuser-equivalent caller may change the track level;
/// - the superuser flag is never deserialized from untrusted input, it has
///   to be set by the engine's own authentication layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallerContext {
    pub caller_id: String,
    #[serde(default, skip_deserializing)]
    superuser: bool,
}

impl CallerContext {
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            superuser: false,
        }
    }

    pub fn superuser(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            superuser: true,
        }
    }

    pub fn is_superuser(&self) -> bool {
        self.superuser
    }
}

#[cfg(test)]
mod tests {
    use super::CallerContext;

    #[test]
    fn superuser_flag_is_not_deserialized() {
        let raw = r#"{"caller_id":"mallory","superuser":true}"#;
        let caller: CallerContext = serde_json::from_str(raw).expect("decode");
        assert!(!caller.is_superuser());
    }

    #[test]
    fn constructors_set_expected_privilege() {
        assert!(!CallerContext::new("alice").is_superuser());
        assert!(CallerContext::superuser("admin").is_superuser());
    }
}
