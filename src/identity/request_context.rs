use super::CallerId;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub caller_id: Option<CallerId>,
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Fresh context with a generated request id and no identity.
    pub fn new() -> Self {
        Self { caller_id: None, request_id: Some(uuid::Uuid::new_v4().to_string()) }
    }

    pub fn with_caller_id(mut self, caller_id: CallerId) -> Self {
        self.caller_id = Some(caller_id);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn request_id_or_default(&self) -> &str {
        self.request_id.as_deref().unwrap_or("-")
    }
}
