use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("unknown {kind} `{value}`")]
    Unknown { kind: &'static str, value: String },
}

impl DomainError {
    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        Self::Unknown {
            kind,
            value: value.into(),
        }
    }
}
