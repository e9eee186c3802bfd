//! Construction-time validation errors. Per the error handling design,
//! this is the only place an `Err` crosses a public boundary in this
//! crate; transient admin failures and tracker inconsistencies are logged
//! and absorbed instead.

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("targetRoutingService must not be empty")]
    EmptyTarget,

    #[error("requestTimeout must be greater than zero")]
    NonPositiveTimeout,

    #[error("xml content length {len} exceeds transport maximum {max}")]
    XmlTooLong { len: usize, max: usize },

    #[error("failed to load configuration from environment: {0}")]
    Env(String),
}
