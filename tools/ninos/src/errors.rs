use thiserror::Error;

#[derive(Debug, Error)]
pub enum NinosError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("no active restoration registry: spies can only be installed between begin_test and end_test")]
    NoActiveRegistry,
    #[error("cannot spy on `{name}`: no such method and no replacement given")]
    MissingMethod { name: String },
    #[error("cannot spy on `{name}`: method is absent and spy.allow_absent_method is off")]
    AbsentMethodDisallowed { name: String },
}
