#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("script execution cancelled")]
    Cancelled,
    #[error("function not found: {0}")]
    FunctionNotFound(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("no runner available for function '{0}'")]
    Unavailable(String),
}

#[cfg(feature = "lua")]
impl From<mlua::Error> for VmError {
    fn from(e: mlua::Error) -> Self {
        Self::Script(e.to_string())
    }
}
