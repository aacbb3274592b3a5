mod cancel;
mod error;
mod key;
mod runner;

#[cfg(feature = "lua")]
mod lua;

pub use cancel::CancellationToken;
pub use error::VmError;
pub use key::ScriptKey;
pub use runner::{
    DocumentArg, FunctionRunner, ScriptArg, ScriptIncludes, ScriptOutput, TimeSeriesFunctions,
    TimeSeriesResult,
};

#[cfg(feature = "lua")]
pub use lua::LuaRunner;
