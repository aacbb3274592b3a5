//! Lua implementation of [`FunctionRunner`].
//!
//! One Lua state per [`ScriptKey`], compiled on first use and reused for
//! every later call with an equal key. Scripts see two globals besides the
//! declared functions: `include(id)` and `include_cmpxchg(key)`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bson::{Bson, Document};
use mlua::{Lua, MultiValue, Table, Value};
use tracing::{debug, trace};

use crate::cancel::CancellationToken;
use crate::error::VmError;
use crate::key::ScriptKey;
use crate::runner::{FunctionRunner, ScriptArg, ScriptIncludes, ScriptOutput};

struct LuaScript {
    lua: Lua,
    includes: Arc<Mutex<ScriptIncludes>>,
}

#[derive(Default)]
pub struct LuaRunner {
    scripts: HashMap<ScriptKey, LuaScript>,
}

impl LuaRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compiled script instances held.
    pub fn compiled(&self) -> usize {
        self.scripts.len()
    }

    fn script(&mut self, key: &ScriptKey) -> Result<&LuaScript, VmError> {
        if !self.scripts.contains_key(key) {
            let script = compile(key)?;
            debug!(functions = key.functions().len(), "compiled lua script");
            self.scripts.insert(key.clone(), script);
        }
        self.scripts
            .get(key)
            .ok_or_else(|| VmError::Script("script cache lost an entry".into()))
    }
}

fn compile(key: &ScriptKey) -> Result<LuaScript, VmError> {
    let lua = Lua::new();
    let includes = Arc::new(Mutex::new(ScriptIncludes::default()));

    let documents = Arc::clone(&includes);
    let include = lua.create_function(move |_, id: String| {
        let mut guard = documents
            .lock()
            .map_err(|_| mlua::Error::runtime("include set poisoned"))?;
        guard.documents.push(id);
        Ok(())
    })?;
    let cmpxchg = Arc::clone(&includes);
    let include_cmpxchg = lua.create_function(move |_, key: String| {
        let mut guard = cmpxchg
            .lock()
            .map_err(|_| mlua::Error::runtime("include set poisoned"))?;
        guard.compare_exchange.push(key);
        Ok(())
    })?;

    let globals = lua.globals();
    globals.set("include", include)?;
    globals.set("include_cmpxchg", include_cmpxchg)?;

    for text in key.scripts() {
        lua.load(text).exec()?;
    }

    Ok(LuaScript { lua, includes })
}

impl FunctionRunner for LuaRunner {
    fn run(
        &mut self,
        key: &ScriptKey,
        function: &str,
        args: &[ScriptArg<'_>],
        token: &CancellationToken,
    ) -> Result<ScriptOutput, VmError> {
        token.check()?;
        let script = self.script(key)?;
        let lua = &script.lua;

        let func: Value = lua.globals().get(function)?;
        let Value::Function(func) = func else {
            return Err(VmError::FunctionNotFound(function.to_string()));
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(to_lua(lua, &arg.to_bson())?);
        }
        trace!(function, args = values.len(), "calling lua function");
        let result: Value = func.call(values.into_iter().collect::<MultiValue>())?;
        token.check()?;

        let value = from_lua(result)?;
        let includes = script
            .includes
            .lock()
            .map(|mut guard| std::mem::take(&mut *guard))
            .map_err(|_| VmError::Script("include set poisoned".into()))?;
        Ok(ScriptOutput { value, includes })
    }
}

// ── Marshaling ──────────────────────────────────────────────────

fn to_lua(lua: &Lua, value: &Bson) -> Result<Value, VmError> {
    Ok(match value {
        Bson::Null | Bson::Undefined => Value::Nil,
        Bson::Boolean(b) => Value::Boolean(*b),
        Bson::Int32(i) => Value::Integer(i64::from(*i)),
        Bson::Int64(i) => Value::Integer(*i),
        Bson::Double(d) => Value::Number(*d),
        Bson::String(s) => Value::String(lua.create_string(s)?),
        Bson::DateTime(dt) => Value::Integer(dt.timestamp_millis()),
        Bson::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, to_lua(lua, item)?)?;
            }
            Value::Table(table)
        }
        Bson::Document(doc) => {
            let table = lua.create_table()?;
            for (k, v) in doc {
                table.raw_set(k.as_str(), to_lua(lua, v)?)?;
            }
            Value::Table(table)
        }
        other => Value::String(lua.create_string(other.to_string())?),
    })
}

fn from_lua(value: Value) -> Result<Bson, VmError> {
    Ok(match value {
        Value::Nil => Bson::Null,
        Value::Boolean(b) => Bson::Boolean(b),
        Value::Integer(i) => i32::try_from(i).map(Bson::Int32).unwrap_or(Bson::Int64(i)),
        Value::Number(n) => Bson::Double(n),
        Value::String(s) => Bson::String(s.to_string_lossy().to_string()),
        Value::Table(table) => table_to_bson(table)?,
        other => {
            return Err(VmError::Script(format!(
                "cannot return a {} from a projection",
                other.type_name()
            )));
        }
    })
}

// Tables with a sequence part are arrays, everything else a document with
// keys in sorted order.
fn table_to_bson(table: Table) -> Result<Bson, VmError> {
    let len = table.raw_len();
    if len > 0 {
        let mut items = Vec::with_capacity(len);
        for i in 1..=len {
            items.push(from_lua(table.raw_get(i)?)?);
        }
        return Ok(Bson::Array(items));
    }

    let mut entries = Vec::new();
    for pair in table.pairs::<Value, Value>() {
        let (k, v) = pair?;
        let key = match k {
            Value::String(s) => s.to_string_lossy().to_string(),
            Value::Integer(i) => i.to_string(),
            other => {
                return Err(VmError::Script(format!(
                    "unsupported table key type {}",
                    other.type_name()
                )));
            }
        };
        entries.push((key, from_lua(v)?));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut doc = Document::new();
    for (k, v) in entries {
        doc.insert(k, v);
    }
    Ok(Bson::Document(doc))
}
