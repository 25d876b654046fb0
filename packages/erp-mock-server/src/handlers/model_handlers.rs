//! Model methods: introspection and CRUD.

use serde_json::{json, Value};

use crate::error::ServerError;
use crate::router::AppState;

use super::request_utils::{ids_param, names_param, split_context, usize_param};

/// Executes `method` on `model` inside `database`.
///
/// # Methods
/// - `fields_get([names], ctx)` → `{name: descriptor}`
/// - `create([values, ...], ctx)` → `[id, ...]`
/// - `read(ids, [fields], ctx)` → `[{"id": ..., field: value}, ...]`
/// - `write(ids, values, ctx)` → `null`
/// - `delete(ids, ctx)` → `null`
/// - `search(domain, offset, limit, order, ctx)` → `[id, ...]`
/// - `search_count(domain, ctx)` → integer
///
/// The trailing context argument is accepted and ignored.
pub fn execute(
    database: &str,
    model: &str,
    method: &str,
    params: &[Value],
    state: &AppState,
) -> Result<Value, ServerError> {
    match method {
        "fields_get" => {
            // The name list is optional and never an object, so a lone
            // trailing object is always the context.
            let args = split_context(params, 0);
            let names = names_param(args, 0)?;
            state
                .registry
                .with_database(database, |db| Ok(Value::Object(db.model(model)?.fields_get(&names)?)))
        }
        "read" => {
            let args = split_context(params, 2);
            let ids = ids_param(args, 0)?;
            let fields = names_param(args, 1)?;
            state
                .registry
                .with_database(database, |db| Ok(json!(db.model(model)?.read(&ids, &fields)?)))
        }
        "search" => {
            let args = split_context(params, 4);
            let domain = args.first().cloned().unwrap_or(Value::Null);
            let offset = usize_param(args, 1, "offset")?.unwrap_or(0);
            let limit = usize_param(args, 2, "limit")?;
            let order = args.get(3).cloned().unwrap_or(Value::Null);
            state.registry.with_database(database, |db| {
                Ok(json!(db.model(model)?.search(&domain, offset, limit, &order)?))
            })
        }
        "search_count" => {
            let args = split_context(params, 1);
            let domain = args.first().cloned().unwrap_or(Value::Null);
            state
                .registry
                .with_database(database, |db| Ok(json!(db.model(model)?.search_count(&domain)?)))
        }
        "create" => {
            let args = split_context(params, 1);
            let values_list = args
                .first()
                .and_then(Value::as_array)
                .ok_or_else(|| ServerError::InvalidParams("create expects a list".to_string()))?;
            state
                .registry
                .with_database_mut(database, |db| Ok(json!(db.model_mut(model)?.create(values_list)?)))
        }
        "write" => {
            let args = split_context(params, 2);
            let ids = ids_param(args, 0)?;
            let values = args
                .get(1)
                .ok_or_else(|| ServerError::InvalidParams("write expects values".to_string()))?;
            state.registry.with_database_mut(database, |db| {
                db.model_mut(model)?.write(&ids, values)?;
                Ok(Value::Null)
            })
        }
        "delete" => {
            let args = split_context(params, 1);
            let ids = ids_param(args, 0)?;
            state.registry.with_database_mut(database, |db| {
                db.model_mut(model)?.delete(&ids)?;
                Ok(Value::Null)
            })
        }
        other => Err(ServerError::MethodNotFound(format!("model.{}.{}", model, other))),
    }
}
