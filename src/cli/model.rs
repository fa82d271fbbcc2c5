//! Translates a raw JSON request body into the planner/index types the
//! engine expects. Each request is self-contained: there is no persisted
//! configuration to consult, so every field the engine needs travels in
//! the request itself.

use serde_json::Value;

use crate::index::{IndexDirection, IndexSpec};
use crate::planner::{Clause, Predicate, Query, SortSpec};

use super::errors::{CliError, CliResult};

fn field(v: &Value, name: &str) -> CliResult<Value> {
    v.get(name).cloned().ok_or_else(|| CliError::bad_request(format!("missing field '{name}'")))
}

fn as_str<'a>(v: &'a Value, name: &str) -> CliResult<&'a str> {
    v.as_str().ok_or_else(|| CliError::bad_request(format!("'{name}' must be a string")))
}

pub fn parse_direction(v: &Value) -> CliResult<IndexDirection> {
    match v.as_str() {
        Some("asc") => Ok(IndexDirection::Asc),
        Some("desc") => Ok(IndexDirection::Desc),
        _ => Err(CliError::bad_request("direction must be \"asc\" or \"desc\"")),
    }
}

pub fn parse_index_spec(v: &Value) -> CliResult<IndexSpec> {
    let name = as_str(&field(v, "name")?, "name")?.to_string();
    let fields_val = field(v, "fields")?;
    let fields_arr = fields_val.as_array().ok_or_else(|| CliError::bad_request("'fields' must be an array"))?;
    if fields_arr.is_empty() {
        return Err(CliError::bad_request("an index needs at least one field"));
    }
    let mut fields = Vec::with_capacity(fields_arr.len());
    for pair in fields_arr {
        let arr = pair.as_array().ok_or_else(|| CliError::bad_request("each index field entry must be [name, direction]"))?;
        if arr.len() != 2 {
            return Err(CliError::bad_request("each index field entry must be [name, direction]"));
        }
        let field_name = as_str(&arr[0], "field")?.to_string();
        let direction = parse_direction(&arr[1])?;
        fields.push((field_name, direction));
    }
    Ok(IndexSpec::new(name, fields))
}

pub fn parse_predicate(v: &Value) -> CliResult<Predicate> {
    let field_name = as_str(&field(v, "field")?, "field")?.to_string();
    let op = as_str(&field(v, "op")?, "op")?.to_string();
    match op.as_str() {
        "eq" => Ok(Predicate::eq(field_name, field(v, "value")?)),
        "gte" => Ok(Predicate::gte(field_name, field(v, "value")?)),
        "gt" => Ok(Predicate::gt(field_name, field(v, "value")?)),
        "lte" => Ok(Predicate::lte(field_name, field(v, "value")?)),
        "lt" => Ok(Predicate::lt(field_name, field(v, "value")?)),
        "regex" => Ok(Predicate::regex(field_name, as_str(&field(v, "value")?, "value")?.to_string())),
        "exists" => {
            let present = field(v, "value")?.as_bool().ok_or_else(|| CliError::bad_request("'exists' value must be a bool"))?;
            Ok(Predicate::exists(field_name, present))
        }
        "near" => {
            let value = field(v, "value")?;
            let lon = value.get("lon").and_then(Value::as_f64).ok_or_else(|| CliError::bad_request("'near' requires numeric 'lon'"))?;
            let lat = value.get("lat").and_then(Value::as_f64).ok_or_else(|| CliError::bad_request("'near' requires numeric 'lat'"))?;
            let max_distance_m = value.get("maxDistanceM").and_then(Value::as_f64);
            Ok(Predicate::near(field_name, lon, lat, max_distance_m))
        }
        other => Err(CliError::bad_request(format!("unknown predicate operator '{other}'"))),
    }
}

pub fn parse_clause(v: &Value) -> CliResult<Clause> {
    let arr = v.as_array().ok_or_else(|| CliError::bad_request("a clause must be an array of predicates"))?;
    arr.iter().map(parse_predicate).collect()
}

pub fn parse_query(v: &Value) -> CliResult<Query> {
    let namespace = as_str(&field(v, "namespace")?, "namespace")?.to_string();
    let mut query = Query::new(namespace);

    if let Some(clauses_val) = v.get("clauses") {
        let arr = clauses_val.as_array().ok_or_else(|| CliError::bad_request("'clauses' must be an array"))?;
        if arr.is_empty() {
            return Err(CliError::bad_request("'clauses' must contain at least one clause"));
        }
        let mut clauses = arr.iter().map(parse_clause).collect::<CliResult<Vec<_>>>()?;
        query = query.with_clause(clauses.remove(0));
        for clause in clauses {
            query = query.with_clause(clause);
        }
    }

    if let Some(sort_val) = v.get("sort") {
        let arr = sort_val.as_array().ok_or_else(|| CliError::bad_request("'sort' must be an array"))?;
        let mut sort_specs = Vec::with_capacity(arr.len());
        for entry in arr {
            let field_name = as_str(&field(entry, "field")?, "field")?.to_string();
            let direction = parse_direction(&field(entry, "direction")?)?;
            sort_specs.push(match direction {
                IndexDirection::Asc => SortSpec::asc(field_name),
                IndexDirection::Desc => SortSpec::desc(field_name),
            });
        }
        query = query.with_sort(sort_specs);
    }

    if let Some(limit) = v.get("limit") {
        let limit = limit.as_u64().ok_or_else(|| CliError::bad_request("'limit' must be a non-negative integer"))?;
        query = query.with_limit(limit);
    }

    if let Some(hint) = v.get("hint") {
        query = query.with_hint(as_str(hint, "hint")?.to_string());
    }

    if v.get("snapshot").and_then(Value::as_bool).unwrap_or(false) {
        query = query.with_snapshot();
    }

    if v.get("allowOutOfOrder").and_then(Value::as_bool).unwrap_or(false) {
        query = query.with_allow_out_of_order();
    }

    Ok(query)
}
