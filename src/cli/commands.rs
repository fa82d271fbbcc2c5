//! CLI command implementations.
//!
//! There is no durable, cross-invocation state in this crate (see
//! `engine::Engine`'s module doc), so every command builds a fresh engine
//! and replays an optional `"seed"` block (prior namespaces/documents/
//! indexes) before performing its own operation.

use serde_json::{json, Value};

use crate::engine::Engine;
use crate::explain::ExplainReport;
use crate::storage::NamespaceKind;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_response};
use super::model::{parse_index_spec, parse_query};

pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::CreateNamespace => create_namespace(),
        Command::Insert => insert(),
        Command::CreateIndex => create_index(),
        Command::Query => query(),
    }
}

fn field<'a>(v: &'a Value, name: &str) -> CliResult<&'a Value> {
    v.get(name).ok_or_else(|| CliError::bad_request(format!("missing field '{name}'")))
}

fn as_str<'a>(v: &'a Value, name: &str) -> CliResult<&'a str> {
    v.as_str().ok_or_else(|| CliError::bad_request(format!("'{name}' must be a string")))
}

fn parse_namespace_kind(v: &Value) -> CliResult<NamespaceKind> {
    match as_str(field(v, "kind")?, "kind")? {
        "normal" => Ok(NamespaceKind::Normal),
        "capped" => Ok(NamespaceKind::Capped),
        other => Err(CliError::bad_request(format!("unknown namespace kind '{other}'"))),
    }
}

fn parse_extents(v: &Value) -> CliResult<Option<Vec<u64>>> {
    match v.get("extents") {
        None => Ok(None),
        Some(arr) => {
            let arr = arr.as_array().ok_or_else(|| CliError::bad_request("'extents' must be an array"))?;
            let extents = arr
                .iter()
                .map(|e| e.as_u64().ok_or_else(|| CliError::bad_request("each extent capacity must be a non-negative integer")))
                .collect::<CliResult<Vec<u64>>>()?;
            Ok(Some(extents))
        }
    }
}

/// Replays prior setup so a single CLI invocation can exercise state built
/// up across several logical steps: namespaces first, then indexes, then
/// documents, so indexes exist before any document they'd otherwise need
/// to retroactively cover.
fn apply_seed(engine: &mut Engine, seed: &Value) -> CliResult<()> {
    if let Some(namespaces) = seed.get("namespaces") {
        let arr = namespaces.as_array().ok_or_else(|| CliError::bad_request("'seed.namespaces' must be an array"))?;
        for entry in arr {
            let namespace = as_str(field(entry, "namespace")?, "namespace")?;
            let kind = parse_namespace_kind(entry)?;
            let extents = parse_extents(entry)?;
            engine.create_namespace(namespace, kind, extents.as_deref())?;
        }
    }

    if let Some(indexes) = seed.get("indexes") {
        let arr = indexes.as_array().ok_or_else(|| CliError::bad_request("'seed.indexes' must be an array"))?;
        for entry in arr {
            let namespace = as_str(field(entry, "namespace")?, "namespace")?;
            let spec = parse_index_spec(field(entry, "index")?)?;
            engine.create_index(namespace, spec)?;
        }
    }

    if let Some(documents) = seed.get("documents") {
        let arr = documents.as_array().ok_or_else(|| CliError::bad_request("'seed.documents' must be an array"))?;
        for entry in arr {
            let namespace = as_str(field(entry, "namespace")?, "namespace")?;
            let document = field(entry, "document")?.clone();
            engine.insert(namespace, document)?;
        }
    }

    Ok(())
}

fn fresh_engine(request: &Value) -> CliResult<Engine> {
    let mut engine = Engine::default();
    if let Some(seed) = request.get("seed") {
        apply_seed(&mut engine, seed)?;
    }
    Ok(engine)
}

pub fn create_namespace() -> CliResult<()> {
    let request = read_request()?;
    let mut engine = fresh_engine(&request)?;

    let namespace = as_str(field(&request, "namespace")?, "namespace")?.to_string();
    let kind = parse_namespace_kind(&request)?;
    let extents = parse_extents(&request)?;
    engine.create_namespace(&namespace, kind, extents.as_deref())?;

    write_response(json!({"namespace": namespace, "created": true}))?;
    Ok(())
}

pub fn insert() -> CliResult<()> {
    let request = read_request()?;
    let mut engine = fresh_engine(&request)?;

    let namespace = as_str(field(&request, "namespace")?, "namespace")?.to_string();
    let document = field(&request, "document")?.clone();
    let location = engine.insert(&namespace, document)?;

    write_response(json!({"inserted": true, "location": {"fileId": location.file_id, "offset": location.offset}}))?;
    Ok(())
}

pub fn create_index() -> CliResult<()> {
    let request = read_request()?;
    let mut engine = fresh_engine(&request)?;

    let namespace = as_str(field(&request, "namespace")?, "namespace")?.to_string();
    let spec = parse_index_spec(field(&request, "index")?)?;
    let name = spec.name.clone();
    engine.create_index(&namespace, spec)?;

    write_response(json!({"namespace": namespace, "index": name, "created": true}))?;
    Ok(())
}

pub fn query() -> CliResult<()> {
    let request = read_request()?;
    let mut engine = fresh_engine(&request)?;

    let query_spec = field(&request, "query")?;
    let query = parse_query(query_spec)?;
    let (results, explain) = engine.query(&query)?;

    write_response(json!({"results": results, "explain": explain_to_json(&explain)}))?;
    Ok(())
}

fn explain_to_json(report: &ExplainReport) -> Value {
    serde_json::to_value(report).unwrap_or(Value::Null)
}
