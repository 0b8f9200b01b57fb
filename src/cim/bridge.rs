/*!
bridge.rs - [`Namespace`] over an MCP management bridge.

The bridge is a process that speaks MCP on stdio and owns the actual
CIM/WBEM connection to the managed host. Each CIM intrinsic operation is one
bridge tool; arguments and replies are JSON objects:

| tool                 | arguments                                           | reply                        |
|----------------------|-----------------------------------------------------|------------------------------|
| `EnumerateInstances` | `namespace`, `class_name`                           | `{"instances": [Instance]}`  |
| `GetInstance`        | `path`                                              | `{"instance": Instance}`     |
| `Associators`        | `path`, `assoc_class?`, `result_class?`             | `{"instances": [Instance]}`  |
| `References`         | `path`, `result_class?`                             | `{"instances": [Instance]}`  |
| `InvokeMethod`       | `path`, `method`, `params`, `wait_for_job`          | `{"return_value", "out"}`    |
| `CreateInstance`     | `namespace`, `class_name`, `properties`             | `{"path": ObjectPath}`       |
| `ModifyInstance`     | `path`, `properties`                                | `{}`                         |
| `DeleteInstance`     | `path`                                              | `{}`                         |

Replies come as `structuredContent`, or as JSON text in the first text
content block. A tool result flagged `isError` carries the provider's
message as text.

The CLI is synchronous; the connection owns a Tokio runtime and blocks on
every request.
*/

use anyhow::Context;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value, json};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, trace};

use super::target::TargetSpec;
use super::{Instance, MethodResult, Namespace, ObjectPath};
use crate::error::{Error, Result};

pub struct BridgeNamespace {
    namespace: String,
    label: String,
    runtime: tokio::runtime::Runtime,
    service: Option<RunningService<RoleClient, ()>>,
}

impl BridgeNamespace {
    /// Spawn the bridge for `spec` and complete the MCP handshake.
    ///
    /// The bridge's stderr is discarded unless `bridge_stderr` is set.
    pub fn connect(spec: &TargetSpec, namespace: &str, bridge_stderr: bool) -> Result<Self> {
        let (program, args) = match spec {
            TargetSpec::Command { program, args, .. } => (program.clone(), args.clone()),
            TargetSpec::Url { url, .. } => {
                return Err(Error::Transport(format!(
                    "cannot connect to {url}: URL targets are not supported, \
                     use a bridge command such as \"ssh HOST lmi-bridge\""
                )));
            }
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to create Tokio runtime")?;

        let started = Instant::now();
        let service = runtime.block_on(async {
            let transport = TokioChildProcess::new(Command::new(&program).configure(|c| {
                for a in &args {
                    c.arg(a);
                }
                if !bridge_stderr {
                    c.stderr(std::process::Stdio::null());
                }
            }))
            .with_context(|| format!("Failed to spawn bridge process: {program}"))?;
            ().serve(transport)
                .await
                .with_context(|| format!("Failed to initialize bridge session: '{spec}'"))
        })?;
        debug!(
            target = %spec,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bridge connected"
        );

        Ok(Self {
            namespace: namespace.to_string(),
            label: spec.host_label(),
            runtime,
            service: Some(service),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn request(&self, tool: &'static str, arguments: Map<String, Value>) -> Result<Value> {
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| Error::Transport("bridge session already closed".into()))?;
        let logged = serde_json::Value::Object(arguments.clone());
        trace!(tool, arguments = %logged, "bridge request");

        let result = self.runtime.block_on(async {
            service
                .call_tool(CallToolRequestParam {
                    name: tool.into(),
                    arguments: Some(arguments),
                })
                .await
                .with_context(|| format!("bridge call failed: {tool}"))
        })?;

        let raw = serde_json::to_value(&result)
            .map_err(|e| Error::Malformed(format!("{tool}: unable to serialize result: {e}")))?;
        decode_reply(tool, &raw)
    }

    fn path_args(&self, path: &ObjectPath) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("path".into(), self.qualified(path).to_value());
        args
    }

    fn qualified(&self, path: &ObjectPath) -> ObjectPath {
        if path.namespace.is_empty() {
            let mut p = path.clone();
            p.namespace = self.namespace.clone();
            p
        } else {
            path.clone()
        }
    }
}

impl Drop for BridgeNamespace {
    fn drop(&mut self) {
        if let Some(service) = self.service.take() {
            // Best effort; the child is killed with the transport anyway.
            let _ = self.runtime.block_on(service.cancel());
        }
    }
}

impl Namespace for BridgeNamespace {
    fn name(&self) -> &str {
        &self.namespace
    }

    fn instances(&self, class_name: &str) -> Result<Vec<Instance>> {
        let mut args = Map::new();
        args.insert("namespace".into(), json!(self.namespace));
        args.insert("class_name".into(), json!(class_name));
        instances_from("EnumerateInstances", self.request("EnumerateInstances", args)?)
    }

    fn get_instance(&self, path: &ObjectPath) -> Result<Instance> {
        let reply = self.request("GetInstance", self.path_args(path))?;
        let inst = reply
            .get("instance")
            .cloned()
            .ok_or_else(|| Error::Malformed("GetInstance: missing 'instance'".into()))?;
        serde_json::from_value(inst).map_err(|e| Error::Malformed(format!("GetInstance: {e}")))
    }

    fn associators(
        &self,
        path: &ObjectPath,
        assoc_class: Option<&str>,
        result_class: Option<&str>,
    ) -> Result<Vec<Instance>> {
        let mut args = self.path_args(path);
        if let Some(c) = assoc_class {
            args.insert("assoc_class".into(), json!(c));
        }
        if let Some(c) = result_class {
            args.insert("result_class".into(), json!(c));
        }
        instances_from("Associators", self.request("Associators", args)?)
    }

    fn references(&self, path: &ObjectPath, result_class: Option<&str>) -> Result<Vec<Instance>> {
        let mut args = self.path_args(path);
        if let Some(c) = result_class {
            args.insert("result_class".into(), json!(c));
        }
        instances_from("References", self.request("References", args)?)
    }

    fn invoke_method(
        &self,
        path: &ObjectPath,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<MethodResult> {
        let mut args = self.path_args(path);
        args.insert("method".into(), json!(method));
        args.insert("params".into(), Value::Object(params));
        args.insert("wait_for_job".into(), json!(true));
        let reply = self.request("InvokeMethod", args)?;
        let return_value = reply.get("return_value").cloned().unwrap_or(Value::Null);
        debug!(method, path = %path, return_value = %return_value, "method invoked");
        Ok(MethodResult {
            return_value,
            out: reply
                .get("out")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
    }

    fn create_instance(
        &self,
        class_name: &str,
        properties: Map<String, Value>,
    ) -> Result<ObjectPath> {
        let mut args = Map::new();
        args.insert("namespace".into(), json!(self.namespace));
        args.insert("class_name".into(), json!(class_name));
        args.insert("properties".into(), Value::Object(properties));
        let reply = self.request("CreateInstance", args)?;
        reply
            .get("path")
            .and_then(ObjectPath::from_value)
            .ok_or_else(|| Error::Malformed("CreateInstance: missing 'path'".into()))
    }

    fn modify_instance(&self, path: &ObjectPath, properties: Map<String, Value>) -> Result<()> {
        let mut args = self.path_args(path);
        args.insert("properties".into(), Value::Object(properties));
        self.request("ModifyInstance", args).map(|_| ())
    }

    fn delete_instance(&self, path: &ObjectPath) -> Result<()> {
        self.request("DeleteInstance", self.path_args(path))
            .map(|_| ())
    }
}

/// Extract the JSON payload of a serialized `CallToolResult`.
fn decode_reply(tool: &str, raw: &Value) -> Result<Value> {
    let first_text = raw
        .get("content")
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .find_map(|c| c.get("text").and_then(Value::as_str))
        });

    if raw.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        let msg = first_text.unwrap_or("bridge reported an error without a message");
        return Err(Error::Failed(format!("{tool}: {msg}")));
    }

    if let Some(structured) = raw.get("structuredContent").filter(|v| !v.is_null()) {
        return Ok(structured.clone());
    }

    match first_text {
        Some(text) if text.trim().is_empty() => Ok(Value::Object(Map::new())),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| Error::Malformed(format!("{tool}: reply is not JSON: {e}"))),
        None => Ok(Value::Object(Map::new())),
    }
}

fn instances_from(tool: &str, reply: Value) -> Result<Vec<Instance>> {
    let list = match reply {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => map
            .remove("instances")
            .ok_or_else(|| Error::Malformed(format!("{tool}: missing 'instances'")))?,
        other => {
            return Err(Error::Malformed(format!(
                "{tool}: expected an object, got {other}"
            )));
        }
    };
    serde_json::from_value(list).map_err(|e| Error::Malformed(format!("{tool}: {e}")))
}
