//! Response-shape adapters.
//!
//! Service revisions nest the host and port of a running executor
//! differently. An adapter turns a detailed task payload into an
//! [`EndpointInfo`], answers `Ok(None)` while the data is incomplete or in a
//! shape it does not know, and only errors when the payload is ambiguous.

use std::fmt::Debug;

use serde_json::Value;

use crate::error::{Result, TesError};
use crate::models::{EndpointInfo, TaskHandle};

pub trait ResponseShape: Debug + Send + Sync {
    /// Find the endpoint of the task's (single) executor in `payload`.
    fn extract(&self, handle: &TaskHandle, payload: &Value) -> Result<Option<EndpointInfo>>;
}

/// `metadata["<handle>0"]` holds a JSON-encoded container inspection document.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyMetadata;

impl ResponseShape for LegacyMetadata {
    fn extract(&self, handle: &TaskHandle, payload: &Value) -> Result<Option<EndpointInfo>> {
        // executors are indexed, the notebook always runs as the first one
        let key = format!("{}0", handle);
        let Some(entry) = payload.get("metadata").and_then(|m| m.get(&key)) else {
            return Ok(None);
        };

        let document = match entry {
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(doc) => doc,
                Err(e) => {
                    log::debug!("Metadata for task {} is not JSON yet: {}", handle, e);
                    return Ok(None);
                }
            },
            Value::Object(_) => entry.clone(),
            _ => return Ok(None),
        };

        let Some(bindings) = document
            .pointer("/HostConfig/PortBindings")
            .and_then(Value::as_object)
        else {
            return Ok(None);
        };
        if bindings.len() > 1 {
            return Err(TesError::Protocol(format!(
                "task {} has {} port bindings, expected one",
                handle,
                bindings.len()
            )));
        }

        let host = match document
            .pointer("/NetworkSettings/IPAddress")
            .and_then(Value::as_str)
        {
            Some(ip) if !ip.is_empty() => ip,
            _ => return Ok(None),
        };

        let Some((container_port, targets)) = bindings.iter().next() else {
            return Ok(None);
        };
        let Some(targets) = targets.as_array() else {
            return Ok(None);
        };

        // dual-stack hosts publish the same host port once per address family
        let mut host_ports: Vec<u16> = Vec::new();
        for target in targets {
            let Some(port) = target
                .get("HostPort")
                .and_then(|p| parse_port(handle, p))
            else {
                return Ok(None);
            };
            if !host_ports.contains(&port) {
                host_ports.push(port);
            }
        }

        match host_ports.as_slice() {
            [] => Ok(None),
            [port] => Ok(Some(EndpointInfo::new(host, *port))),
            _ => Err(TesError::Protocol(format!(
                "container port {} of task {} is bound to host ports {:?}",
                container_port, handle, host_ports
            ))),
        }
    }
}

/// `logs[0].logs[0]` is the first executor log with `host_ip` and `ports`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorLog;

impl ResponseShape for ExecutorLog {
    fn extract(&self, handle: &TaskHandle, payload: &Value) -> Result<Option<EndpointInfo>> {
        let Some(entry) = payload.pointer("/logs/0/logs/0") else {
            return Ok(None);
        };

        let Some(ports) = entry.get("ports").and_then(Value::as_array) else {
            return Ok(None);
        };
        if ports.len() > 1 {
            return Err(TesError::Protocol(format!(
                "executor of task {} reports {} port mappings, expected one",
                handle,
                ports.len()
            )));
        }

        let host = match entry.get("host_ip").and_then(Value::as_str) {
            Some(ip) if !ip.is_empty() => ip,
            _ => return Ok(None),
        };

        let Some(host_port) = ports.first().and_then(|p| p.get("host")) else {
            return Ok(None);
        };

        Ok(parse_port(handle, host_port).map(|port| EndpointInfo::new(host, port)))
    }
}

/// Read a host-side port given as number or numeric string.
///
/// `null`, `0` and `""` mean the port is not assigned yet. Values in any other
/// shape are treated the same way and retried.
fn parse_port(handle: &TaskHandle, value: &Value) -> Option<u16> {
    let port = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match port.map(u16::try_from) {
        Some(Ok(0)) => None,
        Some(Ok(p)) => Some(p),
        _ => {
            if !matches!(value, Value::String(s) if s.trim().is_empty()) {
                log::debug!("Task {} reports unusable host port {}", handle, value);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle() -> TaskHandle {
        TaskHandle::new("task-123")
    }

    fn inspect_doc(ip: &str, bindings: Value) -> String {
        json!({
            "NetworkSettings": {"IPAddress": ip},
            "HostConfig": {"PortBindings": bindings}
        })
        .to_string()
    }

    #[test]
    fn test_executor_log_ready() {
        let payload = json!({
            "id": "task-123",
            "state": "RUNNING",
            "logs": [{"logs": [{"host_ip": "10.0.0.5", "ports": [{"container": 8888, "host": 30080}]}]}]
        });
        let endpoint = ExecutorLog.extract(&handle(), &payload).unwrap();
        assert_eq!(endpoint, Some(EndpointInfo::new("10.0.0.5", 30080)));
    }

    #[test]
    fn test_executor_log_partial_payloads_are_not_ready() {
        let partials = [
            json!({"state": "QUEUED"}),
            json!({"logs": []}),
            json!({"logs": [{"logs": []}]}),
            json!({"logs": [{"logs": [{"host_ip": null, "ports": [{"host": 30080}]}]}]}),
            json!({"logs": [{"logs": [{"host_ip": "10.0.0.5"}]}]}),
            json!({"logs": [{"logs": [{"host_ip": "10.0.0.5", "ports": []}]}]}),
            json!({"logs": [{"logs": [{"host_ip": "10.0.0.5", "ports": [{"container": 8888}]}]}]}),
            json!({"logs": "unexpected"}),
        ];
        for payload in partials {
            assert_eq!(
                ExecutorLog.extract(&handle(), &payload).unwrap(),
                None,
                "payload should not be ready: {}",
                payload
            );
        }
    }

    #[test]
    fn test_executor_log_multiple_ports_is_protocol_error() {
        let payload = json!({
            "logs": [{"logs": [{
                "host_ip": "10.0.0.5",
                "ports": [{"container": 8888, "host": 30080}, {"container": 8889, "host": 30081}]
            }]}]
        });
        let err = ExecutorLog.extract(&handle(), &payload).unwrap_err();
        assert!(matches!(err, TesError::Protocol(_)));
    }

    #[test]
    fn test_legacy_metadata_ready() {
        let doc = inspect_doc("172.17.0.2", json!({"8888/tcp": [{"HostIp": "", "HostPort": "32768"}]}));
        let payload = json!({"state": "Running", "metadata": {"task-1230": doc}});
        let endpoint = LegacyMetadata.extract(&handle(), &payload).unwrap();
        assert_eq!(endpoint, Some(EndpointInfo::new("172.17.0.2", 32768)));
    }

    #[test]
    fn test_legacy_metadata_waits_for_document() {
        let missing = json!({"state": "Initializing"});
        assert_eq!(LegacyMetadata.extract(&handle(), &missing).unwrap(), None);

        let other_key = json!({"metadata": {"other0": inspect_doc("1.2.3.4", json!({}))}});
        assert_eq!(LegacyMetadata.extract(&handle(), &other_key).unwrap(), None);

        let truncated = json!({"metadata": {"task-1230": "{\"NetworkSettings\":"}});
        assert_eq!(LegacyMetadata.extract(&handle(), &truncated).unwrap(), None);

        let no_ip = json!({"metadata": {"task-1230": inspect_doc("", json!({"8888/tcp": [{"HostPort": "1"}]}))}});
        assert_eq!(LegacyMetadata.extract(&handle(), &no_ip).unwrap(), None);
    }

    #[test]
    fn test_legacy_metadata_multiple_bindings_is_protocol_error() {
        let doc = inspect_doc(
            "172.17.0.2",
            json!({"8888/tcp": [{"HostPort": "1"}], "22/tcp": [{"HostPort": "2"}]}),
        );
        let payload = json!({"metadata": {"task-1230": doc}});
        assert!(matches!(
            LegacyMetadata.extract(&handle(), &payload),
            Err(TesError::Protocol(_))
        ));
    }

    #[test]
    fn test_legacy_metadata_dual_stack_binding() {
        let doc = inspect_doc(
            "172.17.0.2",
            json!({"8888/tcp": [
                {"HostIp": "0.0.0.0", "HostPort": "32768"},
                {"HostIp": "::", "HostPort": "32768"}
            ]}),
        );
        let payload = json!({"metadata": {"task-1230": doc}});
        let endpoint = LegacyMetadata.extract(&handle(), &payload).unwrap();
        assert_eq!(endpoint, Some(EndpointInfo::new("172.17.0.2", 32768)));
    }

    #[test]
    fn test_legacy_metadata_conflicting_host_ports() {
        let doc = inspect_doc(
            "172.17.0.2",
            json!({"8888/tcp": [
                {"HostIp": "0.0.0.0", "HostPort": "32768"},
                {"HostIp": "::", "HostPort": "32769"}
            ]}),
        );
        let payload = json!({"metadata": {"task-1230": doc}});
        assert!(matches!(
            LegacyMetadata.extract(&handle(), &payload),
            Err(TesError::Protocol(_))
        ));
    }

    #[test]
    fn test_executor_log_unknown_port_shape_is_not_ready() {
        for host in [json!("30080/tcp"), json!({"value": 30080}), json!(true), json!(70000)] {
            let payload = json!({
                "logs": [{"logs": [{"host_ip": "10.0.0.5", "ports": [{"host": host}]}]}]
            });
            assert_eq!(
                ExecutorLog.extract(&handle(), &payload).unwrap(),
                None,
                "host port should not be ready: {}",
                payload
            );
        }
    }

    #[test]
    fn test_parse_port() {
        let h = handle();
        assert_eq!(parse_port(&h, &json!(30080)), Some(30080));
        assert_eq!(parse_port(&h, &json!(30080.0)), Some(30080));
        assert_eq!(parse_port(&h, &json!("30080")), Some(30080));
        assert_eq!(parse_port(&h, &json!(0)), None);
        assert_eq!(parse_port(&h, &json!("")), None);
        assert_eq!(parse_port(&h, &json!(null)), None);
        assert_eq!(parse_port(&h, &json!(70000)), None);
        assert_eq!(parse_port(&h, &json!(30080.5)), None);
        assert_eq!(parse_port(&h, &json!("http")), None);
        assert_eq!(parse_port(&h, &json!(true)), None);
    }
}
