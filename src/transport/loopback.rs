use std::{
    collections::HashMap,
    fmt::Write,
    sync::{Arc, Mutex},
    time::Duration,
};

use thiserror::Error;
use tokio::{select, sync::broadcast};
use tracing::{debug, debug_span, warn};

use crate::{
    fields::{DEFAULT_FIELD, Field},
    transport::{MonitorCallback, Status, Subscription, Transport, TransportError},
    value::{self, Number, Value},
};

#[derive(Debug)]
struct PV {
    name: String,
    value: Value,
    /// Channel to send updates to any subscribers
    sender: broadcast::Sender<Value>,
}

impl PV {
    fn new(name: &str, value: Value) -> Self {
        PV {
            name: name.to_owned(),
            value,
            sender: broadcast::Sender::new(16),
        }
    }

    fn store(&mut self, value: Value) {
        self.value = value;
        // No receivers is not an error, nobody is watching
        let _ = self.sender.send(self.value.clone());
    }

    /// Apply a list of encoded put fields.
    ///
    /// Either every field is applied or the PV is left untouched.
    fn store_fields(&mut self, fields: &[Field]) -> Result<(), TransportError> {
        let mut updated = self.value.clone();
        for field in fields {
            let target = if !matches!(updated, Value::Object(_)) && field.name == DEFAULT_FIELD {
                &mut updated
            } else {
                updated.pointer_mut(&field.name).ok_or_else(|| {
                    TransportError::Refused(format!("{} has no field '{}'", self.name, field.name))
                })?
            };
            *target = parse_as_type_of(target, &field.value).ok_or_else(|| {
                TransportError::Refused(format!(
                    "Cannot convert '{}' for field '{}'",
                    field.value, field.name
                ))
            })?;
        }
        self.store(updated);
        Ok(())
    }
}

/// Parse put text into the same kind of value that is currently stored
fn parse_as_type_of(current: &Value, text: &str) -> Option<Value> {
    let trimmed = text.trim();
    Some(match current {
        Value::String(_) => Value::from(text),
        Value::Bool(_) => match trimmed {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => return None,
        },
        Value::Number(Number::Int(_)) => Value::from(trimmed.parse::<i64>().ok()?),
        Value::Number(Number::UInt(_)) => Value::from(trimmed.parse::<u64>().ok()?),
        Value::Number(Number::Float(_)) => Value::from(trimmed.parse::<f64>().ok()?),
        // Untyped; take whatever scalar the text describes
        Value::Null => match value::decode(trimmed) {
            Ok(v) if v.is_scalar() => v,
            _ => Value::from(text),
        },
        Value::Array(_) | Value::Object(_) => return None,
    })
}

/// Render a value the way the server writes it on the wire.
///
/// Every structure member and array element is followed by a separator,
/// non-finite floats are written as bare `nan`/`inf` tokens, and strings use C
/// escapes.
fn render_wire(value: &Value) -> String {
    let mut out = String::new();
    write_wire(&mut out, value, 0);
    out
}

fn write_wire(out: &mut String, value: &Value, depth: usize) {
    let indent = "    ";
    match value {
        Value::Number(Number::Float(v)) if v.is_nan() => out.push_str("nan"),
        Value::Number(Number::Float(v)) if v.is_infinite() => {
            out.push_str(if *v > 0.0 { "inf" } else { "-inf" })
        }
        Value::Object(members) => {
            out.push_str("{\n");
            for (key, member) in members.iter() {
                out.push_str(&indent.repeat(depth + 1));
                write_quoted(out, key);
                out.push_str(": ");
                write_wire(out, member, depth + 1);
                out.push_str(",\n");
            }
            out.push_str(&indent.repeat(depth));
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for item in items {
                write_wire(out, item, depth + 1);
                out.push_str(", ");
            }
            out.push(']');
        }
        Value::String(s) => write_quoted(out, s),
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

/// Write a string literal with the server's escaping: C escapes for the usual
/// control characters and quotes, and `\xHH` for every other byte that is not
/// printable ASCII
fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for byte in s.bytes() {
        match byte {
            b'\x07' => out.push_str("\\a"),
            b'\x08' => out.push_str("\\b"),
            b'\x0c' => out.push_str("\\f"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'\x0b' => out.push_str("\\v"),
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'"' => out.push_str("\\\""),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push('"');
}

/// Serving-side access to a single PV held by a [`LoopbackTransport`]
#[derive(Clone, Debug)]
pub struct PvHandle {
    pv: Arc<Mutex<PV>>,
}

impl PvHandle {
    pub fn name(&self) -> String {
        self.pv.lock().unwrap().name.clone()
    }
    pub fn load(&self) -> Value {
        self.pv.lock().unwrap().value.clone()
    }
    /// Replace the value, and notify every subscriber
    pub fn store(&self, value: impl Into<Value>) {
        self.pv.lock().unwrap().store(value.into());
    }
}

#[derive(Error, Debug)]
#[error("A PV named '{0}' already exists")]
pub struct PVAlreadyExists(pub String);

/// A [`Transport`] serving PVs from memory, in-process.
///
/// Clones share the same set of PVs.
#[derive(Clone, Debug, Default)]
pub struct LoopbackTransport {
    pvs: Arc<Mutex<HashMap<String, Arc<Mutex<PV>>>>>,
}

impl LoopbackTransport {
    pub fn new() -> LoopbackTransport {
        LoopbackTransport::default()
    }

    pub fn add_pv(
        &self,
        name: &str,
        initial_value: impl Into<Value>,
    ) -> Result<PvHandle, PVAlreadyExists> {
        let mut pvmap = self.pvs.lock().unwrap();
        if pvmap.contains_key(name) {
            return Err(PVAlreadyExists(name.to_owned()));
        }
        let pv = Arc::new(Mutex::new(PV::new(name, initial_value.into())));
        pvmap.insert(name.to_owned(), pv.clone());
        Ok(PvHandle { pv })
    }

    /// Does this transport serve the given PV name?
    pub fn provides(&self, name: &str) -> bool {
        self.pvs.lock().unwrap().contains_key(name)
    }

    fn lookup(&self, name: &str) -> Result<Arc<Mutex<PV>>, TransportError> {
        self.pvs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(name.to_owned()))
    }
}

impl Transport for LoopbackTransport {
    async fn read(&self, name: &str, _timeout: Duration) -> Result<String, TransportError> {
        let pv = self.lookup(name)?;
        let pv = pv.lock().unwrap();
        Ok(render_wire(&pv.value))
    }

    async fn write(&self, name: &str, fields: &[Field], _timeout: Duration) -> Status {
        let _span = debug_span!("loopback_write", pv = name).entered();
        let pv = match self.lookup(name) {
            Ok(pv) => pv,
            Err(e) => {
                debug!("Rejecting write: {e}");
                return Status::FAILED;
            }
        };
        let mut pv = pv.lock().unwrap();
        debug!("Processing write: {fields:?}");
        match pv.store_fields(fields) {
            Ok(()) => Status::OK,
            Err(e) => {
                debug!("    Error: {e}");
                Status::FAILED
            }
        }
    }

    fn subscribe(
        &self,
        name: &str,
        mut callback: MonitorCallback,
    ) -> Result<Subscription, TransportError> {
        let pv = self.lookup(name)?;
        // Subscribe and render under the same lock, so no update is missed
        let (mut updates, initial) = {
            let pv = pv.lock().unwrap();
            (pv.sender.subscribe(), render_wire(&pv.value))
        };
        let subscription = Subscription::new();
        let stop = subscription.token();
        let name = name.to_owned();
        tokio::spawn(async move {
            callback(&initial);
            loop {
                select! {
                    biased;
                    _ = stop.cancelled() => break,
                    update = updates.recv() => match update {
                        Ok(value) => callback(&render_wire(&value)),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Subscriber to '{name}' lagged, skipped {n} updates");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("Loopback subscription to '{name}' finished");
        });
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::decode;

    fn nt_scalar(value: impl Into<Value>) -> Value {
        let mut alarm = value::Map::new();
        alarm.insert("severity", 0);
        alarm.insert("message", "");
        let mut map = value::Map::new();
        map.insert("id", "epics:nt/NTScalar:1.0");
        map.insert("value", value);
        map.insert("alarm", alarm);
        Value::Object(map)
    }

    fn field(name: &str, value: &str) -> Field {
        Field {
            name: name.to_owned(),
            value: value.to_owned(),
        }
    }

    #[test]
    fn wire_dialect_needs_repair() {
        let text = render_wire(&nt_scalar(f64::NAN));
        assert!(text.contains("\"value\": nan,"));
        assert!(text.contains("},\n}"));
        assert_eq!(decode(&text).unwrap(), nt_scalar(Value::Null));

        let text = render_wire(&Value::from(vec![1.5, f64::NEG_INFINITY]));
        assert_eq!(text, "[1.5, -inf, ]");
    }

    #[test]
    fn wire_text_decodes_to_stored_value() {
        let original = nt_scalar(vec![1, 2, 3]);
        assert_eq!(decode(&render_wire(&original)).unwrap(), original);
    }

    #[test]
    fn strings_use_server_escapes() {
        let text = "operator's \"note\"\tμm\u{7}";
        let wire = render_wire(&Value::from(text));
        assert_eq!(wire, r#""operator\'s \"note\"\t\xce\xbcm\a""#);
        assert_eq!(decode(&wire).unwrap(), Value::from(text));

        let mut map = value::Map::new();
        map.insert("unité", "°C");
        let original = Value::Object(map);
        assert_eq!(decode(&render_wire(&original)).unwrap(), original);
    }

    #[test]
    fn field_writes_convert_to_stored_type() {
        let mut pv = PV::new("TEST", nt_scalar(1.5));
        pv.store_fields(&[field("value", "10")]).unwrap();
        assert_eq!(pv.value.get("value"), Some(&Value::from(10.0)));

        let mut pv = PV::new("TEST", Value::from(42));
        pv.store_fields(&[field("value", "7")]).unwrap();
        assert_eq!(pv.value, Value::from(7));
        assert!(pv.store_fields(&[field("value", "7.5")]).is_err());

        let mut pv = PV::new("TEST", Value::from(false));
        pv.store_fields(&[field("value", "true")]).unwrap();
        assert_eq!(pv.value, Value::from(true));
    }

    #[test]
    fn failed_field_write_changes_nothing() {
        let mut pv = PV::new("TEST", nt_scalar(3));
        let before = pv.value.clone();
        let result = pv.store_fields(&[field("value", "4"), field("alarm.missing", "1")]);
        assert!(matches!(result, Err(TransportError::Refused(_))));
        assert_eq!(pv.value, before);
        assert!(pv.store_fields(&[field("alarm", "1")]).is_err());
    }

    #[test]
    fn duplicate_pv_names_are_rejected() {
        let transport = LoopbackTransport::new();
        transport.add_pv("TEST", 1).unwrap();
        assert!(transport.add_pv("TEST", 2).is_err());
        assert!(transport.provides("TEST"));
        assert!(!transport.provides("OTHER"));
    }
}
