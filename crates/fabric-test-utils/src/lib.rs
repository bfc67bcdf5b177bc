//! Testing utilities for the fabric reconciler workspace
//!
//! [`FakeController`] is an in-memory controller speaking the REST wire
//! format closely enough to drive the engine end to end.

#![allow(missing_docs)]

use async_trait::async_trait;
use fabric_core::{ControllerFault, ControllerRequest, ManagedObject, Method, RawResponse, Transport, TransportError};
use fabric_state::wire::{decode_object, encode_fault, encode_read_response};
use fabric_state::AttrValue;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap, VecDeque};

const EMPTY_WRITE_REPLY: &str = r#"{"totalCount":"0","imdata":[]}"#;

#[derive(Debug, Default)]
struct State {
    /// dn → object (nested children included)
    objects: BTreeMap<String, ManagedObject>,
    requests: Vec<ControllerRequest>,
    duplicated: Vec<String>,
    forced: VecDeque<(Method, RawResponse)>,
    unreachable: bool,
    revision: u64,
}

/// In-memory controller
#[derive(Debug, Default)]
pub struct FakeController {
    state: Mutex<State>,
    /// Class → attribute naming a nested child among its siblings
    naming: HashMap<String, String>,
}

impl FakeController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name nested children of `class` by `attribute` when merging writes
    #[must_use]
    pub fn with_naming(mut self, class: &str, attribute: &str) -> Self {
        self.naming.insert(class.to_string(), attribute.to_string());
        self
    }

    /// Store an object at `dn`, replacing whatever was there
    pub fn seed(&self, dn: &str, object: ManagedObject) {
        let object = object.with_attribute("dn", dn);
        self.state.lock().objects.insert(dn.to_string(), object);
    }

    /// Object currently stored at `dn`
    #[must_use]
    pub fn object(&self, dn: &str) -> Option<ManagedObject> {
        self.state.lock().objects.get(dn).cloned()
    }

    /// Every stored dn
    #[must_use]
    pub fn dns(&self) -> Vec<String> {
        self.state.lock().objects.keys().cloned().collect()
    }

    /// Answer reads of `dn` with the object twice
    pub fn duplicate(&self, dn: &str) {
        self.state.lock().duplicated.push(dn.to_string());
    }

    /// Answer the next `method` request with `status` and a controller fault
    pub fn fail_next(&self, method: Method, status: u16, fault: &ControllerFault) {
        let body = encode_fault(fault).to_string();
        self.state
            .lock()
            .forced
            .push_back((method, RawResponse::new(status, body)));
    }

    /// Fail every request at the transport level
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Every request received, in order
    #[must_use]
    pub fn requests(&self) -> Vec<ControllerRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests of one verb
    #[must_use]
    pub fn requests_of(&self, method: Method) -> Vec<ControllerRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    /// Number of writes and deletes received
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method.is_mutation())
            .count()
    }

    /// Forget recorded requests, keeping stored objects
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    fn handle(&self, request: &ControllerRequest) -> RawResponse {
        let mut state = self.state.lock();
        state.requests.push(request.clone());

        if let Some(position) = state.forced.iter().position(|(m, _)| *m == request.method) {
            if let Some((_, response)) = state.forced.remove(position) {
                return response;
            }
        }

        let (path, query) = split_query(&request.path);
        let target = match Target::parse(path) {
            Some(target) => target,
            None => return fault(400, "104", &format!("unknown path {path}")),
        };

        match (request.method, target) {
            (Method::Get, Target::Mo(dn)) => read_mo(&state, &dn, &query),
            (Method::Get, Target::Class(class)) => read_class(&state, &class, &query),
            (Method::Post, Target::Mo(dn)) => match &request.body {
                Some(body) => self.write(&mut state, &dn, body),
                None => fault(400, "103", "missing body"),
            },
            (Method::Delete, Target::Mo(dn)) => {
                let prefix = format!("{dn}/");
                state.objects.retain(|k, _| k != &dn && !k.starts_with(&prefix));
                RawResponse::new(200, EMPTY_WRITE_REPLY)
            }
            (_, Target::Class(_)) => fault(400, "105", "class endpoints are read-only"),
        }
    }

    fn write(&self, state: &mut State, dn: &str, body: &JsonValue) -> RawResponse {
        let posted = match decode_object(body) {
            Ok(object) => object,
            Err(e) => return fault(400, "107", &e.to_string()),
        };

        state.revision += 1;
        let stamp = format!("rev-{}", state.revision);

        let merged = match state.objects.remove(dn) {
            Some(current) if current.class_name != posted.class_name => {
                state.objects.insert(dn.to_string(), current);
                return fault(400, "108", "class does not match existing object");
            }
            Some(current) => self.merge(current, posted),
            None => posted.with_attribute("dn", dn),
        };
        state
            .objects
            .insert(dn.to_string(), merged.with_attribute("modTs", stamp));
        RawResponse::new(200, EMPTY_WRITE_REPLY)
    }

    fn merge(&self, mut current: ManagedObject, posted: ManagedObject) -> ManagedObject {
        current.attributes.extend(posted.attributes);
        for child in posted.children {
            let naming = self.naming.get(&child.class_name);
            let slot = current.children.iter().position(|existing| {
                existing.class_name == child.class_name
                    && naming.map_or(true, |attr| existing.get(attr) == child.get(attr))
            });
            match slot {
                Some(index) => {
                    let existing = current.children.remove(index);
                    current.children.insert(index, self.merge(existing, child));
                }
                None => current.children.push(child),
            }
        }
        current
    }
}

#[async_trait]
impl Transport for FakeController {
    async fn send(&self, request: ControllerRequest) -> Result<RawResponse, TransportError> {
        if self.state.lock().unreachable {
            return Err(TransportError::Connection("fake controller unreachable".to_string()));
        }
        Ok(self.handle(&request))
    }
}

enum Target {
    Mo(String),
    Class(String),
}

impl Target {
    fn parse(path: &str) -> Option<Self> {
        let path = path.strip_suffix(".json")?;
        if let Some(dn) = path.strip_prefix("api/mo/") {
            Some(Self::Mo(dn.to_string()))
        } else {
            path.strip_prefix("api/class/")
                .map(|class| Self::Class(class.to_string()))
        }
    }
}

fn split_query(path: &str) -> (&str, HashMap<&str, &str>) {
    match path.split_once('?') {
        Some((path, query)) => (
            path,
            query.split('&').filter_map(|pair| pair.split_once('=')).collect(),
        ),
        None => (path, HashMap::new()),
    }
}

fn fault(status: u16, code: &str, text: &str) -> RawResponse {
    let fault = ControllerFault {
        code: code.to_string(),
        text: text.to_string(),
    };
    RawResponse::new(status, encode_fault(&fault).to_string())
}

fn reply(objects: &[ManagedObject]) -> RawResponse {
    RawResponse::new(200, encode_read_response(objects).to_string())
}

fn read_mo(state: &State, dn: &str, query: &HashMap<&str, &str>) -> RawResponse {
    let Some(stored) = state.objects.get(dn) else {
        return reply(&[]);
    };

    let classes: Vec<&str> = query
        .get("rsp-subtree-class")
        .map(|c| c.split(',').collect())
        .unwrap_or_default();

    let mut object = stored.clone();
    match query.get("rsp-subtree").copied() {
        Some("full") => {
            // Addressable descendants are reported nested under the parent
            let prefix = format!("{dn}/");
            object.children = state
                .objects
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .filter(|(_, o)| classes.is_empty() || classes.contains(&o.class_name.as_str()))
                .map(|(_, o)| o.clone())
                .collect();
        }
        Some("children") => {
            object
                .children
                .retain(|c| classes.is_empty() || classes.contains(&c.class_name.as_str()));
        }
        _ => object.children.clear(),
    }

    if state.duplicated.iter().any(|d| d == dn) {
        return reply(&[object.clone(), object]);
    }
    reply(&[object])
}

fn read_class(state: &State, class: &str, query: &HashMap<&str, &str>) -> RawResponse {
    let filter = query.get("query-target-filter").and_then(|f| parse_eq_filter(f));
    let objects: Vec<ManagedObject> = state
        .objects
        .values()
        .filter(|o| o.class_name == class)
        .filter(|o| {
            filter.as_ref().map_or(true, |(attr, value)| {
                o.get(attr).map(AttrValue::as_str) == Some(value.as_str())
            })
        })
        .map(|o| {
            let mut o = o.clone();
            o.children.clear();
            o
        })
        .collect();
    reply(&objects)
}

/// `eq(Class.attr, "value")` → (attr, value)
fn parse_eq_filter(filter: &str) -> Option<(String, String)> {
    let inner = filter.strip_prefix("eq(")?.strip_suffix(')')?;
    let (field, value) = inner.split_once(',')?;
    let (_, attr) = field.trim().split_once('.')?;
    let value = value.trim().trim_matches('"');
    Some((attr.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_state::ReadResponse;
    use serde_json::json;

    fn read(controller: &FakeController, path: &str) -> ReadResponse {
        let response = controller.handle(&ControllerRequest::get(path));
        ReadResponse::parse(&response.body).unwrap()
    }

    #[test]
    fn post_then_get() {
        let controller = FakeController::new();
        let body = json!({"fvTenant": {"attributes": {"name": "T1"}}});
        let response = controller.handle(&ControllerRequest::post("api/mo/uni/tn-T1.json", body));
        assert_eq!(response.status, 200);

        let read = read(&controller, "api/mo/uni/tn-T1.json");
        assert_eq!(read.objects.len(), 1);
        assert_eq!(read.objects[0].dn(), Some("uni/tn-T1"));
        assert!(read.objects[0].get("modTs").is_some());
    }

    #[test]
    fn post_merges_attributes_and_named_children() {
        let controller = FakeController::new().with_naming("vzRsSubjFiltAtt", "tnVzFilterName");
        let path = "api/mo/uni/tn-T1/brc-C1/subj-S1.json";
        controller.handle(&ControllerRequest::post(
            path,
            json!({"vzSubj": {"attributes": {"name": "S1", "prio": "level1"}, "children": [
                {"vzRsSubjFiltAtt": {"attributes": {"tnVzFilterName": "F1", "directives": ""}}}
            ]}}),
        ));
        controller.handle(&ControllerRequest::post(
            path,
            json!({"vzSubj": {"attributes": {}, "children": [
                {"vzRsSubjFiltAtt": {"attributes": {"tnVzFilterName": "F1", "directives": "log"}}},
                {"vzRsSubjFiltAtt": {"attributes": {"tnVzFilterName": "F2"}}}
            ]}}),
        ));

        let stored = controller.object("uni/tn-T1/brc-C1/subj-S1").unwrap();
        assert_eq!(stored.get("prio").unwrap().as_str(), "level1");
        assert_eq!(stored.children.len(), 2);
        assert_eq!(stored.children[0].get("directives").unwrap().as_str(), "log");
    }

    #[test]
    fn subtree_and_class_listing() {
        let controller = FakeController::new();
        controller.seed("uni/tn-T1", ManagedObject::new("fvTenant").with_attribute("name", "T1"));
        controller.seed("uni/tn-T1/brc-C1", ManagedObject::new("vzBrCP").with_attribute("name", "C1"));
        controller.seed("uni/tn-T2/brc-C2", ManagedObject::new("vzBrCP").with_attribute("name", "C2"));

        let subtree = read(
            &controller,
            "api/mo/uni/tn-T1.json?rsp-subtree=full&rsp-subtree-class=vzBrCP",
        );
        assert_eq!(subtree.objects[0].children.len(), 1);

        let all = read(&controller, "api/class/vzBrCP.json");
        assert_eq!(all.objects.len(), 2);

        let filtered = read(
            &controller,
            "api/class/vzBrCP.json?query-target-filter=eq(vzBrCP.name, \"C2\")",
        );
        assert_eq!(filtered.objects.len(), 1);
    }

    #[test]
    fn delete_removes_subtree() {
        let controller = FakeController::new();
        controller.seed("uni/tn-T1", ManagedObject::new("fvTenant"));
        controller.seed("uni/tn-T1/brc-C1", ManagedObject::new("vzBrCP"));
        controller.handle(&ControllerRequest::delete("api/mo/uni/tn-T1.json"));
        assert!(controller.dns().is_empty());
    }

    #[test]
    fn forced_fault_is_consumed_once() {
        let controller = FakeController::new();
        let fault = ControllerFault {
            code: "122".into(),
            text: "rejected".into(),
        };
        controller.fail_next(Method::Post, 400, &fault);

        let body = json!({"fvTenant": {"attributes": {"name": "T1"}}});
        let first = controller.handle(&ControllerRequest::post("api/mo/uni/tn-T1.json", body.clone()));
        let second = controller.handle(&ControllerRequest::post("api/mo/uni/tn-T1.json", body));
        assert_eq!(first.status, 400);
        assert_eq!(second.status, 200);
        assert_eq!(controller.mutation_count(), 2);
    }

    #[tokio::test]
    async fn unreachable_controller_fails_transport() {
        let controller = FakeController::new();
        controller.set_unreachable(true);
        let err = controller
            .send(ControllerRequest::get("api/mo/uni/tn-T1.json"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
