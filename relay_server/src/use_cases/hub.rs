// Rendezvous state: which connection holds which join code, what each
// universe has published, and which universes are merged.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};
use universe::domain::object::{ObjectId, SceneObject};
use universe::use_cases::relay::is_valid_join_code;
use universe::use_cases::types::{ObjectEvent, RelayInbound, RelayOutbound};

pub type ConnId = u64;

/// One message addressed to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub conn: ConnId,
    pub message: RelayInbound,
}

impl Delivery {
    fn new(conn: ConnId, message: RelayInbound) -> Self {
        Self { conn, message }
    }
}

#[derive(Debug)]
struct Universe {
    conn: ConnId,
    // Last published state of every object, replayed on merge.
    objects: BTreeMap<ObjectId, SceneObject>,
    merged: BTreeSet<String>,
    last_seen_ms: u64,
}

pub struct RelayHub {
    universes: HashMap<String, Universe>,
    codes: HashMap<ConnId, String>,
    liveness_ms: u64,
}

impl RelayHub {
    pub fn new(liveness_ms: u64) -> Self {
        Self {
            universes: HashMap::new(),
            codes: HashMap::new(),
            liveness_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.universes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }

    pub fn code_of(&self, conn: ConnId) -> Option<&str> {
        self.codes.get(&conn).map(String::as_str)
    }

    pub fn merged_with(&self, code: &str) -> Option<&BTreeSet<String>> {
        self.universes.get(code).map(|u| &u.merged)
    }

    pub fn object_count(&self, code: &str) -> usize {
        self.universes.get(code).map_or(0, |u| u.objects.len())
    }

    pub fn handle(&mut self, conn: ConnId, message: RelayOutbound, now_ms: u64) -> Vec<Delivery> {
        match message {
            RelayOutbound::Connect { code } => self.connect(conn, code, now_ms),
            RelayOutbound::Heartbeat { code } => {
                match self.owned_mut(conn, &code) {
                    Some(universe) => universe.last_seen_ms = now_ms,
                    None => debug!(conn, %code, "heartbeat for a code this connection does not hold"),
                }
                Vec::new()
            }
            RelayOutbound::MergeRequest { from_code, to_code } => {
                self.merge(conn, &from_code, &to_code, now_ms)
            }
            RelayOutbound::Object { code, event } => self.object(conn, code, event, now_ms),
        }
    }

    fn connect(&mut self, conn: ConnId, code: String, now_ms: u64) -> Vec<Delivery> {
        let reject = |message: String| {
            vec![Delivery::new(conn, RelayInbound::ConnectError { message })]
        };
        if !is_valid_join_code(&code) {
            return reject(format!("invalid join code {code:?}"));
        }
        if let Some(held) = self.codes.get(&conn) {
            if *held == code {
                return vec![Delivery::new(conn, RelayInbound::Connected { code })];
            }
            return reject(format!("already connected as {held}"));
        }
        if self.universes.contains_key(&code) {
            return reject(format!("code {code} is already in use"));
        }

        self.universes.insert(
            code.clone(),
            Universe {
                conn,
                objects: BTreeMap::new(),
                merged: BTreeSet::new(),
                last_seen_ms: now_ms,
            },
        );
        self.codes.insert(conn, code.clone());
        info!(conn, %code, universes = self.universes.len(), "universe connected");
        vec![Delivery::new(conn, RelayInbound::Connected { code })]
    }

    fn merge(&mut self, conn: ConnId, from: &str, to: &str, now_ms: u64) -> Vec<Delivery> {
        let reject = |message: String| vec![Delivery::new(conn, RelayInbound::MergeError { message })];
        let Some(requester) = self.owned_mut(conn, from) else {
            return reject(format!("not connected as {from}"));
        };
        requester.last_seen_ms = now_ms;
        if from == to {
            return reject("cannot merge a universe with itself".to_string());
        }
        let Some(target) = self.universes.get_mut(to) else {
            return reject(format!("universe {to} not found"));
        };

        target.merged.insert(from.to_string());
        let target_conn = target.conn;
        let target_objects: Vec<SceneObject> = target.objects.values().cloned().collect();
        let Some(requester) = self.universes.get_mut(from) else {
            return Vec::new();
        };
        requester.merged.insert(to.to_string());
        let requester_objects: Vec<SceneObject> = requester.objects.values().cloned().collect();

        info!(%from, %to, "universes merged");
        vec![
            Delivery::new(
                conn,
                RelayInbound::MergeObjects {
                    from_code: to.to_string(),
                    objects: target_objects,
                },
            ),
            Delivery::new(
                target_conn,
                RelayInbound::MergeObjects {
                    from_code: from.to_string(),
                    objects: requester_objects,
                },
            ),
            Delivery::new(
                target_conn,
                RelayInbound::UniverseMerged {
                    code: from.to_string(),
                },
            ),
        ]
    }

    fn object(&mut self, conn: ConnId, code: String, event: ObjectEvent, now_ms: u64) -> Vec<Delivery> {
        let Some(universe) = self.owned_mut(conn, &code) else {
            warn!(conn, %code, "object event for a code this connection does not hold");
            return Vec::new();
        };
        universe.last_seen_ms = now_ms;
        match &event {
            ObjectEvent::Add { object } => {
                universe.objects.insert(object.id.clone(), object.clone());
            }
            ObjectEvent::Move { id, position } => {
                if let Some(object) = universe.objects.get_mut(id) {
                    object.position = *position;
                }
            }
            ObjectEvent::Update { id, properties } => {
                if let Some(object) = universe.objects.get_mut(id) {
                    properties.apply(&mut object.properties);
                }
            }
            ObjectEvent::Remove { id } => {
                universe.objects.remove(id);
            }
        }

        let merged: Vec<String> = universe.merged.iter().cloned().collect();
        merged
            .iter()
            .filter_map(|peer| self.universes.get(peer))
            .map(|peer| {
                Delivery::new(
                    peer.conn,
                    RelayInbound::Object {
                        code: code.clone(),
                        event: event.clone(),
                    },
                )
            })
            .collect()
    }

    /// Releases the connection's code and tells merged universes it is gone.
    pub fn disconnect(&mut self, conn: ConnId) -> Vec<Delivery> {
        let Some(code) = self.codes.remove(&conn) else {
            return Vec::new();
        };
        let Some(universe) = self.universes.remove(&code) else {
            return Vec::new();
        };
        info!(conn, %code, universes = self.universes.len(), "universe disconnected");

        let mut out = Vec::new();
        for peer in &universe.merged {
            if let Some(peer) = self.universes.get_mut(peer) {
                peer.merged.remove(&code);
                out.push(Delivery::new(
                    peer.conn,
                    RelayInbound::UniverseDisconnected { code: code.clone() },
                ));
            }
        }
        out
    }

    /// Connections whose universe has been silent past the liveness window.
    pub fn expired(&self, now_ms: u64) -> Vec<ConnId> {
        self.universes
            .values()
            .filter(|u| now_ms.saturating_sub(u.last_seen_ms) > self.liveness_ms)
            .map(|u| u.conn)
            .collect()
    }

    fn owned_mut(&mut self, conn: ConnId, code: &str) -> Option<&mut Universe> {
        self.universes.get_mut(code).filter(|u| u.conn == conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use universe::domain::math::Vec3;
    use universe::domain::object::{ObjectKind, ObjectProps, Rgb, Scale};

    const LIVENESS: u64 = 30_000;

    fn cube(id: &str, owner: &str) -> SceneObject {
        SceneObject {
            id: ObjectId::from(id),
            kind: ObjectKind::Cube,
            position: Vec3::new(1.0, 2.0, 3.0),
            properties: ObjectProps::primitive(Rgb(0x4488ff), Scale::Uniform(1.0)),
            owner_id: owner.to_string(),
            created_at: 0,
        }
    }

    fn connect(hub: &mut RelayHub, conn: ConnId, code: &str) {
        let out = hub.handle(conn, RelayOutbound::Connect { code: code.to_string() }, 0);
        assert_eq!(
            out,
            vec![Delivery::new(conn, RelayInbound::Connected { code: code.to_string() })]
        );
    }

    fn add(hub: &mut RelayHub, conn: ConnId, code: &str, object: SceneObject) -> Vec<Delivery> {
        hub.handle(
            conn,
            RelayOutbound::Object {
                code: code.to_string(),
                event: ObjectEvent::Add { object },
            },
            0,
        )
    }

    #[test]
    fn when_a_code_is_taken_then_a_second_connect_is_rejected() {
        let mut hub = RelayHub::new(LIVENESS);
        connect(&mut hub, 1, "ABC123");

        let out = hub.handle(2, RelayOutbound::Connect { code: "ABC123".to_string() }, 0);
        assert!(matches!(
            out.as_slice(),
            [Delivery { conn: 2, message: RelayInbound::ConnectError { .. } }]
        ));
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn when_a_code_is_malformed_then_connect_is_rejected() {
        let mut hub = RelayHub::new(LIVENESS);
        let out = hub.handle(1, RelayOutbound::Connect { code: "abc".to_string() }, 0);
        assert!(matches!(out[0].message, RelayInbound::ConnectError { .. }));
        assert!(hub.is_empty());
    }

    #[test]
    fn when_merging_then_both_sides_receive_each_others_objects() {
        let mut hub = RelayHub::new(LIVENESS);
        connect(&mut hub, 1, "AAAAAA");
        connect(&mut hub, 2, "BBBBBB");
        add(&mut hub, 1, "AAAAAA", cube("a1", "w1"));
        add(&mut hub, 2, "BBBBBB", cube("b1", "w2"));

        let out = hub.handle(
            1,
            RelayOutbound::MergeRequest {
                from_code: "AAAAAA".to_string(),
                to_code: "BBBBBB".to_string(),
            },
            0,
        );

        assert_eq!(out.len(), 3);
        assert_eq!(
            out[0],
            Delivery::new(
                1,
                RelayInbound::MergeObjects {
                    from_code: "BBBBBB".to_string(),
                    objects: vec![cube("b1", "w2")],
                }
            )
        );
        assert_eq!(out[1].conn, 2);
        assert!(matches!(
            &out[1].message,
            RelayInbound::MergeObjects { from_code, objects } if from_code == "AAAAAA" && objects.len() == 1
        ));
        assert_eq!(
            out[2],
            Delivery::new(2, RelayInbound::UniverseMerged { code: "AAAAAA".to_string() })
        );
    }

    #[test]
    fn when_merge_targets_self_or_unknown_then_merge_error() {
        let mut hub = RelayHub::new(LIVENESS);
        connect(&mut hub, 1, "AAAAAA");

        for to in ["AAAAAA", "ZZZZZZ"] {
            let out = hub.handle(
                1,
                RelayOutbound::MergeRequest {
                    from_code: "AAAAAA".to_string(),
                    to_code: to.to_string(),
                },
                0,
            );
            assert!(matches!(
                out.as_slice(),
                [Delivery { conn: 1, message: RelayInbound::MergeError { .. } }]
            ));
        }
        assert!(hub.merged_with("AAAAAA").is_some_and(BTreeSet::is_empty));
    }

    #[test]
    fn when_merged_then_object_events_are_forwarded_and_cached() {
        let mut hub = RelayHub::new(LIVENESS);
        connect(&mut hub, 1, "AAAAAA");
        connect(&mut hub, 2, "BBBBBB");
        connect(&mut hub, 3, "CCCCCC");
        hub.handle(
            2,
            RelayOutbound::MergeRequest {
                from_code: "BBBBBB".to_string(),
                to_code: "AAAAAA".to_string(),
            },
            0,
        );

        let out = add(&mut hub, 1, "AAAAAA", cube("a1", "w1"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].conn, 2);
        assert!(matches!(&out[0].message, RelayInbound::Object { code, .. } if code == "AAAAAA"));

        let moved = hub.handle(
            1,
            RelayOutbound::Object {
                code: "AAAAAA".to_string(),
                event: ObjectEvent::Move {
                    id: ObjectId::from("a1"),
                    position: Vec3::new(9.0, 0.0, 0.0),
                },
            },
            0,
        );
        assert_eq!(moved.len(), 1);
        assert_eq!(hub.object_count("AAAAAA"), 1);
        assert_eq!(hub.object_count("CCCCCC"), 0);
    }

    #[test]
    fn when_another_connection_spoofs_a_code_then_events_are_dropped() {
        let mut hub = RelayHub::new(LIVENESS);
        connect(&mut hub, 1, "AAAAAA");

        let out = add(&mut hub, 2, "AAAAAA", cube("x", "w9"));
        assert!(out.is_empty());
        assert_eq!(hub.object_count("AAAAAA"), 0);
    }

    #[test]
    fn when_a_universe_disconnects_then_merged_peers_are_told_and_the_code_is_released() {
        let mut hub = RelayHub::new(LIVENESS);
        connect(&mut hub, 1, "AAAAAA");
        connect(&mut hub, 2, "BBBBBB");
        hub.handle(
            1,
            RelayOutbound::MergeRequest {
                from_code: "AAAAAA".to_string(),
                to_code: "BBBBBB".to_string(),
            },
            0,
        );

        let out = hub.disconnect(1);
        assert_eq!(
            out,
            vec![Delivery::new(
                2,
                RelayInbound::UniverseDisconnected { code: "AAAAAA".to_string() }
            )]
        );
        assert!(hub.merged_with("BBBBBB").is_some_and(BTreeSet::is_empty));
        connect(&mut hub, 3, "AAAAAA");
    }

    #[test]
    fn when_heartbeats_stop_then_the_universe_expires() {
        let mut hub = RelayHub::new(LIVENESS);
        connect(&mut hub, 1, "AAAAAA");
        connect(&mut hub, 2, "BBBBBB");
        hub.handle(2, RelayOutbound::Heartbeat { code: "BBBBBB".to_string() }, 20_000);

        assert!(hub.expired(LIVENESS).is_empty());
        assert_eq!(hub.expired(LIVENESS + 1), vec![1]);
    }
}
