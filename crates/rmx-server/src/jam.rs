//! Jam and participant metadata plus the request/response shapes of the
//! `/jam` endpoints.

use std::sync::Arc;

use rmx_broker::{Broker, Room, RoomStatus};
use serde::{Deserialize, Serialize};

/// Descriptive data attached to a jam room.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jam {
    /// Display name.
    pub name: String,
    /// Tempo in beats per minute, if the creator set one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<u32>,
}

/// An already-resolved participant identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable user ID supplied by the identity layer.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Broker specialized to jam rooms.
pub type JamBroker = Broker<Jam, Participant>;

/// Room specialized to jam rooms.
pub type JamRoom = Room<Jam, Participant>;

/// `POST /jam` body.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateJamRequest {
    /// Display name; empty names are replaced by `"untitled"`.
    pub name: String,
    /// Member ceiling; falls back to the configured default.
    pub capacity: Option<i64>,
    /// Tempo in beats per minute.
    pub bpm: Option<u32>,
}

impl CreateJamRequest {
    /// Split the request into room metadata and a requested capacity.
    pub fn into_parts(self) -> (Jam, Option<i64>) {
        let name = if self.name.trim().is_empty() {
            "untitled".to_string()
        } else {
            self.name
        };
        (Jam { name, bpm: self.bpm }, self.capacity)
    }
}

/// `POST /jam` response body.
#[derive(Clone, Debug, Serialize)]
pub struct CreatedJam {
    /// New room ID.
    pub id: String,
}

/// A room as reported by `GET /jam` and `GET /jam/{id}`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JamView {
    /// Room status snapshot.
    #[serde(flatten)]
    pub status: RoomStatus,
    /// Room metadata.
    pub jam: Jam,
    /// Current members.
    pub participants: Vec<Participant>,
}

impl JamView {
    /// Snapshot a live room.
    pub fn from_room(room: &Arc<JamRoom>) -> Self {
        Self {
            status: room.status(),
            jam: room.metadata().clone(),
            participants: room
                .members()
                .iter()
                .map(|conn| conn.participant().clone())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults() {
        let req: CreateJamRequest = serde_json::from_str("{}").unwrap();
        let (jam, capacity) = req.into_parts();
        assert_eq!(jam.name, "untitled");
        assert_eq!(jam.bpm, None);
        assert_eq!(capacity, None);
    }

    #[test]
    fn create_request_keeps_negative_capacity() {
        let req: CreateJamRequest =
            serde_json::from_str(r#"{"name":"late night","capacity":-1,"bpm":92}"#).unwrap();
        let (jam, capacity) = req.into_parts();
        assert_eq!(jam.name, "late night");
        assert_eq!(jam.bpm, Some(92));
        assert_eq!(capacity, Some(-1));
    }

    #[test]
    fn view_flattens_status() {
        let broker = JamBroker::default();
        let id = broker
            .create_room(
                3,
                Jam {
                    name: "groove".into(),
                    bpm: Some(120),
                },
            )
            .unwrap();
        let room = broker.get_room(&id).unwrap();
        let json = serde_json::to_value(JamView::from_room(&room)).unwrap();
        assert_eq!(json["id"], id.as_str());
        assert_eq!(json["capacity"], 3);
        assert_eq!(json["members"], 0);
        assert_eq!(json["state"], "open");
        assert_eq!(json["jam"]["name"], "groove");
        assert_eq!(json["jam"]["bpm"], 120);
        assert!(json["participants"].as_array().unwrap().is_empty());
    }
}
