use serde::{Deserialize, Serialize};

use crate::{Band, NoteId, Outcome, Position};

/// Notification for the presentation layer. Emitted in the order things
/// happened; score changes always directly follow the resolution that caused
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    NoteSpawned {
        id: NoteId,
        kind: Band,
        lane: Option<usize>,
        /// Tail length of a sustain note.
        sustain: Option<f32>,
        position: Position,
    },
    NoteAdvanced {
        id: NoteId,
        position: Position,
    },
    NoteHeld {
        id: NoteId,
        lane: usize,
    },
    NoteResolved {
        id: NoteId,
        outcome: Outcome,
        points: u32,
    },
    ScoreChanged {
        score: u64,
        combo: u32,
    },
}

impl GameEvent {
    pub fn note_id(&self) -> Option<NoteId> {
        match self {
            GameEvent::NoteSpawned { id, .. }
            | GameEvent::NoteAdvanced { id, .. }
            | GameEvent::NoteHeld { id, .. }
            | GameEvent::NoteResolved { id, .. } => Some(*id),
            GameEvent::ScoreChanged { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Grade;

    #[test]
    fn serialises_as_tagged_json_lines() {
        let event = GameEvent::NoteResolved {
            id: NoteId(3),
            outcome: Outcome::Hit {
                grade: Grade::Tap,
                points: 110,
            },
            points: 110,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"note_resolved","id":3,"outcome":{"result":"hit","grade":"tap","points":110},"points":110}"#
        );

        let back: GameEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.note_id(), Some(NoteId(3)));
    }

    #[test]
    fn score_changes_carry_no_note() {
        let event = GameEvent::ScoreChanged { score: 0, combo: 0 };
        assert_eq!(event.note_id(), None);
    }
}
