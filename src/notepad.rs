//! Kanban notepad: free-form notes per roadmap, arranged in a "Notepad"
//! column (`lane_id == None`) followed by one column per lane.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::edit::new_record_id;
use crate::edit::patch::{Edit, NoteContent, NotePlacement, Patch, Record};
use crate::error::ValidationError;
use crate::model::{Note, RoadmapState};

/// Title of the column holding notes without a lane.
pub const NOTEPAD_TITLE: &str = "Notepad";

#[derive(Debug, Clone, Serialize)]
pub struct NoteColumn {
    pub lane_id: Option<String>,
    pub title: String,
    pub color: Option<String>,
    pub notes: Vec<Note>,
}

/// Notes of one board column in display order.
pub fn notes_for_lane<'a>(state: &'a RoadmapState, lane_id: Option<&str>) -> Vec<&'a Note> {
    let mut notes: Vec<&Note> = state
        .notes
        .iter()
        .filter(|note| note.lane_id.as_deref() == lane_id)
        .collect();
    notes.sort_by_key(|note| note.order_index);
    notes
}

/// The whole board: the notepad column first, then lanes in row order.
pub fn board(state: &RoadmapState) -> Vec<NoteColumn> {
    let mut columns = Vec::with_capacity(state.lanes.len() + 1);
    columns.push(NoteColumn {
        lane_id: None,
        title: NOTEPAD_TITLE.to_string(),
        color: None,
        notes: notes_for_lane(state, None).into_iter().cloned().collect(),
    });
    for lane in &state.lanes {
        columns.push(NoteColumn {
            lane_id: Some(lane.id.clone()),
            title: lane.name.clone(),
            color: Some(lane.color.clone()),
            notes: notes_for_lane(state, Some(&lane.id)).into_iter().cloned().collect(),
        });
    }
    columns
}

fn check_lane(state: &RoadmapState, lane_id: Option<&str>) -> Result<(), ValidationError> {
    match lane_id {
        Some(id) if state.lane_index(id).is_none() => Err(ValidationError::UnknownLane(id.to_string())),
        _ => Ok(()),
    }
}

fn note_position(state: &RoadmapState, note_id: &str) -> Result<usize, ValidationError> {
    state
        .notes
        .iter()
        .position(|note| note.id == note_id)
        .ok_or_else(|| ValidationError::UnknownNote(note_id.to_string()))
}

/// Appends a note at the end of its column.
pub fn add_note(
    state: &RoadmapState,
    lane_id: Option<&str>,
    title: &str,
    description: Option<String>,
) -> Result<Patch, ValidationError> {
    check_lane(state, lane_id)?;
    let order_index = notes_for_lane(state, lane_id)
        .last()
        .map_or(0, |note| note.order_index + 1);
    let note = Note {
        id: new_record_id(),
        roadmap_id: state.roadmap.id.clone(),
        lane_id: lane_id.map(str::to_string),
        order_index,
        title: title.trim().to_string(),
        description: description.filter(|text| !text.trim().is_empty()),
        updated_at: Some(Utc::now()),
    };
    let mut patch = Patch::new("add note");
    patch.push(Edit::Insert {
        index: state.notes.len(),
        record: Record::Note(note),
    });
    Ok(patch)
}

/// Moves a note into `target_lane`, before `before_note` or at the end.
///
/// Both affected columns are renumbered `0..n`; only notes whose lane or
/// index actually changes are edited. Dropping a note before itself does
/// nothing.
pub fn move_note(
    state: &RoadmapState,
    note_id: &str,
    target_lane: Option<&str>,
    before_note: Option<&str>,
) -> Result<Patch, ValidationError> {
    let moving = &state.notes[note_position(state, note_id)?];
    check_lane(state, target_lane)?;
    let mut patch = Patch::new("move note");
    if before_note == Some(note_id) {
        return Ok(patch);
    }
    if let Some(before) = before_note {
        let anchor = &state.notes[note_position(state, before)?];
        if anchor.lane_id.as_deref() != target_lane {
            return Err(ValidationError::UnknownNote(before.to_string()));
        }
    }

    let source_lane = moving.lane_id.as_deref();
    let mut target: Vec<&Note> = notes_for_lane(state, target_lane)
        .into_iter()
        .filter(|note| note.id != note_id)
        .collect();
    let insert_at = before_note
        .and_then(|before| target.iter().position(|note| note.id == before))
        .unwrap_or(target.len());
    target.insert(insert_at, moving);

    let now = Utc::now();
    let mut renumbered: Vec<(&Note, Option<&str>, i64)> = target
        .iter()
        .enumerate()
        .map(|(idx, note)| (*note, target_lane, idx as i64))
        .collect();
    if source_lane != target_lane {
        renumbered.extend(
            notes_for_lane(state, source_lane)
                .into_iter()
                .filter(|note| note.id != note_id)
                .enumerate()
                .map(|(idx, note)| (note, source_lane, idx as i64)),
        );
    }
    for (note, lane_id, order_index) in renumbered {
        if note.lane_id.as_deref() == lane_id && note.order_index == order_index {
            continue;
        }
        patch.push(placement_edit(note, lane_id, order_index, now));
    }
    Ok(patch)
}

fn placement_edit(note: &Note, lane_id: Option<&str>, order_index: i64, now: DateTime<Utc>) -> Edit {
    Edit::NotePlacement {
        id: note.id.clone(),
        before: NotePlacement {
            lane_id: note.lane_id.clone(),
            order_index: note.order_index,
            updated_at: note.updated_at,
        },
        after: NotePlacement {
            lane_id: lane_id.map(str::to_string),
            order_index,
            updated_at: Some(now),
        },
    }
}

pub fn update_note(
    state: &RoadmapState,
    note_id: &str,
    title: Option<String>,
    description: Option<Option<String>>,
) -> Result<Patch, ValidationError> {
    let note = &state.notes[note_position(state, note_id)?];
    let before = NoteContent {
        title: note.title.clone(),
        description: note.description.clone(),
        updated_at: note.updated_at,
    };
    let after = NoteContent {
        title: title.map_or_else(|| before.title.clone(), |title| title.trim().to_string()),
        description: description.map_or_else(
            || before.description.clone(),
            |text| text.filter(|text| !text.trim().is_empty()),
        ),
        updated_at: Some(Utc::now()),
    };
    let mut patch = Patch::new("update note");
    if after.title != before.title || after.description != before.description {
        patch.push(Edit::NoteContent {
            id: note.id.clone(),
            before,
            after,
        });
    }
    Ok(patch)
}

pub fn delete_note(state: &RoadmapState, note_id: &str) -> Result<Patch, ValidationError> {
    let index = note_position(state, note_id)?;
    let mut patch = Patch::new("delete note");
    patch.push(Edit::Remove {
        index,
        record: Record::Note(state.notes[index].clone()),
    });
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lane, Roadmap};

    fn state() -> RoadmapState {
        let mut state = RoadmapState::new(Roadmap {
            id: "r1".to_string(),
            title: "Roadmap".to_string(),
            description: None,
            pinned_column_id: None,
        });
        state.lanes.push(Lane {
            id: "core".to_string(),
            roadmap_id: "r1".to_string(),
            name: "Core Features".to_string(),
            color: "#3b82f6".to_string(),
            description: None,
            expanded: false,
            order_index: 0,
        });
        for (id, lane, idx) in [
            ("n1", None, 0),
            ("n2", None, 1),
            ("n3", None, 2),
            ("k1", Some("core"), 0),
        ] {
            state.notes.push(Note {
                id: id.to_string(),
                roadmap_id: "r1".to_string(),
                lane_id: lane.map(str::to_string),
                order_index: idx,
                title: id.to_string(),
                description: None,
                updated_at: None,
            });
        }
        state.normalize_order();
        state
    }

    fn ids(state: &RoadmapState, lane: Option<&str>) -> Vec<String> {
        notes_for_lane(state, lane).iter().map(|note| note.id.clone()).collect()
    }

    fn indexes(state: &RoadmapState, lane: Option<&str>) -> Vec<i64> {
        notes_for_lane(state, lane).iter().map(|note| note.order_index).collect()
    }

    #[test]
    fn move_within_column_touches_only_shifted_notes() {
        let mut state = state();
        let patch = move_note(&state, "n3", None, Some("n2")).unwrap();
        assert_eq!(patch.len(), 2);
        patch.apply(&mut state);
        assert_eq!(ids(&state, None), vec!["n1", "n3", "n2"]);
        assert_eq!(indexes(&state, None), vec![0, 1, 2]);
    }

    #[test]
    fn move_across_columns_renumbers_both() {
        let mut state = state();
        let patch = move_note(&state, "n1", Some("core"), None).unwrap();
        patch.apply(&mut state);
        assert_eq!(ids(&state, Some("core")), vec!["k1", "n1"]);
        assert_eq!(indexes(&state, Some("core")), vec![0, 1]);
        assert_eq!(ids(&state, None), vec!["n2", "n3"]);
        assert_eq!(indexes(&state, None), vec![0, 1]);
        assert!(state.notes.iter().find(|n| n.id == "n1").unwrap().updated_at.is_some());
    }

    #[test]
    fn dropping_before_itself_is_a_noop() {
        let state = state();
        assert!(move_note(&state, "n2", None, Some("n2")).unwrap().is_empty());
    }

    #[test]
    fn unknown_targets_are_rejected() {
        let state = state();
        assert!(matches!(
            move_note(&state, "n1", Some("nope"), None),
            Err(ValidationError::UnknownLane(_))
        ));
        assert!(matches!(move_note(&state, "zz", None, None), Err(ValidationError::UnknownNote(_))));
    }

    #[test]
    fn added_note_goes_last() {
        let mut state = state();
        add_note(&state, Some("core"), " Ship it ", None).unwrap().apply(&mut state);
        let notes = notes_for_lane(&state, Some("core"));
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].title, "Ship it");
        assert_eq!(notes[1].order_index, 1);
    }

    #[test]
    fn board_lists_notepad_first() {
        let board = board(&state());
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].title, NOTEPAD_TITLE);
        assert_eq!(board[0].notes.len(), 3);
        assert_eq!(board[1].lane_id.as_deref(), Some("core"));
    }

    #[test]
    fn update_and_delete() {
        let mut state = state();
        update_note(&state, "n1", Some("Renamed".to_string()), None)
            .unwrap()
            .apply(&mut state);
        assert_eq!(notes_for_lane(&state, None)[0].title, "Renamed");
        assert!(update_note(&state, "n1", Some("Renamed".to_string()), None).unwrap().is_empty());
        delete_note(&state, "n2").unwrap().apply(&mut state);
        assert_eq!(ids(&state, None), vec!["n1", "n3"]);
    }
}
