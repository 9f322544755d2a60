//! Input selection state machine
//!
//! Turns clicks on squares and reserve slots into moves, independent of any
//! rendering. Every transition is a pure function of the current state, the
//! event and the legal move list.

use crate::board::Square;
use crate::moves::Move;
use crate::units::UnitKind;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Ready,
    PieceSelected { from: Square },
    /// Several moves share the clicked target; the user picks one
    CaptureDisambiguation { options: Vec<Move> },
    ReserveSelected { kind: UnitKind },
    /// Input is ignored while a replay animates
    Replaying,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionEvent {
    SquareClicked(Square),
    ReserveClicked(UnitKind),
    OptionChosen(usize),
    Cancelled,
    ReplayStarted,
    ReplayFinished,
}

/// Advance the selection, returning the next state and the move it commits
pub fn transition(state: Selection, event: SelectionEvent, legal: &[Move]) -> (Selection, Option<Move>) {
    use Selection::*;
    use SelectionEvent::*;

    match (state, event) {
        (Replaying, ReplayFinished) => (Ready, None),
        (Replaying, _) => (Replaying, None),
        (_, ReplayStarted) => (Replaying, None),
        (_, Cancelled) => (Ready, None),

        (Ready, SquareClicked(sq)) => select_square(sq, legal),
        (_, ReserveClicked(kind)) => select_reserve(kind, legal),

        (PieceSelected { from }, SquareClicked(to)) => {
            let candidates: Vec<Move> = legal
                .iter()
                .copied()
                .filter(|mv| mv.origin() == Some(from) && mv.destination() == Some(to))
                .collect();
            if candidates.is_empty() {
                return select_square(to, legal);
            }
            resolve(candidates)
        }

        (ReserveSelected { kind }, SquareClicked(to)) => {
            let candidates: Vec<Move> = legal
                .iter()
                .copied()
                .filter(|mv| matches!(mv, Move::Reinforce { kind: k, to: t, .. } if *k == kind && *t == to))
                .collect();
            if candidates.is_empty() {
                return (ReserveSelected { kind }, None);
            }
            resolve(candidates)
        }

        (CaptureDisambiguation { options }, OptionChosen(index)) => match options.get(index) {
            Some(&mv) => (Ready, Some(mv)),
            None => (CaptureDisambiguation { options }, None),
        },

        (state, _) => (state, None),
    }
}

/// One candidate commits immediately; several need a choice
fn resolve(candidates: Vec<Move>) -> (Selection, Option<Move>) {
    match candidates.as_slice() {
        [] => (Selection::Ready, None),
        [only] => (Selection::Ready, Some(*only)),
        _ => (Selection::CaptureDisambiguation { options: candidates }, None),
    }
}

fn select_square(sq: Square, legal: &[Move]) -> (Selection, Option<Move>) {
    let captures: Vec<Move> = legal
        .iter()
        .copied()
        .filter(|mv| matches!(mv, Move::AutoCapture { target, .. } if *target == sq))
        .collect();
    if !captures.is_empty() {
        return resolve(captures);
    }

    if legal.iter().any(|mv| mv.origin() == Some(sq)) {
        return (Selection::PieceSelected { from: sq }, None);
    }
    (Selection::Ready, None)
}

fn select_reserve(kind: UnitKind, legal: &[Move]) -> (Selection, Option<Move>) {
    let deployable = legal
        .iter()
        .any(|mv| matches!(mv, Move::Reinforce { kind: k, .. } if *k == kind));
    if deployable {
        (Selection::ReserveSelected { kind }, None)
    } else {
        (Selection::Ready, None)
    }
}
