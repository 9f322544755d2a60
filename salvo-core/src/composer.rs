//! Turn composer and outcome detection
//!
//! Drives a [`Position`] through whole turns: validates each move against the
//! legality engine, closes turns after the third move or a skip, and decides
//! when the game is over.

use crate::moves::Move;
use crate::position::{Position, MAX_MOVES_PER_TURN};
use crate::rules::{LegalityEngine, StandardRules};
use crate::turn::{side_for_turn, EndReason, Outcome, Turn};
use crate::units::Player;
use tracing::debug;

/// Composer state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    AwaitingMove,
    TurnInProgress { moves_made: usize },
    TurnComplete,
    Won { winner: Player, reason: EndReason },
    Draw { reason: EndReason },
}

impl Phase {
    pub fn is_finished(self) -> bool {
        matches!(self, Phase::Won { .. } | Phase::Draw { .. })
    }
}

impl From<Outcome> for Phase {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Win { winner, reason } => Phase::Won { winner, reason },
            Outcome::Draw { reason } => Phase::Draw { reason },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("illegal move {0}")]
    IllegalMove(Move),

    #[error("game is already over")]
    GameOver,

    #[error("expected turn {expected}, got {got}")]
    OutOfSequence { expected: u32, got: u32 },

    #[error("turn does not end with a skip or a third move")]
    IncompleteTurn,

    #[error("turn {0} records an outcome the rules do not produce")]
    OutcomeMismatch(u32),

    #[error("a pass must be the first action of a turn")]
    PassMidTurn,

    #[error("{0} is not on move")]
    NotOnMove(Player),

    #[error("side to move has no legal moves")]
    NoLegalMoves,
}

/// Rollback point for multi-move composition
#[derive(Clone)]
struct Checkpoint {
    position: Position,
    turn_start: Position,
    open: Vec<Move>,
    phase: Phase,
    turns: usize,
}

/// Builds the authoritative turn sequence of one game
#[derive(Clone, Debug)]
pub struct TurnComposer<E = StandardRules> {
    engine: E,
    first: Player,
    position: Position,
    /// Position when the open turn began, restored on resignation
    turn_start: Position,
    /// Moves applied in the open turn
    open: Vec<Move>,
    turns: Vec<Turn>,
    phase: Phase,
    /// Set when the start position is already lost for the side to move
    start_outcome: Option<Outcome>,
}

impl TurnComposer<StandardRules> {
    pub fn new(position: Position) -> Self {
        Self::with_engine(position, StandardRules)
    }

    /// Rebuild a game from its start position and logged turns
    pub fn from_log(position: Position, turns: &[Turn]) -> Result<Self, GameError> {
        let mut composer = Self::new(position);
        for turn in turns {
            composer.replay(turn)?;
        }
        Ok(composer)
    }
}

impl<E: LegalityEngine> TurnComposer<E> {
    pub fn with_engine(position: Position, engine: E) -> Self {
        let side = position.side_to_move();
        let start_outcome = (position.moves_made() == 0 && engine.legal_moves(&position).is_empty())
            .then_some(Outcome::win(side.opponent(), EndReason::Trapped));

        let phase = match (start_outcome, position.moves_made()) {
            (Some(outcome), _) => outcome.into(),
            (None, 0) => Phase::AwaitingMove,
            (None, moves_made) => Phase::TurnInProgress { moves_made },
        };
        Self {
            engine,
            first: side,
            turn_start: position.clone(),
            position,
            open: Vec::new(),
            turns: Vec::new(),
            phase,
            start_outcome,
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Side that moves in turn 1
    pub fn first_player(&self) -> Player {
        self.first
    }

    pub fn side_to_move(&self) -> Player {
        self.position.side_to_move()
    }

    /// Number the open (or next) turn will carry
    pub fn next_turn_number(&self) -> u32 {
        self.turns.len() as u32 + 1
    }

    /// Side that owns turn `number` in this game
    pub fn side_for(&self, number: u32) -> Player {
        side_for_turn(number, self.first)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.turns.last() {
            Some(turn) => turn.outcome,
            None => self.start_outcome,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_finished()
    }

    /// Moves applied so far in the open turn
    pub fn open_moves(&self) -> &[Move] {
        &self.open
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        if self.is_finished() {
            return Vec::new();
        }
        self.engine.legal_moves(&self.position)
    }

    // ========================================================================
    // ACTIONS
    // ========================================================================

    /// Apply one move. Returns the finished turn when this move closes it.
    pub fn apply(&mut self, mv: Move) -> Result<Option<Turn>, GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }
        if !self.engine.legal_moves(&self.position).contains(&mv) {
            return Err(GameError::IllegalMove(mv));
        }

        if mv.is_skip() {
            self.open.push(Move::Skip);
            return Ok(Some(self.close_turn(None)));
        }

        self.position.apply(&mv);
        self.open.push(mv);

        if let Some(owner) = self.position.missing_hq() {
            let outcome = Outcome::win(owner.opponent(), EndReason::HqCapture);
            return Ok(Some(self.close_turn(Some(outcome))));
        }

        let moves_made = self.position.moves_made();
        if moves_made >= MAX_MOVES_PER_TURN {
            return Ok(Some(self.close_turn(None)));
        }

        self.phase = Phase::TurnInProgress { moves_made };
        Ok(None)
    }

    /// Zero-move turn; a draw when it answers the opponent's pass
    pub fn pass(&mut self) -> Result<Turn, GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }
        if self.position.moves_made() > 0 {
            return Err(GameError::PassMidTurn);
        }

        let answered_pass = self.turns.last().is_some_and(Turn::is_pass);
        self.open.push(Move::Skip);
        let outcome = answered_pass.then_some(Outcome::Draw { reason: EndReason::DoubleSkip });
        Ok(self.close_turn(outcome))
    }

    /// Resign for `player`, on move or not. Any open moves are discarded.
    pub fn resign(&mut self, player: Player) -> Result<Turn, GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }

        let outcome = Outcome::win(player.opponent(), EndReason::Resign);
        self.position = self.turn_start.clone();
        self.open.clear();

        let turn = Turn {
            number: self.next_turn_number(),
            moves: Vec::new(),
            elapsed_ms: 0,
            resigned: true,
            outcome: Some(outcome),
        };
        self.finish(turn.clone());
        Ok(turn)
    }

    /// Flag `player` on time, keeping the moves they made in the open turn
    pub fn timeout(&mut self, player: Player) -> Result<Turn, GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }
        if player != self.side_to_move() {
            return Err(GameError::NotOnMove(player));
        }

        let turn = Turn {
            number: self.next_turn_number(),
            moves: std::mem::take(&mut self.open),
            elapsed_ms: 0,
            resigned: false,
            outcome: Some(Outcome::win(player.opponent(), EndReason::Timeout)),
        };
        self.finish(turn.clone());
        Ok(turn)
    }

    /// Apply a whole turn at once. All-or-nothing: on error the composer is
    /// left exactly as it was.
    pub fn compose(&mut self, moves: &[Move], elapsed_ms: u64) -> Result<Turn, GameError> {
        let checkpoint = self.checkpoint();
        let result = self.compose_inner(moves);
        match result {
            Ok(mut turn) => {
                turn.elapsed_ms = elapsed_ms;
                if let Some(last) = self.turns.last_mut() {
                    last.elapsed_ms = elapsed_ms;
                }
                Ok(turn)
            }
            Err(err) => {
                self.restore(checkpoint);
                Err(err)
            }
        }
    }

    fn compose_inner(&mut self, moves: &[Move]) -> Result<Turn, GameError> {
        if moves == [Move::Skip] && self.position.moves_made() == 0 {
            return self.pass();
        }

        let mut closed = None;
        for (i, &mv) in moves.iter().enumerate() {
            if closed.is_some() {
                return Err(GameError::IllegalMove(moves[i]));
            }
            closed = self.apply(mv)?;
        }
        closed.ok_or(GameError::IncompleteTurn)
    }

    /// Re-apply a logged turn, checking that the rules reproduce it
    pub fn replay(&mut self, turn: &Turn) -> Result<(), GameError> {
        let expected = self.next_turn_number();
        if turn.number != expected {
            return Err(GameError::OutOfSequence { expected, got: turn.number });
        }

        let checkpoint = self.checkpoint();
        let result = self.replay_inner(turn);
        match result {
            Ok(produced) if produced.outcome == turn.outcome => {
                if let Some(last) = self.turns.last_mut() {
                    last.elapsed_ms = turn.elapsed_ms;
                }
                Ok(())
            }
            Ok(_) => {
                self.restore(checkpoint);
                Err(GameError::OutcomeMismatch(turn.number))
            }
            Err(err) => {
                self.restore(checkpoint);
                Err(err)
            }
        }
    }

    fn replay_inner(&mut self, turn: &Turn) -> Result<Turn, GameError> {
        let mismatch = || GameError::OutcomeMismatch(turn.number);

        if turn.resigned {
            let winner = turn.outcome.and_then(Outcome::winner).ok_or_else(mismatch)?;
            if !turn.moves.is_empty() {
                return Err(mismatch());
            }
            return self.resign(winner.opponent());
        }

        match turn.outcome {
            Some(Outcome::Win { winner, reason: EndReason::Timeout }) => {
                for &mv in &turn.moves {
                    if self.apply(mv)?.is_some() {
                        return Err(mismatch());
                    }
                }
                self.timeout(winner.opponent())
            }
            _ => self.compose_inner(&turn.moves),
        }
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Close the open turn, then look for a trapped opponent
    fn close_turn(&mut self, outcome: Option<Outcome>) -> Turn {
        let mover = self.position.side_to_move();
        let mut turn = Turn::new(self.next_turn_number(), std::mem::take(&mut self.open));

        self.position.end_turn();
        self.turn_start = self.position.clone();

        turn.outcome = outcome.or_else(|| {
            self.engine
                .legal_moves(&self.position)
                .is_empty()
                .then_some(Outcome::win(mover, EndReason::Trapped))
        });

        debug!("turn {} closed: {} moves", turn.number, turn.moves.len());

        match turn.outcome {
            Some(_) => self.finish(turn.clone()),
            None => {
                self.turns.push(turn.clone());
                self.phase = Phase::TurnComplete;
            }
        }
        turn
    }

    fn finish(&mut self, turn: Turn) {
        if let Some(outcome) = turn.outcome {
            debug!("game over after turn {}: {}", turn.number, outcome);
            self.phase = outcome.into();
        }
        self.turns.push(turn);
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            position: self.position.clone(),
            turn_start: self.turn_start.clone(),
            open: self.open.clone(),
            phase: self.phase,
            turns: self.turns.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.position = checkpoint.position;
        self.turn_start = checkpoint.turn_start;
        self.open = checkpoint.open;
        self.phase = checkpoint.phase;
        self.turns.truncate(checkpoint.turns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::decode;

    fn mv(token: &str) -> Move {
        token.parse().unwrap()
    }

    fn composer(position: &str) -> TurnComposer {
        TurnComposer::new(decode(position).unwrap())
    }

    #[test]
    fn test_three_moves_close_turn() {
        let mut game = TurnComposer::new(Position::standard());
        assert_eq!(game.apply(mv("c2c3")), Ok(None));
        assert_eq!(game.phase(), Phase::TurnInProgress { moves_made: 1 });
        assert_eq!(game.apply(mv("d2d3")), Ok(None));
        let turn = game.apply(mv("Ia1")).unwrap().unwrap();
        assert_eq!(turn.number, 1);
        assert_eq!(turn.moves.len(), 3);
        assert_eq!(game.phase(), Phase::TurnComplete);
        assert_eq!(game.side_to_move(), Player::Blue);
        assert_eq!(game.next_turn_number(), 2);
    }

    #[test]
    fn test_skip_closes_turn() {
        let mut game = TurnComposer::new(Position::standard());
        game.apply(mv("c2c3")).unwrap();
        let turn = game.apply(Move::Skip).unwrap().unwrap();
        assert_eq!(turn.moves, vec![mv("c2c3"), Move::Skip]);
        assert_eq!(game.side_to_move(), Player::Blue);
    }

    #[test]
    fn test_illegal_move_leaves_state() {
        let mut game = TurnComposer::new(Position::standard());
        let before = game.position().clone();
        assert_eq!(game.apply(mv("c2c5")), Err(GameError::IllegalMove(mv("c2c5"))));
        assert_eq!(game.apply(Move::Skip), Err(GameError::IllegalMove(Move::Skip)));
        assert_eq!(game.position(), &before);
    }

    #[test]
    fn test_hq_capture_ends_game() {
        let mut game = composer("8/8/8/8/8/4h3/2I5/4H3 - - r -");
        let turn = game.apply(mv("c2d2xe3")).unwrap().unwrap();
        assert_eq!(turn.outcome, Some(Outcome::win(Player::Red, EndReason::HqCapture)));
        assert_eq!(
            game.phase(),
            Phase::Won { winner: Player::Red, reason: EndReason::HqCapture }
        );
        assert_eq!(game.apply(mv("e1e2")), Err(GameError::GameOver));
    }

    #[test]
    fn test_absent_hq_decided_after_first_move() {
        let mut game = composer("4i3/8/8/8/8/8/8/4H3 - - r -");
        assert_eq!(game.phase(), Phase::AwaitingMove);
        let turn = game.apply(mv("e1e2")).unwrap().unwrap();
        assert_eq!(turn.moves, vec![mv("e1e2")]);
        assert_eq!(turn.outcome, Some(Outcome::win(Player::Red, EndReason::HqCapture)));
        assert!(game.is_finished());
    }

    #[test]
    fn test_trapped_at_start_is_finished() {
        // every square around the red HQ on a1 is under blue fire
        let game = composer("7h/8/8/8/r↓v↓6/8/8/H7 - - r -");
        assert_eq!(game.outcome(), Some(Outcome::win(Player::Blue, EndReason::Trapped)));
        assert_eq!(game.phase(), Phase::Won { winner: Player::Blue, reason: EndReason::Trapped });
        assert!(game.legal_moves().is_empty());
        assert!(game.turns().is_empty());
    }

    #[test]
    fn test_trapped_opponent_loses() {
        // blue HQ hemmed in on h8: g7 and h7 occupied, g8 under fire
        let mut game = composer("7h/6R↑R↑/8/8/8/8/8/4H3 - - r -");
        let turn = game.apply(mv("e1e2")).unwrap();
        assert_eq!(turn, None);
        game.apply(Move::Skip).unwrap();
        assert_eq!(game.outcome(), Some(Outcome::win(Player::Red, EndReason::Trapped)));
    }

    #[test]
    fn test_double_pass_is_draw() {
        let mut game = TurnComposer::new(Position::standard());
        let first = game.pass().unwrap();
        assert!(first.is_pass());
        assert_eq!(first.outcome, None);
        let second = game.pass().unwrap();
        assert_eq!(second.outcome, Some(Outcome::Draw { reason: EndReason::DoubleSkip }));
        assert_eq!(game.phase(), Phase::Draw { reason: EndReason::DoubleSkip });
    }

    #[test]
    fn test_pass_only_at_turn_start() {
        let mut game = TurnComposer::new(Position::standard());
        game.apply(mv("c2c3")).unwrap();
        assert_eq!(game.pass(), Err(GameError::PassMidTurn));
    }

    #[test]
    fn test_resign_discards_open_moves() {
        let mut game = TurnComposer::new(Position::standard());
        game.apply(mv("c2c3")).unwrap();
        let turn = game.resign(Player::Blue).unwrap();
        assert_eq!(turn.number, 1);
        assert!(turn.resigned);
        assert!(turn.moves.is_empty());
        assert_eq!(turn.outcome, Some(Outcome::win(Player::Red, EndReason::Resign)));
        assert_eq!(game.position(), &Position::standard());
    }

    #[test]
    fn test_timeout_only_for_side_to_move() {
        let mut game = TurnComposer::new(Position::standard());
        game.apply(mv("c2c3")).unwrap();
        assert_eq!(game.timeout(Player::Blue), Err(GameError::NotOnMove(Player::Blue)));
        let turn = game.timeout(Player::Red).unwrap();
        assert_eq!(turn.moves, vec![mv("c2c3")]);
        assert_eq!(turn.outcome, Some(Outcome::win(Player::Blue, EndReason::Timeout)));
    }

    #[test]
    fn test_compose_is_atomic() {
        let mut game = TurnComposer::new(Position::standard());
        let err = game.compose(&[mv("c2c3"), mv("c3c5")], 100);
        assert_eq!(err, Err(GameError::IllegalMove(mv("c3c5"))));
        assert_eq!(game.position(), &Position::standard());
        assert!(game.open_moves().is_empty());

        assert_eq!(game.compose(&[mv("c2c3")], 100), Err(GameError::IncompleteTurn));
        assert!(game.open_moves().is_empty());

        let turn = game.compose(&[mv("c2c3"), Move::Skip], 1234).unwrap();
        assert_eq!(turn.elapsed_ms, 1234);
        assert_eq!(game.turns()[0].elapsed_ms, 1234);
    }

    #[test]
    fn test_compose_rejects_moves_after_close() {
        let mut game = TurnComposer::new(Position::standard());
        let moves = [mv("c2c3"), Move::Skip, mv("d2d3")];
        assert_eq!(game.compose(&moves, 0), Err(GameError::IllegalMove(mv("d2d3"))));
        assert!(game.turns().is_empty());
    }

    #[test]
    fn test_replay_checks_outcome() {
        let mut source = TurnComposer::new(Position::standard());
        let t1 = source.compose(&[mv("c2c3"), Move::Skip], 500).unwrap();
        let t2 = source.resign(Player::Blue).unwrap();

        let rebuilt = TurnComposer::from_log(Position::standard(), &[t1.clone(), t2.clone()]).unwrap();
        assert_eq!(rebuilt.turns(), source.turns());
        assert_eq!(rebuilt.position(), source.position());

        let mut forged = t1.clone();
        forged.outcome = Some(Outcome::win(Player::Red, EndReason::Trapped));
        let mut game = TurnComposer::new(Position::standard());
        assert_eq!(game.replay(&forged), Err(GameError::OutcomeMismatch(1)));
        assert!(game.turns().is_empty());

        assert_eq!(
            game.replay(&t2),
            Err(GameError::OutOfSequence { expected: 1, got: 2 })
        );
    }

    #[test]
    fn test_replay_timeout_turn() {
        let mut source = TurnComposer::new(Position::standard());
        source.apply(mv("c2c3")).unwrap();
        let flagged = source.timeout(Player::Red).unwrap();

        let mut game = TurnComposer::new(Position::standard());
        game.replay(&flagged).unwrap();
        assert_eq!(game.outcome(), flagged.outcome);
        assert_eq!(game.position(), source.position());
    }
}
