//! Session orchestration
//!
//! `start_session` racks a new table; `apply_shot` reads a stored table,
//! runs the shot through the physics capability and stores the settled
//! result under a new id. The manager never holds table state itself: the
//! id handed back to the client is the only handle to a game.
//!
//! Shooting the same id twice is allowed and forks the game; each shot gets
//! its own successor id and the original stays readable.

use std::sync::Arc;

use glam::DVec2;
use rand::Rng;

use crate::error::GameError;
use crate::persistence::TableStore;
use crate::physics::Simulate;
use crate::renderer::Render;
use crate::table::{Origin, RackLayout, TableId, TableState};

/// Default display label for new games
pub const DEFAULT_GAME_NAME: &str = "game";

/// Result of `start_session`
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    pub table_id: TableId,
    /// Rendered opening rack
    pub snapshot: String,
}

/// Result of `apply_shot`
#[derive(Debug, Clone, PartialEq)]
pub struct ShotReceipt {
    /// Id of the settled table
    pub table_id: TableId,
    /// Id the shot was taken on
    pub parent: TableId,
    /// One rendered document per trace frame (empty when nothing moved)
    pub frames: Vec<String>,
    pub balls_before: usize,
    pub balls_after: usize,
}

/// Ties the store, physics and renderer together
pub struct SessionManager {
    store: Arc<dyn TableStore>,
    engine: Arc<dyn Simulate>,
    renderer: Arc<dyn Render>,
    rack: RackLayout,
    game_name: String,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn TableStore>,
        engine: Arc<dyn Simulate>,
        renderer: Arc<dyn Render>,
    ) -> Self {
        Self {
            store,
            engine,
            renderer,
            rack: RackLayout::default(),
            game_name: DEFAULT_GAME_NAME.to_string(),
        }
    }

    pub fn with_rack(mut self, rack: RackLayout) -> Self {
        self.rack = rack;
        self
    }

    pub fn with_game_name(mut self, name: impl Into<String>) -> Self {
        self.game_name = name.into();
        self
    }

    pub fn rack(&self) -> &RackLayout {
        &self.rack
    }

    /// Rack a fresh table for two players and store it
    pub fn start_session<R: Rng>(
        &self,
        player1: &str,
        player2: &str,
        rng: &mut R,
    ) -> Result<SessionStart, GameError> {
        for (field, name) in [("player1name", player1), ("player2name", player2)] {
            if name.trim().is_empty() {
                return Err(GameError::InvalidInput(format!("{field} must not be empty")));
            }
        }

        let balls = self.rack.build(rng);
        let table = TableState::new(&self.game_name, player1, player2, Origin::Break, balls)?;
        let ball_count = table.len();
        let snapshot = self.renderer.render_table(&table);
        let table_id = self.store.write(table)?;

        log::info!(
            "Started session {} for {} vs {} ({} balls)",
            table_id,
            player1,
            player2,
            ball_count
        );

        Ok(SessionStart { table_id, snapshot })
    }

    /// Shoot the cue ball on table `id` and store the settled result
    pub fn apply_shot(&self, id: TableId, velocity: DVec2) -> Result<ShotReceipt, GameError> {
        if !velocity.is_finite() {
            return Err(GameError::InvalidInput(format!(
                "cue velocity must be finite, got ({}, {})",
                velocity.x, velocity.y
            )));
        }

        let prior = self.store.read(id)?;
        if prior.cue_ball().is_none() {
            return Err(GameError::InvalidState(format!(
                "table {id} has no cue ball"
            )));
        }

        // No store lock is held while the engine runs
        let outcome = self.engine.simulate(&prior, velocity)?;

        if outcome.settled.len() > prior.len() {
            return Err(GameError::EngineUnavailable(format!(
                "engine returned {} balls for a table of {}",
                outcome.settled.len(),
                prior.len()
            )));
        }
        if !outcome.settled.is_settled() {
            return Err(GameError::EngineUnavailable(
                "engine returned a table still in motion".into(),
            ));
        }

        let settled = prior.successor(
            Origin::Shot {
                parent: id,
                velocity,
            },
            outcome.settled.balls().to_vec(),
        )?;
        let balls_after = settled.len();
        let table_id = self.store.write(settled)?;
        let frames = self.renderer.render_trace(&outcome.trace);

        log::info!(
            "Shot on {} -> {}: velocity ({:.1}, {:.1}), balls {} -> {}, {} frames",
            id,
            table_id,
            velocity.x,
            velocity.y,
            prior.len(),
            balls_after,
            frames.len()
        );

        Ok(ShotReceipt {
            table_id,
            parent: id,
            frames,
            balls_before: prior.len(),
            balls_after,
        })
    }

    /// Stored table for `id`
    pub fn table(&self, id: TableId) -> Result<Arc<TableState>, GameError> {
        Ok(self.store.read(id)?)
    }

    /// Rendered snapshot of a stored table
    pub fn snapshot(&self, id: TableId) -> Result<String, GameError> {
        let table = self.store.read(id)?;
        Ok(self.renderer.render_table(&table))
    }

    /// Every table from the opening rack up to `id`, oldest first
    pub fn history(&self, id: TableId) -> Result<Vec<(TableId, Arc<TableState>)>, GameError> {
        let mut chain = Vec::new();
        let mut current = id;
        loop {
            let table = self.store.read(current)?;
            let origin = table.origin();
            chain.push((current, table));
            match origin {
                Origin::Break => break,
                // Parents are always allocated before their children
                Origin::Shot { parent, .. } if parent < current => current = parent,
                Origin::Shot { parent, .. } => {
                    return Err(GameError::InvalidState(format!(
                        "table {current} claims later parent {parent}"
                    )));
                }
            }
        }
        chain.reverse();
        Ok(chain)
    }

    /// Number of stored tables across all games
    pub fn stored_tables(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::persistence::{MemoryStore, StoreError};
    use crate::physics::{PoolEngine, ShotOutcome, SimulationError, Trace};
    use crate::renderer::SvgRenderer;
    use crate::table::{Ball, head_spot, layout_is_valid};
    use crate::on_table;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::sync::Mutex;
    use std::thread;

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(MemoryStore::new()),
            Arc::new(PoolEngine::default()),
            Arc::new(SvgRenderer::default()),
        )
    }

    fn with_engine(engine: impl Simulate + 'static) -> SessionManager {
        SessionManager::new(
            Arc::new(MemoryStore::new()),
            Arc::new(engine),
            Arc::new(SvgRenderer::default()),
        )
    }

    /// Pockets the listed balls and leaves the rest where they were
    struct PocketingEngine {
        pocket: Vec<u8>,
        calls: Mutex<usize>,
    }

    impl PocketingEngine {
        fn new(pocket: Vec<u8>) -> Self {
            Self {
                pocket,
                calls: Mutex::new(0),
            }
        }
    }

    impl Simulate for PocketingEngine {
        fn simulate(&self, table: &TableState, _v: DVec2) -> Result<ShotOutcome, SimulationError> {
            *self.calls.lock().unwrap() += 1;
            let balls = table
                .balls()
                .iter()
                .filter(|b| !self.pocket.contains(&b.number))
                .copied()
                .collect();
            Ok(ShotOutcome {
                settled: table.successor(table.origin(), balls).unwrap(),
                trace: Trace::default(),
            })
        }
    }

    /// Misbehaving engine that conjures an extra ball
    struct AddingEngine;

    impl Simulate for AddingEngine {
        fn simulate(&self, table: &TableState, _v: DVec2) -> Result<ShotOutcome, SimulationError> {
            let mut balls = table.balls().to_vec();
            balls.push(Ball::still(15, DVec2::new(100.0, 100.0)));
            Ok(ShotOutcome {
                settled: table.successor(table.origin(), balls).unwrap(),
                trace: Trace::default(),
            })
        }
    }

    struct StuckEngine;

    impl Simulate for StuckEngine {
        fn simulate(&self, _t: &TableState, _v: DVec2) -> Result<ShotOutcome, SimulationError> {
            Err(SimulationError::DidNotSettle { segments: 10_001 })
        }
    }

    /// Reads work, writes after the first fail
    struct FullStore {
        inner: MemoryStore,
    }

    impl TableStore for FullStore {
        fn write(&self, table: TableState) -> Result<TableId, StoreError> {
            if self.inner.len() >= 1 {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            self.inner.write(table)
        }

        fn read(&self, id: TableId) -> Result<Arc<TableState>, StoreError> {
            self.inner.read(id)
        }

        fn len(&self) -> usize {
            self.inner.len()
        }
    }

    fn rng() -> Pcg32 {
        Pcg32::seed_from_u64(2024)
    }

    #[test]
    fn test_start_session_scenario() {
        let sessions = manager();
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        assert_eq!(start.table_id, TableId::new(1));
        assert!(!start.snapshot.is_empty());
        assert!(start.snapshot.contains("fill=\"WHITE\""));

        let table = sessions.table(start.table_id).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.balls().iter().filter(|b| b.is_cue()).count(), 1);
        assert!(layout_is_valid(table.balls()));
        assert_eq!(table.player1(), "Alice");
        assert_eq!(table.player2(), "Bob");
        assert_eq!(table.game_name(), DEFAULT_GAME_NAME);
        assert_eq!(table.origin(), Origin::Break);
    }

    #[test]
    fn test_empty_names_rejected() {
        let sessions = manager();
        for (p1, p2) in [("", "Bob"), ("Alice", ""), ("  ", "Bob")] {
            let err = sessions.start_session(p1, p2, &mut rng()).unwrap_err();
            assert!(matches!(err, GameError::InvalidInput(_)));
        }
        assert_eq!(sessions.stored_tables(), 0);
    }

    #[test]
    fn test_seeded_start_is_deterministic() {
        let a = manager();
        let b = manager();
        let ta = a.start_session("A", "B", &mut rng()).unwrap();
        let tb = b.start_session("A", "B", &mut rng()).unwrap();
        assert_eq!(ta, tb);
        assert_eq!(a.table(ta.table_id).unwrap(), b.table(tb.table_id).unwrap());
    }

    #[test]
    fn test_apply_shot_scenario() {
        let sessions = manager();
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        let receipt = sessions
            .apply_shot(start.table_id, DVec2::new(0.0, -5.0))
            .unwrap();

        assert_eq!(receipt.table_id, TableId::new(2));
        assert_eq!(receipt.parent, start.table_id);
        assert!(receipt.balls_after <= 4);
        assert!(!receipt.frames.is_empty());

        let after = sessions.table(receipt.table_id).unwrap();
        if let Some(cue) = after.cue_ball() {
            assert_ne!(cue.pos, head_spot());
        }
        // The pre-shot table is untouched
        let before = sessions.table(start.table_id).unwrap();
        assert_eq!(before.cue_ball().unwrap().pos, head_spot());
        assert_eq!(
            after.origin(),
            Origin::Shot {
                parent: start.table_id,
                velocity: DVec2::new(0.0, -5.0)
            }
        );
    }

    #[test]
    fn test_unknown_id_scenario() {
        let sessions = manager();
        sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        let err = sessions
            .apply_shot(TableId::new(999), DVec2::new(1.0, 1.0))
            .unwrap_err();
        assert_eq!(err, GameError::NotFound(TableId::new(999)));
        assert_eq!(sessions.stored_tables(), 1);
    }

    #[test]
    fn test_zero_velocity_keeps_layout() {
        let sessions = manager();
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        let receipt = sessions.apply_shot(start.table_id, DVec2::ZERO).unwrap();
        assert_ne!(receipt.table_id, start.table_id);
        assert!(receipt.frames.is_empty());
        let before = sessions.table(start.table_id).unwrap();
        let after = sessions.table(receipt.table_id).unwrap();
        assert!(before.same_layout(&after));
    }

    #[test]
    fn test_non_finite_velocity_is_invalid_input() {
        let engine = Arc::new(PocketingEngine::new(vec![]));
        let sessions = SessionManager::new(
            Arc::new(MemoryStore::new()),
            engine.clone(),
            Arc::new(SvgRenderer::default()),
        );
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        for v in [
            DVec2::new(f64::NAN, 0.0),
            DVec2::new(0.0, f64::INFINITY),
        ] {
            let err = sessions.apply_shot(start.table_id, v).unwrap_err();
            assert!(matches!(err, GameError::InvalidInput(_)));
        }
        assert_eq!(sessions.stored_tables(), 1);
        assert_eq!(*engine.calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_pocketed_cue_is_invalid_state() {
        let sessions = with_engine(PocketingEngine::new(vec![CUE_BALL]));
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        let scratch = sessions
            .apply_shot(start.table_id, DVec2::new(0.0, -100.0))
            .unwrap();
        assert_eq!(scratch.balls_after, 3);

        let err = sessions
            .apply_shot(scratch.table_id, DVec2::new(0.0, -100.0))
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
        assert_eq!(sessions.stored_tables(), 2);
    }

    #[test]
    fn test_engine_adding_balls_is_rejected() {
        let sessions = with_engine(AddingEngine);
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        let err = sessions
            .apply_shot(start.table_id, DVec2::new(0.0, -100.0))
            .unwrap_err();
        assert!(matches!(err, GameError::EngineUnavailable(_)));
        assert_eq!(sessions.stored_tables(), 1);
    }

    #[test]
    fn test_engine_failure_is_retryable() {
        let sessions = with_engine(StuckEngine);
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        let err = sessions
            .apply_shot(start.table_id, DVec2::new(0.0, -100.0))
            .unwrap_err();
        assert!(matches!(err, GameError::EngineUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_store_failure_propagates() {
        let sessions = SessionManager::new(
            Arc::new(FullStore {
                inner: MemoryStore::new(),
            }),
            Arc::new(PocketingEngine::new(vec![])),
            Arc::new(SvgRenderer::default()),
        );
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        let err = sessions
            .apply_shot(start.table_id, DVec2::new(0.0, -100.0))
            .unwrap_err();
        assert!(matches!(err, GameError::StoreUnavailable(_)));

        let err = sessions.start_session("Carol", "Dave", &mut rng()).unwrap_err();
        assert!(matches!(err, GameError::StoreUnavailable(_)));
        assert_eq!(sessions.stored_tables(), 1);
    }

    #[test]
    fn test_same_id_forks() {
        let sessions = Arc::new(with_engine(PocketingEngine::new(vec![2])));
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sessions = Arc::clone(&sessions);
                thread::spawn(move || {
                    sessions
                        .apply_shot(start.table_id, DVec2::new(0.0, -50.0))
                        .unwrap()
                })
            })
            .collect();

        let mut ids: Vec<TableId> = handles
            .into_iter()
            .map(|h| {
                let receipt = h.join().unwrap();
                assert_eq!(receipt.parent, start.table_id);
                receipt.table_id
            })
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert_eq!(sessions.table(start.table_id).unwrap().len(), 4);
    }

    #[test]
    fn test_history_walks_back_to_break() {
        let sessions = with_engine(PocketingEngine::new(vec![]));
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        let first = sessions.apply_shot(start.table_id, DVec2::new(0.0, -10.0)).unwrap();
        // A fork that is not part of the second shot's lineage
        sessions.apply_shot(start.table_id, DVec2::new(5.0, -10.0)).unwrap();
        let second = sessions.apply_shot(first.table_id, DVec2::new(1.0, -10.0)).unwrap();

        let chain: Vec<TableId> = sessions
            .history(second.table_id)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(chain, vec![start.table_id, first.table_id, second.table_id]);

        assert_eq!(
            sessions.history(TableId::new(77)).unwrap_err(),
            GameError::NotFound(TableId::new(77))
        );
    }

    #[test]
    fn test_history_rejects_forward_parent() {
        let store = Arc::new(MemoryStore::new());
        let sessions = SessionManager::new(
            store.clone(),
            Arc::new(PocketingEngine::new(vec![])),
            Arc::new(SvgRenderer::default()),
        );
        let balls = vec![Ball::still(CUE_BALL, head_spot())];
        // Tables 1 and 2 name themselves and a later id as parent
        for parent in [1, 5] {
            let origin = Origin::Shot {
                parent: TableId::new(parent),
                velocity: DVec2::new(0.0, -1.0),
            };
            let table = TableState::new("game", "A", "B", origin, balls.clone()).unwrap();
            store.write(table).unwrap();
        }

        for id in [1, 2] {
            let err = sessions.history(TableId::new(id)).unwrap_err();
            assert!(matches!(err, GameError::InvalidState(_)), "{err}");
        }
    }

    #[test]
    fn test_snapshot_renders_stored_table() {
        let sessions = manager();
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        assert_eq!(sessions.snapshot(start.table_id).unwrap(), start.snapshot);
    }

    #[test]
    fn test_custom_rack_and_label() {
        let sessions = manager()
            .with_rack(RackLayout::new(5, 1.5))
            .with_game_name("eight-ball");
        let start = sessions.start_session("Alice", "Bob", &mut rng()).unwrap();
        let table = sessions.table(start.table_id).unwrap();
        assert_eq!(table.len(), 16);
        assert_eq!(table.game_name(), "eight-ball");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_start_session_rack_is_valid(
            p1 in "[A-Za-z]{1,12}",
            p2 in "[A-Za-z]{1,12}",
            seed in any::<u64>(),
        ) {
            let sessions = manager();
            let start = sessions.start_session(&p1, &p2, &mut Pcg32::seed_from_u64(seed)).unwrap();
            let table = sessions.table(start.table_id).unwrap();
            prop_assert_eq!(table.len(), sessions.rack().ball_count());
            prop_assert!(table.balls().iter().filter(|b| b.is_cue()).count() <= 1);
            prop_assert!(table.balls().iter().all(|b| on_table(b.pos)));
        }

        #[test]
        fn prop_zero_shot_is_identity(seed in any::<u64>()) {
            let sessions = manager();
            let start = sessions.start_session("A", "B", &mut Pcg32::seed_from_u64(seed)).unwrap();
            let receipt = sessions.apply_shot(start.table_id, DVec2::ZERO).unwrap();
            prop_assert_ne!(receipt.table_id, start.table_id);
            let before = sessions.table(start.table_id).unwrap();
            let after = sessions.table(receipt.table_id).unwrap();
            prop_assert!(before.same_layout(&after));
        }

        #[test]
        fn prop_unknown_id_is_not_found(raw in 2u64..u64::MAX, vx in -1e3f64..1e3, vy in -1e3f64..1e3) {
            let sessions = manager();
            sessions.start_session("A", "B", &mut rng()).unwrap();
            let id = TableId::new(raw);
            let err = sessions.apply_shot(id, DVec2::new(vx, vy)).unwrap_err();
            prop_assert_eq!(err, GameError::NotFound(id));
            prop_assert_eq!(sessions.stored_tables(), 1);
        }

        #[test]
        fn prop_writes_never_share_ids(n in 1usize..40) {
            let sessions = with_engine(PocketingEngine::new(vec![]));
            let start = sessions.start_session("A", "B", &mut rng()).unwrap();
            let mut seen = std::collections::HashSet::new();
            seen.insert(start.table_id);
            for _ in 0..n {
                let receipt = sessions.apply_shot(start.table_id, DVec2::new(0.0, -1.0)).unwrap();
                prop_assert!(seen.insert(receipt.table_id));
            }
        }
    }
}
