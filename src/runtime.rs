//! The simulation thread and the control surface the host drives it with.
//!
//! Two long-lived roles share the engine: the host (UI/render) thread and
//! the simulation thread spawned here. One mutex protects the engine — grid
//! and excitation field included — and every host access goes through it.
//! The simulation thread takes the lock for exactly one tick at a time, so a
//! host lock always observes a consistent grid from a completed tick or the
//! idle gap between ticks.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::info;

use crate::compute::{EditOp, Engine, EngineError};
use crate::schema::GridStats;
use crate::snapshot::SnapshotError;

/// How often the paused loop re-checks its flags.
const PAUSE_POLL: Duration = Duration::from_millis(250);

#[derive(Default)]
struct Flags {
    paused: AtomicBool,
    step: AtomicBool,
    quit: AtomicBool,
}

/// Handle to a running simulation.
///
/// Dropping the handle stops the simulation thread and joins it. The engine
/// lock is exposed through short accessor methods; hosts needing several
/// operations under one lock can use [`Simulation::with_engine`].
pub struct Simulation {
    engine: Arc<Mutex<Engine>>,
    flags: Arc<Flags>,
    worker: Option<JoinHandle<()>>,
}

impl Simulation {
    /// Start the simulation thread. `frame_time` is the minimum wall time
    /// per tick; faster ticks sleep out the remainder.
    pub fn spawn(engine: Engine, frame_time: Duration) -> Self {
        let engine = Arc::new(Mutex::new(engine));
        let flags = Arc::new(Flags::default());

        let worker = thread::spawn({
            let engine = Arc::clone(&engine);
            let flags = Arc::clone(&flags);
            move || run_loop(&engine, &flags, frame_time)
        });

        Self {
            engine,
            flags,
            worker: Some(worker),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().expect("simulation mutex poisoned")
    }

    /// Run a closure with the engine lock held, e.g. a render snapshot or a
    /// batch of edits that must land between two ticks.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        f(&mut self.lock())
    }

    /// Advance one tick on the caller's thread, blocking on the lock.
    pub fn tick(&self) {
        self.lock().tick();
    }

    pub fn pause(&self) {
        self.flags.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.flags.paused.store(false, Ordering::Relaxed);
    }

    /// Flip the paused flag, returning the new value.
    pub fn toggle_pause(&self) -> bool {
        !self.flags.paused.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::Relaxed)
    }

    /// While paused, request one additional tick.
    pub fn request_step(&self) {
        self.flags.step.store(true, Ordering::Relaxed);
    }

    pub fn shock_all(&self) {
        self.lock().shock_all();
    }

    pub fn edit_cell(&self, x: usize, y: usize, op: EditOp) {
        self.lock().edit_cell(x, y, op);
    }

    pub fn edit_rect(&self, x0: usize, y0: usize, x1: usize, y1: usize, op: EditOp) {
        self.lock().edit_rect(x0, y0, x1, y1, op);
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        self.lock().save(path)
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        self.lock().load(path)
    }

    pub fn cell_status(&self, x: usize, y: usize) -> String {
        self.lock().cell_status(x, y)
    }

    pub fn stats(&self) -> GridStats {
        self.lock().stats()
    }

    pub fn ticks(&self) -> u64 {
        self.lock().ticks()
    }

    /// Stop the simulation thread and join it.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        self.flags.quit.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("simulation thread panicked");
            }
        }
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn run_loop(engine: &Mutex<Engine>, flags: &Flags, frame_time: Duration) {
    info!("simulation thread running, frame time {:?}", frame_time);
    loop {
        if flags.quit.load(Ordering::Relaxed) {
            break;
        }
        if flags.paused.load(Ordering::Relaxed) && !flags.step.swap(false, Ordering::Relaxed) {
            thread::sleep(PAUSE_POLL);
            continue;
        }

        let started = Instant::now();
        engine
            .lock()
            .expect("simulation mutex poisoned")
            .tick();

        // Pace to the configured frame time; a tick is never cancelled
        // mid-flight.
        let elapsed = started.elapsed();
        if elapsed < frame_time {
            thread::sleep(frame_time - elapsed);
        }
    }
    info!("simulation thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Grid, SimConfig};

    fn small_engine() -> Engine {
        let mut grid = Grid::uniform(16, 16);
        grid.seed_pacemaker_patch(8, 8, 1);
        let config = SimConfig {
            width: 16,
            height: 16,
            search_radius: 8,
            ..Default::default()
        };
        Engine::new(grid, &config).unwrap()
    }

    fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_runs_and_shuts_down() {
        let sim = Simulation::spawn(small_engine(), Duration::from_millis(1));
        assert!(
            wait_until(Duration::from_secs(5), || sim.ticks() > 2),
            "simulation never advanced"
        );
        sim.shutdown();
    }

    #[test]
    fn test_pause_stops_ticking() {
        let sim = Simulation::spawn(small_engine(), Duration::from_millis(1));
        sim.pause();
        assert!(sim.is_paused());

        // Let any in-flight tick drain, then confirm the count settles.
        thread::sleep(Duration::from_millis(100));
        let settled = sim.ticks();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(sim.ticks(), settled);
        sim.shutdown();
    }

    #[test]
    fn test_step_while_paused() {
        let sim = Simulation::spawn(small_engine(), Duration::from_millis(1));
        sim.pause();
        thread::sleep(Duration::from_millis(100));
        let before = sim.ticks();

        sim.request_step();
        assert!(
            wait_until(Duration::from_secs(2), || sim.ticks() == before + 1),
            "step request never honoured"
        );
        thread::sleep(Duration::from_millis(300));
        assert_eq!(sim.ticks(), before + 1, "step ran more than once");
        sim.shutdown();
    }

    #[test]
    fn test_edits_apply_through_lock() {
        let sim = Simulation::spawn(small_engine(), Duration::from_millis(1));
        sim.pause();
        thread::sleep(Duration::from_millis(50));

        sim.edit_cell(1, 1, EditOp::Excite);
        let status = sim.cell_status(1, 1);
        assert_eq!(status, "Cell type: Normal Cell  Cell state: 8");
        sim.shutdown();
    }

    #[test]
    fn test_toggle_pause_reports_new_state() {
        let sim = Simulation::spawn(small_engine(), Duration::from_millis(1));
        assert!(sim.toggle_pause());
        assert!(sim.is_paused());
        assert!(!sim.toggle_pause());
        assert!(!sim.is_paused());
        sim.shutdown();
    }
}
