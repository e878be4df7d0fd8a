use std::cell::Cell;

use crate::{error::SceneError, scene::Scene};

/// One-shot finalize flag.
#[derive(Debug, Default)]
pub struct FinalizeState {
    finalized: Cell<bool>,
}

impl FinalizeState {
    pub fn is_finalized(&self) -> bool {
        self.finalized.get()
    }
}

impl Clone for FinalizeState {
    /// Copies start out unfinalized.
    fn clone(&self) -> Self {
        Self::default()
    }
}

/// Lifecycle shared by everything that has to be prepared before rendering.
///
/// The scene is only borrowed for the duration of the call.
pub trait SceneObject {
    fn finalize_state(&self) -> &FinalizeState;

    fn do_finalize(&self, scene: &Scene) -> Result<(), SceneError>;

    /// Runs [`SceneObject::do_finalize`] until it succeeds once, or again when `force`
    /// is set.
    fn finalize(&self, scene: &Scene, force: bool) -> Result<(), SceneError> {
        let state = self.finalize_state();
        if state.is_finalized() && !force {
            return Ok(());
        }
        self.do_finalize(scene)?;
        state.finalized.set(true);
        Ok(())
    }

    fn is_finalized(&self) -> bool {
        self.finalize_state().is_finalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;

    struct Counter {
        state: FinalizeState,
        runs: Cell<u32>,
        fail: Cell<bool>,
    }

    impl SceneObject for Counter {
        fn finalize_state(&self) -> &FinalizeState {
            &self.state
        }

        fn do_finalize(&self, _scene: &Scene) -> Result<(), SceneError> {
            self.runs.set(self.runs.get() + 1);
            if self.fail.get() {
                return Err(SceneError::UnresolvedReference {
                    kind: "mesh",
                    name: "counter".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn finalize_runs_once_unless_forced() {
        let scene = Scene::new(SceneConfig::default());
        let counter = Counter {
            state: FinalizeState::default(),
            runs: Cell::new(0),
            fail: Cell::new(false),
        };
        counter.finalize(&scene, false).unwrap();
        counter.finalize(&scene, false).unwrap();
        assert_eq!(counter.runs.get(), 1);
        counter.finalize(&scene, true).unwrap();
        assert_eq!(counter.runs.get(), 2);
        assert!(counter.is_finalized());
    }

    #[test]
    fn failed_finalize_runs_again() {
        let scene = Scene::new(SceneConfig::default());
        let counter = Counter {
            state: FinalizeState::default(),
            runs: Cell::new(0),
            fail: Cell::new(true),
        };
        assert!(counter.finalize(&scene, false).is_err());
        assert!(!counter.is_finalized());
        assert!(counter.finalize(&scene, false).is_err());
        assert_eq!(counter.runs.get(), 2);

        counter.fail.set(false);
        counter.finalize(&scene, false).unwrap();
        assert!(counter.is_finalized());
    }
}
