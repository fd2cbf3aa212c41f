use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use image::RgbaImage;
use tracing::warn;

use super::{CacheStats, TransitionError, TransitionGenerator, TransitionKey};
use crate::app::{CardinalDirection, FloorTypeId};

static TRANSITION_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_transition_lock_poison_once() {
    if TRANSITION_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!("transition cache lock poisoned; recovered inner value");
    }
}

/// Cloneable handle serializing access to one generator, so concurrent requests for the
/// same key generate it once.
#[derive(Debug, Clone)]
pub struct SharedTransitions {
    inner: Arc<Mutex<TransitionGenerator>>,
}

impl SharedTransitions {
    pub fn new(generator: TransitionGenerator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(generator)),
        }
    }

    pub fn create_transition(
        &self,
        direction: CardinalDirection,
        floor: FloorTypeId,
    ) -> Result<Arc<RgbaImage>, TransitionError> {
        self.lock().create_transition(direction, floor)
    }

    pub fn composite(&self, key: TransitionKey) -> Result<Arc<RgbaImage>, TransitionError> {
        self.lock().composite(key)
    }

    pub fn fog_edge(&self, direction: CardinalDirection) -> Arc<RgbaImage> {
        self.lock().fog_edge(direction)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock().cache_stats()
    }

    /// Runs `f` with exclusive access to the generator.
    pub fn with<R>(&self, f: impl FnOnce(&mut TransitionGenerator) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, TransitionGenerator> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_transition_lock_poison_once();
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::config::TransitionConfig;
    use crate::transitions::SolidColorSource;

    #[test]
    fn concurrent_requests_share_one_tile() {
        let source = SolidColorSource::new(16).with_floor(FloorTypeId(4), [9, 9, 9, 255]);
        let config = TransitionConfig {
            tile_size: 16,
            diffusion_depth: 6,
            seed: 7,
        };
        let shared = SharedTransitions::new(
            TransitionGenerator::new(config, Box::new(source)).expect("generator"),
        );

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared
                        .create_transition(CardinalDirection::South, FloorTypeId(4))
                        .expect("tile")
                })
            })
            .collect();
        let tiles: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("join"))
            .collect();

        assert!(tiles.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(shared.cache_stats().edges, 1);
    }
}
