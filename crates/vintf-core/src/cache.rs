use crate::CoreError;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

#[derive(Debug)]
struct SlotState<T> {
    fetched: bool,
    object: Option<Arc<T>>,
    error: Option<String>,
}

/// A lazily fetched object shared by reference.
///
/// The first read fetches and remembers the outcome, success or failure.
/// Later reads serve what was remembered until a read with `skip_cache`
/// fetches again. The lock is held across the fetch, so concurrent first
/// reads populate the slot once.
#[derive(Debug)]
pub struct CachedSlot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> Default for CachedSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CachedSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                fetched: false,
                object: None,
                error: None,
            }),
        }
    }

    pub fn is_fetched(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fetched
    }

    /// Forget the remembered outcome; the next read fetches.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.fetched = false;
        state.object = None;
        state.error = None;
    }

    /// Serve the remembered object, fetching it first when the slot is empty
    /// or `skip_cache` is set. A fetch failure is returned as is and then
    /// served as [`CoreError::Cached`] until the next `skip_cache` read.
    pub fn get_or_fetch<F>(&self, name: &str, skip_cache: bool, fetch: F) -> Result<Arc<T>, CoreError>
    where
        F: FnOnce() -> Result<T, CoreError>,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.fetched && !skip_cache {
            debug!("serving cached {name}");
            return match (&state.object, &state.error) {
                (Some(object), _) => Ok(Arc::clone(object)),
                (None, Some(error)) => Err(CoreError::Cached(error.clone())),
                (None, None) => Err(CoreError::Cached(format!("{name} is unavailable"))),
            };
        }

        debug!("fetching {name}");
        state.fetched = true;
        match fetch() {
            Ok(object) => {
                let object = Arc::new(object);
                state.object = Some(Arc::clone(&object));
                state.error = None;
                Ok(object)
            }
            Err(e) => {
                info!("remembering failure to fetch {name}: {e}");
                state.object = None;
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}
