use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use futures_util::future::{self, FutureExt, LocalBoxFuture, Shared};
use tracing::{debug, error};

use crate::error::{FetchError, LoadError};
use crate::record::RecordSet;

pub type LoadResult = Result<Arc<RecordSet>, LoadError>;

/// Handle to a dataset load. Every clone resolves to the same result.
pub type PendingLoad = Shared<LocalBoxFuture<'static, LoadResult>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Loaded,
    Failed(LoadError),
}

enum Slot {
    Idle,
    Loading(PendingLoad),
    Loaded(Arc<RecordSet>),
    Failed(LoadError),
}

/// Owner of the canonical record set for the session.
///
/// Lifecycle: Idle → Loading → Loaded | Failed. Failed → Loading only through
/// another explicit [`RecordStore::load`] call.
///
/// Notes:
/// - A `load` while Loading returns the in-flight future; fetch is not called
///   again.
/// - A `load` after Loaded resolves immediately to the cached set.
/// - Clones share state; the store is single-threaded.
#[derive(Clone)]
pub struct RecordStore {
    slot: Rc<RefCell<Slot>>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot::Idle)),
        }
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("status", &self.status())
            .finish()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<F, Fut>(&self, fetch: F) -> PendingLoad
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, FetchError>> + 'static,
    {
        let mut slot = self.slot.borrow_mut();
        match &*slot {
            Slot::Loading(pending) => {
                debug!("dataset load already in flight");
                return pending.clone();
            }
            Slot::Loaded(set) => return future::ready(Ok(Arc::clone(set))).boxed_local().shared(),
            Slot::Idle | Slot::Failed(_) => {}
        }

        let owner = Rc::downgrade(&self.slot);
        let fetched = fetch();
        let pending = async move {
            let result = match fetched.await {
                Ok(text) => RecordSet::parse(&text).map(Arc::new),
                Err(e) => Err(LoadError::Fetch(e)),
            };
            if let Err(e) = &result {
                error!(error = %e, "dataset load failed");
            }
            if let Some(slot) = owner.upgrade() {
                *slot.borrow_mut() = match &result {
                    Ok(set) => Slot::Loaded(Arc::clone(set)),
                    Err(e) => Slot::Failed(e.clone()),
                };
            }
            result
        }
        .boxed_local()
        .shared();

        *slot = Slot::Loading(pending.clone());
        pending
    }

    /// Loads from text that is already in memory.
    pub fn load_text(&self, text: impl Into<String>) -> PendingLoad {
        let text = text.into();
        self.load(move || future::ready(Ok(text)))
    }

    pub fn status(&self) -> LoadStatus {
        match &*self.slot.borrow() {
            Slot::Idle => LoadStatus::Idle,
            Slot::Loading(_) => LoadStatus::Loading,
            Slot::Loaded(_) => LoadStatus::Loaded,
            Slot::Failed(e) => LoadStatus::Failed(e.clone()),
        }
    }

    pub fn records(&self) -> Option<Arc<RecordSet>> {
        match &*self.slot.borrow() {
            Slot::Loaded(set) => Some(Arc::clone(set)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadStatus, RecordStore};
    use crate::error::{FetchError, LoadError};
    use futures_util::future;
    use std::cell::Cell;
    use std::rc::Rc;

    const DATA: &str = "id,lat,lng,category\n1,10,10,forest\n2,20,20,marine\n";

    #[test]
    fn second_load_while_pending_shares_the_fetch() {
        let store = RecordStore::new();
        let calls = Rc::new(Cell::new(0));
        let (tx, rx) = manual_fetch::oneshot();

        let c = Rc::clone(&calls);
        let first = store.load(move || {
            c.set(c.get() + 1);
            rx
        });
        assert_eq!(store.status(), LoadStatus::Loading);

        let c = Rc::clone(&calls);
        let second = store.load(move || {
            c.set(c.get() + 1);
            future::ready(Ok(String::new()))
        });
        assert_eq!(calls.get(), 1);

        tx(Ok(DATA.to_string()));
        let a = pollster::block_on(first).expect("load");
        let b = pollster::block_on(second).expect("load");
        assert_eq!(a.len(), 2);
        assert!(std::sync::Arc::ptr_eq(&a, &b));
        assert_eq!(store.status(), LoadStatus::Loaded);
    }

    #[test]
    fn loaded_store_returns_cached_set_without_fetching() {
        let store = RecordStore::new();
        let first = pollster::block_on(store.load_text(DATA)).unwrap();

        let fetched = Rc::new(Cell::new(false));
        let f = Rc::clone(&fetched);
        let again = pollster::block_on(store.load(move || {
            f.set(true);
            future::ready(Ok(String::new()))
        }))
        .unwrap();
        assert!(!fetched.get());
        assert!(std::sync::Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn failure_is_reported_and_retry_is_explicit() {
        let store = RecordStore::new();
        let err = pollster::block_on(
            store.load(|| future::ready(Err(FetchError::new("offline")))),
        )
        .unwrap_err();
        assert_eq!(err, LoadError::Fetch(FetchError::new("offline")));
        assert_eq!(store.status(), LoadStatus::Failed(err));
        assert!(store.records().is_none());

        let set = pollster::block_on(store.load_text(DATA)).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(store.status(), LoadStatus::Loaded);
    }

    #[test]
    fn unparseable_payload_is_a_load_error() {
        let store = RecordStore::new();
        let err = pollster::block_on(store.load_text("title\nnothing useful\n")).unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    /// A hand-completed future standing in for a network fetch.
    mod manual_fetch {
        use crate::error::FetchError;
        use std::cell::RefCell;
        use std::future::Future;
        use std::pin::Pin;
        use std::rc::Rc;
        use std::task::{Context, Poll, Waker};

        type Payload = Result<String, FetchError>;

        #[derive(Default)]
        struct Inner {
            value: Option<Payload>,
            waker: Option<Waker>,
        }

        pub struct Receiver(Rc<RefCell<Inner>>);

        impl Future for Receiver {
            type Output = Payload;

            fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Payload> {
                let mut inner = self.0.borrow_mut();
                match inner.value.take() {
                    Some(v) => Poll::Ready(v),
                    None => {
                        inner.waker = Some(cx.waker().clone());
                        Poll::Pending
                    }
                }
            }
        }

        pub fn oneshot() -> (impl FnOnce(Payload), Receiver) {
            let inner = Rc::new(RefCell::new(Inner::default()));
            let tx = {
                let inner = Rc::clone(&inner);
                move |v: Payload| {
                    let waker = {
                        let mut i = inner.borrow_mut();
                        i.value = Some(v);
                        i.waker.take()
                    };
                    if let Some(w) = waker {
                        w.wake();
                    }
                }
            };
            (tx, Receiver(inner))
        }
    }
}
