//! The atomic `status`/`view` cells shared between the core's event loop
//! and the backend (spec §5, §9 "Global mutable state"). The backend
//! reads both to gate `broadcast` targets and header verification; only
//! the core writes them, and only through [`Backend::change_view`] /
//! [`Backend::set_status`] (spec §9: "the backend reads them but never
//! changes `status`; only the core advances `view`").

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use e2c_types::{Status, View};

#[derive(Clone)]
pub struct SharedViewStatus {
    view: Arc<AtomicU64>,
    status: Arc<AtomicU8>,
}

impl SharedViewStatus {
    pub fn new(initial_view: View) -> Self {
        SharedViewStatus {
            view: Arc::new(AtomicU64::new(initial_view)),
            status: Arc::new(AtomicU8::new(Status::SteadyState as u8)),
        }
    }

    pub fn view(&self) -> View {
        self.view.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn set_view(&self, view: View) {
        self.view.store(view, Ordering::SeqCst);
    }

    pub fn set_status(&self, status: Status) {
        self.status.store(status as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_and_status_round_trip() {
        let shared = SharedViewStatus::new(0);
        assert_eq!(shared.view(), 0);
        assert_eq!(shared.status(), Status::SteadyState);
        shared.set_view(3);
        shared.set_status(Status::Wait);
        assert_eq!(shared.view(), 3);
        assert_eq!(shared.status(), Status::Wait);
    }
}
