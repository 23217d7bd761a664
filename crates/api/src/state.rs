use hypergate_admission::AdmissionControl;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    pub admission: AdmissionControl,
}

impl AppState {
    pub fn new(admission: AdmissionControl) -> Self {
        Self { admission }
    }
}
