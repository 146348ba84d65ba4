use std::sync::OnceLock;

static INSTANCE_ID: OnceLock<String> = OnceLock::new();

/// Identity of this process within the fleet: `<hostname>-<uuid>`.
///
/// Stable for the process lifetime; written into lock values so an operator
/// can tell which instance holds a key.
pub fn instance_id() -> &'static str {
    INSTANCE_ID.get_or_init(|| {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        format!("{host}-{}", uuid::Uuid::new_v4().simple())
    })
}

/// Fresh holder token scoped to this instance.
///
/// Used when one process hosts several lock handles that must not release
/// each other's keys.
pub fn holder_token() -> String {
    format!("{}#{}", instance_id(), uuid::Uuid::new_v4().simple())
}
