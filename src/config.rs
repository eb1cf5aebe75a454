//! Runtime settings resolved from the environment and injected into
//! `AppState` (rather than a module-level global), per the design note.

/// Process-wide runtime toggles.
#[derive(Clone, Debug)]
pub struct AppSettings {
    /// Write audit rows for authorization denials. Default off.
    pub audit_denials: bool,
}

impl AppSettings {
    /// Resolve settings from the environment. `AUDIT_DENIALS=true`
    /// enables denial auditing; anything else (or unset) leaves it off.
    pub fn from_env() -> Self {
        let audit_denials = std::env::var("AUDIT_DENIALS")
            .map(|val| val.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self { audit_denials }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            audit_denials: false,
        }
    }
}
