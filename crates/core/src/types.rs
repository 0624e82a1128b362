/// Seconds since the Unix epoch, as carried in a credential's `exp` claim.
pub type UnixSeconds = i64;

/// Current wall-clock time in whole seconds since the epoch.
pub fn now_secs() -> UnixSeconds {
    chrono::Utc::now().timestamp()
}
