/// Timing of ghost visuals and window topology announcements.

#[derive(Debug, Clone, Copy)]
pub struct SyncTuning {
    /// Ghost fade-in/out duration in seconds.
    pub fade_seconds: f32,

    /// Opacity of a fully faded-in ghost.
    pub ghost_opacity: f32,

    /// Duration of the blend toward a remote move target, in seconds.
    pub smoothing_seconds: f32,

    /// Minimum change in pixels before a window move is broadcast.
    pub move_threshold_px: i32,

    /// How often the local window re-announces itself, in milliseconds.
    pub announce_interval_ms: u64,

    /// Peers silent for longer than this are treated as closed, in milliseconds.
    pub liveness_window_ms: u64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            fade_seconds: 0.5,
            ghost_opacity: 0.5,
            smoothing_seconds: 0.2,
            move_threshold_px: 3,
            announce_interval_ms: 1_000,
            liveness_window_ms: 5_000,
        }
    }
}
