// Pure per-frame update rules for the viewport.

pub mod movement;
pub mod orbit;
