//! Terminal output with CI fallback
//!
//! Uses `cliclack` for styled step logs when attached to a terminal and
//! falls back to plain bracketed lines in CI or when piped.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_error, outro_success, remark, step_error_detail, step_info,
    step_ok_detail, step_warn_hint,
};
pub use progress::RunProgress;

use cliclack::ThemeState;
use console::Style;

/// Cyan bar while a scenario is in flight, red once a run has failed
struct CacheCheckTheme;

impl cliclack::Theme for CacheCheckTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Error(_) => Style::new().red(),
            _ => Style::new().cyan(),
        }
    }
}

/// Install the cachecheck theme for cliclack output
pub fn init_theme() {
    cliclack::set_theme(CacheCheckTheme);
}
