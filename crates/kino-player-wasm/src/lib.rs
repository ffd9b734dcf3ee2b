//! Kino Player WASM - Browser binding for the Kino player framework
//!
//! Provides the browser host for `kino-player`:
//! - `web-sys` DOM backend
//! - Native `HTMLMediaElement` platform
//! - A clock pump driving the player's run loop from `setInterval`
//! - The `KinoPlayer` facade for JavaScript
//!
//! ```javascript
//! import init, { KinoPlayer } from '@kino/player';
//!
//! await init();
//! const player = new KinoPlayer('player-container', { sources: ['movie.mp4'] });
//! player.on('timeupdate', (type, data) => console.log(player.currentTime()));
//! player.play();
//! ```

use wasm_bindgen::prelude::*;

mod dom;
mod media;
mod player;

pub use dom::WebDom;
pub use media::{WebMediaElement, WebPlatform};
pub use player::KinoPlayer;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
    kino_player::init();
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    kino_player::VERSION.to_string()
}

/// Names of the registered techs, in precedence order
#[wasm_bindgen(js_name = techNames)]
pub fn tech_names() -> Vec<String> {
    kino_player::tech_names()
}
