use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use web_sys::console;

use crate::controller::RotateDirection;
use crate::scores::Leaderboard;
use crate::session::SessionCoordinator;
use crate::settings::{GameSettings, SessionSettings};
use crate::store::{MemoryClient, MemoryStore};
use crate::timer::ManualTicks;

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
}

fn log(msg: &str) {
    console::log_1(&JsValue::from_str(msg));
}

/// Solo game for the browser. The page owns the clock: it calls `tick()` every
/// `tickIntervalMs()` and re-reads the interval after each clear.
#[wasm_bindgen]
pub struct PracticeClient {
    session: SessionCoordinator<MemoryClient, Leaderboard>,
}

#[wasm_bindgen]
impl PracticeClient {
    #[wasm_bindgen(constructor)]
    pub fn new(name: String, settings: JsValue) -> Result<PracticeClient, JsValue> {
        let game: GameSettings = from_value(settings).unwrap_or_default();
        let settings = SessionSettings {
            game,
            ..SessionSettings::default()
        };
        let mut session = SessionCoordinator::new(
            MemoryStore::new().connect(),
            Leaderboard::new(),
            settings,
            Box::new(ManualTicks),
        )
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
        session
            .join(&name, true)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        log(&format!("[practice] started for {}", session.display_name()));
        Ok(Self { session })
    }

    pub fn tick(&mut self) {
        self.session.tick();
    }

    #[wasm_bindgen(js_name = moveLeft)]
    pub fn move_left(&mut self) -> bool {
        self.session.move_piece(-1)
    }

    #[wasm_bindgen(js_name = moveRight)]
    pub fn move_right(&mut self) -> bool {
        self.session.move_piece(1)
    }

    pub fn rotate(&mut self) -> bool {
        self.session.rotate(RotateDirection::Clockwise)
    }

    #[wasm_bindgen(js_name = softDrop)]
    pub fn soft_drop(&mut self) {
        self.session.soft_drop();
    }

    #[wasm_bindgen(js_name = hardDrop)]
    pub fn hard_drop(&mut self) {
        self.session.hard_drop();
    }

    #[wasm_bindgen(js_name = togglePause)]
    pub fn toggle_pause(&mut self) -> Result<(), JsValue> {
        self.session
            .toggle_pause()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = tickIntervalMs)]
    pub fn tick_interval_ms(&self) -> u32 {
        self.session
            .controller()
            .map(|c| c.tick_interval_ms())
            .unwrap_or(self.session.settings().game.base_interval_ms)
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_value(&self.session.snapshot()).map_err(|e| e.into())
    }
}
