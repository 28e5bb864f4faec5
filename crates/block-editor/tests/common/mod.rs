#![allow(dead_code)]

use std::time::{Duration, Instant};

use notes_block_editor::{Block, BlockId, BlockType, EditorEvent, EditorHost, EngineView, Rect};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Monospace layout: every position is `CHAR_WIDTH` wide on one line.
pub struct GridView {
    pub block: Rect,
}

pub const CHAR_WIDTH: f32 = 8.0;

impl EngineView for GridView {
    fn coords_at_pos(&self, pos: usize) -> Option<Rect> {
        Some(Rect::new(
            self.block.x + pos as f32 * CHAR_WIDTH,
            self.block.y + 4.0,
            1.0,
            16.0,
        ))
    }

    fn block_rect(&self) -> Rect {
        self.block
    }
}

pub fn block_rect() -> Rect {
    Rect::new(100.0, 40.0, 600.0, 24.0)
}

pub fn view() -> Box<dyn EngineView> {
    Box::new(GridView { block: block_rect() })
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("notes_block_editor=trace"))
        .with_test_writer()
        .try_init();
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub fn id(name: &str) -> BlockId {
    BlockId::from(name)
}

pub fn text_block(name: &str, content: &str) -> Block {
    Block::new(name, BlockType::Text, Value::from(content))
}

/// Host with one mounted, focused text block.
pub fn host_with(name: &str, content: &str) -> EditorHost {
    init_tracing();
    let mut host = EditorHost::default();
    host.mount(&text_block(name, content), view());
    host.focus(&id(name));
    host
}

pub fn events_for(host: &mut EditorHost, name: &str) -> Vec<EditorEvent> {
    let block = id(name);
    host.drain_events()
        .into_iter()
        .filter(|(owner, _)| *owner == block)
        .map(|(_, event)| event)
        .collect()
}

pub fn start() -> Instant {
    Instant::now()
}
