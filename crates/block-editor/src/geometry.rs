use serde::{Deserialize, Serialize};

/// Screen-space rectangle, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Zero-size anchor at the horizontal center of the top edge.
    pub fn top_center(&self) -> Rect {
        Rect::new(self.center_x(), self.y, 0.0, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Where a document-level pointer-down landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    /// Inside the engine view of a block.
    Block(crate::BlockId),
    /// On an element flagged as toolbar content.
    Toolbar,
    Outside,
}

/// Where focus went when an engine view blurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurTarget {
    Toolbar,
    Elsewhere,
}

/// Layout queries the host answers for one block's engine view.
pub trait EngineView {
    /// Box of the character boundary at flat position `pos`, if laid out.
    fn coords_at_pos(&self, pos: usize) -> Option<Rect>;

    /// Bounding box of the whole block.
    fn block_rect(&self) -> Rect;
}

/// View with no layout; every toolbar anchors to the empty block box.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedView;

impl EngineView for DetachedView {
    fn coords_at_pos(&self, _pos: usize) -> Option<Rect> {
        None
    }

    fn block_rect(&self) -> Rect {
        Rect::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_covers_both_boxes() {
        let a = Rect::new(10.0, 20.0, 5.0, 10.0);
        let b = Rect::new(40.0, 50.0, 5.0, 10.0);
        assert_eq!(a.union(&b), Rect::new(10.0, 20.0, 35.0, 40.0));
        assert_eq!(b.union(&a), a.union(&b));
    }

    #[test]
    fn top_center_anchor() {
        let block = Rect::new(100.0, 40.0, 600.0, 80.0);
        assert_eq!(block.top_center(), Rect::new(400.0, 40.0, 0.0, 0.0));
    }
}
