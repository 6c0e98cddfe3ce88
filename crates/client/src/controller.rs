//! Interaction state for the canvas surface.
//!
//! The renderer feeds pointer and wheel events in and reads positions, cursor
//! affordance and selection back out. Nothing here touches the network.

use pinboard_types::{Comment, CommentId};

use crate::{
    threads::Threads,
    viewport::{Point, Size, Viewport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Browsing,
    /// Next canvas press drops a new comment; panning is suspended.
    Placing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CenteringState {
    #[default]
    Uninitialized,
    Centered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Grab,
    Crosshair,
}

/// What a pointer event landed on, as hit-tested by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Canvas,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerOutcome {
    /// A new comment was placed at this canvas position.
    Placed(Point),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click completed a placement and was swallowed.
    Consumed,
    /// Selection and any pending placement were cleared.
    Cleared,
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct CanvasController {
    viewport: Viewport,
    size: Size,
    mode: Mode,
    centering: CenteringState,
    selected: Option<CommentId>,
    editing: Option<CommentId>,
    pending: Option<Point>,
    just_placed: bool,
}

impl CanvasController {
    pub fn new(viewport: Viewport, size: Size) -> Self {
        Self {
            viewport,
            size,
            ..Self::default()
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn resize(&mut self, size: Size) {
        self.size = size;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn centering(&self) -> CenteringState {
        self.centering
    }

    pub fn selected(&self) -> Option<CommentId> {
        self.selected
    }

    pub fn editing(&self) -> Option<CommentId> {
        self.editing
    }

    /// Canvas position of the comment being composed, if any.
    pub fn pending(&self) -> Option<Point> {
        self.pending
    }

    pub fn cursor(&self) -> Cursor {
        match self.mode {
            Mode::Browsing => Cursor::Grab,
            Mode::Placing => Cursor::Crosshair,
        }
    }

    pub fn set_placement(&mut self, active: bool) {
        self.mode = if active { Mode::Placing } else { Mode::Browsing };
    }

    pub fn toggle_placement(&mut self) {
        self.set_placement(self.mode == Mode::Browsing);
    }

    pub fn pointer_down(&mut self, screen: Point, target: PointerTarget) -> PointerOutcome {
        if target == PointerTarget::Comment || self.mode != Mode::Placing {
            return PointerOutcome::Ignored;
        }

        let canvas = self.viewport.to_canvas(screen);
        self.pending = Some(canvas);
        self.mode = Mode::Browsing;
        // The click that follows this press must not clear what we just placed
        self.just_placed = true;
        PointerOutcome::Placed(canvas)
    }

    pub fn click(&mut self, target: PointerTarget) -> ClickOutcome {
        if std::mem::take(&mut self.just_placed) {
            return ClickOutcome::Consumed;
        }
        if target == PointerTarget::Comment {
            return ClickOutcome::Ignored;
        }

        self.selected = None;
        self.pending = None;
        ClickOutcome::Cleared
    }

    /// Pans in browsing mode; returns whether the drag moved the view.
    pub fn drag(&mut self, dx: f64, dy: f64) -> bool {
        if self.mode == Mode::Placing {
            return false;
        }
        self.viewport.pan_by(dx, dy);
        true
    }

    pub fn wheel(&mut self, cursor: Point, delta_y: f64) -> f64 {
        self.viewport.on_wheel(cursor, delta_y)
    }

    pub fn pinch(&mut self, cursor: Point, ratio: f64) -> f64 {
        self.viewport.on_pinch(cursor, ratio)
    }

    pub fn select(&mut self, id: Option<CommentId>) {
        self.selected = id;
    }

    pub fn start_editing(&mut self, id: CommentId) {
        self.editing = Some(id);
    }

    pub fn stop_editing(&mut self) {
        self.editing = None;
    }

    pub fn cancel_placement(&mut self) {
        self.pending = None;
        self.mode = Mode::Browsing;
    }

    /// Centers the view on the loaded comments the first time any arrive.
    /// Returns true only on the call that performed the centering.
    pub fn on_comments_loaded(&mut self, threads: &Threads) -> bool {
        if self.centering == CenteringState::Centered {
            return false;
        }
        let Some(center) = threads.bounding_center() else {
            return false;
        };

        self.viewport.center_on(center, self.size);
        self.centering = CenteringState::Centered;
        tracing::debug!(x = center.x, y = center.y, "centered viewport on comments");
        true
    }

    pub fn screen_position(&self, comment: &Comment) -> Point {
        self.viewport
            .to_screen(Point::new(comment.x_coord, comment.y_coord))
    }

    pub fn pending_screen_position(&self) -> Option<Point> {
        self.pending.map(|p| self.viewport.to_screen(p))
    }
}
