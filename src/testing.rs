// SPDX-License-Identifier: MPL-2.0

//! Deterministic clock and display doubles for playback tests.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::{Duration, Instant},
};

use crate::{
    canvas::{Canvas, FrameBuffer},
    display::Display,
    scheduler::Clock,
};

/// Clock that only moves when slept on or advanced. Clones share the same time.
#[derive(Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
            sleeps: Rc::default(),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Every sleep requested so far, including ones cut short.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn sleep(&self, duration: Duration, stop: &dyn Fn() -> bool) {
        self.sleeps.borrow_mut().push(duration);
        if !stop() {
            self.advance(duration);
        }
    }
}

/// Display that records every presented frame and takes `latency` per swap.
pub struct RecordingDisplay {
    front: Canvas,
    clock: ManualClock,
    latency: Duration,
    presented: Rc<RefCell<Vec<Canvas>>>,
    swaps: Rc<Cell<usize>>,
    multiples: Vec<u32>,
    on_swap: Option<Box<dyn FnMut(usize)>>,
}

impl RecordingDisplay {
    pub fn new(width: u32, height: u32, clock: ManualClock) -> Self {
        Self {
            front: Canvas::new(width, height),
            clock,
            latency: Duration::ZERO,
            presented: Rc::default(),
            swaps: Rc::default(),
            multiples: Vec::new(),
            on_swap: None,
        }
    }

    /// Run `hook` after every swap with the number of swaps so far.
    pub fn on_swap(mut self, hook: impl FnMut(usize) + 'static) -> Self {
        self.on_swap = Some(Box::new(hook));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Shared swap counter, usable from stop predicates.
    pub fn swap_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.swaps)
    }

    pub fn presented(&self) -> Rc<RefCell<Vec<Canvas>>> {
        Rc::clone(&self.presented)
    }

    pub fn multiples(&self) -> &[u32] {
        &self.multiples
    }
}

impl Display for RecordingDisplay {
    type Buffer = Canvas;

    fn width(&self) -> u32 {
        self.front.width()
    }

    fn height(&self) -> u32 {
        self.front.height()
    }

    fn offscreen(&mut self) -> Canvas {
        Canvas::new(self.front.width(), self.front.height())
    }

    fn swap_on_vsync(&mut self, buffer: &mut Canvas, vsync_multiple: u32) {
        self.clock.advance(self.latency);
        std::mem::swap(&mut self.front, buffer);
        self.presented.borrow_mut().push(self.front.clone());
        self.multiples.push(vsync_multiple);
        self.swaps.set(self.swaps.get() + 1);
        if let Some(hook) = self.on_swap.as_mut() {
            hook(self.swaps.get());
        }
    }

    fn clear(&mut self) {
        self.front.clear();
    }
}

/// Canvas filled with a single grey level.
pub fn shade(width: u32, height: u32, value: u8) -> Canvas {
    let mut canvas = Canvas::new(width, height);
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            canvas.set_pixel(x, y, value, value, value);
        }
    }
    canvas
}
