use onac_core::{Display, Key, KeyEvent, Result, Scene};
use onac_timing::{ManualTimer, Timer};
use std::collections::VecDeque;
use std::time::Duration;

/// A display that renders nothing. Each flip advances the shared
/// [`ManualTimer`] by one frame, and scripted key presses are delivered once
/// the clock passes their time.
pub struct HeadlessDisplay {
    size: (u32, u32),
    timer: ManualTimer,
    frame_period: Duration,
    script: VecDeque<(u64, Key)>,
    last_scene: Option<Scene>,
    recorded: Option<Vec<(u64, Scene)>>,
    flips: usize,
    cursor_visible: bool,
    closed: bool,
}

impl HeadlessDisplay {
    pub fn new(size: (u32, u32), timer: ManualTimer, refresh_hz: f64) -> Self {
        Self {
            size,
            timer,
            frame_period: Duration::from_secs_f64(1.0 / refresh_hz.max(1.0)),
            script: VecDeque::new(),
            last_scene: None,
            recorded: None,
            flips: 0,
            cursor_visible: true,
            closed: false,
        }
    }

    /// Queues a key press at `at` on the session clock. Presses must be
    /// scripted in time order.
    pub fn press_at(mut self, at: Duration, key: Key) -> Self {
        self.script.push_back((at.as_nanos() as u64, key));
        self
    }

    /// Keeps every presented scene with its flip time.
    pub fn recording(mut self) -> Self {
        self.recorded = Some(Vec::new());
        self
    }

    pub fn flips(&self) -> usize {
        self.flips
    }

    pub fn frames(&self) -> &[(u64, Scene)] {
        self.recorded.as_deref().unwrap_or(&[])
    }

    pub fn last_scene(&self) -> Option<&Scene> {
        self.last_scene.as_ref()
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn pending_keys(&self) -> usize {
        self.script.len()
    }
}

impl Display for HeadlessDisplay {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn draw(&mut self, scene: &Scene) -> Result<()> {
        self.last_scene = Some(scene.clone());
        Ok(())
    }

    fn flip(&mut self) -> Result<u64> {
        self.timer.advance(self.frame_period);
        self.flips += 1;
        let now = self.timer.now();
        if let (Some(frames), Some(scene)) = (self.recorded.as_mut(), self.last_scene.as_ref()) {
            frames.push((now, scene.clone()));
        }
        Ok(now)
    }

    fn poll_keys(&mut self) -> Vec<KeyEvent> {
        let now = self.timer.now();
        let mut events = Vec::new();
        while self.script.front().is_some_and(|(at, _)| *at <= now) {
            if let Some((at, key)) = self.script.pop_front() {
                events.push(KeyEvent {
                    key,
                    timestamp_ns: at,
                });
            }
        }
        events
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }

    fn refresh_rate(&self) -> Option<f64> {
        Some(1.0 / self.frame_period.as_secs_f64())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn auto_advance(&self) -> bool {
        self.script.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onac_core::stimulus::BLACK;

    #[test]
    fn flips_advance_the_shared_clock() {
        let timer = ManualTimer::new();
        let mut display = HeadlessDisplay::new((800, 600), timer.clone(), 100.0).recording();
        display.draw(&Scene::blank(BLACK)).unwrap();
        let t1 = display.flip().unwrap();
        let t2 = display.flip().unwrap();
        assert_eq!(t1, 10_000_000);
        assert_eq!(t2 - t1, 10_000_000);
        assert_eq!(timer.now(), t2);
        assert_eq!(display.frames().len(), 2);
    }

    #[test]
    fn scripted_keys_arrive_in_time() {
        let timer = ManualTimer::new();
        let mut display = HeadlessDisplay::new((800, 600), timer.clone(), 60.0)
            .press_at(Duration::from_millis(500), Key::Space)
            .press_at(Duration::from_secs(2), Key::Left);

        assert!(display.poll_keys().is_empty());
        assert!(!display.auto_advance());
        timer.advance(Duration::from_millis(600));
        let keys = display.poll_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key, Key::Space);
        assert_eq!(keys[0].timestamp_ns, 500_000_000);
        timer.advance(Duration::from_secs(2));
        assert_eq!(display.poll_keys()[0].key, Key::Left);
        assert!(display.auto_advance());
    }
}
