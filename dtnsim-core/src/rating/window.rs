use crate::{error::ConfigError, time::SimTime};
use std::time::Duration;

/// Fixed length windows of simulated time.
///
/// Windowed rating mechanisms accumulate observations during a window and
/// fold them into their estimate when the window ends. The first window
/// ends at `length`, the next one at `2 * length` and so on.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    length: f64,
    next_end: f64,
}

impl Window {
    /// ```
    /// # use dtnsim_core::rating::Window;
    /// # use std::time::Duration;
    /// assert!(Window::new("windowLength", Duration::ZERO).is_err());
    /// assert!(Window::new("windowLength", Duration::from_secs(10)).is_ok());
    /// ```
    pub fn new(name: &'static str, length: Duration) -> Result<Self, ConfigError> {
        let length = ConfigError::check_positive(name, length.as_secs_f64())?;
        Ok(Self {
            length,
            next_end: length,
        })
    }

    #[inline]
    pub fn length(&self) -> Duration {
        Duration::from_secs_f64(self.length)
    }

    /// the end of the current window
    #[inline]
    pub fn next_end(&self) -> SimTime {
        SimTime::from_secs(self.next_end)
    }

    /// move past every window that ended at or before `now`
    ///
    /// Returns how many windows ended. Calling it again before the next
    /// boundary returns `0`.
    pub fn advance(&mut self, now: SimTime) -> u32 {
        let mut crossed = 0;
        while now.as_secs() >= self.next_end {
            self.next_end += self.length;
            crossed += 1;
        }
        crossed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(secs: u64) -> Window {
        Window::new("windowLength", Duration::from_secs(secs)).unwrap()
    }

    #[test]
    fn nothing_before_first_boundary() {
        let mut window = window(10);

        assert_eq!(window.advance(SimTime::from_secs(9.9)), 0);
        assert_eq!(window.next_end(), SimTime::from_secs(10.0));
    }

    #[test]
    fn boundary_is_inclusive() {
        let mut window = window(10);

        assert_eq!(window.advance(SimTime::from_secs(10.0)), 1);
        assert_eq!(window.advance(SimTime::from_secs(10.0)), 0);
        assert_eq!(window.next_end(), SimTime::from_secs(20.0));
    }

    #[test]
    fn several_windows_at_once() {
        let mut window = window(10);

        assert_eq!(window.advance(SimTime::from_secs(35.0)), 3);
        assert_eq!(window.next_end(), SimTime::from_secs(40.0));
    }
}
