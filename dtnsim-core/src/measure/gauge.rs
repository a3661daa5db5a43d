/// [`Gauge`] keeps track of how much of a bounded capacity is in use.
///
/// It is used to account for the bytes stored in a message buffer. Unlike
/// a strict allocator, the gauge may be forced above its maximum: a
/// transfer that was admitted while there was room must still be able to
/// land even if the buffer filled up in the meantime. Such an over-full
/// gauge refuses every [`Gauge::try_reserve`] until enough is freed.
///
/// The [`Default`] gauge has an unlimited capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gauge {
    maximum_capacity: u64,
    used_capacity: u64,
}

impl Gauge {
    /// create a [`Gauge`] with an infinite maximum capacity.
    ///
    /// ```
    /// # use dtnsim_core::measure::Gauge;
    /// let gauge = Gauge::new();
    /// # assert_eq!(gauge.maximum_capacity(), u64::MAX);
    /// // is equivalent to calling:
    /// let gauge = Gauge::with_capacity(u64::MAX);
    /// # assert_eq!(gauge.maximum_capacity(), u64::MAX);
    /// ```
    pub fn new() -> Self {
        Self::with_capacity(u64::MAX)
    }

    /// create a [`Gauge`] with the given maximum capacity.
    pub fn with_capacity(maximum_capacity: u64) -> Self {
        Self {
            maximum_capacity,
            used_capacity: 0,
        }
    }

    #[inline]
    pub fn maximum_capacity(&self) -> u64 {
        self.maximum_capacity
    }

    #[inline]
    pub fn set_maximum_capacity(&mut self, new: u64) {
        self.maximum_capacity = new;
    }

    #[inline]
    pub fn used_capacity(&self) -> u64 {
        self.used_capacity
    }

    /// capacity still available, `0` when over-full
    ///
    /// ```
    /// # use dtnsim_core::measure::Gauge;
    /// let mut gauge = Gauge::with_capacity(100);
    /// gauge.force_reserve(60);
    /// assert_eq!(gauge.remaining_capacity(), 40);
    /// gauge.force_reserve(60);
    /// assert_eq!(gauge.remaining_capacity(), 0);
    /// assert!(gauge.is_over_full());
    /// ```
    #[inline]
    pub fn remaining_capacity(&self) -> u64 {
        self.maximum_capacity.saturating_sub(self.used_capacity)
    }

    #[inline]
    pub fn is_over_full(&self) -> bool {
        self.used_capacity > self.maximum_capacity
    }

    /// `size` could never fit, even in an empty gauge
    #[inline]
    pub fn exceeds_capacity(&self, size: u64) -> bool {
        size > self.maximum_capacity
    }

    /// reserve `size` if it fits in the remaining capacity
    ///
    /// Returns `false` and leaves the gauge untouched otherwise.
    pub fn try_reserve(&mut self, size: u64) -> bool {
        if size <= self.remaining_capacity() {
            self.used_capacity += size;
            true
        } else {
            false
        }
    }

    /// reserve `size` even if this goes beyond the maximum capacity
    pub fn force_reserve(&mut self, size: u64) {
        self.used_capacity = self.used_capacity.saturating_add(size);
    }

    /// release up to `size`, returning what was actually released
    ///
    /// It is not possible to free more than what is in use.
    pub fn free(&mut self, size: u64) -> u64 {
        let actual_size = std::cmp::min(self.used_capacity, size);
        self.used_capacity -= actual_size;
        actual_size
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_bound() {
        let mut gauge = Gauge::with_capacity(10);

        assert!(gauge.try_reserve(0));
        assert!(gauge.try_reserve(10));
        assert!(!gauge.try_reserve(1));
        assert_eq!(gauge.used_capacity(), 10);
    }

    #[test]
    fn all_or_nothing() {
        let mut gauge = Gauge::with_capacity(100);

        assert!(gauge.try_reserve(60));
        assert!(!gauge.try_reserve(41));
        assert_eq!(gauge.used_capacity(), 60);
    }

    #[test]
    fn lower_bound() {
        let mut gauge = Gauge::new();

        assert_eq!(gauge.free(10), 0);

        gauge.force_reserve(100);
        assert_eq!(gauge.free(90), 90);
        assert_eq!(gauge.free(0), 0);
        assert_eq!(gauge.free(20), 10);
        assert_eq!(gauge.free(20), 0);
    }

    #[test]
    fn over_full_refuses_reservations_until_freed() {
        let mut gauge = Gauge::with_capacity(100);
        gauge.force_reserve(99);
        gauge.force_reserve(99);

        assert!(gauge.is_over_full());
        assert!(!gauge.try_reserve(1));

        gauge.free(99);
        assert!(!gauge.is_over_full());
        assert!(gauge.try_reserve(1));
    }

    #[test]
    fn exceeding_capacity() {
        let gauge = Gauge::with_capacity(100);

        assert!(gauge.exceeds_capacity(101));
        assert!(!gauge.exceeds_capacity(100));
    }
}
