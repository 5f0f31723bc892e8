//! Heartbeat driven one-shot timers. The owner advances them with the frame time and gets the
//! keys of the timers that ran out. Nothing fires on its own, so a cancelled timer can never
//! touch the owner's state afterwards.

struct TimeEntry<Key> {
    key: Key,
    remaining_time: f32,
}

pub struct Timer<Key> {
    list_of_timers: Vec<TimeEntry<Key>>,
}

impl<Key> Default for Timer<Key> {
    fn default() -> Self {
        Timer {
            list_of_timers: Vec::new(),
        }
    }
}

impl<Key: Copy + PartialEq> Timer<Key> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new timer. If a timer with the key already exists it gets overwritten.
    pub fn start_timer(&mut self, key: Key, remaining_time: f32) {
        self.list_of_timers.retain(|e| e.key != key);
        self.list_of_timers.push(TimeEntry {
            key,
            remaining_time,
        });
    }

    /// Kills a timer (if still existing).
    pub fn cancel_timer(&mut self, key: Key) {
        self.list_of_timers.retain(|e| e.key != key);
    }

    /// Kills all timers.
    pub fn cancel_all(&mut self) {
        self.list_of_timers.clear();
    }

    /// The time left on a running timer.
    pub fn remaining(&self, key: Key) -> Option<f32> {
        self.list_of_timers
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.remaining_time.max(0.0))
    }

    pub fn is_empty(&self) -> bool {
        self.list_of_timers.is_empty()
    }

    /// Advances all timers and removes and returns the ones that ran out, in start order.
    pub fn update_and_get_list(&mut self, delta_time: f32) -> Vec<Key> {
        let mut result = Vec::new();

        for entry in self.list_of_timers.iter_mut() {
            entry.remaining_time -= delta_time;
            if entry.remaining_time <= 0.0 {
                result.push(entry.key);
            }
        }

        self.list_of_timers.retain(|e| !result.contains(&e.key));

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_after_the_duration() {
        let mut timer = Timer::new();
        timer.start_timer(1_u16, 0.3);
        assert!(timer.update_and_get_list(0.2).is_empty());
        assert_eq!(timer.update_and_get_list(0.2), vec![1]);
        assert!(timer.update_and_get_list(1.0).is_empty());
        assert!(timer.is_empty());
    }

    #[test]
    fn restarting_overwrites() {
        let mut timer = Timer::new();
        timer.start_timer('a', 0.1);
        timer.start_timer('a', 1.0);
        assert!(timer.update_and_get_list(0.5).is_empty());
        assert_eq!(timer.remaining('a'), Some(0.5));
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut timer = Timer::new();
        timer.start_timer(1_u16, 0.1);
        timer.start_timer(2_u16, 0.1);
        timer.cancel_timer(1);
        assert_eq!(timer.update_and_get_list(0.5), vec![2]);
        timer.start_timer(3, 0.1);
        timer.cancel_all();
        assert!(timer.update_and_get_list(0.5).is_empty());
        assert_eq!(timer.remaining(3), None);
    }
}
